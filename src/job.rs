//! Upload flow: idle → uploading → processing → completed / failed.

use std::future::Future;
use std::time::Duration;

use futures_channel::mpsc::UnboundedSender;

use crate::api::{ApiClient, ApiError, JobId, JobState, JobStatus, OutputSelection, Upload};
use crate::config::AppConfig;
use crate::download::{Artifact, ArtifactKind, Href, ObjectUrl};

#[derive(Debug)]
pub enum Stage {
    Idle,
    Uploading { file_name: String },
    Processing { job_id: JobId, state: JobState, attempts: u32 },
    Completed { artifacts: Vec<Artifact> },
    Failed { message: String },
}

impl Stage {
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Uploading { .. } | Self::Processing { .. })
    }
}

/// Progress reported by a running upload.
#[derive(Debug)]
pub enum JobEvent {
    Submitted(JobId),
    Progress { state: JobState, attempt: u32 },
    Finished(Vec<Artifact>),
    Failed(String),
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FlowError {
    #[error("an upload is already in progress")]
    Busy,
    #[error("please choose a .{expected} file (got \"{file_name}\")")]
    WrongExtension { expected: String, file_name: String },
    #[error("\"{0}\" is empty")]
    EmptyFile(String),
    #[error("select at least one output")]
    NoOutputs,
}

#[derive(Debug)]
pub struct JobTracker {
    stage: Stage,
}

impl Default for JobTracker {
    fn default() -> Self {
        Self { stage: Stage::Idle }
    }
}

impl JobTracker {
    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    /// Accept a picked file and move to `Uploading`.
    pub fn begin(&mut self, upload: &Upload, extension: &str) -> Result<(), FlowError> {
        if self.stage.is_busy() {
            return Err(FlowError::Busy);
        }
        let matches = upload
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(extension));
        if !matches {
            return Err(FlowError::WrongExtension {
                expected: extension.to_owned(),
                file_name: upload.file_name.clone(),
            });
        }
        if upload.bytes.is_empty() {
            return Err(FlowError::EmptyFile(upload.file_name.clone()));
        }
        self.stage = Stage::Uploading { file_name: upload.file_name.clone() };
        Ok(())
    }

    /// Pick up a job submitted before the page was reloaded.
    pub fn resume(&mut self, job_id: JobId) -> bool {
        if !matches!(self.stage, Stage::Idle) {
            return false;
        }
        self.stage = Stage::Processing { job_id, state: JobState::Queued, attempts: 0 };
        true
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.stage = Stage::Failed { message: message.into() };
    }

    pub fn reset(&mut self) {
        self.stage = Stage::Idle;
    }

    pub fn apply(&mut self, event: JobEvent) {
        let stage = std::mem::replace(&mut self.stage, Stage::Idle);
        self.stage = match (stage, event) {
            (Stage::Uploading { .. }, JobEvent::Submitted(job_id)) => {
                log::info!("job {job_id} submitted");
                Stage::Processing { job_id, state: JobState::Queued, attempts: 0 }
            }
            (Stage::Processing { job_id, .. }, JobEvent::Progress { state, attempt }) => {
                log::debug!("job {job_id}: {} (poll {attempt})", state.label());
                Stage::Processing { job_id, state, attempts: attempt }
            }
            (Stage::Uploading { .. } | Stage::Processing { .. }, JobEvent::Finished(artifacts)) => {
                if artifacts.is_empty() {
                    Stage::Failed { message: "the job finished without any artifacts".to_owned() }
                } else {
                    log::info!("{} artifact(s) ready", artifacts.len());
                    Stage::Completed { artifacts }
                }
            }
            (Stage::Uploading { .. } | Stage::Processing { .. }, JobEvent::Failed(message)) => {
                log::error!("upload failed: {message}");
                Stage::Failed { message }
            }
            (stage, event) => {
                log::warn!("ignoring {event:?} while {stage:?}");
                stage
            }
        };
    }
}

/// Terminal result of a [`Poller`] run.
#[derive(Debug, PartialEq)]
pub enum PollOutcome {
    Settled(JobStatus),
    Cancelled,
    TimedOut { attempts: u32 },
}

/// Fixed-interval status poll.
#[derive(Debug, Clone, Copy)]
pub struct Poller {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Poller {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            interval: config.poll_interval(),
            max_attempts: config.max_poll_attempts,
        }
    }

    /// Poll until the job reaches a terminal state.
    ///
    /// `on_status` sees every status with its 1-based attempt number and
    /// returns `false` once nobody is listening any more.
    pub async fn run<F, Fut, S, SFut, R>(
        &self,
        mut fetch: F,
        mut sleep: S,
        mut on_status: R,
    ) -> Result<PollOutcome, ApiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<JobStatus, ApiError>>,
        S: FnMut(Duration) -> SFut,
        SFut: Future<Output = ()>,
        R: FnMut(u32, &JobStatus) -> bool,
    {
        for attempt in 1..=self.max_attempts {
            let status = fetch().await?;
            if !on_status(attempt, &status) {
                return Ok(PollOutcome::Cancelled);
            }
            if status.status.is_terminal() {
                return Ok(PollOutcome::Settled(status));
            }
            if attempt < self.max_attempts {
                sleep(self.interval).await;
            }
        }
        Ok(PollOutcome::TimedOut { attempts: self.max_attempts })
    }
}

/// Turn a completed status into downloadable artifacts.
pub fn resolve_artifacts(config: &AppConfig, status: &JobStatus) -> Vec<Artifact> {
    [
        (ArtifactKind::Image, status.image_url.as_deref()),
        (ArtifactKind::Object, status.object_url.as_deref()),
    ]
    .into_iter()
    .filter_map(|(kind, url)| {
        let url = url.map(str::trim).filter(|u| !u.is_empty())?;
        Some(Artifact::remote(kind, config.resolve(url)))
    })
    .collect()
}

/// The event a finished poll run reports; `None` when it was cancelled.
pub fn outcome_event(
    config: &AppConfig,
    job_id: &JobId,
    outcome: Result<PollOutcome, ApiError>,
) -> Option<JobEvent> {
    let event = match outcome {
        Ok(PollOutcome::Settled(status)) if status.status == JobState::Completed => {
            JobEvent::Finished(resolve_artifacts(config, &status))
        }
        Ok(PollOutcome::Settled(status)) => JobEvent::Failed(status.failure_reason()),
        Ok(PollOutcome::TimedOut { attempts }) => JobEvent::Failed(format!(
            "job {job_id} did not finish after {attempts} status checks"
        )),
        Ok(PollOutcome::Cancelled) => return None,
        Err(e) => JobEvent::Failed(e.to_string()),
    };
    Some(event)
}

/// Delivers events from a driver to the UI thread.
pub struct EventSink {
    tx: UnboundedSender<JobEvent>,
    ctx: egui::Context,
}

impl EventSink {
    pub fn new(tx: UnboundedSender<JobEvent>, ctx: egui::Context) -> Self {
        Self { tx, ctx }
    }

    /// `false` once the receiving side has been dropped.
    pub fn send(&self, event: JobEvent) -> bool {
        let delivered = self.tx.unbounded_send(event).is_ok();
        self.ctx.request_repaint();
        delivered
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Legacy flow: one request, image bytes back.
pub async fn drive_legacy(client: ApiClient, upload: Upload, sink: EventSink) {
    let event = match client.generate_graph(&upload).await {
        Ok(bytes) => match ObjectUrl::from_bytes(&bytes, ArtifactKind::Image.mime()) {
            Ok(url) => {
                log::info!("received {} byte image for {}", bytes.len(), upload.file_name);
                JobEvent::Finished(vec![Artifact { kind: ArtifactKind::Image, href: Href::Local(url) }])
            }
            Err(e) => JobEvent::Failed(format!("could not store the image: {e:?}")),
        },
        Err(e) => JobEvent::Failed(e.to_string()),
    };
    sink.send(event);
}

/// Job flow: create the job, then poll it.
pub async fn drive_job(
    config: AppConfig,
    client: ApiClient,
    upload: Upload,
    outputs: OutputSelection,
    sink: EventSink,
) {
    let job_id = match client.create_job(&upload, outputs).await {
        Ok(id) => id,
        Err(e) => {
            sink.send(JobEvent::Failed(e.to_string()));
            return;
        }
    };
    if !sink.send(JobEvent::Submitted(job_id.clone())) {
        return;
    }
    crate::persist::remember_job(&job_id);
    drive_resume(config, client, job_id, sink).await;
}

/// Poll an already submitted job to completion.
pub async fn drive_resume(config: AppConfig, client: ApiClient, job_id: JobId, sink: EventSink) {
    let poller = Poller::from_config(&config);
    let outcome = poller
        .run(
            || client.job_status(&job_id),
            sleep,
            |attempt, status| {
                sink.send(JobEvent::Progress { state: status.status, attempt })
            },
        )
        .await;

    let Some(event) = outcome_event(&config, &job_id, outcome) else {
        log::info!("stopped polling job {job_id}");
        return;
    };
    crate::persist::forget_job();
    if sink.is_closed() {
        return;
    }
    sink.send(event);
}

#[cfg(target_arch = "wasm32")]
async fn sleep(interval: Duration) {
    let millis = u32::try_from(interval.as_millis()).unwrap_or(u32::MAX);
    gloo_timers::future::TimeoutFuture::new(millis).await;
}

#[cfg(not(target_arch = "wasm32"))]
async fn sleep(interval: Duration) {
    std::thread::sleep(interval);
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;

    fn mtx(name: &str) -> Upload {
        Upload { file_name: name.to_owned(), bytes: b"%%MatrixMarket matrix coordinate real general\n".to_vec() }
    }

    fn status(state: JobState) -> JobStatus {
        JobStatus { status: state, image_url: None, object_url: None, error: None, message: None }
    }

    #[test]
    fn begin_validates_the_file() {
        let mut t = JobTracker::default();
        assert!(matches!(
            t.begin(&mtx("graph.csv"), "mtx"),
            Err(FlowError::WrongExtension { .. })
        ));
        let empty = Upload { file_name: "g.mtx".to_owned(), bytes: vec![] };
        assert_eq!(t.begin(&empty, "mtx"), Err(FlowError::EmptyFile("g.mtx".to_owned())));
        assert!(matches!(t.stage(), Stage::Idle));

        t.begin(&mtx("G.MTX"), "mtx").unwrap();
        assert!(matches!(t.stage(), Stage::Uploading { file_name } if file_name == "G.MTX"));
        assert_eq!(t.begin(&mtx("again.mtx"), "mtx"), Err(FlowError::Busy));
    }

    #[test]
    fn job_flow_walks_all_stages() {
        let mut t = JobTracker::default();
        t.begin(&mtx("a.mtx"), "mtx").unwrap();
        t.apply(JobEvent::Submitted(JobId::new("j1")));
        assert!(matches!(t.stage(), Stage::Processing { attempts: 0, .. }));

        t.apply(JobEvent::Progress { state: JobState::Processing, attempt: 3 });
        match t.stage() {
            Stage::Processing { job_id, state, attempts } => {
                assert_eq!(job_id.as_str(), "j1");
                assert_eq!(*state, JobState::Processing);
                assert_eq!(*attempts, 3);
            }
            other => panic!("unexpected {other:?}"),
        }

        t.apply(JobEvent::Finished(vec![Artifact::remote(ArtifactKind::Image, "https://x/g.png")]));
        assert!(matches!(t.stage(), Stage::Completed { artifacts } if artifacts.len() == 1));

        // A new upload may start from a finished state.
        t.begin(&mtx("b.mtx"), "mtx").unwrap();
        assert!(matches!(t.stage(), Stage::Uploading { .. }));
    }

    #[test]
    fn finishing_without_artifacts_is_a_failure() {
        let mut t = JobTracker::default();
        t.begin(&mtx("a.mtx"), "mtx").unwrap();
        t.apply(JobEvent::Finished(Vec::new()));
        assert!(matches!(t.stage(), Stage::Failed { .. }));
    }

    #[test]
    fn stray_events_are_ignored() {
        let mut t = JobTracker::default();
        t.apply(JobEvent::Progress { state: JobState::Processing, attempt: 1 });
        t.apply(JobEvent::Failed("late".to_owned()));
        assert!(matches!(t.stage(), Stage::Idle));

        t.begin(&mtx("a.mtx"), "mtx").unwrap();
        t.apply(JobEvent::Progress { state: JobState::Processing, attempt: 1 });
        assert!(matches!(t.stage(), Stage::Uploading { .. }));
    }

    #[test]
    fn resume_only_from_idle() {
        let mut t = JobTracker::default();
        assert!(t.resume(JobId::new("old")));
        assert!(!t.resume(JobId::new("other")));
        t.apply(JobEvent::Failed("gone".to_owned()));
        assert!(matches!(t.stage(), Stage::Failed { message } if message == "gone"));
        t.reset();
        assert!(matches!(t.stage(), Stage::Idle));
    }

    #[test]
    fn poller_stops_on_terminal_state() {
        let replies = RefCell::new(VecDeque::from([
            status(JobState::Queued),
            status(JobState::Processing),
            status(JobState::Completed),
            status(JobState::Failed),
        ]));
        let sleeps = Cell::new(0);
        let seen = RefCell::new(Vec::new());
        let poller = Poller { interval: Duration::from_millis(1000), max_attempts: 10 };

        let outcome = block_on(poller.run(
            || {
                let next = replies.borrow_mut().pop_front().ok_or(ApiError::Unsupported);
                async move { next }
            },
            |interval| {
                assert_eq!(interval, Duration::from_millis(1000));
                sleeps.set(sleeps.get() + 1);
                async {}
            },
            |attempt, s| {
                seen.borrow_mut().push((attempt, s.status));
                true
            },
        ))
        .unwrap();

        assert_eq!(outcome, PollOutcome::Settled(status(JobState::Completed)));
        assert_eq!(sleeps.get(), 2);
        assert_eq!(
            seen.into_inner(),
            vec![(1, JobState::Queued), (2, JobState::Processing), (3, JobState::Completed)]
        );
    }

    #[test]
    fn poller_times_out_and_cancels() {
        let poller = Poller { interval: Duration::ZERO, max_attempts: 4 };
        let calls = Cell::new(0);
        let outcome = block_on(poller.run(
            || {
                calls.set(calls.get() + 1);
                async { Ok(status(JobState::Processing)) }
            },
            |_| async {},
            |_, _| true,
        ))
        .unwrap();
        assert_eq!(outcome, PollOutcome::TimedOut { attempts: 4 });
        assert_eq!(calls.get(), 4);

        let outcome = block_on(poller.run(
            || async { Ok(status(JobState::Queued)) },
            |_| async {},
            |attempt, _| attempt < 2,
        ))
        .unwrap();
        assert_eq!(outcome, PollOutcome::Cancelled);
    }

    #[test]
    fn poller_propagates_fetch_errors() {
        let poller = Poller { interval: Duration::ZERO, max_attempts: 4 };
        let result = block_on(poller.run(
            || async { Err(ApiError::Status { status: 404, message: "no such job".to_owned() }) },
            |_| async {},
            |_, _| true,
        ));
        assert!(matches!(result, Err(ApiError::Status { status: 404, .. })));
    }

    fn failed_message(event: Option<JobEvent>) -> String {
        match event {
            Some(JobEvent::Failed(message)) => message,
            other => panic!("expected a failure, got {other:?}"),
        }
    }

    #[test]
    fn completed_outcome_finishes_with_artifacts() {
        let cfg = AppConfig { origin: "https://d.example".to_owned(), ..AppConfig::default() };
        let mut s = status(JobState::Completed);
        s.image_url = Some("/out/g.png".to_owned());
        match outcome_event(&cfg, &JobId::new("j"), Ok(PollOutcome::Settled(s))) {
            Some(JobEvent::Finished(artifacts)) => {
                assert_eq!(artifacts, vec![Artifact::remote(ArtifactKind::Image, "https://d.example/out/g.png")]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn failed_outcomes_carry_a_reason() {
        let cfg = AppConfig::default();
        let id = JobId::new("j7");

        let mut s = status(JobState::Failed);
        s.error = Some("matrix is not square".to_owned());
        let msg = failed_message(outcome_event(&cfg, &id, Ok(PollOutcome::Settled(s))));
        assert_eq!(msg, "matrix is not square");

        let msg = failed_message(outcome_event(&cfg, &id, Ok(PollOutcome::TimedOut { attempts: 900 })));
        assert_eq!(msg, "job j7 did not finish after 900 status checks");

        let err = ApiError::Status { status: 500, message: "boom".to_owned() };
        let msg = failed_message(outcome_event(&cfg, &id, Err(err)));
        assert_eq!(msg, "server answered 500: boom");
    }

    #[test]
    fn cancelled_outcome_reports_nothing() {
        let event = outcome_event(&AppConfig::default(), &JobId::new("j"), Ok(PollOutcome::Cancelled));
        assert!(event.is_none());
    }

    #[test]
    fn create_job_error_becomes_failure() {
        let cfg = AppConfig::default();
        let client = ApiClient::new(&cfg);
        let (tx, mut rx) = futures_channel::mpsc::unbounded();
        let sink = EventSink::new(tx, egui::Context::default());

        block_on(drive_job(cfg, client, mtx("a.mtx"), OutputSelection::default(), sink));

        match rx.try_next() {
            Ok(Some(JobEvent::Failed(message))) => {
                assert_eq!(message, "not available outside the browser");
            }
            other => panic!("unexpected {other:?}"),
        }
        // Driver finished and dropped its sender.
        assert!(matches!(rx.try_next(), Ok(None)));
    }

    #[test]
    fn legacy_error_becomes_failure() {
        let client = ApiClient::new(&AppConfig::default());
        let (tx, mut rx) = futures_channel::mpsc::unbounded();
        block_on(drive_legacy(client, mtx("a.mtx"), EventSink::new(tx, egui::Context::default())));
        assert!(matches!(rx.try_next(), Ok(Some(JobEvent::Failed(_)))));
    }

    #[test]
    fn artifacts_resolve_against_config() {
        let cfg = AppConfig {
            origin: "https://d.example".to_owned(),
            artifact_base: "/store".to_owned(),
            ..AppConfig::default()
        };
        let mut s = status(JobState::Completed);
        s.image_url = Some("jobs/9/graph.png".to_owned());
        s.object_url = Some("  ".to_owned());
        let artifacts = resolve_artifacts(&cfg, &s);
        assert_eq!(
            artifacts,
            vec![Artifact::remote(ArtifactKind::Image, "https://d.example/store/jobs/9/graph.png")]
        );

        s.object_url = Some("https://cdn.example/9.obj".to_owned());
        let artifacts = resolve_artifacts(&cfg, &s);
        assert_eq!(artifacts.len(), 2);
        assert_eq!(artifacts[1].kind, ArtifactKind::Object);
        assert_eq!(artifacts[1].href.as_str(), "https://cdn.example/9.obj");
    }
}
