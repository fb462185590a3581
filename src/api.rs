//! Client for the graph-drawing backend.
//!
//! Two workflows are spoken:
//!
//! * `POST /api/generate-graph` (multipart `file`) answers with the PNG bytes.
//! * `POST /api/jobs` (multipart `file`, `outputs`) answers `{"jobId": ...}`;
//!   `GET /api/jobs/{id}` then reports the job state and, once completed, the
//!   artifact locations.
//!
//! Requests go through `gloo-net` on wasm32. Native builds get stubs that
//! report [`ApiError::Unsupported`].

use std::fmt;

#[cfg(target_arch = "wasm32")]
use gloo_net::http::{Request, Response};
use serde::Deserialize;

use crate::config::AppConfig;

pub const GENERATE_GRAPH_PATH: &str = "/api/generate-graph";
pub const JOBS_PATH: &str = "/api/jobs";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(String),
    #[error("server answered {status}: {message}")]
    Status { status: u16, message: String },
    #[error("unexpected response: {0}")]
    Decode(String),
    #[error("browser error: {0}")]
    Browser(String),
    #[error("not available outside the browser")]
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    #[serde(alias = "pending")]
    Queued,
    #[serde(alias = "running")]
    Processing,
    #[serde(alias = "done", alias = "succeeded")]
    Completed,
    #[serde(alias = "error")]
    Failed,
    #[serde(other)]
    Unknown,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Unknown => "waiting",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    pub status: JobState,
    #[serde(default, alias = "image_url")]
    pub image_url: Option<String>,
    #[serde(default, alias = "object_url")]
    pub object_url: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl JobStatus {
    /// Human-readable reason for a failed job.
    pub fn failure_reason(&self) -> String {
        self.error
            .as_deref()
            .or(self.message.as_deref())
            .filter(|m| !m.trim().is_empty())
            .unwrap_or("the server could not process this file")
            .to_owned()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateJobResponse {
    #[serde(rename = "jobId", alias = "job_id", alias = "id")]
    pub job_id: JobId,
}

/// Which artifacts a job should produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputSelection {
    pub image: bool,
    pub object: bool,
}

impl Default for OutputSelection {
    fn default() -> Self {
        Self { image: true, object: false }
    }
}

impl OutputSelection {
    pub fn is_empty(&self) -> bool {
        !self.image && !self.object
    }

    /// Value of the `outputs` form field.
    pub fn form_value(&self) -> String {
        let mut parts = Vec::with_capacity(2);
        if self.image {
            parts.push("image");
        }
        if self.object {
            parts.push("object");
        }
        parts.join(",")
    }
}

/// A picked input file.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn extension(&self) -> Option<&str> {
        let (stem, ext) = self.file_name.rsplit_once('.')?;
        (!stem.is_empty()).then_some(ext)
    }
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    generate_url: String,
    jobs_url: String,
}

impl ApiClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            generate_url: config.api_url(GENERATE_GRAPH_PATH),
            jobs_url: config.api_url(JOBS_PATH),
        }
    }

    pub fn job_url(&self, id: &JobId) -> String {
        format!("{}/{}", self.jobs_url, encode_segment(id.as_str()))
    }
}

fn encode_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char);
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

#[cfg(target_arch = "wasm32")]
impl ApiClient {
    /// Legacy single-shot call returning the rendered PNG.
    pub async fn generate_graph(&self, upload: &Upload) -> Result<Vec<u8>, ApiError> {
        let form = form_with_file(upload)?;
        let resp = Request::post(&self.generate_url)
            .body(form)
            .map_err(to_network)?
            .send()
            .await
            .map_err(to_network)?;
        let resp = ensure_ok(resp).await?;
        resp.binary().await.map_err(to_network)
    }

    pub async fn create_job(
        &self,
        upload: &Upload,
        outputs: OutputSelection,
    ) -> Result<JobId, ApiError> {
        let form = form_with_file(upload)?;
        form.append_with_str("outputs", &outputs.form_value())
            .map_err(to_browser)?;
        let resp = Request::post(&self.jobs_url)
            .body(form)
            .map_err(to_network)?
            .send()
            .await
            .map_err(to_network)?;
        let text = ensure_ok(resp).await?.text().await.map_err(to_network)?;
        let created: CreateJobResponse =
            serde_json::from_str(&text).map_err(|e| ApiError::Decode(e.to_string()))?;
        Ok(created.job_id)
    }

    pub async fn job_status(&self, id: &JobId) -> Result<JobStatus, ApiError> {
        let resp = Request::get(&self.job_url(id))
            .send()
            .await
            .map_err(to_network)?;
        let text = ensure_ok(resp).await?.text().await.map_err(to_network)?;
        serde_json::from_str(&text).map_err(|e| ApiError::Decode(e.to_string()))
    }

    pub async fn fetch_text(&self, url: &str) -> Result<String, ApiError> {
        let resp = Request::get(url).send().await.map_err(to_network)?;
        ensure_ok(resp).await?.text().await.map_err(to_network)
    }
}

#[cfg(target_arch = "wasm32")]
fn form_with_file(upload: &Upload) -> Result<web_sys::FormData, ApiError> {
    let form = web_sys::FormData::new().map_err(to_browser)?;
    let blob = crate::download::blob_from_bytes(&upload.bytes, "application/octet-stream")
        .map_err(to_browser)?;
    form.append_with_blob_and_filename("file", &blob, &upload.file_name)
        .map_err(to_browser)?;
    Ok(form)
}

#[cfg(target_arch = "wasm32")]
async fn ensure_ok(resp: Response) -> Result<Response, ApiError> {
    if resp.ok() {
        return Ok(resp);
    }
    let status = resp.status();
    let status_text = resp.status_text();
    let body = resp.text().await.unwrap_or_default();
    Err(ApiError::Status {
        status,
        message: error_message(&body, &status_text),
    })
}

#[cfg(target_arch = "wasm32")]
fn to_network<E: fmt::Display>(e: E) -> ApiError {
    ApiError::Network(e.to_string())
}

#[cfg(target_arch = "wasm32")]
fn to_browser(e: wasm_bindgen::JsValue) -> ApiError {
    ApiError::Browser(format!("{e:?}"))
}

/// Pick the most useful text out of an error response.
#[cfg_attr(not(target_arch = "wasm32"), allow(dead_code))]
fn error_message(body: &str, status_text: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        #[serde(alias = "message", alias = "detail")]
        error: String,
    }

    if let Some(parsed) = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .filter(|parsed| !parsed.error.trim().is_empty())
    {
        return parsed.error;
    }
    let body = body.trim();
    if body.is_empty() {
        status_text.to_owned()
    } else {
        body.to_owned()
    }
}

// --------------------------- non-wasm stubs ---------------------------

#[cfg(not(target_arch = "wasm32"))]
impl ApiClient {
    pub async fn generate_graph(&self, _upload: &Upload) -> Result<Vec<u8>, ApiError> {
        Err(ApiError::Unsupported)
    }

    pub async fn create_job(
        &self,
        _upload: &Upload,
        _outputs: OutputSelection,
    ) -> Result<JobId, ApiError> {
        Err(ApiError::Unsupported)
    }

    pub async fn job_status(&self, _id: &JobId) -> Result<JobStatus, ApiError> {
        Err(ApiError::Unsupported)
    }

    pub async fn fetch_text(&self, _url: &str) -> Result<String, ApiError> {
        Err(ApiError::Unsupported)
    }
}
