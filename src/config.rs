//! Runtime configuration.
//!
//! The host page may embed a JSON document in
//! `<script id="spectral-config" type="application/json">`; every field is
//! optional and falls back to the defaults below.

use anyhow::{bail, Context as _};
use serde::Deserialize;

/// Element id of the embedded configuration document.
pub const CONFIG_ELEMENT_ID: &str = "spectral-config";

/// Which backend workflow to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiMode {
    /// Create a job, poll its status, download the resolved artifacts.
    #[default]
    Jobs,
    /// One synchronous request returning the rendered image.
    Legacy,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GalleryImage {
    pub src: String,
    pub caption: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ObjectExample {
    pub title: String,
    /// Wavefront OBJ file.
    pub model: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub mode: ApiMode,
    pub api_base: String,
    pub artifact_base: String,
    pub poll_interval_ms: u32,
    pub max_poll_attempts: u32,
    pub accept_extension: String,
    pub illustrations: Vec<GalleryImage>,
    pub object_examples: Vec<ObjectExample>,
    #[serde(skip)]
    pub origin: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        let illustrations = (1..=3)
            .map(|i| GalleryImage {
                src: format!("img/img{i}.png"),
                caption: format!("Graph {i}"),
            })
            .collect();
        let object_examples = (1..=3)
            .map(|i| ObjectExample {
                title: format!("Graph {i}"),
                model: format!("models/graph{i}.obj"),
                description: String::new(),
            })
            .collect();

        Self {
            mode: ApiMode::Jobs,
            api_base: String::new(),
            artifact_base: String::new(),
            poll_interval_ms: 1000,
            max_poll_attempts: 900,
            accept_extension: "mtx".to_owned(),
            illustrations,
            object_examples,
            origin: default_origin(),
        }
    }
}

impl AppConfig {
    /// Parse a (possibly partial) JSON document and validate it.
    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        let mut config: AppConfig =
            serde_json::from_str(text).context("malformed configuration document")?;
        config.accept_extension = config
            .accept_extension
            .trim()
            .trim_start_matches('.')
            .to_ascii_lowercase();
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.poll_interval_ms == 0 {
            bail!("poll_interval_ms must be positive");
        }
        if self.max_poll_attempts == 0 {
            bail!("max_poll_attempts must be positive");
        }
        if self.accept_extension.is_empty() {
            bail!("accept_extension must not be empty");
        }
        Ok(())
    }

    /// Load the configuration embedded in the page, falling back to defaults.
    pub fn load() -> Self {
        let mut config = match embedded_document() {
            Some(text) => Self::from_json(&text).unwrap_or_else(|e| {
                log::warn!("ignoring embedded configuration: {e:#}");
                Self::default()
            }),
            None => Self::default(),
        };
        config.origin = default_origin();
        log::info!(
            "configuration: mode={:?} api_base={:?} poll={}ms",
            config.mode,
            config.api_base,
            config.poll_interval_ms
        );
        config
    }

    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(u64::from(self.poll_interval_ms))
    }

    /// Endpoint URL below `api_base`.
    pub fn api_url(&self, path: &str) -> String {
        let base = self.absolute(&self.api_base);
        join(&base, path)
    }

    /// Static asset URL (gallery images, example models).
    pub fn asset_url(&self, path: &str) -> String {
        if has_scheme(path) {
            return path.to_owned();
        }
        join(&self.origin, path)
    }

    /// Resolve an artifact location reported by the backend.
    pub fn resolve(&self, raw: &str) -> String {
        let raw = raw.trim();
        if raw.starts_with("//") {
            return format!("{}{raw}", self.scheme());
        }
        if has_scheme(raw) || raw.starts_with('/') {
            return self.absolute(raw);
        }
        join(&self.absolute(&self.artifact_base), raw)
    }

    /// `https:` for an `https://…` origin; defaults to `https:`.
    fn scheme(&self) -> &str {
        self.origin
            .split_once("//")
            .map(|(scheme, _)| scheme)
            .filter(|scheme| scheme.ends_with(':'))
            .unwrap_or("https:")
    }

    fn absolute(&self, path: &str) -> String {
        if has_scheme(path) {
            path.to_owned()
        } else {
            join(&self.origin, path)
        }
    }
}

fn has_scheme(url: &str) -> bool {
    ["http://", "https://", "blob:", "data:"]
        .iter()
        .any(|scheme| url.starts_with(scheme))
}

fn join(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        base.to_owned()
    } else {
        format!("{base}/{path}")
    }
}

#[cfg(target_arch = "wasm32")]
fn embedded_document() -> Option<String> {
    web_sys::window()?
        .document()?
        .get_element_by_id(CONFIG_ELEMENT_ID)?
        .text_content()
        .filter(|text| !text.trim().is_empty())
}

#[cfg(target_arch = "wasm32")]
fn default_origin() -> String {
    web_sys::window()
        .and_then(|w| w.location().origin().ok())
        .unwrap_or_default()
}

// --------------------------- non-wasm stubs ---------------------------

#[cfg(not(target_arch = "wasm32"))]
fn embedded_document() -> Option<String> {
    None
}

#[cfg(not(target_arch = "wasm32"))]
fn default_origin() -> String {
    "http://localhost:8080".to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AppConfig {
        AppConfig {
            origin: "https://draw.example".to_owned(),
            ..AppConfig::default()
        }
    }

    #[test]
    fn partial_document_keeps_defaults() {
        let cfg = AppConfig::from_json(r#"{ "mode": "legacy", "accept_extension": ".MTX" }"#).unwrap();
        assert_eq!(cfg.mode, ApiMode::Legacy);
        assert_eq!(cfg.accept_extension, "mtx");
        assert_eq!(cfg.poll_interval_ms, 1000);
        assert_eq!(cfg.illustrations.len(), 3);
        assert_eq!(cfg.illustrations[2].caption, "Graph 3");
    }

    #[test]
    fn rejects_unusable_values() {
        assert!(AppConfig::from_json(r#"{ "poll_interval_ms": 0 }"#).is_err());
        assert!(AppConfig::from_json(r#"{ "max_poll_attempts": 0 }"#).is_err());
        assert!(AppConfig::from_json(r#"{ "accept_extension": " . " }"#).is_err());
        assert!(AppConfig::from_json(r#"{ "mode": "batch" }"#).is_err());
        assert!(AppConfig::from_json("not json").is_err());
    }

    #[test]
    fn resolves_artifact_locations() {
        let mut cfg = config();
        assert_eq!(cfg.resolve("https://cdn.example/a.png"), "https://cdn.example/a.png");
        assert_eq!(cfg.resolve("/files/a.png"), "https://draw.example/files/a.png");
        assert_eq!(cfg.resolve("jobs/7/graph.png"), "https://draw.example/jobs/7/graph.png");

        cfg.artifact_base = "/artifacts/".to_owned();
        assert_eq!(cfg.resolve("jobs/7/graph.png"), "https://draw.example/artifacts/jobs/7/graph.png");

        cfg.artifact_base = "https://bucket.example/out".to_owned();
        assert_eq!(cfg.resolve("graph.obj"), "https://bucket.example/out/graph.obj");

        assert_eq!(cfg.resolve("//cdn.example/x.png"), "https://cdn.example/x.png");
        cfg.origin = "http://localhost:8080".to_owned();
        assert_eq!(cfg.resolve("//cdn.example/x.png"), "http://cdn.example/x.png");
    }

    #[test]
    fn api_urls_follow_api_base() {
        let mut cfg = config();
        assert_eq!(cfg.api_url("/api/jobs"), "https://draw.example/api/jobs");
        cfg.api_base = "https://api.example/v2/".to_owned();
        assert_eq!(cfg.api_url("/api/jobs/42"), "https://api.example/v2/api/jobs/42");
        assert_eq!(cfg.asset_url("img/img1.png"), "https://draw.example/img/img1.png");
    }
}
