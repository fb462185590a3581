//! Generated artifacts and how the browser saves them.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::{JsCast, JsValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Image,
    Object,
}

impl ArtifactKind {
    pub fn button_label(self) -> &'static str {
        match self {
            Self::Image => "Download Image",
            Self::Object => "Download 3D Object",
        }
    }

    pub fn default_file_name(self) -> &'static str {
        match self {
            Self::Image => "graph.png",
            Self::Object => "graph.obj",
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            Self::Image => "image/png",
            Self::Object => "model/obj",
        }
    }
}

/// A `blob:` URL owned by this page; revoked on drop.
#[derive(Debug, PartialEq, Eq)]
pub struct ObjectUrl(String);

impl ObjectUrl {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[cfg(target_arch = "wasm32")]
impl ObjectUrl {
    pub fn from_bytes(bytes: &[u8], mime: &str) -> Result<Self, JsValue> {
        let blob = blob_from_bytes(bytes, mime)?;
        web_sys::Url::create_object_url_with_blob(&blob).map(Self)
    }
}

#[cfg(target_arch = "wasm32")]
impl Drop for ObjectUrl {
    fn drop(&mut self) {
        if let Err(e) = web_sys::Url::revoke_object_url(&self.0) {
            log::warn!("could not revoke {}: {e:?}", self.0);
        } else {
            log::debug!("revoked {}", self.0);
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum Href {
    Remote(String),
    Local(ObjectUrl),
}

impl Href {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Remote(url) => url,
            Self::Local(url) => url.as_str(),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct Artifact {
    pub kind: ArtifactKind,
    pub href: Href,
}

impl Artifact {
    pub fn remote(kind: ArtifactKind, url: impl Into<String>) -> Self {
        Self { kind, href: Href::Remote(url.into()) }
    }

    /// Name offered to the browser's save dialog.
    pub fn file_name(&self) -> String {
        match &self.href {
            Href::Remote(url) => file_name_from_url(url),
            Href::Local(_) => None,
        }
        .unwrap_or_else(|| self.kind.default_file_name().to_owned())
    }

    pub fn save(&self) {
        if let Err(e) = trigger_download(self.href.as_str(), &self.file_name()) {
            log::error!("download of {} failed: {e}", self.href.as_str());
        }
    }
}

/// Last path segment of `url`, if it looks like a file name.
pub fn file_name_from_url(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let path = path.split_once("://").map_or(path, |(_, rest)| {
        rest.split_once('/').map_or("", |(_, p)| p)
    });
    let segment = path.rsplit('/').next()?;
    let (stem, ext) = segment.rsplit_once('.')?;
    (!stem.is_empty() && !ext.is_empty()).then(|| segment.to_owned())
}

#[cfg(target_arch = "wasm32")]
pub fn blob_from_bytes(bytes: &[u8], mime: &str) -> Result<web_sys::Blob, JsValue> {
    let parts = js_sys::Array::of1(&js_sys::Uint8Array::from(bytes));
    let options = web_sys::BlobPropertyBag::new();
    options.set_type(mime);
    web_sys::Blob::new_with_u8_array_sequence_and_options(&parts, &options)
}

/// Click a temporary `<a download>` pointing at `href`.
#[cfg(target_arch = "wasm32")]
pub fn trigger_download(href: &str, file_name: &str) -> Result<(), String> {
    let document = web_sys::window()
        .and_then(|w| w.document())
        .ok_or("no document")?;
    let anchor = document
        .create_element("a")
        .map_err(|e| format!("{e:?}"))?
        .dyn_into::<web_sys::HtmlAnchorElement>()
        .map_err(|_| "created element is not an anchor")?;
    anchor.set_href(href);
    anchor.set_download(file_name);
    anchor.set_rel("noopener");
    anchor.click();
    log::info!("download started: {file_name}");
    Ok(())
}

/// Show a blocking browser alert.
#[cfg(target_arch = "wasm32")]
pub fn alert(message: &str) {
    if let Some(window) = web_sys::window() {
        let _ = window.alert_with_message(message);
    }
}

// --------------------------- non-wasm stubs ---------------------------

#[cfg(not(target_arch = "wasm32"))]
impl ObjectUrl {
    pub fn from_bytes(bytes: &[u8], mime: &str) -> Result<Self, String> {
        Ok(Self(format!("blob:native/{mime}/{}", bytes.len())))
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub fn trigger_download(href: &str, file_name: &str) -> Result<(), String> {
    log::info!("would download {href} as {file_name}");
    Ok(())
}

#[cfg(not(target_arch = "wasm32"))]
pub fn alert(message: &str) {
    log::error!("{message}");
}
