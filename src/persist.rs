//! Remember the in-flight job across page reloads (`localStorage`).

use crate::api::JobId;

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::JsValue;

pub const JOB_KEY: &str = "spectral.job";

#[cfg(target_arch = "wasm32")]
fn storage() -> Result<web_sys::Storage, JsValue> {
    web_sys::window()
        .ok_or_else(|| JsValue::from_str("no window"))?
        .local_storage()?
        .ok_or_else(|| JsValue::from_str("no localStorage"))
}

#[cfg(target_arch = "wasm32")]
pub fn remember_job(id: &JobId) {
    if let Err(e) = storage().and_then(|s| s.set_item(JOB_KEY, id.as_str())) {
        log::warn!("could not remember job {id}: {e:?}");
    }
}

#[cfg(target_arch = "wasm32")]
pub fn forget_job() {
    if let Err(e) = storage().and_then(|s| s.remove_item(JOB_KEY)) {
        log::warn!("could not clear remembered job: {e:?}");
    }
}

#[cfg(target_arch = "wasm32")]
pub fn remembered_job() -> Option<JobId> {
    let value = storage().ok()?.get_item(JOB_KEY).ok()??;
    parse_job_id(&value)
}

/// Stored ids are trimmed; blank entries count as absent.
pub fn parse_job_id(value: &str) -> Option<JobId> {
    let value = value.trim();
    (!value.is_empty()).then(|| JobId::new(value))
}

// --------------------------- non-wasm stubs ---------------------------

#[cfg(not(target_arch = "wasm32"))]
pub fn remember_job(_id: &JobId) {}

#[cfg(not(target_arch = "wasm32"))]
pub fn forget_job() {}

#[cfg(not(target_arch = "wasm32"))]
pub fn remembered_job() -> Option<JobId> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_ids_are_ignored() {
        assert_eq!(parse_job_id("  "), None);
        assert_eq!(parse_job_id(" 5f2c \n"), Some(JobId::new("5f2c")));
    }
}
