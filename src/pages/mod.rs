//! Top-level views and the hash router that switches between them.

pub mod draw;
pub mod examples;
pub mod illustration;

use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Page {
    #[default]
    Draw,
    Illustration,
    Examples,
}

impl Page {
    pub const ALL: [Page; 3] = [Page::Draw, Page::Illustration, Page::Examples];

    pub fn title(self) -> &'static str {
        match self {
            Page::Draw => "Draw Spectral Graph",
            Page::Illustration => "Illustration",
            Page::Examples => "3D Examples",
        }
    }

    pub fn hash(self) -> &'static str {
        match self {
            Page::Draw => "#draw",
            Page::Illustration => "#illustration",
            Page::Examples => "#examples",
        }
    }

    /// Unknown routes land on the draw page.
    pub fn from_hash(hash: &str) -> Self {
        let route = hash.trim().trim_start_matches('#').trim_start_matches('/');
        match route.to_ascii_lowercase().as_str() {
            "illustration" | "gallery" => Page::Illustration,
            "examples" | "3d" => Page::Examples,
            _ => Page::Draw,
        }
    }
}

/// Hash reported by the `hashchange` listener, waiting for the next frame.
#[derive(Clone, Default)]
pub struct HashWatch {
    pending: Arc<Mutex<Option<String>>>,
    ctx: Option<egui::Context>,
}

impl HashWatch {
    fn new(ctx: &egui::Context) -> Self {
        Self { pending: Arc::default(), ctx: Some(ctx.clone()) }
    }

    /// Called from the listener; wakes the UI so the route is applied at once.
    pub fn notify(&self, hash: String) {
        if let Ok(mut slot) = self.pending.lock() {
            *slot = Some(hash);
        }
        if let Some(ctx) = &self.ctx {
            ctx.request_repaint();
        }
    }

    fn take(&self) -> Option<String> {
        self.pending.lock().ok().and_then(|mut slot| slot.take())
    }
}

impl std::fmt::Debug for HashWatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashWatch").field("pending", &self.pending).finish_non_exhaustive()
    }
}

/// Follows `location.hash`, so links in the host page can switch views.
#[derive(Debug, Default)]
pub struct Router {
    page: Page,
    last_hash: Option<String>,
    watch: HashWatch,
}

impl Router {
    pub fn new(ctx: &egui::Context) -> Self {
        let mut router = Self { watch: HashWatch::new(ctx), ..Self::default() };
        listen_for_hash_changes(router.watch.clone());
        router.observe(current_hash());
        router
    }

    pub fn page(&self) -> Page {
        self.page
    }

    pub fn sync_from_location(&mut self) {
        let hash = self.watch.take().or_else(current_hash);
        if hash.is_some() {
            self.observe(hash);
        }
    }

    /// React to the hash only when it changed since last seen.
    pub fn observe(&mut self, hash: Option<String>) {
        if hash == self.last_hash {
            return;
        }
        if let Some(h) = &hash {
            let page = Page::from_hash(h);
            if page != self.page {
                log::debug!("route {h:?} -> {page:?}");
            }
            self.page = page;
        }
        self.last_hash = hash;
    }

    pub fn navigate(&mut self, page: Page) {
        self.page = page;
        self.last_hash = Some(page.hash().to_owned());
        set_hash(page.hash());
    }

    pub fn nav_bar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.strong("Spectral Graph");
            ui.separator();
            for page in Page::ALL {
                if ui.selectable_label(self.page == page, page.title()).clicked() && self.page != page {
                    self.navigate(page);
                }
            }
        });
    }
}

#[cfg(target_arch = "wasm32")]
fn current_hash() -> Option<String> {
    web_sys::window()?.location().hash().ok()
}

#[cfg(target_arch = "wasm32")]
fn listen_for_hash_changes(watch: HashWatch) {
    use wasm_bindgen::{closure::Closure, JsCast as _};

    let Some(window) = web_sys::window() else {
        return;
    };
    let callback = Closure::<dyn FnMut()>::new(move || {
        if let Some(hash) = current_hash() {
            watch.notify(hash);
        }
    });
    if let Err(e) = window.add_event_listener_with_callback("hashchange", callback.as_ref().unchecked_ref()) {
        log::warn!("could not listen for hash changes: {e:?}");
        return;
    }
    // Lives as long as the page.
    callback.forget();
}

#[cfg(target_arch = "wasm32")]
fn set_hash(hash: &str) {
    if let Some(window) = web_sys::window() {
        if let Err(e) = window.location().set_hash(hash) {
            log::warn!("could not set location hash: {e:?}");
        }
    }
}

// --------------------------- non-wasm stubs ---------------------------

#[cfg(not(target_arch = "wasm32"))]
fn current_hash() -> Option<String> {
    None
}

#[cfg(not(target_arch = "wasm32"))]
fn listen_for_hash_changes(_watch: HashWatch) {}

#[cfg(not(target_arch = "wasm32"))]
fn set_hash(_hash: &str) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_routes() {
        assert_eq!(Page::from_hash("#illustration"), Page::Illustration);
        assert_eq!(Page::from_hash("#/Examples"), Page::Examples);
        assert_eq!(Page::from_hash(""), Page::Draw);
        assert_eq!(Page::from_hash("#nowhere"), Page::Draw);
        for page in Page::ALL {
            assert_eq!(Page::from_hash(page.hash()), page);
        }
    }

    #[test]
    fn router_follows_external_hash_changes() {
        let mut router = Router::default();
        router.observe(Some("#illustration".to_owned()));
        assert_eq!(router.page(), Page::Illustration);

        router.navigate(Page::Examples);
        // Stale hash reported before the browser caught up.
        router.observe(Some("#examples".to_owned()));
        assert_eq!(router.page(), Page::Examples);

        router.observe(Some("#draw".to_owned()));
        assert_eq!(router.page(), Page::Draw);

        router.observe(None);
        assert_eq!(router.page(), Page::Draw);
    }

    #[test]
    fn hash_change_reaches_the_router() {
        let ctx = egui::Context::default();
        let mut router = Router::new(&ctx);
        assert_eq!(router.page(), Page::Draw);

        let listener = router.watch.clone();
        listener.notify("#illustration".to_owned());
        router.sync_from_location();
        assert_eq!(router.page(), Page::Illustration);

        // Nothing pending: the page stays put.
        router.sync_from_location();
        assert_eq!(router.page(), Page::Illustration);

        listener.notify("#examples".to_owned());
        listener.notify("#draw".to_owned());
        router.sync_from_location();
        assert_eq!(router.page(), Page::Draw);
    }
}
