use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

use crate::config::Config;
use crate::content_loader::SiteContent;
use crate::gate::AccessGate;
use crate::guestbook::Guestbook;
use crate::markdown::PostRenderer;
use crate::posts::{DraftStore, PostRepository, StoredPosts};
use crate::storage::KeyValueStore;

pub type RefreshBroadcaster = broadcast::Sender<()>;

pub struct AppState {
    pub config: Config,
    pub content: RwLock<SiteContent>,
    pub posts: Arc<dyn PostRepository>,
    pub drafts: Arc<DraftStore>,
    pub guestbook: Guestbook,
    pub gate: AccessGate,
    pub renderer: PostRenderer,
}

impl AppState {
    pub fn new(config: Config, content: SiteContent, store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            gate: AccessGate::new(config.admin_password.clone()),
            renderer: PostRenderer::new(config.render_links),
            content: RwLock::new(content),
            posts: Arc::new(StoredPosts::new(store.clone())),
            drafts: Arc::new(DraftStore::new(store)),
            guestbook: Guestbook::with_samples(),
            config,
        }
    }
}

#[derive(Clone)]
pub struct RouterState {
    pub app_state: Arc<AppState>,
    pub broadcaster: RefreshBroadcaster,
}

impl axum::extract::FromRef<RouterState> for Arc<AppState> {
    fn from_ref(state: &RouterState) -> Self {
        state.app_state.clone()
    }
}

impl axum::extract::FromRef<RouterState> for RefreshBroadcaster {
    fn from_ref(state: &RouterState) -> Self {
        state.broadcaster.clone()
    }
}
