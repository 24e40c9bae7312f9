//! Collaborators reached over the network: video lookup, subtitle fetch and save.

pub mod http;

use crate::error::{Error, Result};
use crate::version::{Ledger, Revision, SaveRequest, SubtitleKey, SubtitleStorage, VersionStore};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::trace;

pub use http::HttpApi;

/// Turns an external video id into a directly playable URL.
#[async_trait]
pub trait VideoResolver: Send + Sync {
    async fn resolve(&self, video_id: &str) -> Result<String>;
}

/// Subtitle persistence as seen by an editing session.
#[async_trait]
pub trait SubtitleApi: Send + Sync {
    /// Existing SRT text for `key`, or `None` when nothing was saved yet.
    async fn fetch(&self, key: &SubtitleKey) -> Result<Option<String>>;

    async fn save(&self, request: SaveRequest) -> Result<Revision>;
}

/// [`SubtitleApi`] backed by an in-process [`VersionStore`].
pub struct LocalApi<L, S> {
    store: Arc<VersionStore<L, S>>,
}

impl<L, S> LocalApi<L, S> {
    pub fn new(store: Arc<VersionStore<L, S>>) -> Self {
        Self { store }
    }
}

impl<L, S> Clone for LocalApi<L, S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

#[async_trait]
impl<L, S> SubtitleApi for LocalApi<L, S>
where
    L: Ledger + 'static,
    S: SubtitleStorage + 'static,
{
    async fn fetch(&self, key: &SubtitleKey) -> Result<Option<String>> {
        trace!("local fetch {}/{}", key.video_id, key.lang);
        match self.store.fetch(key) {
            Ok(text) => Ok(Some(text)),
            Err(Error::NotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn save(&self, request: SaveRequest) -> Result<Revision> {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || store.save(&request))
            .await
            .map_err(|err| Error::Remote(format!("save task failed: {err}")))?
    }
}
