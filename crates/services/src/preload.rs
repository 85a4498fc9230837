//! Fire-and-forget asset warming.
//!
//! Preloading runs on its own task and never blocks or fails the session:
//! errors are logged and counted in the report.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use reqwest::Client;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use url::Url;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PreloadError {
    #[error("asset request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("asset cache lock poisoned")]
    CachePoisoned,
}

/// Fetched assets, shared with whoever renders views.
#[derive(Debug, Clone, Default)]
pub struct AssetCache {
    assets: Arc<Mutex<HashMap<Url, Vec<u8>>>>,
}

impl AssetCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    ///
    /// Returns `PreloadError::CachePoisoned` if a writer panicked while holding
    /// the cache; the asset is not stored.
    pub fn insert(&self, url: Url, bytes: Vec<u8>) -> Result<(), PreloadError> {
        let mut guard = self
            .assets
            .lock()
            .map_err(|_| PreloadError::CachePoisoned)?;
        guard.insert(url, bytes);
        Ok(())
    }

    #[must_use]
    pub fn get(&self, url: &Url) -> Option<Vec<u8>> {
        self.assets.lock().ok()?.get(url).cloned()
    }

    #[must_use]
    pub fn contains(&self, url: &Url) -> bool {
        self.assets
            .lock()
            .map(|guard| guard.contains_key(url))
            .unwrap_or(false)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.assets.lock().map(|guard| guard.len()).unwrap_or(0)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// What a preload run achieved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreloadReport {
    pub fetched: usize,
    pub failed: Vec<Url>,
}

#[derive(Clone, Default)]
pub struct Preloader {
    client: Client,
    cache: AssetCache,
}

impl Preloader {
    #[must_use]
    pub fn new(cache: AssetCache) -> Self {
        Self {
            client: Client::new(),
            cache,
        }
    }

    #[must_use]
    pub fn cache(&self) -> &AssetCache {
        &self.cache
    }

    /// Start fetching `urls` in the background.
    ///
    /// Must be called from within a tokio runtime. The handle may be dropped;
    /// the task keeps running.
    #[must_use]
    pub fn spawn(&self, urls: Vec<Url>) -> JoinHandle<PreloadReport> {
        let this = self.clone();
        tokio::spawn(async move { this.run(urls).await })
    }

    /// Fetch `urls` one after another into the cache.
    pub async fn run(&self, urls: Vec<Url>) -> PreloadReport {
        let mut report = PreloadReport::default();
        for url in urls {
            let fetched = self.fetch(&url).await;
            self.store(&mut report, url, fetched);
        }
        report
    }

    fn store(
        &self,
        report: &mut PreloadReport,
        url: Url,
        fetched: Result<Vec<u8>, PreloadError>,
    ) {
        let stored = fetched.and_then(|bytes| {
            let len = bytes.len();
            self.cache.insert(url.clone(), bytes)?;
            Ok(len)
        });
        match stored {
            Ok(bytes) => {
                debug!(%url, bytes, "asset preloaded");
                report.fetched += 1;
            }
            Err(err) => {
                warn!(%url, error = %err, "asset preload failed");
                report.failed.push(url);
            }
        }
    }

    async fn fetch(&self, url: &Url) -> Result<Vec<u8>, PreloadError> {
        let response = self.client.get(url.clone()).send().await?;
        if !response.status().is_success() {
            return Err(PreloadError::HttpStatus(response.status()));
        }
        Ok(response.bytes().await?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset() -> Url {
        Url::parse("https://assets.example.org/target.gif").unwrap()
    }

    fn poisoned_cache() -> AssetCache {
        let cache = AssetCache::new();
        let inner = cache.clone();
        let _ = std::thread::spawn(move || {
            let _guard = inner.assets.lock().unwrap();
            panic!("writer died holding the cache");
        })
        .join();
        cache
    }

    #[test]
    fn stored_asset_counts_as_fetched() {
        let preloader = Preloader::new(AssetCache::new());
        let mut report = PreloadReport::default();
        preloader.store(&mut report, asset(), Ok(b"GIF89a".to_vec()));
        assert_eq!(report.fetched, 1);
        assert!(report.failed.is_empty());
        assert!(preloader.cache().contains(&asset()));
    }

    #[test]
    fn poisoned_cache_rejects_insert() {
        let cache = poisoned_cache();
        let err = cache.insert(asset(), Vec::new()).unwrap_err();
        assert!(matches!(err, PreloadError::CachePoisoned));
    }

    #[test]
    fn poisoned_cache_reports_asset_as_failed() {
        let preloader = Preloader::new(poisoned_cache());
        let mut report = PreloadReport::default();
        preloader.store(&mut report, asset(), Ok(b"GIF89a".to_vec()));
        assert_eq!(report.fetched, 0);
        assert_eq!(report.failed, vec![asset()]);
    }
}
