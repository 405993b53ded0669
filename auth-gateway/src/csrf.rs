use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::Result;

/// Server-issued CSRF token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsrfToken {
    pub value: String,
    pub fetched_at: DateTime<Utc>,
}

/// Process-wide CSRF token cache
///
/// Fetched lazily once and refetched only after an observed rejection.
/// Reads never wait on a fetch. Fetches are serialized: a rejection observed
/// while a refetch is already in flight reuses that refetch's result.
#[derive(Debug, Default)]
pub struct CsrfCache {
    current: RwLock<Option<CsrfToken>>,
    fetch_lock: Mutex<()>,
    fetches: AtomicU64,
}

impl CsrfCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<CsrfToken> {
        self.current.read().clone()
    }

    /// Number of completed fetches, lazy and refresh alike
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn clear(&self) {
        *self.current.write() = None;
    }

    /// Cached token, fetching it on first use
    pub async fn get_or_fetch<F, Fut>(&self, fetch: F) -> Result<String>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String>>,
    {
        if let Some(token) = self.current() {
            return Ok(token.value);
        }

        let _guard = self.fetch_lock.lock().await;
        if let Some(token) = self.current() {
            return Ok(token.value);
        }
        self.store(fetch().await?)
    }

    /// Replace `stale` with a fresh token.
    ///
    /// Returns the token to retry with and whether this call performed the
    /// fetch. If another caller already replaced `stale`, its token is reused.
    pub async fn refresh<F, Fut>(&self, stale: Option<&str>, fetch: F) -> Result<(String, bool)>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String>>,
    {
        let _guard = self.fetch_lock.lock().await;
        if let Some(token) = self.current() {
            if Some(token.value.as_str()) != stale {
                debug!("Reusing CSRF token refreshed by a concurrent request");
                return Ok((token.value, false));
            }
        }
        let value = self.store(fetch().await?)?;
        Ok((value, true))
    }

    fn store(&self, value: String) -> Result<String> {
        *self.current.write() = Some(CsrfToken {
            value: value.clone(),
            fetched_at: Utc::now(),
        });
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientError;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_lazy_fetch_happens_once() {
        let cache = CsrfCache::new();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let token = cache
                .get_or_fetch(|| async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok("token-1".to_string())
                })
                .await
                .unwrap();
            assert_eq!(token, "token-1");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_fetch_leaves_cache_empty() {
        let cache = CsrfCache::new();
        let result = cache
            .get_or_fetch(|| async { Err(ClientError::indeterminate("HTTP 500")) })
            .await;
        assert!(result.is_err());
        assert!(cache.current().is_none());
    }

    #[tokio::test]
    async fn test_refresh_reuses_token_already_replaced() {
        let cache = CsrfCache::new();
        cache.get_or_fetch(|| async { Ok("token-1".to_string()) }).await.unwrap();

        let (fresh, fetched) = cache
            .refresh(Some("token-1"), || async { Ok("token-2".to_string()) })
            .await
            .unwrap();
        assert_eq!((fresh.as_str(), fetched), ("token-2", true));

        // A second rejection of the same stale token must not refetch
        let (reused, fetched) = cache
            .refresh(Some("token-1"), || async { Ok("token-3".to_string()) })
            .await
            .unwrap();
        assert_eq!((reused.as_str(), fetched), ("token-2", false));
        assert_eq!(cache.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_refreshes_share_one_fetch() {
        let cache = Arc::new(CsrfCache::new());
        cache.get_or_fetch(|| async { Ok("token-1".to_string()) }).await.unwrap();
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let cache = cache.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .refresh(Some("token-1"), || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::task::yield_now().await;
                        Ok("token-2".to_string())
                    })
                    .await
                    .unwrap()
                    .0
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap(), "token-2");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
