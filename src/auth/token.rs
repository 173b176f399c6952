//! Renewable UAA token sessions.
//!
//! The cached token is read under a short `RwLock`; renewal runs inside a
//! single-flight async mutex and re-checks the cache after acquiring it, so
//! concurrent scrapes that find an expired token trigger one renewal and
//! the rest pick up its result.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock as StdRwLock};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::uaa::{AccessToken, Uaa};
use crate::director::ClientError;

/// Source of bearer tokens attached to director requests.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Returns a valid token, renewing it first when needed.
    async fn token(&self) -> Result<Arc<AccessToken>, ClientError>;

    /// Drops `stale` from the cache if it is still the current token.
    fn invalidate(&self, stale: &AccessToken);

    /// Short name of the grant behind this source.
    fn grant(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Grant {
    ClientCredentials,
    RefreshToken,
}

/// Token source backed by a UAA grant.
pub struct TokenSession {
    uaa: Arc<dyn Uaa>,
    grant: Grant,
    current: StdRwLock<Option<Arc<AccessToken>>>,
    /// Renewal section. Holds the refresh token for refresh-token sessions.
    renewal: Mutex<Option<String>>,
    renewals: AtomicU64,
}

impl TokenSession {
    /// Session that asks for a new client-credentials token on every expiry.
    pub fn client_credentials(uaa: Arc<dyn Uaa>) -> Self {
        Self {
            uaa,
            grant: Grant::ClientCredentials,
            current: StdRwLock::new(None),
            renewal: Mutex::new(None),
            renewals: AtomicU64::new(0),
        }
    }

    /// Session that renews through the refresh-token grant.
    ///
    /// `initial` is served until it expires; pass `None` to force a refresh
    /// on first use.
    pub fn refresh_token(
        uaa: Arc<dyn Uaa>,
        refresh_token: String,
        initial: Option<AccessToken>,
    ) -> Self {
        Self {
            uaa,
            grant: Grant::RefreshToken,
            current: StdRwLock::new(initial.map(Arc::new)),
            renewal: Mutex::new(Some(refresh_token)),
            renewals: AtomicU64::new(0),
        }
    }

    /// Number of completed renewals.
    pub fn renewals(&self) -> u64 {
        self.renewals.load(Ordering::Relaxed)
    }

    fn cached(&self) -> Option<Arc<AccessToken>> {
        let guard = match self.current.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.as_ref().filter(|t| t.is_valid()).cloned()
    }

    fn store(&self, token: Option<Arc<AccessToken>>) {
        let mut guard = match self.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = token;
    }
}

#[async_trait]
impl TokenSource for TokenSession {
    async fn token(&self) -> Result<Arc<AccessToken>, ClientError> {
        if let Some(token) = self.cached() {
            return Ok(token);
        }

        let mut refresh_token = self.renewal.lock().await;

        // Another caller may have renewed while we waited for the lock.
        if let Some(token) = self.cached() {
            return Ok(token);
        }

        debug!("Renewing UAA token ({})", self.grant());
        let token = match self.grant {
            Grant::ClientCredentials => self.uaa.client_credentials_grant().await?,
            Grant::RefreshToken => {
                let current = refresh_token.as_deref().unwrap_or_default();
                self.uaa.refresh_token_grant(current).await?
            }
        };

        if self.grant == Grant::RefreshToken {
            if let Some(rotated) = &token.refresh_token {
                *refresh_token = Some(rotated.clone());
            }
        }

        let token = Arc::new(token);
        self.store(Some(Arc::clone(&token)));
        let n = self.renewals.fetch_add(1, Ordering::Relaxed) + 1;
        info!("UAA token renewed ({} renewals so far)", n);
        Ok(token)
    }

    fn invalidate(&self, stale: &AccessToken) {
        let mut guard = match self.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if guard.as_deref().is_some_and(|t| t.value == stale.value) {
            *guard = None;
        }
    }

    fn grant(&self) -> &'static str {
        match self.grant {
            Grant::ClientCredentials => "client_credentials",
            Grant::RefreshToken => "refresh_token",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::{Duration, Instant};

    /// Counts grants and hands out numbered tokens.
    #[derive(Default)]
    struct CountingUaa {
        client_credentials: AtomicUsize,
        refreshes: AtomicUsize,
        last_refresh_token: std::sync::Mutex<String>,
        delay: Duration,
        ttl: Option<Duration>,
    }

    impl CountingUaa {
        fn issue(&self, n: usize, refresh: Option<String>) -> AccessToken {
            AccessToken {
                value: format!("token-{}", n),
                token_type: "bearer".into(),
                refresh_token: refresh,
                renew_at: self.ttl.map(|ttl| Instant::now() + ttl),
            }
        }
    }

    #[async_trait]
    impl Uaa for CountingUaa {
        async fn client_credentials_grant(&self) -> Result<AccessToken, ClientError> {
            let n = self.client_credentials.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::time::sleep(self.delay).await;
            Ok(self.issue(n, None))
        }

        async fn password_grant(&self, _: &str, _: &str) -> Result<AccessToken, ClientError> {
            unreachable!("token sessions never use the password grant")
        }

        async fn refresh_token_grant(
            &self,
            refresh_token: &str,
        ) -> Result<AccessToken, ClientError> {
            let n = self.refreshes.fetch_add(1, Ordering::SeqCst) + 1;
            *self.last_refresh_token.lock().unwrap() = refresh_token.to_string();
            tokio::time::sleep(self.delay).await;
            Ok(self.issue(n, Some(format!("refresh-{}", n))))
        }
    }

    #[tokio::test]
    async fn test_token_is_reused_while_valid() {
        let uaa = Arc::new(CountingUaa {
            ttl: Some(Duration::from_secs(3600)),
            ..Default::default()
        });
        let session = TokenSession::client_credentials(uaa.clone());

        let first = session.token().await.unwrap();
        let second = session.token().await.unwrap();

        assert_eq!(first.value, second.value);
        assert_eq!(uaa.client_credentials.load(Ordering::SeqCst), 1);
        assert_eq!(session.renewals(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_callers_share_one_renewal() {
        let uaa = Arc::new(CountingUaa {
            delay: Duration::from_millis(50),
            ttl: Some(Duration::from_secs(3600)),
            ..Default::default()
        });
        let session = Arc::new(TokenSession::client_credentials(uaa.clone()));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let session = Arc::clone(&session);
            handles.push(tokio::spawn(async move { session.token().await.unwrap() }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().value, "token-1");
        }

        assert_eq!(uaa.client_credentials.load(Ordering::SeqCst), 1);
        assert_eq!(session.renewals(), 1);
    }

    #[tokio::test]
    async fn test_invalidate_forces_renewal() {
        let uaa = Arc::new(CountingUaa {
            ttl: Some(Duration::from_secs(3600)),
            ..Default::default()
        });
        let session = TokenSession::client_credentials(uaa.clone());

        let first = session.token().await.unwrap();
        session.invalidate(&first);
        let second = session.token().await.unwrap();

        assert_ne!(first.value, second.value);
        assert_eq!(session.renewals(), 2);
    }

    #[tokio::test]
    async fn test_invalidating_an_older_token_keeps_current() {
        let uaa = Arc::new(CountingUaa::default());
        let session = TokenSession::client_credentials(uaa.clone());

        let first = session.token().await.unwrap();
        session.invalidate(&first);
        let second = session.token().await.unwrap();
        session.invalidate(&first);
        let third = session.token().await.unwrap();

        assert_eq!(second.value, third.value);
        assert_eq!(uaa.client_credentials.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_refresh_session_serves_initial_then_rotates_refresh_token() {
        let uaa = Arc::new(CountingUaa::default());
        let initial = AccessToken {
            value: "initial".into(),
            token_type: "bearer".into(),
            refresh_token: Some("refresh-0".into()),
            renew_at: Some(Instant::now() + Duration::from_secs(3600)),
        };
        let session =
            TokenSession::refresh_token(uaa.clone(), "refresh-0".into(), Some(initial.clone()));

        assert_eq!(session.token().await.unwrap().value, "initial");
        assert_eq!(uaa.refreshes.load(Ordering::SeqCst), 0);

        session.invalidate(&initial);
        let renewed = session.token().await.unwrap();
        assert_eq!(renewed.value, "token-1");
        assert_eq!(*uaa.last_refresh_token.lock().unwrap(), "refresh-0");

        session.invalidate(&renewed);
        session.token().await.unwrap();
        assert_eq!(*uaa.last_refresh_token.lock().unwrap(), "refresh-1");
        assert_eq!(uaa.client_credentials.load(Ordering::SeqCst), 0);
    }
}
