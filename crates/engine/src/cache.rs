//! Credential-keyed adapter handle cache.
//!
//! Building a session against a remote API is expensive; concurrent
//! resource units with identical credentials must share one handle. The
//! cache guarantees at most one construction per credential tuple even
//! under concurrent first use, and evicts entries after a bounded
//! lifetime so long-running agents pick up rotated credentials.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;

use stratus_core::{AdapterError, AdapterResult};

/// Default lifetime of a cached handle.
pub const DEFAULT_HANDLE_TTL: Duration = Duration::from_secs(600);

/// The credential tuple identifying one remote session.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Credentials {
    /// API endpoint.
    pub auth_url: String,
    /// Project or tenant scope.
    pub project: String,
    /// User name.
    pub username: String,
    /// Password or token.
    pub password: String,
}

impl Credentials {
    /// Create a credential tuple.
    pub fn new(
        auth_url: impl Into<String>,
        project: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            auth_url: auth_url.into(),
            project: project.into(),
            username: username.into(),
            password: password.into(),
        }
    }
}

// The password never reaches logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("auth_url", &self.auth_url)
            .field("project", &self.project)
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// TTL-bounded, construct-once-then-share cache of adapter handles.
///
/// `H` is whatever an adapter considers a session: an authenticated client,
/// a connection pool, a token bundle.
pub struct HandleCache<H> {
    cache: Cache<Credentials, Arc<H>>,
}

impl<H: Send + Sync + 'static> HandleCache<H> {
    /// Create a cache with the default handle lifetime.
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_HANDLE_TTL)
    }

    /// Create a cache with a custom handle lifetime.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(64)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Fetch the handle for `credentials`, constructing it with `connect`
    /// if none is cached.
    ///
    /// Concurrent callers with the same tuple coalesce onto a single
    /// construction; everyone shares the resulting handle. A failed
    /// construction is not cached, so the next caller retries.
    pub async fn get_or_connect<F, Fut>(
        &self,
        credentials: Credentials,
        connect: F,
    ) -> AdapterResult<Arc<H>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = AdapterResult<H>>,
    {
        self.cache
            .try_get_with(credentials, async move { connect().await.map(Arc::new) })
            .await
            .map_err(|err: Arc<AdapterError>| (*err).clone())
    }

    /// Drop a single entry, forcing reconstruction on next use.
    pub async fn invalidate(&self, credentials: &Credentials) {
        self.cache.invalidate(credentials).await;
    }

    /// Drop every cached handle.
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    /// Number of live entries.
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

impl<H: Send + Sync + 'static> Default for HandleCache<H> {
    fn default() -> Self {
        Self::new()
    }
}
