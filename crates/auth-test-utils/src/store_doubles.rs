//! Identity store doubles for concurrency and fault injection tests.
//!
//! Each double wraps a real store (usually `InMemoryIdentityStore`) and
//! perturbs one aspect of its behavior.

use auth_service::errors::AuthError;
use auth_service::models::Identity;
use auth_service::repositories::IdentityStore;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Barrier;
use uuid::Uuid;

/// Holds every armed `get_by_id` until `parties` readers have read.
///
/// With N concurrent rotations and `parties = N`, every request observes the
/// same current hash before any of them reaches compare-and-set.
pub struct BarrierStore {
    inner: Arc<dyn IdentityStore>,
    barrier: Barrier,
    armed: AtomicBool,
}

impl BarrierStore {
    pub fn new(inner: Arc<dyn IdentityStore>, parties: usize) -> Self {
        Self {
            inner,
            barrier: Barrier::new(parties),
            armed: AtomicBool::new(false),
        }
    }

    /// Start holding reads. Reads before this call pass straight through.
    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    /// Stop holding reads. Must not be called while readers are waiting.
    pub fn disarm(&self) {
        self.armed.store(false, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl IdentityStore for BarrierStore {
    async fn create_identity(&self, email: &str) -> Result<Uuid, AuthError> {
        self.inner.create_identity(email).await
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Identity, AuthError> {
        let result = self.inner.get_by_id(id).await;
        if self.armed.load(Ordering::SeqCst) {
            self.barrier.wait().await;
        }
        result
    }

    async fn compare_and_set_rotation(
        &self,
        id: Uuid,
        expected_hash: Option<&str>,
        new_hash: &str,
        new_expires_at: DateTime<Utc>,
    ) -> Result<bool, AuthError> {
        self.inner
            .compare_and_set_rotation(id, expected_hash, new_hash, new_expires_at)
            .await
    }

    async fn ping(&self) -> Result<(), AuthError> {
        self.inner.ping().await
    }
}

/// Which store operation a [`StallingStore`] delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StallOn {
    CreateIdentity,
    GetById,
    CompareAndSet,
    Ping,
}

/// Whether the stall happens before or after the inner call is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StallMode {
    /// Nothing reaches the inner store until the stall ends.
    Before,
    /// The inner call is applied, then the response is delayed.
    After,
}

/// Delays one operation by a fixed duration.
pub struct StallingStore {
    inner: Arc<dyn IdentityStore>,
    stall_on: StallOn,
    mode: StallMode,
    delay: Duration,
    armed: AtomicBool,
}

impl StallingStore {
    pub fn new(inner: Arc<dyn IdentityStore>, stall_on: StallOn, delay: Duration) -> Self {
        Self {
            inner,
            stall_on,
            mode: StallMode::Before,
            delay,
            armed: AtomicBool::new(true),
        }
    }

    pub fn with_mode(mut self, mode: StallMode) -> Self {
        self.mode = mode;
        self
    }

    /// Start disarmed; call [`arm`](Self::arm) once setup is done.
    pub fn disarmed(self) -> Self {
        self.armed.store(false, Ordering::SeqCst);
        self
    }

    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    pub fn disarm(&self) {
        self.armed.store(false, Ordering::SeqCst);
    }

    async fn run<T, F>(&self, op: StallOn, fut: F) -> Result<T, AuthError>
    where
        F: std::future::Future<Output = Result<T, AuthError>> + Send,
        T: Send,
    {
        let stalls = op == self.stall_on && self.armed.load(Ordering::SeqCst);
        if !stalls {
            return fut.await;
        }

        match self.mode {
            StallMode::Before => {
                tokio::time::sleep(self.delay).await;
                fut.await
            }
            StallMode::After => {
                let result = fut.await;
                tokio::time::sleep(self.delay).await;
                result
            }
        }
    }
}

#[async_trait::async_trait]
impl IdentityStore for StallingStore {
    async fn create_identity(&self, email: &str) -> Result<Uuid, AuthError> {
        self.run(StallOn::CreateIdentity, self.inner.create_identity(email))
            .await
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Identity, AuthError> {
        self.run(StallOn::GetById, self.inner.get_by_id(id)).await
    }

    async fn compare_and_set_rotation(
        &self,
        id: Uuid,
        expected_hash: Option<&str>,
        new_hash: &str,
        new_expires_at: DateTime<Utc>,
    ) -> Result<bool, AuthError> {
        self.run(
            StallOn::CompareAndSet,
            self.inner
                .compare_and_set_rotation(id, expected_hash, new_hash, new_expires_at),
        )
        .await
    }

    async fn ping(&self) -> Result<(), AuthError> {
        self.run(StallOn::Ping, self.inner.ping()).await
    }
}

/// Simulates a competing writer: the next `times` compare-and-set calls are
/// each preceded by another write that installs a bcrypt digest of a secret
/// nobody holds, so the caller's expectation is stale.
pub struct InterferingStore {
    inner: Arc<dyn IdentityStore>,
    remaining: AtomicUsize,
    interferences: AtomicUsize,
}

impl InterferingStore {
    pub fn new(inner: Arc<dyn IdentityStore>, times: usize) -> Self {
        Self {
            inner,
            remaining: AtomicUsize::new(times),
            interferences: AtomicUsize::new(0),
        }
    }

    /// Interfere with the next `times` compare-and-set calls.
    pub fn interfere_next(&self, times: usize) {
        self.remaining.store(times, Ordering::SeqCst);
    }

    /// Competing writes performed so far.
    pub fn interferences(&self) -> usize {
        self.interferences.load(Ordering::SeqCst)
    }

    fn take_interference(&self) -> bool {
        self.remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait::async_trait]
impl IdentityStore for InterferingStore {
    async fn create_identity(&self, email: &str) -> Result<Uuid, AuthError> {
        self.inner.create_identity(email).await
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Identity, AuthError> {
        self.inner.get_by_id(id).await
    }

    async fn compare_and_set_rotation(
        &self,
        id: Uuid,
        expected_hash: Option<&str>,
        new_hash: &str,
        new_expires_at: DateTime<Utc>,
    ) -> Result<bool, AuthError> {
        if self.take_interference() {
            let n = self.interferences.fetch_add(1, Ordering::SeqCst);
            let competing_hash = bcrypt::hash(format!("competing-writer-{}", n), 4)
                .map_err(|e| AuthError::Crypto(e.to_string()))?;
            self.inner
                .compare_and_set_rotation(id, expected_hash, &competing_hash, new_expires_at)
                .await?;
        }

        self.inner
            .compare_and_set_rotation(id, expected_hash, new_hash, new_expires_at)
            .await
    }

    async fn ping(&self) -> Result<(), AuthError> {
        self.inner.ping().await
    }
}

/// Every operation fails as if the backing store were down.
#[derive(Debug, Default)]
pub struct UnavailableStore;

impl UnavailableStore {
    fn error() -> AuthError {
        AuthError::UpstreamStorage("connection refused".to_string())
    }
}

#[async_trait::async_trait]
impl IdentityStore for UnavailableStore {
    async fn create_identity(&self, _email: &str) -> Result<Uuid, AuthError> {
        Err(Self::error())
    }

    async fn get_by_id(&self, _id: Uuid) -> Result<Identity, AuthError> {
        Err(Self::error())
    }

    async fn compare_and_set_rotation(
        &self,
        _id: Uuid,
        _expected_hash: Option<&str>,
        _new_hash: &str,
        _new_expires_at: DateTime<Utc>,
    ) -> Result<bool, AuthError> {
        Err(Self::error())
    }

    async fn ping(&self) -> Result<(), AuthError> {
        Err(Self::error())
    }
}
