//! Test server harness for E2E testing
//!
//! Provides TestAuthServer for spawning real auth service instances in tests.

use crate::crypto_fixtures::test_issuer;
use crate::test_ids::test_epoch;
use auth_service::clock::{Clock, ManualClock};
use auth_service::config::{DEFAULT_ACCESS_TOKEN_TTL_SECONDS, DEFAULT_REFRESH_TOKEN_TTL_SECONDS};
use auth_service::models::{RegisterResponse, TokenPairResponse};
use auth_service::repositories::{IdentityStore, InMemoryIdentityStore, PgIdentityStore};
use auth_service::routes::{self, AppState};
use auth_service::services::{AuthService, AuthSettings};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Test harness for spawning the auth service in E2E tests.
///
/// Time is driven by a [`ManualClock`] shared by the token issuer and the
/// orchestrator, so tests can expire rotation secrets without sleeping.
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_rotation_e2e() -> Result<(), anyhow::Error> {
///     let server = TestAuthServer::spawn().await?;
///     let id = server.register("alice@example.com").await?;
///     let pair = server.create_token_pair(id).await?;
///
///     let response = server.post_refresh(id, &pair.refresh_token).await?;
///     assert_eq!(response.status(), 201);
///     Ok(())
/// }
/// ```
pub struct TestAuthServer {
    addr: SocketAddr,
    clock: Arc<ManualClock>,
    store: Arc<dyn IdentityStore>,
    auth: Arc<AuthService>,
    client: reqwest::Client,
    _handle: JoinHandle<()>,
}

/// Options for [`TestAuthServer`]. Defaults match production lifetimes.
pub struct TestAuthServerBuilder {
    store: Option<Arc<dyn IdentityStore>>,
    access_token_ttl: chrono::Duration,
    refresh_token_ttl: chrono::Duration,
    store_timeout: Duration,
    health_ping_timeout: Duration,
    start: DateTime<Utc>,
}

impl Default for TestAuthServerBuilder {
    fn default() -> Self {
        Self {
            store: None,
            access_token_ttl: chrono::Duration::seconds(DEFAULT_ACCESS_TOKEN_TTL_SECONDS),
            refresh_token_ttl: chrono::Duration::seconds(DEFAULT_REFRESH_TOKEN_TTL_SECONDS),
            store_timeout: Duration::from_secs(5),
            health_ping_timeout: Duration::from_secs(1),
            start: test_epoch(),
        }
    }
}

impl TestAuthServerBuilder {
    /// Use `store` instead of a fresh in-memory store.
    pub fn store(mut self, store: Arc<dyn IdentityStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn access_token_ttl(mut self, ttl: chrono::Duration) -> Self {
        self.access_token_ttl = ttl;
        self
    }

    pub fn refresh_token_ttl(mut self, ttl: chrono::Duration) -> Self {
        self.refresh_token_ttl = ttl;
        self
    }

    pub fn store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    pub fn health_ping_timeout(mut self, timeout: Duration) -> Self {
        self.health_ping_timeout = timeout;
        self
    }

    /// Initial reading of the manual clock.
    pub fn start_at(mut self, start: DateTime<Utc>) -> Self {
        self.start = start;
        self
    }

    /// Start the server on a random local port.
    pub async fn spawn(self) -> Result<TestAuthServer, anyhow::Error> {
        let store: Arc<dyn IdentityStore> = match self.store {
            Some(store) => store,
            None => Arc::new(InMemoryIdentityStore::new()),
        };
        let clock = Arc::new(ManualClock::new(self.start));
        let shared_clock: Arc<dyn Clock> = clock.clone();

        let issuer = Arc::new(test_issuer(shared_clock.clone()));
        let auth = Arc::new(AuthService::new(
            store.clone(),
            issuer,
            shared_clock,
            AuthSettings {
                access_token_ttl: self.access_token_ttl,
                refresh_token_ttl: self.refresh_token_ttl,
                store_timeout: self.store_timeout,
            },
        ));

        let state = Arc::new(AppState {
            auth: auth.clone(),
            store: store.clone(),
            health_ping_timeout: self.health_ping_timeout,
        });

        // The global recorder can only be installed once per test process.
        // Later servers get a standalone recorder.
        let metrics_handle = match routes::init_metrics_recorder() {
            Ok(handle) => handle,
            Err(_) => {
                use metrics_exporter_prometheus::PrometheusBuilder;
                PrometheusBuilder::new().build_recorder().handle()
            }
        };

        let app = routes::build_routes(state, metrics_handle);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
            if let Err(e) = axum::serve(listener, make_service).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(TestAuthServer {
            addr,
            clock,
            store,
            auth,
            client: reqwest::Client::new(),
            _handle: handle,
        })
    }
}

impl TestAuthServer {
    pub fn builder() -> TestAuthServerBuilder {
        TestAuthServerBuilder::default()
    }

    /// Spawn with an in-memory store and default settings.
    pub async fn spawn() -> Result<Self, anyhow::Error> {
        Self::builder().spawn().await
    }

    /// Spawn against a Postgres pool (typically from `#[sqlx::test]`).
    pub async fn spawn_with_pool(pool: PgPool) -> Result<Self, anyhow::Error> {
        Self::builder()
            .store(Arc::new(PgIdentityStore::new(pool)))
            .spawn()
            .await
    }

    /// Get the base URL of the test server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// The clock every expiry decision reads.
    pub fn clock(&self) -> &ManualClock {
        &self.clock
    }

    pub fn store(&self) -> &Arc<dyn IdentityStore> {
        &self.store
    }

    /// The orchestrator behind the HTTP surface, for tests that bypass HTTP.
    pub fn auth(&self) -> &Arc<AuthService> {
        &self.auth
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// `POST /api/register`; fails unless the server answers 201.
    pub async fn register(&self, email: &str) -> Result<Uuid, anyhow::Error> {
        let response = self
            .client
            .post(format!("{}/api/register", self.url()))
            .json(&serde_json::json!({ "email": email }))
            .send()
            .await?;

        let status = response.status();
        if status != reqwest::StatusCode::CREATED {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("register returned {}: {}", status, body);
        }

        let body: RegisterResponse = response.json().await?;
        Ok(body.uuid)
    }

    /// `GET /api/createTokenPair/{uuid}`; fails unless the server answers 201.
    pub async fn create_token_pair(&self, id: Uuid) -> Result<TokenPairResponse, anyhow::Error> {
        let response = self.get_token_pair(&id.to_string()).await?;

        let status = response.status();
        if status != reqwest::StatusCode::CREATED {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("createTokenPair returned {}: {}", status, body);
        }

        Ok(response.json().await?)
    }

    /// Raw `GET /api/createTokenPair/{raw_id}`.
    pub async fn get_token_pair(&self, raw_id: &str) -> Result<reqwest::Response, anyhow::Error> {
        Ok(self
            .client
            .get(format!("{}/api/createTokenPair/{}", self.url(), raw_id))
            .send()
            .await?)
    }

    /// Raw `POST /api/refreshToken`.
    pub async fn post_refresh(
        &self,
        id: Uuid,
        refresh_token: &str,
    ) -> Result<reqwest::Response, anyhow::Error> {
        Ok(self
            .client
            .post(format!("{}/api/refreshToken", self.url()))
            .json(&serde_json::json!({
                "refresh_token": refresh_token,
                "uuid": id.to_string(),
            }))
            .send()
            .await?)
    }
}

impl Drop for TestAuthServer {
    fn drop(&mut self) {
        self._handle.abort();
    }
}
