//! # Auth Test Utilities
//!
//! Shared test utilities for the auth service.
//!
//! This crate provides:
//! - Deterministic crypto fixtures (fixed signing secret, forged refresh tokens)
//! - Server test harness (TestAuthServer for E2E tests)
//! - Identity store doubles for concurrency and fault injection
//! - Fixed test IDs and emails
//! - Custom assertions (TokenAssertions, RefreshTokenAssertions)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use auth_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> Result<(), anyhow::Error> {
//!     let server = TestAuthServer::spawn().await?;
//!     let id = server.register(TEST_EMAIL_ALICE).await?;
//!     let pair = server.create_token_pair(id).await?;
//!
//!     pair.access_token
//!         .assert_valid_jwt()
//!         .assert_for_subject(&id.to_string());
//!     Ok(())
//! }
//! ```

pub mod assertions;
pub mod crypto_fixtures;
pub mod server_harness;
pub mod store_doubles;
pub mod test_ids;

// Re-export commonly used items
pub use assertions::*;
pub use crypto_fixtures::*;
pub use server_harness::*;
pub use store_doubles::*;
pub use test_ids::*;
