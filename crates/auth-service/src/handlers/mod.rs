//! HTTP request handlers.

pub mod auth_handler;
pub mod health_handler;
pub mod metrics_handler;

pub use auth_handler::{handle_create_token_pair, handle_refresh_token, handle_register};
pub use health_handler::health_check;
pub use metrics_handler::metrics_handler;
