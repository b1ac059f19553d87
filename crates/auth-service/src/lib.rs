//! Identity credential issuance and refresh rotation service.
//!
//! # Modules
//!
//! - `clock` - Injectable time source
//! - `config` - Service configuration
//! - `crypto` - Access token signing and rotation secret handling
//! - `errors` - Error types
//! - `handlers` - HTTP request handlers
//! - `middleware` - HTTP middleware
//! - `models` - Data models
//! - `observability` - Tracing and metrics
//! - `repositories` - Identity store implementations
//! - `routes` - Router and application state
//! - `services` - Registration, issuance and rotation protocol

pub mod clock;
pub mod config;
pub mod crypto;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod repositories;
pub mod routes;
pub mod services;
