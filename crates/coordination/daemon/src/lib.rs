//! Coordination daemon library
//!
//! This module provides the components of the coordination daemon:
//! - REST API handlers over the coordination engine
//! - Configuration loading
//! - Server lifecycle management

pub mod api;
pub mod config;
pub mod error;
pub mod server;

pub use api::create_router;
pub use config::DaemonConfig;
pub use error::{ApiError, ApiResult, DaemonError, DaemonResult, ErrorResponse};
pub use server::Server;
