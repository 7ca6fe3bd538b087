//! HTTP API for the coordination daemon

pub mod rest;

pub use rest::router::create_router;
