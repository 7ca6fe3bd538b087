//! REST API: operator endpoints and participant magic-link endpoints

pub mod handlers;
pub mod router;
pub mod state;
