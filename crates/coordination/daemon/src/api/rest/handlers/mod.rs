//! REST API handlers

mod health;
mod links;
mod participants;
mod runs;
mod templates;

pub use health::*;
pub use links::*;
pub use participants::*;
pub use runs::*;
pub use templates::*;
