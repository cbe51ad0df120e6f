//! System orchestration, startup, and shutdown logic.

pub mod config;
pub mod error;
pub mod feed_system;
pub mod logging;

pub use config::*;
pub use error::*;
pub use feed_system::*;
pub use logging::*;
