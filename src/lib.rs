//! Lifecycle core for brokering agricultural crop trades between farmers and
//! buyers, with inspector-gated quality checks and delivery tracking.

pub mod collaborators;
pub mod config;
pub mod engine;
pub mod error;
pub mod event_log;
pub mod inspection;
pub mod locks;
pub mod logistics;
pub mod model;
pub mod store;
pub mod telemetry;
pub mod transition;
pub mod utils;

pub use engine::TradeEngine;
pub use error::{LifecycleError, Result};
