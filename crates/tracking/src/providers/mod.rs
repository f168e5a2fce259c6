//! Tracking provider implementations.

pub mod traits;
pub mod wandb;

pub use traits::{Project, Run, TrackingError, TrackingProvider};
