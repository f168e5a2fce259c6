//! Experiment-tracking housekeeping.
//!
//! Deletes runs in bulk from an experiment-tracking account. Projects
//! themselves cannot be removed through the API and are left in place.
//!
//! ## Supported Providers
//!
//! - **Weights & Biases** - GraphQL API
//!
//! ## Example
//!
//! ```ignore
//! use tracking::cleanup::{delete_all_runs, CleanupOptions};
//! use tracking::providers::wandb::WandbClient;
//! use tracking::TrackingProvider;
//!
//! let client = WandbClient::new(api_key)?;
//! let entity = client.default_entity().await?;
//! let summary = delete_all_runs(&client, &entity, &CleanupOptions::default()).await?;
//! println!("deleted {} runs", summary.deleted());
//! ```

pub mod cleanup;
pub mod providers;

pub use providers::traits::{Project, Run, TrackingError, TrackingProvider};
