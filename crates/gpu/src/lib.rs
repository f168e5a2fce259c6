//! GPU instance rental for AI/ML workloads.
//!
//! This crate searches a GPU marketplace for rentable machines, rents the
//! best one, waits for it to come up and checks that the container's
//! entrypoint cloned the expected repository.
//!
//! ## Flow
//!
//! ```text
//!  offers ──► rank ──► create ──► wait for SSH ──► ls /workspace/<repo>
//!  (on-demand)  (price or        (template +       (poll)        (over ssh)
//!               network)          image)
//! ```
//!
//! ## Supported Providers
//!
//! - **Vast.ai** - on-demand marketplace offers
//!
//! ## Example
//!
//! ```ignore
//! use gpu::launch::{LaunchConfig, Launcher};
//! use gpu::providers::vast::Vast;
//! use gpu::verify::SshShell;
//!
//! let provider = Vast::new(api_token)?;
//! let shell = SshShell::default();
//!
//! let report = Launcher::new(&provider, &shell, LaunchConfig::default())
//!     .run()
//!     .await?;
//! println!("rented {}", report.instance_id);
//! ```

pub mod launch;
pub mod providers;
pub mod selection;
pub mod verify;

pub use providers::vast;
pub use providers::traits::{
    CreateInstanceRequest, GpuInstance, GpuOffer, GpuProvider, GpuProviderError, InstanceStatus,
    OfferQuery, SshEndpoint,
};
pub use selection::OfferRanking;
