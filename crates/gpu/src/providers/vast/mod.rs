//! Vast.ai GPU rental provider.
//!
//! Implements the [`GpuProvider`](crate::providers::traits::GpuProvider) trait
//! against the Vast.ai marketplace API.
//!
//! ## Example
//!
//! ```ignore
//! use gpu::providers::vast::Vast;
//! use gpu::providers::traits::{CreateInstanceRequest, GpuProvider, OfferQuery};
//!
//! let provider = Vast::new(api_token)?;
//!
//! // Search on-demand offers
//! let offers = provider.list_offers(&OfferQuery::default()).await?;
//!
//! // Rent the first one
//! let id = provider
//!     .create_instance(CreateInstanceRequest::new(&offers[0].id, 329609, image))
//!     .await?;
//! ```

mod client;
mod models;

pub use client::{Vast, API_BASE_URL, CONSOLE_URL};
pub use models::*;
