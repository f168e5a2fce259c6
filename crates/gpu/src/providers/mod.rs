//! GPU provider implementations.
//!
//! This module contains the [`GpuProvider`] trait and the Vast.ai
//! implementation.

pub mod traits;
pub mod vast;

pub use traits::{
    CreateInstanceRequest, GpuInstance, GpuOffer, GpuProvider, GpuProviderError, InstanceStatus,
    OfferQuery, SshEndpoint,
};
