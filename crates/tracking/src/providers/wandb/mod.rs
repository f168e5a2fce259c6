//! Weights & Biases provider.
//!
//! Talks to the public GraphQL endpoint with an API key, the same one the
//! `wandb` CLI stores after `wandb login`.

mod client;
mod models;

pub use client::{WandbClient, API_BASE_URL};
