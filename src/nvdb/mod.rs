//! NVDB read API client.
//!
//! Walks a `vegobjekter` collection page by page, following the `neste` link
//! the server returns, and accumulates the raw road objects in memory.

pub mod client;
pub mod error;
pub mod params;

pub use client::{Harvest, NVDB_ACCEPT, NvdbClient, PageEnvelope};
pub use error::FetchError;
pub use params::QueryParams;
