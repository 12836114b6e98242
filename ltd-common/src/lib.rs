//! Shared library for LifeTime Deploy.
//!
//! - [`endpoint`]: LifeTime and CI/CD probe base URLs
//! - [`client`]: async HTTP client and per-endpoint status tables
//! - [`cache`]: JSON artifact store under the artifact directory
//! - [`lifetime`]: environments, applications, deployments and downloads
//! - [`deploy`]: plan building, queue wait and the deployment poll loop
//! - [`manifest`]: trigger and deployment manifests
//! - [`order`]: dependency-first deployment order
//! - [`config`], [`errors`], [`logging`]: ambient infrastructure

pub mod cache;
pub mod client;
pub mod config;
pub mod deploy;
pub mod endpoint;
pub mod errors;
pub mod lifetime;
pub mod logging;
pub mod manifest;
pub mod order;
pub mod probe;
pub mod util;
pub mod version;

pub use cache::{ArtifactStore, CacheFile};
pub use client::{ApiResponse, LifetimeClient};
pub use config::PipelineConfig;
pub use endpoint::{ApiVersion, LifetimeEndpoint};
pub use errors::{LifetimeError, Result};
pub use lifetime::Lifetime;
