//! Database sub-API client.
//!
//! Service instances authenticate with HTTP Basic credentials plus the tenant
//! header, and are provisioned asynchronously: creation is accepted at once
//! and completes when the instance reports `Running`.

#![deny(missing_docs)]

pub mod client;
pub mod models;
pub mod service_instances;

pub use client::{DatabaseClient, DatabaseClientBuilder};
pub use models::{CreateServiceInstanceInput, DatabaseParameter, ServiceInstance};
pub use service_instances::ServiceInstances;

/// Convenient result alias that reuses the shared OPC error type.
pub type Result<T> = opc_core::Result<T>;
