//! # opc-core
//!
//! Client engine shared by the cloud control-plane sub-API crates.
//!
//! This crate provides the transport, authentication session, polling wait
//! engine and name qualification every resource wrapper is built on.
//!
//! ## Modules
//!
//! - [`error`] - Error types and HTTP status code mapping
//! - [`config`] - Connection configuration shared by every sub-API
//! - [`client`] - HTTP transport, retry policy and client configuration
//! - [`session`] - Credential caching and refresh
//! - [`wait`] - Polling wait engine and status tables
//! - [`naming`] - Hierarchical resource-name qualification
//! - [`resource`] - Generic create/get/update/delete client

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod config;
pub mod error;
pub mod naming;
pub mod resource;
pub mod session;
pub mod wait;

// Re-export commonly used types
pub use error::{Error, Result};
