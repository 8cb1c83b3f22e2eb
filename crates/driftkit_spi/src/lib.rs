//! # DriftKit SPI (Service Provider Interface)
//!
//! Low-level provider contracts and foundational types for DriftKit.
//!
//! This crate provides:
//! - **Error types**: Unified error taxonomy across all providers
//! - **Resource model**: Normalized resources, identities, and checksums
//! - **Provider contracts**: The SDK shim interface and the uniform adapter
//! - **Taxonomy**: Native-to-unified type normalization
//! - **Extension points**: Retry policy trait and built-in policies
//!
//! ## Architecture
//!
//! This is the foundation layer that all other DriftKit crates depend on.
//! It defines the contracts that provider adapters must fulfill.

#![warn(missing_docs)]
#![deny(unsafe_code)]

// Core types and errors
mod error;
mod resource;
mod taxonomy;

// Contracts
mod provider;
mod retry;

// Re-export everything
pub use error::*;
pub use provider::*;
pub use resource::*;
pub use retry::*;
pub use taxonomy::*;
