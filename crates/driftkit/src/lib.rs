//! # DriftKit - Multi-Cloud Discovery & Drift Automation
//!
//! A unified, type-safe engine for discovering cloud infrastructure
//! across providers and driving automation from what it finds.
//!
//! ## Architecture
//!
//! This workspace is organized into layers:
//!
//! 1. **SPI** ([`driftkit_spi`]) - Resource model, error taxonomy, adapter contracts
//! 2. **Providers** (`driftkit-aws`, `driftkit-azure`, ...) - Per-cloud adapters
//! 3. **Core** ([`driftkit_core`]) - Cache, diffing, fan-out, resilience, events
//! 4. **Automation** ([`driftkit_automation`]) - Workflows, triggers, actions
//! 5. **Facade** (this crate) - Configuration and the one-stop [`DriftKit`] handle
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use driftkit::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> DriftResult<()> {
//!     let kit = DriftKit::builder()
//!         .adapter(aws_adapter)
//!         .build()
//!         .await?;
//!     kit.start();
//!
//!     let result = kit.run_cycle(&[Provider::Aws], &[]).await?;
//!     println!(
//!         "new={} updated={} deleted={} unchanged={}",
//!         result.new.len(),
//!         result.updated.len(),
//!         result.deleted.len(),
//!         result.unchanged_count,
//!     );
//!
//!     kit.stop().await;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod facade;
pub mod plugins;
pub mod prelude;

pub use config::DriftConfig;
pub use facade::{DriftKit, DriftKitBuilder};
pub use plugins::{PluginConfig, PluginDescriptor};
