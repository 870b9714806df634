//! AVRCP target player list coordination.
//!
//! Exposes every media application on a device to a remote AVRCP
//! controller as a single aggregate player:
//!
//! - Tracks media sessions and browse services under stable two digit ids
//! - Arbitrates the active player and pushes its metadata, state and queue
//! - Merges all browse services into one browse tree
//! - Suppresses updates that change nothing
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use avrcp_target::{config::Config, services::avrcp::{AvrcpTargetService, MediaFramework}};
//!
//! async fn run(framework: Arc<dyn MediaFramework>) -> avrcp_target::Result<()> {
//!     let config = Config::load()?;
//!     let (updates_tx, mut updates) = tokio::sync::mpsc::unbounded_channel();
//!
//!     let service = AvrcpTargetService::start(config.players, framework, updates_tx).await;
//!     while let Some(update) = updates.recv().await {
//!         println!("{update:?}");
//!     }
//!     service.stop();
//!     Ok(())
//! }
//! ```

/// Configuration schema definitions and validation.
pub mod config;

/// Core error types and result aliases.
pub mod core;

/// Reactive services.
pub mod services;

/// Logging setup.
pub mod tracing_config;

/// Re-exported core types for convenience.
pub use core::{AppError, Result};
