//! # dockhand-core
//!
//! Core types, traits, and abstractions shared by the dockhand crates.
//!
//! This crate provides:
//! - The workspace [`Error`]/[`Result`] types
//! - Entity models (documents, jobs, sources, AI suggestions)
//! - Centralized default constants
//! - The in-process [`StatusBroadcaster`] for lifecycle fan-out

pub mod defaults;
pub mod error;
pub mod logging;
pub mod models;
pub mod status;

pub use error::{Error, Result};
pub use models::*;
pub use status::{StatusBroadcaster, StatusUpdate, Subscription};
