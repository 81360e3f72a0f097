//! # dockhand-jobs
//!
//! Durable background job processing for dockhand.
//!
//! This crate provides:
//! - Per-queue worker pools with poll-based claiming
//! - Retry with full-jitter exponential backoff
//! - A visibility sweep that revives claims from crashed workers
//! - The `process_document` and `ai_analyze` handlers
//!
//! ## Example
//!
//! ```rust,ignore
//! use dockhand_jobs::{HandlerRegistry, Queue, QueueConfig};
//!
//! let mut registry = HandlerRegistry::new();
//! registry.register(process_handler);
//!
//! let queue = Arc::new(Queue::new(db, QueueConfig::default(), registry));
//! let handles = queue.start("default", cancel.clone());
//! // ... on shutdown: cancel.cancel(); join all handles.
//! ```

pub mod handler;
pub mod handlers;
pub mod worker;

pub use handler::{HandlerRegistry, JobContext, JobHandler};
pub use handlers::{AiAnalyzeHandler, ProcessHandler, TextExtractor, TextMethod, ThumbnailGenerator};
pub use worker::{next_retry_delay, Queue, QueueConfig};
