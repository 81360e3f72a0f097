//! Centralized default constants for the dockhand system.
//!
//! **This module is the single source of truth** for shared default values.
//! Crates reference these constants instead of defining their own magic
//! numbers. Organized by domain area.

// =============================================================================
// QUEUES
// =============================================================================

/// Queue that carries document processing jobs.
pub const QUEUE_DEFAULT: &str = "default";

/// Queue that carries AI analysis jobs, kept separate so provider latency
/// does not starve ingestion.
pub const QUEUE_AI: &str = "ai";

/// Job type handled by the processing orchestrator.
pub const JOB_TYPE_PROCESS: &str = "process_document";

/// Job type handled by the AI analyzer.
pub const JOB_TYPE_AI: &str = "ai_analyze";

/// Default maximum delivery attempts before a job is failed.
pub const JOB_MAX_ATTEMPTS: i32 = 3;

/// Worker poll interval when the queue is empty, in milliseconds.
pub const JOB_POLL_INTERVAL_MS: u64 = 1_000;

/// Concurrent workers per queue.
pub const JOB_WORKER_COUNT: usize = 4;

/// How long a claimed job stays invisible before the sweep revives it.
pub const VISIBILITY_TIMEOUT_SECS: u64 = 300;

/// Base delay for full-jitter exponential backoff, in milliseconds.
pub const RETRY_BASE_DELAY_MS: u64 = 1_000;

/// Cap on the retry delay, in seconds.
pub const RETRY_MAX_DELAY_SECS: u64 = 3_600;

// =============================================================================
// PROCESSING
// =============================================================================

/// Minimum trimmed character count for embedded text to count as "has text".
pub const MIN_TEXT_LENGTH: usize = 100;

/// Poll interval while waiting for the OCR service output, in milliseconds.
pub const OCR_POLL_INTERVAL_MS: u64 = 500;

/// Timeout for the OCR service round trip, in seconds.
pub const OCR_TIMEOUT_SECS: u64 = 300;

/// Deadline for thumbnail rendering (rasterize + encode), in seconds.
pub const THUMBNAIL_TIMEOUT_SECS: u64 = 120;

/// Thumbnail width passed to the rasterizer, in pixels.
pub const THUMBNAIL_WIDTH: u32 = 300;

/// WebP encoder quality.
pub const WEBP_QUALITY: u32 = 80;

// =============================================================================
// SOURCES
// =============================================================================

/// Quiescence window for inbox file events, in milliseconds.
pub const DEBOUNCE_DELAY_MS: u64 = 500;

/// Concurrent ingestions per source service.
pub const SOURCE_MAX_CONCURRENT: usize = 4;

/// Subdirectory for files an inbox could not import.
pub const ERROR_SUBDIR: &str = "errors";

/// Cadence of the network source poller, in seconds.
pub const SYNC_INTERVAL_SECS: u64 = 300;

/// Consecutive sync failures before a network source is auto-disabled.
pub const MAX_CONSECUTIVE_FAILURES: i32 = 5;

/// Default cap on files handled per sync.
pub const SYNC_BATCH_SIZE: i32 = 100;

/// Connect timeout for SMB/NFS sessions, in seconds.
pub const REMOTE_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Subfolder used by the `move` post-import action when none is configured.
pub const MOVE_SUBFOLDER_DEFAULT: &str = "imported";

/// Bytes sniffed for magic-byte file type detection.
pub const MAGIC_SNIFF_LEN: usize = 262;

// =============================================================================
// STATUS FAN-OUT
// =============================================================================

/// Maximum concurrent status subscribers.
pub const MAX_SUBSCRIBERS: usize = 100;

/// Per-subscriber buffered updates before drops kick in.
pub const SUBSCRIBER_BUFFER: usize = 16;

/// SSE heartbeat interval, in seconds.
pub const SSE_HEARTBEAT_SECS: u64 = 30;

// =============================================================================
// AI
// =============================================================================

/// Rough characters-per-page used to truncate text sent to providers.
pub const CHARS_PER_PAGE: usize = 3_000;

/// Default max response tokens for provider calls.
pub const AI_MAX_TOKENS: u32 = 1_024;

// =============================================================================
// SERVER
// =============================================================================

/// Default HTTP server port.
pub const SERVER_PORT: u16 = 3000;

/// Grace period for HTTP shutdown, in seconds.
pub const SHUTDOWN_TIMEOUT_SECS: u64 = 10;
