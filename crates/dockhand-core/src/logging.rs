//! Structured logging field name constants.
//!
//! Crates use these constants for consistent structured logging so log
//! aggregation tools can query by standardized field names across every
//! subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events, operation completions |
//! | DEBUG | Decision points, intermediate values |

/// Subsystem originating the log event.
/// Values: "queue", "ingest", "processing", "inbox", "network", "ai", "api"
pub const SUBSYSTEM: &str = "subsystem";

/// Document UUID being operated on.
pub const DOCUMENT_ID: &str = "document_id";

/// Job UUID being processed.
pub const JOB_ID: &str = "job_id";

/// Job type string.
pub const JOB_TYPE: &str = "job_type";

/// Queue name a job or worker belongs to.
pub const QUEUE: &str = "queue";

/// Source (inbox or network) UUID.
pub const SOURCE_ID: &str = "source_id";

/// AI provider identifier.
pub const PROVIDER: &str = "provider";

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";
