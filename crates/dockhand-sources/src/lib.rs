//! # dockhand-sources
//!
//! Source adapters that funnel files into the ingest service:
//! - Watched local inbox directories with per-path debouncing
//! - SMB/NFS network shares polled on a fixed cadence
//!
//! All sources share the same policies: magic-byte validation before
//! ingestion, per-file event logging, and failure isolation (one bad file
//! never aborts a scan or sync).

pub mod debounce;
pub mod inbox;
pub mod poller;
pub mod remote;
pub mod sync;

pub use debounce::Debouncer;
pub use inbox::InboxService;
pub use poller::Poller;
pub use remote::{source_from_config, NfsSource, RemoteFile, RemoteSource, SmbSource};
pub use sync::{AdapterFactory, NetworkService};
