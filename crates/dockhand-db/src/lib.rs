//! # dockhand-db
//!
//! PostgreSQL layer for dockhand.
//!
//! This crate provides:
//! - Connection pool management
//! - Embedded migrations
//! - Repository implementations for documents, the job queue, sources,
//!   taxonomy, and AI settings/suggestions/usage
//!
//! ## Example
//!
//! ```rust,ignore
//! use dockhand_db::Database;
//!
//! let db = Database::connect("postgres://localhost/dockhand").await?;
//! let doc = db.documents.get(document_id).await?;
//! ```

pub mod ai;
pub mod documents;
pub mod inboxes;
pub mod jobs;
pub mod network_sources;
pub mod pool;
pub mod taxonomy;

pub use ai::{NewSuggestion, PgAiRepository};
pub use documents::PgDocumentRepository;
pub use inboxes::PgInboxRepository;
pub use jobs::PgJobRepository;
pub use network_sources::{CreateNetworkSource, PgNetworkSourceRepository};
pub use pool::{create_pool, create_pool_with_config, PoolConfig};
pub use taxonomy::PgTaxonomyRepository;

use sqlx::PgPool;

use dockhand_core::Result;

/// Handle bundling the pool and all repositories.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
    pub documents: PgDocumentRepository,
    pub jobs: PgJobRepository,
    pub inboxes: PgInboxRepository,
    pub network_sources: PgNetworkSourceRepository,
    pub taxonomy: PgTaxonomyRepository,
    pub ai: PgAiRepository,
}

impl Database {
    /// Wrap an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self {
            documents: PgDocumentRepository::new(pool.clone()),
            jobs: PgJobRepository::new(pool.clone()),
            inboxes: PgInboxRepository::new(pool.clone()),
            network_sources: PgNetworkSourceRepository::new(pool.clone()),
            taxonomy: PgTaxonomyRepository::new(pool.clone()),
            ai: PgAiRepository::new(pool.clone()),
            pool,
        }
    }

    /// Connect with default pool settings and apply migrations.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = create_pool(database_url).await?;
        sqlx::migrate!("../../migrations").run(&pool).await.map_err(|e| {
            dockhand_core::Error::Internal(format!("migration failed: {e}"))
        })?;
        Ok(Self::new(pool))
    }

    /// The underlying pool, for transactions spanning repositories.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
