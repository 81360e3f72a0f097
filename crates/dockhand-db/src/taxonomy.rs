//! Tags and correspondents: the taxonomy the AI analyzer links against.
//!
//! The `_in_tx` variants exist for the auto-apply path, which must create
//! the suggestion row and the association in one transaction.

use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use dockhand_core::{Correspondent, Result, Tag};

/// PostgreSQL taxonomy repository.
#[derive(Clone)]
pub struct PgTaxonomyRepository {
    pool: PgPool,
}

impl PgTaxonomyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn parse_tag(row: PgRow) -> Tag {
        Tag {
            id: row.get("id"),
            name: row.get("name"),
            created_at: row.get("created_at"),
        }
    }

    fn parse_correspondent(row: PgRow) -> Correspondent {
        Correspondent {
            id: row.get("id"),
            name: row.get("name"),
            created_at: row.get("created_at"),
        }
    }

    /// All tag names, for provider context.
    pub async fn list_tag_names(&self) -> Result<Vec<String>> {
        let names: Vec<String> = sqlx::query_scalar("SELECT name FROM tags ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(names)
    }

    /// All correspondent names, for provider context.
    pub async fn list_correspondent_names(&self) -> Result<Vec<String>> {
        let names: Vec<String> =
            sqlx::query_scalar("SELECT name FROM correspondents ORDER BY name")
                .fetch_all(&self.pool)
                .await?;
        Ok(names)
    }

    /// Exact-name tag lookup inside a transaction.
    pub async fn find_tag_in_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        name: &str,
    ) -> Result<Option<Tag>> {
        let row = sqlx::query("SELECT id, name, created_at FROM tags WHERE name = $1")
            .bind(name)
            .fetch_optional(&mut **tx)
            .await?;
        Ok(row.map(Self::parse_tag))
    }

    pub async fn create_tag_in_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        name: &str,
    ) -> Result<Tag> {
        let row = sqlx::query(
            "INSERT INTO tags (id, name) VALUES ($1, $2) RETURNING id, name, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .fetch_one(&mut **tx)
        .await?;
        Ok(Self::parse_tag(row))
    }

    /// Associate a tag with a document (many-to-many, idempotent).
    pub async fn link_tag_in_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        document_id: Uuid,
        tag_id: Uuid,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO document_tags (document_id, tag_id)
             VALUES ($1, $2)
             ON CONFLICT DO NOTHING",
        )
        .bind(document_id)
        .bind(tag_id)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    pub async fn find_correspondent_in_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        name: &str,
    ) -> Result<Option<Correspondent>> {
        let row = sqlx::query("SELECT id, name, created_at FROM correspondents WHERE name = $1")
            .bind(name)
            .fetch_optional(&mut **tx)
            .await?;
        Ok(row.map(Self::parse_correspondent))
    }

    pub async fn create_correspondent_in_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        name: &str,
    ) -> Result<Correspondent> {
        let row = sqlx::query(
            "INSERT INTO correspondents (id, name) VALUES ($1, $2) RETURNING id, name, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .fetch_one(&mut **tx)
        .await?;
        Ok(Self::parse_correspondent(row))
    }

    /// Set the document's correspondent (0..1 relationship).
    pub async fn set_document_correspondent_in_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        document_id: Uuid,
        correspondent_id: Uuid,
    ) -> Result<()> {
        sqlx::query("UPDATE documents SET correspondent_id = $1 WHERE id = $2")
            .bind(correspondent_id)
            .bind(document_id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// Tag ids associated with a document.
    pub async fn document_tag_ids(&self, document_id: Uuid) -> Result<Vec<Uuid>> {
        let ids: Vec<Uuid> =
            sqlx::query_scalar("SELECT tag_id FROM document_tags WHERE document_id = $1")
                .bind(document_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(ids)
    }
}
