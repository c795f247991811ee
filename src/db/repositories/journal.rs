//! Journal repository
//!
//! Every listing is scoped to an owner: there is no query that returns
//! journals across users.

use crate::db::DynDatabasePool;
use crate::models::Journal;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::sync::Arc;

/// Journal repository trait
#[async_trait]
pub trait JournalRepository: Send + Sync {
    /// Insert a journal, returning it with its assigned id
    async fn create(&self, journal: &Journal) -> Result<Journal>;

    /// Get journal by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Journal>>;

    /// Journals owned by `author_id`, newest first
    async fn list_by_author(&self, author_id: i64) -> Result<Vec<Journal>>;

    /// Journals linked to a question, newest first
    async fn list_for_question(&self, question_id: i64) -> Result<Vec<Journal>>;

    /// Of `ids`, the ones that exist and belong to `author_id`
    async fn owned_ids(&self, author_id: i64, ids: &[i64]) -> Result<Vec<i64>>;
}

/// SQLx-based journal repository implementation
pub struct SqlxJournalRepository {
    pool: DynDatabasePool,
}

impl SqlxJournalRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn JournalRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl JournalRepository for SqlxJournalRepository {
    async fn create(&self, journal: &Journal) -> Result<Journal> {
        let result = sqlx::query(
            r#"
            INSERT INTO journals (author_id, title, body, date, edited_date)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(journal.author_id)
        .bind(&journal.title)
        .bind(&journal.body)
        .bind(journal.date)
        .bind(journal.edited_date)
        .execute(self.pool.pool())
        .await
        .context("Failed to create journal")?;

        Ok(Journal {
            id: result.last_insert_rowid(),
            ..journal.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Journal>> {
        let row = sqlx::query(
            r#"
            SELECT id, author_id, title, body, date, edited_date
            FROM journals
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool.pool())
        .await
        .context("Failed to get journal by ID")?;

        row.as_ref().map(row_to_journal).transpose()
    }

    async fn list_by_author(&self, author_id: i64) -> Result<Vec<Journal>> {
        let rows = sqlx::query(
            r#"
            SELECT id, author_id, title, body, date, edited_date
            FROM journals
            WHERE author_id = ?
            ORDER BY date DESC, id DESC
            "#,
        )
        .bind(author_id)
        .fetch_all(self.pool.pool())
        .await
        .context("Failed to list journals")?;

        rows.iter().map(row_to_journal).collect()
    }

    async fn list_for_question(&self, question_id: i64) -> Result<Vec<Journal>> {
        let rows = sqlx::query(
            r#"
            SELECT j.id, j.author_id, j.title, j.body, j.date, j.edited_date
            FROM journals j
            INNER JOIN question_journals qj ON qj.journal_id = j.id
            WHERE qj.question_id = ?
            ORDER BY j.date DESC, j.id DESC
            "#,
        )
        .bind(question_id)
        .fetch_all(self.pool.pool())
        .await
        .context("Failed to list journals for question")?;

        rows.iter().map(row_to_journal).collect()
    }

    async fn owned_ids(&self, author_id: i64, ids: &[i64]) -> Result<Vec<i64>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "SELECT id FROM journals WHERE author_id = ? AND id IN ({placeholders}) ORDER BY id"
        );

        let mut query = sqlx::query_scalar::<_, i64>(&sql).bind(author_id);
        for id in ids {
            query = query.bind(*id);
        }

        query
            .fetch_all(self.pool.pool())
            .await
            .context("Failed to check journal ownership")
    }
}

fn row_to_journal(row: &SqliteRow) -> Result<Journal> {
    Ok(Journal {
        id: row.try_get("id")?,
        author_id: row.try_get("author_id")?,
        title: row.try_get("title")?,
        body: row.try_get("body")?,
        date: row.try_get("date")?,
        edited_date: row.try_get("edited_date")?,
    })
}
