//! Question repository
//!
//! A question row and its journal links are written in one transaction.

use crate::db::DynDatabasePool;
use crate::models::Question;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::sync::Arc;

/// Question repository trait
#[async_trait]
pub trait QuestionRepository: Send + Sync {
    /// Insert a question together with its journal links
    async fn create(&self, question: &Question) -> Result<Question>;

    /// Get question by ID, with linked journal ids
    async fn get_by_id(&self, id: i64) -> Result<Option<Question>>;

    /// Questions owned by `author_id`, in creation order
    async fn list_by_author(&self, author_id: i64) -> Result<Vec<Question>>;
}

/// SQLx-based question repository implementation
pub struct SqlxQuestionRepository {
    pool: DynDatabasePool,
}

impl SqlxQuestionRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn QuestionRepository> {
        Arc::new(Self::new(pool))
    }

    async fn journal_ids(&self, question_id: i64) -> Result<Vec<i64>> {
        sqlx::query_scalar(
            "SELECT journal_id FROM question_journals WHERE question_id = ? ORDER BY journal_id",
        )
        .bind(question_id)
        .fetch_all(self.pool.pool())
        .await
        .context("Failed to load question journal links")
    }
}

#[async_trait]
impl QuestionRepository for SqlxQuestionRepository {
    async fn create(&self, question: &Question) -> Result<Question> {
        let mut tx = self
            .pool
            .pool()
            .begin()
            .await
            .context("Failed to begin transaction")?;

        let result = sqlx::query(
            r#"
            INSERT INTO questions (author_id, body, date, edited_date)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(question.author_id)
        .bind(&question.body)
        .bind(question.date)
        .bind(question.edited_date)
        .execute(&mut *tx)
        .await
        .context("Failed to create question")?;

        let id = result.last_insert_rowid();

        let mut journal_ids = question.journal_ids.clone();
        journal_ids.sort_unstable();
        journal_ids.dedup();

        for journal_id in &journal_ids {
            sqlx::query("INSERT INTO question_journals (question_id, journal_id) VALUES (?, ?)")
                .bind(id)
                .bind(*journal_id)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("Failed to link journal {}", journal_id))?;
        }

        tx.commit().await.context("Failed to commit question")?;

        Ok(Question {
            id,
            journal_ids,
            ..question.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Question>> {
        let row = sqlx::query(
            r#"
            SELECT id, author_id, body, date, edited_date
            FROM questions
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool.pool())
        .await
        .context("Failed to get question by ID")?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut question = row_to_question(&row)?;
        question.journal_ids = self.journal_ids(question.id).await?;
        Ok(Some(question))
    }

    async fn list_by_author(&self, author_id: i64) -> Result<Vec<Question>> {
        let rows = sqlx::query(
            r#"
            SELECT id, author_id, body, date, edited_date
            FROM questions
            WHERE author_id = ?
            ORDER BY id
            "#,
        )
        .bind(author_id)
        .fetch_all(self.pool.pool())
        .await
        .context("Failed to list questions")?;

        let mut questions = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut question = row_to_question(row)?;
            question.journal_ids = self.journal_ids(question.id).await?;
            questions.push(question);
        }
        Ok(questions)
    }
}

fn row_to_question(row: &SqliteRow) -> Result<Question> {
    Ok(Question {
        id: row.try_get("id")?,
        author_id: row.try_get("author_id")?,
        body: row.try_get("body")?,
        date: row.try_get("date")?,
        edited_date: row.try_get("edited_date")?,
        journal_ids: Vec::new(),
    })
}
