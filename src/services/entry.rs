//! Entry service
//!
//! Journal and question business logic. Every listing takes the owner as a
//! required argument and every create takes the author from the caller's
//! identity, never from form input.

use crate::db::repositories::{JournalRepository, QuestionRepository};
use crate::models::{
    CreateJournalInput, CreateQuestionInput, Journal, Question, JOURNAL_TITLE_MAX_LENGTH,
    QUESTION_BODY_MAX_LENGTH,
};
use anyhow::Context;
use std::sync::Arc;

/// Error types for entry service operations
#[derive(Debug, thiserror::Error)]
pub enum EntryServiceError {
    /// Entry not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Validation error, keyed by form field
    #[error("Validation error on {field}: {message}")]
    ValidationError { field: &'static str, message: String },

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl EntryServiceError {
    fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::ValidationError {
            field,
            message: message.into(),
        }
    }
}

/// Journal and question operations
pub struct EntryService {
    journals: Arc<dyn JournalRepository>,
    questions: Arc<dyn QuestionRepository>,
}

impl EntryService {
    pub fn new(
        journals: Arc<dyn JournalRepository>,
        questions: Arc<dyn QuestionRepository>,
    ) -> Self {
        Self {
            journals,
            questions,
        }
    }

    /// The owner's journals, newest first
    pub async fn list_journals(&self, owner_id: i64) -> Result<Vec<Journal>, EntryServiceError> {
        Ok(self
            .journals
            .list_by_author(owner_id)
            .await
            .context("Failed to list journals")?)
    }

    /// The owner's questions, in creation order
    pub async fn list_questions(&self, owner_id: i64) -> Result<Vec<Question>, EntryServiceError> {
        Ok(self
            .questions
            .list_by_author(owner_id)
            .await
            .context("Failed to list questions")?)
    }

    /// Create a journal authored by `owner_id`.
    ///
    /// A blank title is stored as no title.
    pub async fn create_journal(
        &self,
        owner_id: i64,
        input: CreateJournalInput,
    ) -> Result<Journal, EntryServiceError> {
        let title = input
            .title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());

        if let Some(title) = &title {
            if title.chars().count() > JOURNAL_TITLE_MAX_LENGTH {
                return Err(EntryServiceError::invalid(
                    "title",
                    format!(
                        "Ensure this value has at most {} characters.",
                        JOURNAL_TITLE_MAX_LENGTH
                    ),
                ));
            }
        }

        if input.body.trim().is_empty() {
            return Err(EntryServiceError::invalid("body", "This field is required."));
        }

        let journal = self
            .journals
            .create(&Journal::new(owner_id, title, input.body))
            .await
            .context("Failed to create journal")?;

        tracing::debug!(journal_id = journal.id, owner_id, "Journal created");
        Ok(journal)
    }

    /// Create a question authored by `owner_id`.
    ///
    /// Every linked journal must exist and belong to the owner.
    pub async fn create_question(
        &self,
        owner_id: i64,
        input: CreateQuestionInput,
    ) -> Result<Question, EntryServiceError> {
        let body = input.body.trim().to_string();

        if body.is_empty() {
            return Err(EntryServiceError::invalid("body", "This field is required."));
        }
        if body.chars().count() > QUESTION_BODY_MAX_LENGTH {
            return Err(EntryServiceError::invalid(
                "body",
                format!(
                    "Ensure this value has at most {} characters.",
                    QUESTION_BODY_MAX_LENGTH
                ),
            ));
        }

        let mut requested = input.journal_ids;
        requested.sort_unstable();
        requested.dedup();

        let owned = self
            .journals
            .owned_ids(owner_id, &requested)
            .await
            .context("Failed to check journal ownership")?;

        if let Some(bad) = requested.iter().find(|id| !owned.contains(*id)) {
            return Err(EntryServiceError::invalid(
                "journal",
                format!(
                    "Select a valid choice. {} is not one of the available choices.",
                    bad
                ),
            ));
        }

        let question = self
            .questions
            .create(&Question::new(owner_id, body, requested))
            .await
            .context("Failed to create question")?;

        tracing::debug!(question_id = question.id, owner_id, "Question created");
        Ok(question)
    }

    /// Get a journal by id
    pub async fn get_journal(&self, id: i64) -> Result<Journal, EntryServiceError> {
        self.journals
            .get_by_id(id)
            .await
            .context("Failed to get journal")?
            .ok_or_else(|| EntryServiceError::NotFound(format!("Journal {}", id)))
    }

    /// Get a question by id, with its linked journal ids
    pub async fn get_question(&self, id: i64) -> Result<Question, EntryServiceError> {
        self.questions
            .get_by_id(id)
            .await
            .context("Failed to get question")?
            .ok_or_else(|| EntryServiceError::NotFound(format!("Question {}", id)))
    }

    /// Journals linked to a question, newest first
    pub async fn list_journals_for_question(
        &self,
        question_id: i64,
    ) -> Result<Vec<Journal>, EntryServiceError> {
        Ok(self
            .journals
            .list_for_question(question_id)
            .await
            .context("Failed to list linked journals")?)
    }
}
