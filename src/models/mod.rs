//! Data models
//!
//! Data structures shared across the RO-DBT journal application:
//! - Database entities (User, Session, Journal, Question)
//! - Input types consumed by the service layer

mod journal;
mod question;
mod session;
mod user;

pub use journal::{CreateJournalInput, Journal, JOURNAL_TITLE_MAX_LENGTH};
pub use question::{CreateQuestionInput, Question, QUESTION_BODY_MAX_LENGTH};
pub use session::Session;
pub use user::{ProfileInput, User, USERNAME_MAX_LENGTH};
