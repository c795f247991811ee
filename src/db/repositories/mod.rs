//! Database repositories
//!
//! Repository pattern implementations for database access.
//! Each repository handles the queries for one entity.

pub mod journal;
pub mod question;
pub mod session;
pub mod user;

pub use journal::{JournalRepository, SqlxJournalRepository};
pub use question::{QuestionRepository, SqlxQuestionRepository};
pub use session::{SessionRepository, SqlxSessionRepository};
pub use user::{SqlxUserRepository, UserRepository};
