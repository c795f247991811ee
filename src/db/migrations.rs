//! Database migrations
//!
//! Migrations are embedded in the binary as SQL strings and tracked in a
//! `_migrations` table, so a fresh database file is brought up to date on
//! startup.
//!
//! ```ignore
//! use rodbt::db::{create_pool, migrations};
//!
//! let pool = create_pool(&config).await?;
//! migrations::run_migrations(&pool).await?;
//! ```

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::Row;

use super::DynDatabasePool;

/// A database migration
#[derive(Debug, Clone)]
pub struct Migration {
    /// Migration version number (must be unique and sequential)
    pub version: i32,
    /// Human-readable migration name
    pub name: &'static str,
    /// SQL statements, separated by `;`
    pub up: &'static str,
}

/// Migration record stored in the database
#[derive(Debug, Clone)]
pub struct MigrationRecord {
    pub version: i64,
    pub name: String,
    pub applied_at: DateTime<Utc>,
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_users",
        up: r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username VARCHAR(150) NOT NULL UNIQUE,
                email VARCHAR(254) NOT NULL DEFAULT '',
                password_hash VARCHAR(255) NOT NULL,
                registration_accepted BOOLEAN NOT NULL DEFAULT 0,
                is_moderator BOOLEAN NOT NULL DEFAULT 0,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE INDEX IF NOT EXISTS idx_users_username ON users(username);
        "#,
    },
    Migration {
        version: 2,
        name: "create_sessions",
        up: r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id VARCHAR(64) PRIMARY KEY,
                user_id INTEGER NOT NULL,
                expires_at TIMESTAMP NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_sessions_user_id ON sessions(user_id);
            CREATE INDEX IF NOT EXISTS idx_sessions_expires_at ON sessions(expires_at);
        "#,
    },
    Migration {
        version: 3,
        name: "create_journals",
        up: r#"
            CREATE TABLE IF NOT EXISTS journals (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                author_id INTEGER NOT NULL,
                title VARCHAR(200),
                body TEXT NOT NULL,
                date TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                edited_date TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (author_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_journals_author_date ON journals(author_id, date);
        "#,
    },
    Migration {
        version: 4,
        name: "create_questions",
        up: r#"
            CREATE TABLE IF NOT EXISTS questions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                author_id INTEGER NOT NULL,
                body VARCHAR(200) NOT NULL,
                date TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                edited_date TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (author_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_questions_author_id ON questions(author_id);
        "#,
    },
    Migration {
        version: 5,
        name: "create_question_journals",
        up: r#"
            CREATE TABLE IF NOT EXISTS question_journals (
                question_id INTEGER NOT NULL,
                journal_id INTEGER NOT NULL,
                PRIMARY KEY (question_id, journal_id),
                FOREIGN KEY (question_id) REFERENCES questions(id) ON DELETE CASCADE,
                FOREIGN KEY (journal_id) REFERENCES journals(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_question_journals_journal_id ON question_journals(journal_id);
        "#,
    },
];

/// Run all pending migrations.
///
/// Returns the number of migrations applied.
pub async fn run_migrations(pool: &DynDatabasePool) -> Result<usize> {
    create_migrations_table(pool).await?;

    let applied = get_applied_migrations(pool).await?;
    let applied_versions: Vec<i32> = applied.iter().map(|m| m.version as i32).collect();

    let mut count = 0;

    for migration in MIGRATIONS {
        if !applied_versions.contains(&migration.version) {
            tracing::info!(
                "Applying migration {}: {}",
                migration.version,
                migration.name
            );
            apply_migration(pool, migration)
                .await
                .with_context(|| format!("Failed to apply migration: {}", migration.name))?;
            count += 1;
        }
    }

    if count > 0 {
        tracing::info!("Applied {} migration(s)", count);
    } else {
        tracing::debug!("No pending migrations");
    }

    Ok(count)
}

async fn create_migrations_table(pool: &DynDatabasePool) -> Result<()> {
    pool.execute(
        r#"
        CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            name VARCHAR(255) NOT NULL UNIQUE,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .await?;
    Ok(())
}

async fn get_applied_migrations(pool: &DynDatabasePool) -> Result<Vec<MigrationRecord>> {
    let rows = sqlx::query("SELECT version, name, applied_at FROM _migrations ORDER BY version")
        .fetch_all(pool.pool())
        .await?;

    Ok(rows
        .into_iter()
        .map(|row| MigrationRecord {
            version: row.get("version"),
            name: row.get("name"),
            applied_at: row.get("applied_at"),
        })
        .collect())
}

/// Apply one migration and record it, atomically.
async fn apply_migration(pool: &DynDatabasePool, migration: &Migration) -> Result<()> {
    let mut tx = pool.pool().begin().await?;

    for statement in split_sql_statements(migration.up) {
        sqlx::query(statement)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to execute: {}", truncate_sql(statement)))?;
    }

    sqlx::query("INSERT INTO _migrations (version, name) VALUES (?, ?)")
        .bind(migration.version)
        .bind(migration.name)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

fn truncate_sql(sql: &str) -> String {
    match sql.char_indices().nth(100) {
        Some((idx, _)) => format!("{}...", &sql[..idx]),
        None => sql.to_string(),
    }
}

/// Split SQL into individual statements, skipping comment-only fragments
fn split_sql_statements(sql: &str) -> Vec<&str> {
    sql.split(';')
        .map(str::trim)
        .filter(|stmt| !stmt.is_empty() && !is_comment_only(stmt))
        .collect()
}

fn is_comment_only(s: &str) -> bool {
    s.lines()
        .map(str::trim)
        .all(|line| line.is_empty() || line.starts_with("--"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;

    async fn migrated_pool() -> DynDatabasePool {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        run_migrations(&pool).await.expect("Failed to run migrations");
        pool
    }

    async fn insert_user(pool: &DynDatabasePool, username: &str) -> i64 {
        sqlx::query("INSERT INTO users (username, password_hash) VALUES (?, 'hash')")
            .bind(username)
            .execute(pool.pool())
            .await
            .expect("Failed to insert user")
            .last_insert_rowid()
    }

    async fn row_count(pool: &DynDatabasePool, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(pool.pool())
            .await
            .expect("Failed to count rows")
    }

    #[tokio::test]
    async fn test_run_migrations_is_idempotent() {
        let pool = create_test_pool().await.expect("Failed to create test pool");

        let applied = run_migrations(&pool).await.expect("first run");
        assert_eq!(applied, MIGRATIONS.len());

        let applied = run_migrations(&pool).await.expect("second run");
        assert_eq!(applied, 0);
    }

    #[tokio::test]
    async fn test_user_flags_default_to_false() {
        let pool = migrated_pool().await;
        let id = insert_user(&pool, "alice").await;

        let row = sqlx::query(
            "SELECT email, registration_accepted, is_moderator FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_one(pool.pool())
        .await
        .unwrap();

        assert_eq!(row.get::<String, _>("email"), "");
        assert!(!row.get::<bool, _>("registration_accepted"));
        assert!(!row.get::<bool, _>("is_moderator"));
    }

    #[tokio::test]
    async fn test_username_unique() {
        let pool = migrated_pool().await;
        insert_user(&pool, "alice").await;

        let result = sqlx::query("INSERT INTO users (username, password_hash) VALUES ('alice', 'x')")
            .execute(pool.pool())
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_journal_requires_existing_author() {
        let pool = migrated_pool().await;

        let result = sqlx::query("INSERT INTO journals (author_id, body) VALUES (999, 'text')")
            .execute(pool.pool())
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_deleting_journal_removes_question_links() {
        let pool = migrated_pool().await;
        let user = insert_user(&pool, "alice").await;

        let journal = sqlx::query("INSERT INTO journals (author_id, body) VALUES (?, 'text')")
            .bind(user)
            .execute(pool.pool())
            .await
            .unwrap()
            .last_insert_rowid();
        let question = sqlx::query("INSERT INTO questions (author_id, body) VALUES (?, 'why?')")
            .bind(user)
            .execute(pool.pool())
            .await
            .unwrap()
            .last_insert_rowid();
        sqlx::query("INSERT INTO question_journals (question_id, journal_id) VALUES (?, ?)")
            .bind(question)
            .bind(journal)
            .execute(pool.pool())
            .await
            .unwrap();

        sqlx::query("DELETE FROM journals WHERE id = ?")
            .bind(journal)
            .execute(pool.pool())
            .await
            .unwrap();

        let links: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM question_journals")
            .fetch_one(pool.pool())
            .await
            .unwrap();
        assert_eq!(links, 0);
    }

    #[tokio::test]
    async fn test_deleting_user_removes_their_entries() {
        let pool = migrated_pool().await;
        let alice = insert_user(&pool, "alice").await;
        let bob = insert_user(&pool, "bob").await;

        for author in [alice, bob] {
            let journal = sqlx::query("INSERT INTO journals (author_id, body) VALUES (?, 'text')")
                .bind(author)
                .execute(pool.pool())
                .await
                .unwrap()
                .last_insert_rowid();
            let question = sqlx::query("INSERT INTO questions (author_id, body) VALUES (?, 'why?')")
                .bind(author)
                .execute(pool.pool())
                .await
                .unwrap()
                .last_insert_rowid();
            sqlx::query("INSERT INTO question_journals (question_id, journal_id) VALUES (?, ?)")
                .bind(question)
                .bind(journal)
                .execute(pool.pool())
                .await
                .unwrap();
        }

        sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(alice)
            .execute(pool.pool())
            .await
            .unwrap();

        assert_eq!(row_count(&pool, "journals").await, 1);
        assert_eq!(row_count(&pool, "questions").await, 1);
        assert_eq!(row_count(&pool, "question_journals").await, 1);

        let orphaned: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM journals WHERE author_id = ?",
        )
        .bind(alice)
        .fetch_one(pool.pool())
        .await
        .unwrap();
        assert_eq!(orphaned, 0);
    }

    #[test]
    fn test_split_sql_statements() {
        let sql = "CREATE TABLE a (id INT); CREATE TABLE b (id INT);";
        assert_eq!(split_sql_statements(sql).len(), 2);

        let sql_with_comments = "-- Comment\nCREATE TABLE a (id INT);\n-- trailing";
        assert_eq!(split_sql_statements(sql_with_comments).len(), 1);
    }

    #[test]
    fn test_is_comment_only() {
        assert!(is_comment_only("-- This is a comment"));
        assert!(is_comment_only("-- Line 1\n-- Line 2"));
        assert!(!is_comment_only("CREATE TABLE test"));
        assert!(!is_comment_only("-- Comment\nCREATE TABLE test"));
    }

    #[test]
    fn test_truncate_sql() {
        assert_eq!(truncate_sql("SELECT 1"), "SELECT 1");
        let long = "x".repeat(150);
        assert_eq!(truncate_sql(&long).len(), 103);
    }

    #[test]
    fn test_migration_versions_sequential() {
        for (i, migration) in MIGRATIONS.iter().enumerate() {
            assert_eq!(migration.version as usize, i + 1);
        }
    }
}
