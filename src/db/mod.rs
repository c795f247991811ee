//! Database layer
//!
//! SQLite storage for accounts, sessions, journals and questions.
//!
//! # Usage
//!
//! ```ignore
//! use rodbt::config::DatabaseConfig;
//! use rodbt::db::{create_pool, migrations};
//!
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! migrations::run_migrations(&pool).await?;
//! pool.ping().await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{create_pool, create_test_pool, Database, DynDatabasePool};
