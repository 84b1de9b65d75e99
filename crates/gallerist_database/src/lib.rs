//! PostgreSQL persistence for Gallerist.
//!
//! This crate provides the [`MediaRepository`] trait, its Diesel/PostgreSQL
//! implementation, the embedded schema migrations, and an in-memory
//! implementation with the same semantics.
//!
//! # Features
//!
//! - Diesel-based PostgreSQL integration over an r2d2 pool
//! - Atomic, idempotent group attachment with per-group position ordering
//! - All-or-nothing batch inserts
//! - Cancellation checked before connection checkout and before commit
//!
//! # Example
//!
//! ```rust,ignore
//! use gallerist_database::{establish_pool_from_env, run_migrations, PostgresMediaRepository};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = establish_pool_from_env(8)?;
//! run_migrations(&pool)?;
//! let repo = PostgresMediaRepository::new(pool);
//! # Ok(())
//! # }
//! ```

mod connection;
mod memory;
mod models;
mod postgres;
mod repository;

// Public modules for external access
pub mod schema;

pub use connection::{MIGRATIONS, PgPool, establish_pool, establish_pool_from_env, run_migrations};
pub use memory::InMemoryMediaRepository;
pub use models::{
    MediaGroupItemRow, MediaGroupRow, MediaRow, NewMediaGroupItemRow, NewMediaGroupRow,
    UpdateMediaRow,
};
pub use postgres::PostgresMediaRepository;
pub use repository::MediaRepository;

use gallerist_error::DatabaseError;

/// Result type for database operations.
pub type DatabaseResult<T> = Result<T, DatabaseError>;
