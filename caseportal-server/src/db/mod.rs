//! Database layer - connection pool, migrations and repositories
//!
//! # Design Principles
//!
//! - Connection pool with a small connection cap
//! - List operations resolve display names with JOINs (no per-row lookups)
//! - Rely on DB constraints, handle conflicts - no check-then-insert
//! - Transactions for read-modify-write updates

pub mod migrations;
pub mod pool;
pub mod repos;

pub use pool::{create_pool, create_pool_with_options};
pub use repos::*;
pub use sqlx::PgPool;
