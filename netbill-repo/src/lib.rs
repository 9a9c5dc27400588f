//! # NetBill Repository
//!
//! Concrete persistence adapter for the billing payment core. Implements
//! the `PaymentRepository` and `WebhookStore` ports on SQLite via sqlx;
//! further backends stay additive behind the same ports.

pub mod security;
pub mod sqlite;

mod types;

#[cfg(test)]
mod sqlite_tests;

pub use sqlite::SqliteRepo;

/// Build and initialize a repository from a database URL.
///
/// Connects, runs the embedded migrations, and returns a ready-to-use repo.
///
/// # Examples
///
/// ```ignore
/// let repo = build_repo("sqlite://netbill.db?mode=rwc").await?;
/// ```
pub async fn build_repo(database_url: &str) -> anyhow::Result<SqliteRepo> {
    SqliteRepo::new(database_url).await
}
