//! Shared test utilities for the VIP points service.
//!
//! This module provides common helpers for setting up test databases and
//! creating members, rules and orders with sensible defaults.

use crate::{
    config::{
        loyalty::{LoyaltyConfig, TierThresholds},
        settings::AppContext,
    },
    core::{membership, pos},
    entities,
    errors::Result,
};
use sea_orm::DatabaseConnection;

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Creates a file-backed `SQLite` database in a fresh temp dir.
///
/// Unlike `sqlite::memory:`, the pool holds several connections, so concurrent calls
/// really interleave. Keep the returned dir alive for the duration of the test.
pub async fn setup_file_db() -> Result<(tempfile::TempDir, DatabaseConnection)> {
    let dir = tempfile::tempdir()?;
    let url = format!(
        "sqlite://{}?mode=rwc",
        dir.path().join("vip_points.sqlite").display()
    );
    let db = sea_orm::Database::connect(url).await?;
    crate::config::database::create_tables(&db).await?;
    Ok((dir, db))
}

/// Default tier thresholds (gold 500, black 2000)
#[must_use]
pub fn thresholds() -> TierThresholds {
    TierThresholds::default()
}

/// Default loyalty configuration (flat check-in 10 points, `vip` role eligible)
#[must_use]
pub fn loyalty_config() -> LoyaltyConfig {
    LoyaltyConfig::default()
}

/// Enrolls an active silver member with an empty balance.
pub async fn create_test_member(
    db: &DatabaseConnection,
    user_id: &str,
) -> Result<entities::membership::Model> {
    membership::enroll_member(db, user_id).await
}

/// Creates an open USD order for `customer`.
pub async fn create_test_order(
    db: &DatabaseConnection,
    total_minor: i64,
    customer: Option<&str>,
) -> Result<entities::order::Model> {
    pos::create_order(db, total_minor, "USD", customer).await
}

/// Sets up a database with one active member, `"test_user"`.
/// Returns (db, member) for common test scenarios.
pub async fn setup_with_member() -> Result<(DatabaseConnection, entities::membership::Model)> {
    let db = setup_test_db().await?;
    let member = create_test_member(&db, "test_user").await?;
    Ok((db, member))
}

/// Builds an application context over a fresh database with default configuration.
pub async fn setup_app_context() -> Result<AppContext> {
    let db = setup_test_db().await?;
    Ok(AppContext::new(db, loyalty_config()))
}
