//! Database configuration module for the VIP points service.
//!
//! This module handles the `SQLite` connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with `Schema::create_table_from_entity`.
//! The composite unique index on the points ledger is created here as well, since it is
//! the storage-level guarantee that a `(user_id, source, ref_id)` triple is only ever
//! rewarded once.

use crate::entities::{CheckIn, Membership, Order, PointRule, PointsLedger, points_ledger};
use crate::errors::Result;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Schema, sea_query::Index};
use std::path::Path;
use tracing::info;

/// Default database location used when `DATABASE_URL` is not set
pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/vip_points.sqlite?mode=rwc";

/// Name of the unique index backing award idempotency
pub const LEDGER_IDEMPOTENCY_INDEX: &str = "idx_points_ledger_user_source_ref";

/// Gets the database URL from the environment or returns the default `SQLite` path.
#[must_use]
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

/// Establishes a connection to the database at `database_url`.
///
/// For file-backed `SQLite` URLs the parent directory is created first, since `SQLite`
/// creates the file but not the directories leading to it.
pub async fn create_connection(database_url: &str) -> Result<DatabaseConnection> {
    if let Some(dir) = sqlite_parent_dir(database_url) {
        std::fs::create_dir_all(dir)?;
    }
    Database::connect(database_url).await.map_err(Into::into)
}

/// Directory holding the database file of a `sqlite://` URL, if it has one
fn sqlite_parent_dir(database_url: &str) -> Option<&Path> {
    let path = database_url.strip_prefix("sqlite://")?;
    let path = path.split('?').next()?;
    if path.is_empty() || path.contains(":memory:") {
        return None;
    }
    Path::new(path)
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
}

/// Creates all tables and the ledger idempotency index if they do not exist yet.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let mut membership_table = schema.create_table_from_entity(Membership);
    let mut ledger_table = schema.create_table_from_entity(PointsLedger);
    let mut rule_table = schema.create_table_from_entity(PointRule);
    let mut order_table = schema.create_table_from_entity(Order);
    let mut checkin_table = schema.create_table_from_entity(CheckIn);

    for table in [
        &mut membership_table,
        &mut ledger_table,
        &mut rule_table,
        &mut order_table,
        &mut checkin_table,
    ] {
        table.if_not_exists();
        db.execute(builder.build(&*table)).await?;
    }

    let idempotency_index = Index::create()
        .name(LEDGER_IDEMPOTENCY_INDEX)
        .table(PointsLedger)
        .col(points_ledger::Column::UserId)
        .col(points_ledger::Column::Source)
        .col(points_ledger::Column::RefId)
        .unique()
        .if_not_exists()
        .to_owned();
    db.execute(builder.build(&idempotency_index)).await?;

    info!("Database tables and ledger idempotency index ensured");
    Ok(())
}
