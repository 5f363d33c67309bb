//! Points ledger business logic - lookups, history, audit and the shared write path.
//!
//! [`record_change`] is the one place that appends to the ledger. It wraps the
//! membership balance update and the ledger insert in a single database transaction,
//! and turns a violation of the `(user_id, source, ref_id)` unique index into
//! [`ChangeOutcome::Duplicate`] instead of an error.

use crate::{
    config::loyalty::TierThresholds,
    core::membership,
    entities::{PointSource, PointsLedger, membership as membership_entity, points_ledger},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{QueryOrder, QuerySelect, Set, SqlErr, TransactionTrait, prelude::*};
use serde::Serialize;
use tracing::{debug, warn};

/// Finds the entry for an idempotency key, if one was written.
pub async fn find_entry<C>(
    db: &C,
    user_id: &str,
    source: PointSource,
    ref_id: &str,
) -> Result<Option<points_ledger::Model>>
where
    C: ConnectionTrait,
{
    PointsLedger::find()
        .filter(points_ledger::Column::UserId.eq(user_id))
        .filter(points_ledger::Column::Source.eq(source))
        .filter(points_ledger::Column::RefId.eq(ref_id))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Retrieves a member's ledger entries, newest first, optionally capped at `limit`.
pub async fn get_entries_for_user(
    db: &DatabaseConnection,
    user_id: &str,
    limit: Option<u64>,
) -> Result<Vec<points_ledger::Model>> {
    let mut query = PointsLedger::find()
        .filter(points_ledger::Column::UserId.eq(user_id))
        .order_by_desc(points_ledger::Column::Id);
    if let Some(limit) = limit {
        query = query.limit(limit);
    }
    query.all(db).await.map_err(Into::into)
}

/// How a member's stored balance compares with a replay of their ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerAudit {
    /// Member audited
    pub user_id: String,
    /// `points_balance` as stored on the membership
    pub stored_balance: i64,
    /// Balance obtained by replaying every delta from zero, flooring at zero
    pub replayed_balance: i64,
    /// Number of entries replayed
    pub entry_count: usize,
    /// First entry whose `balance_after` disagrees with the replay
    pub first_snapshot_mismatch: Option<i64>,
}

impl LedgerAudit {
    /// True when the stored balance and every snapshot agree with the replay
    #[must_use]
    pub const fn is_consistent(&self) -> bool {
        self.stored_balance == self.replayed_balance && self.first_snapshot_mismatch.is_none()
    }
}

/// Replays a member's ledger in write order and compares it with the membership row.
pub async fn audit_membership(db: &DatabaseConnection, user_id: &str) -> Result<LedgerAudit> {
    let membership = membership::get_membership(db, user_id)
        .await?
        .ok_or_else(|| Error::NoMembership {
            user_id: user_id.to_string(),
        })?;

    let entries = PointsLedger::find()
        .filter(points_ledger::Column::UserId.eq(user_id))
        .order_by_asc(points_ledger::Column::Id)
        .all(db)
        .await?;

    let mut replayed_balance = 0i64;
    let mut first_snapshot_mismatch = None;
    for entry in &entries {
        replayed_balance = (replayed_balance + entry.delta_points).max(0);
        if first_snapshot_mismatch.is_none() && entry.balance_after != replayed_balance {
            first_snapshot_mismatch = Some(entry.id);
        }
    }

    let audit = LedgerAudit {
        user_id: user_id.to_string(),
        stored_balance: membership.points_balance,
        replayed_balance,
        entry_count: entries.len(),
        first_snapshot_mismatch,
    };
    if !audit.is_consistent() {
        warn!(
            user_id,
            stored = audit.stored_balance,
            replayed = audit.replayed_balance,
            "Ledger drift detected"
        );
    }
    Ok(audit)
}

/// Whether a change also counts toward lifetime points (and therefore tier)
#[derive(Debug, Clone, Copy)]
pub(crate) enum LifetimeEffect<'a> {
    /// Add the delta to `lifetime_points` and re-derive the tier
    Accrue(&'a TierThresholds),
    /// Leave `lifetime_points` and tier alone
    Keep,
}

/// One balance change to apply together with its ledger entry
#[derive(Debug, Clone)]
pub(crate) struct LedgerChange<'a> {
    pub user_id: &'a str,
    pub source: PointSource,
    pub ref_id: &'a str,
    pub delta_points: i64,
    pub lifetime: LifetimeEffect<'a>,
    pub metadata: Json,
}

/// Result of [`record_change`]
#[derive(Debug, Clone)]
pub(crate) enum ChangeOutcome {
    /// Both writes committed
    Applied {
        membership: membership_entity::Model,
        entry: points_ledger::Model,
    },
    /// Another writer already recorded this idempotency key; nothing was changed
    Duplicate,
}

/// Applies the balance change and appends its ledger entry atomically.
///
/// The membership row is updated first so the entry can carry the resulting
/// `balance_after`. If the insert then hits the idempotency index, the whole
/// transaction is rolled back.
pub(crate) async fn record_change(
    db: &DatabaseConnection,
    change: LedgerChange<'_>,
) -> Result<ChangeOutcome> {
    let txn = db.begin().await?;

    let (lifetime_delta, thresholds) = match change.lifetime {
        LifetimeEffect::Accrue(thresholds) => (change.delta_points, Some(thresholds)),
        LifetimeEffect::Keep => (0, None),
    };

    let updated = membership::apply_points_delta(
        &txn,
        change.user_id,
        change.delta_points,
        lifetime_delta,
        thresholds,
    )
    .await?;

    let entry = points_ledger::ActiveModel {
        user_id: Set(change.user_id.to_string()),
        source: Set(change.source),
        ref_id: Set(change.ref_id.to_string()),
        delta_points: Set(change.delta_points),
        balance_after: Set(updated.points_balance),
        metadata: Set(change.metadata),
        created_at: Set(Utc::now()),
        ..Default::default()
    };

    match entry.insert(&txn).await {
        Ok(entry) => {
            txn.commit().await?;
            Ok(ChangeOutcome::Applied {
                membership: updated,
                entry,
            })
        }
        Err(err) if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
            txn.rollback().await?;
            debug!(
                user_id = change.user_id,
                source = %change.source,
                ref_id = change.ref_id,
                "Ledger entry already exists, rolled back"
            );
            Ok(ChangeOutcome::Duplicate)
        }
        Err(err) => Err(err.into()),
    }
}
