//! Manual adjustments issued by staff.
//!
//! Adjustments are `manual_adjust` ledger entries keyed by a staff-supplied reference,
//! so a retried command cannot apply twice. References are stored under an `adj:`
//! prefix; reversals use bare order and check-in ids under the same source. Credits count toward lifetime points and
//! need an active membership; debits only need the membership to exist and floor the
//! balance at zero.

use crate::{
    config::loyalty::TierThresholds,
    core::{
        ledger::{self, ChangeOutcome, LedgerChange, LifetimeEffect},
        membership,
    },
    entities::{PointSource, Tier},
    errors::{Error, Result},
};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use serde_json::json;
use tracing::{info, instrument};

/// Outcome of [`adjust_points`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdjustmentResult {
    /// Signed delta recorded by this call (zero when the reference was already used)
    pub delta_points: i64,
    /// Membership balance after the call
    pub new_balance: i64,
    /// Membership tier after the call
    pub new_tier: Tier,
    /// True when the reference had already been applied
    pub already_applied: bool,
}

/// Ledger `ref_id` a staff reference is stored under.
#[must_use]
pub fn adjustment_ref(ref_id: &str) -> String {
    format!("adj:{}", ref_id.trim())
}

/// Applies a signed staff adjustment under `ref_id`.
#[instrument(skip(db, thresholds))]
pub async fn adjust_points(
    db: &DatabaseConnection,
    thresholds: &TierThresholds,
    user_id: &str,
    ref_id: &str,
    delta_points: i64,
    reason: &str,
    actor: &str,
) -> Result<AdjustmentResult> {
    if delta_points == 0 {
        return Err(Error::InvalidAmount {
            amount: delta_points,
        });
    }
    if ref_id.trim().is_empty() {
        return Err(Error::Validation {
            message: "Adjustment reference cannot be empty".to_string(),
        });
    }

    let ref_id = adjustment_ref(ref_id);
    if ledger::find_entry(db, user_id, PointSource::ManualAdjust, &ref_id)
        .await?
        .is_some()
    {
        return already_applied(db, user_id).await;
    }

    let lifetime = if delta_points > 0 {
        membership::require_active_membership(db, user_id).await?;
        LifetimeEffect::Accrue(thresholds)
    } else {
        membership::get_membership(db, user_id)
            .await?
            .ok_or_else(|| Error::NoMembership {
                user_id: user_id.to_string(),
            })?;
        LifetimeEffect::Keep
    };

    let outcome = ledger::record_change(
        db,
        LedgerChange {
            user_id,
            source: PointSource::ManualAdjust,
            ref_id: &ref_id,
            delta_points,
            lifetime,
            metadata: json!({ "reason": reason, "actor": actor }),
        },
    )
    .await?;

    match outcome {
        ChangeOutcome::Applied { membership, .. } => {
            info!(
                delta_points,
                balance = membership.points_balance,
                "Manual adjustment applied"
            );
            Ok(AdjustmentResult {
                delta_points,
                new_balance: membership.points_balance,
                new_tier: membership.tier,
                already_applied: false,
            })
        }
        ChangeOutcome::Duplicate => already_applied(db, user_id).await,
    }
}

async fn already_applied(db: &DatabaseConnection, user_id: &str) -> Result<AdjustmentResult> {
    let current = membership::get_membership(db, user_id)
        .await?
        .ok_or_else(|| Error::NoMembership {
            user_id: user_id.to_string(),
        })?;
    Ok(AdjustmentResult {
        delta_points: 0,
        new_balance: current.points_balance,
        new_tier: current.tier,
        already_applied: true,
    })
}
