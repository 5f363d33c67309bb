//! Reversal path - undoes an earlier award when an order is refunded or cancelled.
//!
//! A reversal is itself a ledger entry: `manual_adjust`, negated delta, same `ref_id`
//! as the award it undoes. The unique index therefore also makes reversals idempotent.
//! `lifetime_points` and tier are left untouched.

use crate::{
    core::{
        ledger::{self, ChangeOutcome, LedgerChange, LifetimeEffect},
        membership,
    },
    entities::{PointSource, points_ledger},
    errors::{Error, Result},
};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{info, instrument, warn};

/// Outcome of [`reverse_points`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReversalResult {
    /// Points taken back by this call (the original delta, zero for no-ops)
    pub points_reversed: i64,
    /// Membership balance after the call (zero when the user has no membership)
    pub new_balance: i64,
    /// True when this reference had already been reversed
    pub already_reversed: bool,
}

/// Reverses the award recorded for `(user_id, source, ref_id)`.
///
/// Missing awards and repeated reversals are successful no-ops. The balance is floored at
/// zero; the recorded delta is always the full negated original.
///
/// # Errors
/// `Validation` when asked to reverse a `manual_adjust` entry (issue a new adjustment
/// instead) or when the reversal key is held by an entry that is not this award's
/// reversal. `Database` on persistence failure.
#[instrument(skip(db))]
pub async fn reverse_points(
    db: &DatabaseConnection,
    user_id: &str,
    source: PointSource,
    ref_id: &str,
) -> Result<ReversalResult> {
    if source == PointSource::ManualAdjust {
        return Err(Error::Validation {
            message: "Manual adjustments cannot be reversed; record a new adjustment instead"
                .to_string(),
        });
    }

    let Some(original) = ledger::find_entry(db, user_id, source, ref_id).await? else {
        info!("No award recorded for this reference, nothing to reverse");
        return no_op(db, user_id, false).await;
    };

    if let Some(existing) =
        ledger::find_entry(db, user_id, PointSource::ManualAdjust, ref_id).await?
    {
        return settled_reversal(db, user_id, &existing, &original).await;
    }

    let outcome = ledger::record_change(
        db,
        LedgerChange {
            user_id,
            source: PointSource::ManualAdjust,
            ref_id,
            delta_points: -original.delta_points,
            lifetime: LifetimeEffect::Keep,
            metadata: json!({
                "reversal_of": original.id,
                "original_source": source,
                "original_delta": original.delta_points,
            }),
        },
    )
    .await?;

    match outcome {
        ChangeOutcome::Applied { membership, .. } => {
            info!(
                points = original.delta_points,
                balance = membership.points_balance,
                "Points reversed"
            );
            Ok(ReversalResult {
                points_reversed: original.delta_points,
                new_balance: membership.points_balance,
                already_reversed: false,
            })
        }
        ChangeOutcome::Duplicate => {
            let existing = ledger::find_entry(db, user_id, PointSource::ManualAdjust, ref_id)
                .await?
                .ok_or_else(|| Error::Validation {
                    message: format!("Reversal of '{ref_id}' conflicted but left no entry"),
                })?;
            settled_reversal(db, user_id, &existing, &original).await
        }
    }
}

/// Resolves a `manual_adjust` entry already stored under the reversal key. It only
/// counts as the reversal when it points back at `original`.
async fn settled_reversal(
    db: &DatabaseConnection,
    user_id: &str,
    existing: &points_ledger::Model,
    original: &points_ledger::Model,
) -> Result<ReversalResult> {
    if existing.metadata.get("reversal_of").and_then(Value::as_i64) == Some(original.id) {
        info!("Award already reversed");
        return no_op(db, user_id, true).await;
    }

    warn!(
        entry_id = existing.id,
        original_id = original.id,
        "Reversal key held by an unrelated manual adjustment"
    );
    Err(Error::Validation {
        message: format!(
            "Reference '{}' is already used by manual adjustment #{}; cannot record the reversal",
            original.ref_id, existing.id
        ),
    })
}

async fn no_op(
    db: &DatabaseConnection,
    user_id: &str,
    already_reversed: bool,
) -> Result<ReversalResult> {
    let balance = membership::get_membership(db, user_id)
        .await?
        .map_or(0, |m| m.points_balance);
    Ok(ReversalResult {
        points_reversed: 0,
        new_balance: balance,
        already_reversed,
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::{
        core::{
            adjustment::adjust_points,
            award::{AwardBasis, award_points},
        },
        entities::{MembershipStatus, Tier},
        test_utils::*,
    };

    async fn award_order(
        db: &DatabaseConnection,
        user_id: &str,
        ref_id: &str,
        amount_minor: i64,
    ) -> Result<()> {
        award_points(
            db,
            &thresholds(),
            user_id,
            PointSource::ConsumptionPos,
            ref_id,
            AwardBasis::Spend {
                amount_minor,
                currency: "USD".to_string(),
            },
        )
        .await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_reverse_points_scenario() -> Result<()> {
        let (db, member) = setup_with_member().await?;
        adjust_points(&db, &thresholds(), &member.user_id, "seed", 20, "opening balance", "staff")
            .await?;
        award_order(&db, &member.user_id, "o1", 900).await?;

        let result = reverse_points(&db, &member.user_id, PointSource::ConsumptionPos, "o1").await?;
        assert_eq!(result.points_reversed, 9);
        assert_eq!(result.new_balance, 20);
        assert!(!result.already_reversed);

        let original = ledger::find_entry(&db, &member.user_id, PointSource::ConsumptionPos, "o1")
            .await?
            .unwrap();
        assert_eq!(original.delta_points, 9);

        let reversal = ledger::find_entry(&db, &member.user_id, PointSource::ManualAdjust, "o1")
            .await?
            .unwrap();
        assert_eq!(reversal.delta_points, -9);
        assert_eq!(reversal.balance_after, 20);
        assert_eq!(reversal.metadata["reversal_of"], original.id);

        Ok(())
    }

    #[tokio::test]
    async fn test_reverse_points_floors_at_zero() -> Result<()> {
        let (db, member) = setup_with_member().await?;
        award_order(&db, &member.user_id, "o1", 900).await?;
        adjust_points(&db, &thresholds(), &member.user_id, "spend-1", -5, "redeemed", "staff")
            .await?;

        let result = reverse_points(&db, &member.user_id, PointSource::ConsumptionPos, "o1").await?;
        assert_eq!(result.points_reversed, 9);
        assert_eq!(result.new_balance, 0);

        let reversal = ledger::find_entry(&db, &member.user_id, PointSource::ManualAdjust, "o1")
            .await?
            .unwrap();
        assert_eq!(reversal.delta_points, -9);

        let audit = ledger::audit_membership(&db, &member.user_id).await?;
        assert!(audit.is_consistent());

        Ok(())
    }

    #[tokio::test]
    async fn test_reverse_points_keeps_lifetime_and_tier() -> Result<()> {
        let (db, member) = setup_with_member().await?;
        award_order(&db, &member.user_id, "big", 60_000).await?;

        reverse_points(&db, &member.user_id, PointSource::ConsumptionPos, "big").await?;

        let stored = membership::get_membership(&db, &member.user_id).await?.unwrap();
        assert_eq!(stored.points_balance, 0);
        assert_eq!(stored.lifetime_points, 600);
        assert_eq!(stored.tier, Tier::Gold);

        Ok(())
    }

    #[tokio::test]
    async fn test_reverse_points_twice_is_noop() -> Result<()> {
        let (db, member) = setup_with_member().await?;
        award_order(&db, &member.user_id, "o1", 900).await?;

        reverse_points(&db, &member.user_id, PointSource::ConsumptionPos, "o1").await?;
        let again = reverse_points(&db, &member.user_id, PointSource::ConsumptionPos, "o1").await?;
        assert_eq!(again.points_reversed, 0);
        assert!(again.already_reversed);
        assert_eq!(
            ledger::get_entries_for_user(&db, &member.user_id, None).await?.len(),
            2
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_reverse_points_without_award_is_noop() -> Result<()> {
        let (db, member) = setup_with_member().await?;

        let result = reverse_points(&db, &member.user_id, PointSource::ConsumptionPos, "o9").await?;
        assert_eq!(result.points_reversed, 0);
        assert!(!result.already_reversed);
        assert!(
            ledger::get_entries_for_user(&db, &member.user_id, None)
                .await?
                .is_empty()
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_reverse_points_allowed_for_suspended_member() -> Result<()> {
        let (db, member) = setup_with_member().await?;
        award_order(&db, &member.user_id, "o1", 900).await?;
        membership::set_membership_status(&db, &member.user_id, MembershipStatus::Suspended)
            .await?;

        let result = reverse_points(&db, &member.user_id, PointSource::ConsumptionPos, "o1").await?;
        assert_eq!(result.points_reversed, 9);
        assert_eq!(result.new_balance, 0);

        Ok(())
    }

    #[tokio::test]
    async fn test_reverse_manual_adjustment_rejected() -> Result<()> {
        let (db, member) = setup_with_member().await?;

        let result = reverse_points(&db, &member.user_id, PointSource::ManualAdjust, "adj").await;
        assert!(matches!(result, Err(Error::Validation { .. })));

        Ok(())
    }

    #[tokio::test]
    async fn test_award_after_reversal_stays_idempotent() -> Result<()> {
        let (db, member) = setup_with_member().await?;
        award_order(&db, &member.user_id, "o1", 900).await?;
        reverse_points(&db, &member.user_id, PointSource::ConsumptionPos, "o1").await?;

        // A late webhook for the refunded order must not re-award
        award_order(&db, &member.user_id, "o1", 900).await?;
        let stored = membership::get_membership(&db, &member.user_id).await?.unwrap();
        assert_eq!(stored.points_balance, 0);

        Ok(())
    }

    #[tokio::test]
    async fn test_reverse_points_ignores_staff_reference_with_same_id() -> Result<()> {
        let (db, member) = setup_with_member().await?;
        adjust_points(&db, &thresholds(), &member.user_id, "o1", 5, "goodwill", "ana").await?;
        award_order(&db, &member.user_id, "o1", 900).await?;

        let result = reverse_points(&db, &member.user_id, PointSource::ConsumptionPos, "o1").await?;
        assert_eq!(result.points_reversed, 9);
        assert!(!result.already_reversed);
        assert_eq!(result.new_balance, 5);

        Ok(())
    }

    #[tokio::test]
    async fn test_reverse_points_rejects_unrelated_entry_on_key() -> Result<()> {
        let (db, member) = setup_with_member().await?;
        award_order(&db, &member.user_id, "o1", 900).await?;
        // A manual entry under the bare id that is not this award's reversal
        ledger::record_change(
            &db,
            LedgerChange {
                user_id: &member.user_id,
                source: PointSource::ManualAdjust,
                ref_id: "o1",
                delta_points: 3,
                lifetime: LifetimeEffect::Keep,
                metadata: json!({ "reason": "legacy import" }),
            },
        )
        .await?;

        let result = reverse_points(&db, &member.user_id, PointSource::ConsumptionPos, "o1").await;
        assert!(matches!(result, Err(Error::Validation { .. })));

        let stored = membership::get_membership(&db, &member.user_id).await?.unwrap();
        assert_eq!(stored.points_balance, 12);

        Ok(())
    }
}
