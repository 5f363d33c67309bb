//! Membership business logic - enrollment, status changes and the balance write path.
//!
//! Reads are public. The only writer of `points_balance`, `lifetime_points` and `tier`
//! is [`apply_points_delta`], which is crate-private and always runs inside the same
//! transaction as a ledger append (see `core::ledger::record_change`).

use crate::{
    config::loyalty::TierThresholds,
    entities::{Membership, MembershipStatus, Tier, membership},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{Set, prelude::*, sea_query::Expr};
use tracing::info;

/// Finds a membership by user id.
pub async fn get_membership<C>(db: &C, user_id: &str) -> Result<Option<membership::Model>>
where
    C: ConnectionTrait,
{
    Membership::find_by_id(user_id.to_string())
        .one(db)
        .await
        .map_err(Into::into)
}

/// Fetches a membership that is allowed to earn points.
///
/// # Errors
/// `NoMembership` if the user never enrolled, `MembershipInactive` if suspended.
pub async fn require_active_membership<C>(db: &C, user_id: &str) -> Result<membership::Model>
where
    C: ConnectionTrait,
{
    let membership = get_membership(db, user_id)
        .await?
        .ok_or_else(|| Error::NoMembership {
            user_id: user_id.to_string(),
        })?;

    if membership.status != MembershipStatus::Active {
        return Err(Error::MembershipInactive {
            user_id: user_id.to_string(),
            status: membership.status,
        });
    }

    Ok(membership)
}

/// Enrolls a user at silver with an empty balance. Enrolling twice returns the
/// existing membership unchanged.
pub async fn enroll_member(db: &DatabaseConnection, user_id: &str) -> Result<membership::Model> {
    let user_id = user_id.trim();
    if user_id.is_empty() {
        return Err(Error::Validation {
            message: "User id cannot be empty".to_string(),
        });
    }

    if let Some(existing) = get_membership(db, user_id).await? {
        return Ok(existing);
    }

    let now = Utc::now();
    let membership = membership::ActiveModel {
        user_id: Set(user_id.to_string()),
        tier: Set(Tier::Silver),
        points_balance: Set(0),
        lifetime_points: Set(0),
        status: Set(MembershipStatus::Active),
        created_at: Set(now),
        updated_at: Set(now),
    };

    let created = membership.insert(db).await?;
    info!(user_id, "Enrolled new VIP member");
    Ok(created)
}

/// Suspends or reactivates a membership.
pub async fn set_membership_status(
    db: &DatabaseConnection,
    user_id: &str,
    status: MembershipStatus,
) -> Result<membership::Model> {
    let membership = get_membership(db, user_id)
        .await?
        .ok_or_else(|| Error::NoMembership {
            user_id: user_id.to_string(),
        })?;

    if membership.status == status {
        return Ok(membership);
    }

    let mut active_model: membership::ActiveModel = membership.into();
    active_model.status = Set(status);
    active_model.updated_at = Set(Utc::now());
    let updated = active_model.update(db).await?;
    info!(user_id, %status, "Membership status changed");
    Ok(updated)
}

/// Applies a signed balance change with single-statement updates, then re-derives the tier.
///
/// `points_balance` is clamped at zero. `lifetime_points` only moves when `thresholds`
/// is given, and the tier is recomputed only then.
pub(crate) async fn apply_points_delta<C>(
    db: &C,
    user_id: &str,
    balance_delta: i64,
    lifetime_delta: i64,
    thresholds: Option<&TierThresholds>,
) -> Result<membership::Model>
where
    C: ConnectionTrait,
{
    let now = Utc::now();

    let mut update = Membership::update_many()
        .col_expr(
            membership::Column::PointsBalance,
            Expr::col(membership::Column::PointsBalance).add(balance_delta),
        )
        .col_expr(membership::Column::UpdatedAt, Expr::value(now));
    if thresholds.is_some() && lifetime_delta != 0 {
        update = update.col_expr(
            membership::Column::LifetimePoints,
            Expr::col(membership::Column::LifetimePoints).add(lifetime_delta),
        );
    }

    let result = update
        .filter(membership::Column::UserId.eq(user_id))
        .exec(db)
        .await?;
    if result.rows_affected == 0 {
        return Err(Error::NoMembership {
            user_id: user_id.to_string(),
        });
    }

    // Floor at zero
    if balance_delta < 0 {
        Membership::update_many()
            .col_expr(membership::Column::PointsBalance, Expr::value(0i64))
            .filter(membership::Column::UserId.eq(user_id))
            .filter(membership::Column::PointsBalance.lt(0))
            .exec(db)
            .await?;
    }

    let updated = get_membership(db, user_id)
        .await?
        .ok_or_else(|| Error::NoMembership {
            user_id: user_id.to_string(),
        })?;

    let Some(thresholds) = thresholds else {
        return Ok(updated);
    };

    let derived_tier = thresholds.tier_for(updated.lifetime_points);
    if derived_tier == updated.tier {
        return Ok(updated);
    }

    let previous_tier = updated.tier;
    let mut active_model: membership::ActiveModel = updated.into();
    active_model.tier = Set(derived_tier);
    let promoted = active_model.update(db).await?;
    info!(user_id, from = %previous_tier, to = %derived_tier, "Membership tier changed");
    Ok(promoted)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;

    #[tokio::test]
    async fn test_enroll_member_defaults() -> Result<()> {
        let db = setup_test_db().await?;

        let member = enroll_member(&db, "  user-1 ").await?;
        assert_eq!(member.user_id, "user-1");
        assert_eq!(member.tier, Tier::Silver);
        assert_eq!(member.points_balance, 0);
        assert_eq!(member.lifetime_points, 0);
        assert_eq!(member.status, MembershipStatus::Active);

        Ok(())
    }

    #[tokio::test]
    async fn test_enroll_member_twice_returns_existing() -> Result<()> {
        let db = setup_test_db().await?;

        let first = enroll_member(&db, "user-1").await?;
        let second = enroll_member(&db, "user-1").await?;
        assert_eq!(first, second);

        Ok(())
    }

    #[tokio::test]
    async fn test_enroll_member_rejects_blank_user() -> Result<()> {
        let db = setup_test_db().await?;

        let result = enroll_member(&db, "   ").await;
        assert!(matches!(result, Err(Error::Validation { .. })));

        Ok(())
    }

    #[tokio::test]
    async fn test_require_active_membership() -> Result<()> {
        let db = setup_test_db().await?;

        let missing = require_active_membership(&db, "ghost").await;
        assert!(matches!(missing, Err(Error::NoMembership { .. })));

        enroll_member(&db, "user-1").await?;
        assert!(require_active_membership(&db, "user-1").await.is_ok());

        set_membership_status(&db, "user-1", MembershipStatus::Suspended).await?;
        let suspended = require_active_membership(&db, "user-1").await;
        assert!(matches!(
            suspended,
            Err(Error::MembershipInactive {
                status: MembershipStatus::Suspended,
                ..
            })
        ));

        Ok(())
    }

    #[tokio::test]
    async fn test_apply_points_delta_floors_balance_and_keeps_lifetime() -> Result<()> {
        let db = setup_test_db().await?;
        let thresholds = TierThresholds::default();
        enroll_member(&db, "user-1").await?;

        let after_award = apply_points_delta(&db, "user-1", 5, 5, Some(&thresholds)).await?;
        assert_eq!(after_award.points_balance, 5);
        assert_eq!(after_award.lifetime_points, 5);

        let after_reversal = apply_points_delta(&db, "user-1", -9, 0, None).await?;
        assert_eq!(after_reversal.points_balance, 0);
        assert_eq!(after_reversal.lifetime_points, 5);

        Ok(())
    }

    #[tokio::test]
    async fn test_apply_points_delta_promotes_tier() -> Result<()> {
        let db = setup_test_db().await?;
        let thresholds = TierThresholds::default();
        enroll_member(&db, "user-1").await?;

        let gold = apply_points_delta(&db, "user-1", 600, 600, Some(&thresholds)).await?;
        assert_eq!(gold.tier, Tier::Gold);

        let black = apply_points_delta(&db, "user-1", 1500, 1500, Some(&thresholds)).await?;
        assert_eq!(black.tier, Tier::Black);

        // Spending the balance never demotes
        let spent = apply_points_delta(&db, "user-1", -2100, 0, None).await?;
        assert_eq!(spent.points_balance, 0);
        assert_eq!(spent.tier, Tier::Black);

        Ok(())
    }

    #[tokio::test]
    async fn test_apply_points_delta_unknown_member() -> Result<()> {
        let db = setup_test_db().await?;

        let result = apply_points_delta(&db, "ghost", 10, 10, None).await;
        assert!(matches!(result, Err(Error::NoMembership { .. })));

        Ok(())
    }
}
