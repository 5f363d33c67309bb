//! NFC check-in recording and its flat points award.

use crate::{
    config::loyalty::LoyaltyConfig,
    core::award::{self, AwardBasis, PointsOutcome},
    entities::{CheckIn, PointSource, checkin},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{QueryOrder, QuerySelect, Set, prelude::*};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

/// A card scan to record
#[derive(Debug, Clone, Deserialize)]
pub struct NewCheckIn {
    /// User who scanned
    pub user_id: String,
    /// Site role at scan time
    pub user_role: String,
    /// Event the scan happened at
    #[serde(default)]
    pub event_id: Option<String>,
    /// UID read from the card
    #[serde(default)]
    pub card_uid: Option<String>,
}

/// Result of [`record_checkin`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckInOutcome {
    /// The stored check-in
    pub checkin: checkin::Model,
    /// Best-effort points side effect
    pub points: PointsOutcome,
}

/// Stores a check-in, then awards check-in points when the role is eligible.
///
/// The check-in row is written first and kept whatever happens to the award.
#[instrument(skip(db, loyalty))]
pub async fn record_checkin(
    db: &DatabaseConnection,
    loyalty: &LoyaltyConfig,
    new: NewCheckIn,
) -> Result<CheckInOutcome> {
    let user_id = new.user_id.trim().to_string();
    if user_id.is_empty() {
        return Err(Error::Validation {
            message: "Check-in user id cannot be empty".to_string(),
        });
    }

    let eligible = loyalty.checkin.is_eligible(&new.user_role);
    let checkin = checkin::ActiveModel {
        user_id: Set(user_id),
        user_role: Set(new.user_role),
        event_id: Set(new.event_id),
        card_uid: Set(new.card_uid),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?;
    info!(checkin_id = checkin.id, eligible, "Check-in recorded");

    let points = if eligible {
        award::award_best_effort(
            db,
            &loyalty.tiers,
            &checkin.user_id,
            PointSource::EventCheckin,
            &checkin.id.to_string(),
            AwardBasis::Flat {
                fallback_points: loyalty.checkin.flat_points,
            },
        )
        .await
    } else {
        debug!(role = %checkin.user_role, "Role does not earn check-in points");
        PointsOutcome::NotApplicable
    };

    Ok(CheckInOutcome { checkin, points })
}

/// Re-runs the award for an existing check-in, e.g. after a failed first attempt.
///
/// Safe to repeat: the award is keyed by the check-in id.
pub async fn retry_checkin_award(
    db: &DatabaseConnection,
    loyalty: &LoyaltyConfig,
    checkin_id: i64,
) -> Result<PointsOutcome> {
    let checkin = CheckIn::find_by_id(checkin_id)
        .one(db)
        .await?
        .ok_or(Error::CheckInNotFound { checkin_id })?;

    if !loyalty.checkin.is_eligible(&checkin.user_role) {
        return Ok(PointsOutcome::NotApplicable);
    }

    Ok(award::award_best_effort(
        db,
        &loyalty.tiers,
        &checkin.user_id,
        PointSource::EventCheckin,
        &checkin.id.to_string(),
        AwardBasis::Flat {
            fallback_points: loyalty.checkin.flat_points,
        },
    )
    .await)
}

/// Lists a user's check-ins, newest first.
pub async fn get_checkins_for_user(
    db: &DatabaseConnection,
    user_id: &str,
    limit: Option<u64>,
) -> Result<Vec<checkin::Model>> {
    let mut query = CheckIn::find()
        .filter(checkin::Column::UserId.eq(user_id))
        .order_by_desc(checkin::Column::Id);
    if let Some(limit) = limit {
        query = query.limit(limit);
    }
    query.all(db).await.map_err(Into::into)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::{
        core::{membership, rules::create_rule},
        entities::MembershipStatus,
        test_utils::*,
    };

    fn scan(user_id: &str, role: &str) -> NewCheckIn {
        NewCheckIn {
            user_id: user_id.to_string(),
            user_role: role.to_string(),
            event_id: Some("launch-party".to_string()),
            card_uid: Some("04:A2:19:7F".to_string()),
        }
    }

    #[tokio::test]
    async fn test_record_checkin_awards_vip() -> Result<()> {
        let (db, member) = setup_with_member().await?;
        create_rule(&db, "event_checkin", 10.0).await?;

        let outcome = record_checkin(&db, &loyalty_config(), scan(&member.user_id, "VIP")).await?;
        let PointsOutcome::Awarded(award) = outcome.points else {
            panic!("expected an award");
        };
        assert_eq!(award.points_awarded, 10);
        assert_eq!(award.new_balance, 10);

        // Replaying the same check-in id adds nothing
        let retry = retry_checkin_award(&db, &loyalty_config(), outcome.checkin.id).await?;
        let PointsOutcome::Awarded(repeat) = retry else {
            panic!("expected an award result");
        };
        assert!(repeat.already_awarded);
        assert_eq!(repeat.new_balance, 10);

        Ok(())
    }

    #[tokio::test]
    async fn test_record_checkin_uses_flat_points_without_rule() -> Result<()> {
        let (db, member) = setup_with_member().await?;
        let mut loyalty = loyalty_config();
        loyalty.checkin.flat_points = 15;

        let outcome = record_checkin(&db, &loyalty, scan(&member.user_id, "vip")).await?;
        let PointsOutcome::Awarded(award) = outcome.points else {
            panic!("expected an award");
        };
        assert_eq!(award.points_awarded, 15);

        Ok(())
    }

    #[tokio::test]
    async fn test_record_checkin_ineligible_role() -> Result<()> {
        let (db, member) = setup_with_member().await?;

        let outcome = record_checkin(&db, &loyalty_config(), scan(&member.user_id, "talent")).await?;
        assert_eq!(outcome.points, PointsOutcome::NotApplicable);

        let stored = membership::get_membership(&db, &member.user_id).await?.unwrap();
        assert_eq!(stored.points_balance, 0);

        Ok(())
    }

    #[tokio::test]
    async fn test_record_checkin_kept_when_award_fails() -> Result<()> {
        let (db, member) = setup_with_member().await?;
        membership::set_membership_status(&db, &member.user_id, MembershipStatus::Suspended)
            .await?;

        let outcome = record_checkin(&db, &loyalty_config(), scan(&member.user_id, "vip")).await?;
        assert!(matches!(outcome.points, PointsOutcome::Failed { .. }));

        let stored = get_checkins_for_user(&db, &member.user_id, None).await?;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, outcome.checkin.id);

        Ok(())
    }

    #[tokio::test]
    async fn test_record_checkin_empty_user() -> Result<()> {
        let db = setup_test_db().await?;

        let result = record_checkin(&db, &loyalty_config(), scan("  ", "vip")).await;
        assert!(matches!(result, Err(Error::Validation { .. })));

        Ok(())
    }
}
