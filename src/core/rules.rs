//! Point rule business logic - rate resolution and minimal rule administration.
//!
//! Award-time resolution is read-only. A source matches rules stored under its own tag
//! and under the legacy tags the agency site used before sources were normalized.

use crate::{
    config::loyalty::RuleConfig,
    entities::{PointRule, PointSource, point_rule},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{PaginatorTrait, QueryOrder, Set, prelude::*};
use tracing::info;

/// Rate used when no active rule matches a monetary source
pub const DEFAULT_POINTS_PER_UNIT: f64 = 1.0;

/// Rule `action_type` values that apply to `source`
#[must_use]
pub const fn action_types_for(source: PointSource) -> &'static [&'static str] {
    match source {
        PointSource::ConsumptionPos => &["consumption_pos", "pos_consumption", "consumption"],
        PointSource::EventCheckin => &["event_checkin", "checkin"],
        PointSource::ManualAdjust => &["manual_adjust"],
    }
}

/// Finds the rule to apply for `source`: the active match with the highest rate.
pub async fn resolve_rule<C>(db: &C, source: PointSource) -> Result<Option<point_rule::Model>>
where
    C: ConnectionTrait,
{
    PointRule::find()
        .filter(point_rule::Column::IsActive.eq(true))
        .filter(point_rule::Column::ActionType.is_in(action_types_for(source).iter().copied()))
        .order_by_desc(point_rule::Column::PointsPerUnit)
        .order_by_asc(point_rule::Column::Id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Lists every active rule, grouped by action type.
pub async fn get_active_rules(db: &DatabaseConnection) -> Result<Vec<point_rule::Model>> {
    PointRule::find()
        .filter(point_rule::Column::IsActive.eq(true))
        .order_by_asc(point_rule::Column::ActionType)
        .order_by_desc(point_rule::Column::PointsPerUnit)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Creates an active rule after validating the tag and rate.
pub async fn create_rule(
    db: &DatabaseConnection,
    action_type: &str,
    points_per_unit: f64,
) -> Result<point_rule::Model> {
    let action_type = action_type.trim().to_lowercase();
    if action_type.is_empty() {
        return Err(Error::Validation {
            message: "Rule action type cannot be empty".to_string(),
        });
    }

    if !points_per_unit.is_finite() || points_per_unit < 0.0 {
        return Err(Error::InvalidRate {
            rate: points_per_unit,
        });
    }

    let rule = point_rule::ActiveModel {
        action_type: Set(action_type),
        points_per_unit: Set(points_per_unit),
        is_active: Set(true),
        created_at: Set(Utc::now()),
        ..Default::default()
    };
    rule.insert(db).await.map_err(Into::into)
}

/// Marks a rule inactive so it is no longer selected. Unknown ids are a validation error.
pub async fn deactivate_rule(db: &DatabaseConnection, rule_id: i64) -> Result<point_rule::Model> {
    let rule = PointRule::find_by_id(rule_id)
        .one(db)
        .await?
        .ok_or(Error::RuleNotFound { rule_id })?;

    let mut active_model: point_rule::ActiveModel = rule.into();
    active_model.is_active = Set(false);
    active_model.update(db).await.map_err(Into::into)
}

/// Inserts configured rules whose action type has no rule at all yet.
///
/// Returns the number of rules inserted. Existing rules, active or not, are never touched,
/// so edits made through administration survive restarts.
pub async fn seed_rules(db: &DatabaseConnection, rules: &[RuleConfig]) -> Result<usize> {
    let mut inserted = 0;

    for rule in rules {
        let action_type = rule.action_type.trim().to_lowercase();
        let existing = PointRule::find()
            .filter(point_rule::Column::ActionType.eq(action_type.as_str()))
            .count(db)
            .await?;

        if existing > 0 {
            continue;
        }

        create_rule(db, &action_type, rule.points_per_unit).await?;
        inserted += 1;
    }

    if inserted > 0 {
        info!("Seeded {} point rule(s) from configuration", inserted);
    }
    Ok(inserted)
}
