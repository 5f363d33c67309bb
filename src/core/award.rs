//! Award engine - the idempotent path every point award goes through.
//!
//! An award is identified by `(user_id, source, ref_id)`. The first call for a key
//! writes one ledger entry and moves the balance; every later call, including a
//! concurrent one that loses the race at the unique index, succeeds with zero points.

use crate::{
    config::loyalty::TierThresholds,
    core::{
        ledger::{self, ChangeOutcome, LedgerChange, LifetimeEffect},
        membership, rules,
    },
    entities::{PointSource, Tier, point_rule},
    errors::{Error, Result},
};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use serde_json::json;
use tracing::{error, info, instrument};

/// Tolerance applied before flooring so `9.0000000001`-style float noise cannot cost a point
const FLOOR_EPSILON: f64 = 1e-9;

/// How many points an award is worth
#[derive(Debug, Clone, PartialEq)]
pub enum AwardBasis {
    /// Money spent, converted through the source's rate (default 1 point per major unit)
    Spend {
        /// Amount in minor currency units
        amount_minor: i64,
        /// ISO currency code
        currency: String,
    },
    /// One occurrence; the source's rate is the point value, else `fallback_points`
    Flat {
        /// Points awarded when no active rule exists
        fallback_points: i64,
    },
    /// Pre-computed amount, no rule lookup
    Fixed {
        /// Points to award
        points: i64,
    },
}

/// Outcome of [`award_points`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AwardResult {
    /// Points added by this call (zero for repeats and zero-value awards)
    pub points_awarded: i64,
    /// Membership balance after the call
    pub new_balance: i64,
    /// Membership tier after the call
    pub new_tier: Tier,
    /// True when this key had already been rewarded
    pub already_awarded: bool,
}

/// Points computed for a basis, with the rate that produced them
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointsComputation {
    /// Floored point value
    pub points: i64,
    /// Rate used, if the basis went through rule resolution
    pub rate: Option<f64>,
}

/// Minor units per major unit for `currency` (ISO 4217 exponent)
#[must_use]
pub fn minor_units_per_major(currency: &str) -> i64 {
    const ZERO_DECIMAL: [&str; 8] = ["JPY", "KRW", "VND", "CLP", "ISK", "UGX", "XAF", "XOF"];
    const THREE_DECIMAL: [&str; 5] = ["BHD", "JOD", "KWD", "OMR", "TND"];

    let code = currency.trim().to_uppercase();
    if ZERO_DECIMAL.contains(&code.as_str()) {
        1
    } else if THREE_DECIMAL.contains(&code.as_str()) {
        1000
    } else {
        100
    }
}

/// Applies `rule` (or the documented default) to `basis`, flooring to whole points.
pub fn compute_points(
    basis: &AwardBasis,
    rule: Option<&point_rule::Model>,
) -> Result<PointsComputation> {
    match basis {
        AwardBasis::Spend {
            amount_minor,
            currency,
        } => {
            if *amount_minor < 0 {
                return Err(Error::InvalidAmount {
                    amount: *amount_minor,
                });
            }
            let rate = rule.map_or(rules::DEFAULT_POINTS_PER_UNIT, |r| r.points_per_unit);
            #[allow(clippy::cast_precision_loss)]
            let major_units = *amount_minor as f64 / minor_units_per_major(currency) as f64;
            Ok(PointsComputation {
                points: floor_points(major_units * rate),
                rate: Some(rate),
            })
        }
        AwardBasis::Flat { fallback_points } => Ok(rule.map_or(
            PointsComputation {
                points: *fallback_points,
                rate: None,
            },
            |r| PointsComputation {
                points: floor_points(r.points_per_unit),
                rate: Some(r.points_per_unit),
            },
        )),
        AwardBasis::Fixed { points } => Ok(PointsComputation {
            points: *points,
            rate: None,
        }),
    }
}

#[allow(clippy::cast_possible_truncation)]
fn floor_points(raw: f64) -> i64 {
    (raw + FLOOR_EPSILON).floor() as i64
}

fn basis_metadata(basis: &AwardBasis, computation: PointsComputation) -> serde_json::Value {
    match basis {
        AwardBasis::Spend {
            amount_minor,
            currency,
        } => json!({
            "amount_minor": amount_minor,
            "currency": currency.trim().to_uppercase(),
            "rate": computation.rate,
        }),
        AwardBasis::Flat { fallback_points } => json!({
            "flat": true,
            "rate": computation.rate,
            "fallback_points": fallback_points,
        }),
        AwardBasis::Fixed { points } => json!({ "fixed_points": points }),
    }
}

/// Awards points for one triggering action, at most once per `(user_id, source, ref_id)`.
///
/// # Errors
/// - `NoMembership` / `MembershipInactive` when the member cannot earn
/// - `InvalidAmount` for a negative spend
/// - `Database` when persistence fails; nothing was written and the call can be retried
#[instrument(skip(db, thresholds, basis), fields(basis = ?basis))]
pub async fn award_points(
    db: &DatabaseConnection,
    thresholds: &TierThresholds,
    user_id: &str,
    source: PointSource,
    ref_id: &str,
    basis: AwardBasis,
) -> Result<AwardResult> {
    if let Some(existing) = ledger::find_entry(db, user_id, source, ref_id).await? {
        info!(entry_id = existing.id, "Points already awarded for this reference");
        return already_awarded(db, thresholds, user_id, existing.balance_after).await;
    }

    let member = membership::require_active_membership(db, user_id).await?;

    let rule = match basis {
        AwardBasis::Fixed { .. } => None,
        _ => rules::resolve_rule(db, source).await?,
    };
    let computation = compute_points(&basis, rule.as_ref())?;

    if computation.points <= 0 {
        info!("Award computed to zero points, nothing recorded");
        return Ok(AwardResult {
            points_awarded: 0,
            new_balance: member.points_balance,
            new_tier: member.tier,
            already_awarded: false,
        });
    }

    let mut metadata = basis_metadata(&basis, computation);
    if let Some(rule) = &rule {
        metadata["rule_id"] = json!(rule.id);
    }

    let outcome = ledger::record_change(
        db,
        LedgerChange {
            user_id,
            source,
            ref_id,
            delta_points: computation.points,
            lifetime: LifetimeEffect::Accrue(thresholds),
            metadata,
        },
    )
    .await
    .inspect_err(|e| error!("Failed to persist points award: {}", e))?;

    match outcome {
        ChangeOutcome::Applied { membership, entry } => {
            info!(
                entry_id = entry.id,
                points = computation.points,
                balance = membership.points_balance,
                tier = %membership.tier,
                "Points awarded"
            );
            Ok(AwardResult {
                points_awarded: computation.points,
                new_balance: membership.points_balance,
                new_tier: membership.tier,
                already_awarded: false,
            })
        }
        ChangeOutcome::Duplicate => {
            info!("Concurrent award won the race for this reference");
            already_awarded(db, thresholds, user_id, member.points_balance).await
        }
    }
}

async fn already_awarded(
    db: &DatabaseConnection,
    thresholds: &TierThresholds,
    user_id: &str,
    fallback_balance: i64,
) -> Result<AwardResult> {
    let current = membership::get_membership(db, user_id).await?;
    Ok(AwardResult {
        points_awarded: 0,
        new_balance: current
            .as_ref()
            .map_or(fallback_balance, |m| m.points_balance),
        new_tier: current.map_or_else(|| thresholds.tier_for(0), |m| m.tier),
        already_awarded: true,
    })
}

/// What a settlement integration got out of its best-effort award
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PointsOutcome {
    /// No member to reward (no linked customer, or role not eligible)
    NotApplicable,
    /// The award engine ran; see `already_awarded` for repeats
    Awarded(AwardResult),
    /// The award failed; the primary operation still succeeded
    Failed {
        /// Error description for the caller's response
        reason: String,
    },
}

/// Runs an award for a settlement integration, logging failures instead of propagating them.
pub async fn award_best_effort(
    db: &DatabaseConnection,
    thresholds: &TierThresholds,
    user_id: &str,
    source: PointSource,
    ref_id: &str,
    basis: AwardBasis,
) -> PointsOutcome {
    match award_points(db, thresholds, user_id, source, ref_id, basis).await {
        Ok(result) => PointsOutcome::Awarded(result),
        Err(e) => {
            error!(
                user_id,
                source = %source,
                ref_id,
                error = %e,
                "Points award failed, primary operation kept"
            );
            PointsOutcome::Failed {
                reason: e.to_string(),
            }
        }
    }
}
