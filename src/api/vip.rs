use super::checkins::LimitQuery;
use crate::{
    config::settings::AppContext,
    core::{
        adjustment::{self, AdjustmentResult},
        ledger::{self, LedgerAudit},
        membership,
        reversal::{self, ReversalResult},
        rules,
    },
    entities::{MembershipStatus, PointSource, membership as membership_entity, point_rule, points_ledger},
    errors::{Error, Result},
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;

/// Body of `POST /api/vip/members`
#[derive(Debug, Deserialize)]
pub struct EnrollPayload {
    /// User to enroll
    pub user_id: String,
}

/// Body of `PUT /api/vip/members/:user_id/status`
#[derive(Debug, Deserialize)]
pub struct StatusPayload {
    /// New membership status
    pub status: MembershipStatus,
}

/// Body of `POST /api/vip/members/:user_id/adjustments`
#[derive(Debug, Deserialize)]
pub struct AdjustPayload {
    /// Staff-chosen idempotency reference
    pub ref_id: String,
    /// Signed point change
    pub delta_points: i64,
    /// Why the adjustment was made
    #[serde(default)]
    pub reason: String,
    /// Staff member issuing it
    pub actor: String,
}

/// Body of `POST /api/vip/members/:user_id/reversals`
#[derive(Debug, Deserialize)]
pub struct ReversePayload {
    /// Source of the award to undo
    pub source: String,
    /// Reference of the award to undo
    pub ref_id: String,
}

/// Body of `POST /api/vip/rules`
#[derive(Debug, Deserialize)]
pub struct CreateRulePayload {
    /// Action type the rule applies to
    pub action_type: String,
    /// Points per major currency unit, or per occurrence
    pub points_per_unit: f64,
}

/// `POST /api/vip/members` - enrolls a silver member.
pub async fn enroll(
    State(context): State<AppContext>,
    Json(payload): Json<EnrollPayload>,
) -> Result<(StatusCode, Json<membership_entity::Model>)> {
    let member = membership::enroll_member(&context.database, &payload.user_id).await?;
    Ok((StatusCode::CREATED, Json(member)))
}

/// `GET /api/vip/members/:user_id`
pub async fn get_member(
    State(context): State<AppContext>,
    Path(user_id): Path<String>,
) -> Result<Json<membership_entity::Model>> {
    membership::get_membership(&context.database, &user_id)
        .await?
        .map(Json)
        .ok_or(Error::NoMembership { user_id })
}

/// `PUT /api/vip/members/:user_id/status` - suspends or reactivates a member.
pub async fn set_status(
    State(context): State<AppContext>,
    Path(user_id): Path<String>,
    Json(payload): Json<StatusPayload>,
) -> Result<Json<membership_entity::Model>> {
    let member =
        membership::set_membership_status(&context.database, &user_id, payload.status).await?;
    Ok(Json(member))
}

/// `GET /api/vip/members/:user_id/ledger?limit=` - newest entries first.
pub async fn ledger(
    State(context): State<AppContext>,
    Path(user_id): Path<String>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<points_ledger::Model>>> {
    let entries = ledger::get_entries_for_user(&context.database, &user_id, query.limit).await?;
    Ok(Json(entries))
}

/// `GET /api/vip/members/:user_id/audit` - replays the ledger against the stored balance.
pub async fn audit(
    State(context): State<AppContext>,
    Path(user_id): Path<String>,
) -> Result<Json<LedgerAudit>> {
    Ok(Json(ledger::audit_membership(&context.database, &user_id).await?))
}

/// `POST /api/vip/members/:user_id/adjustments` - staff credit or debit, applied once per `ref_id`.
pub async fn adjust(
    State(context): State<AppContext>,
    Path(user_id): Path<String>,
    Json(payload): Json<AdjustPayload>,
) -> Result<Json<AdjustmentResult>> {
    let result = adjustment::adjust_points(
        &context.database,
        &context.loyalty.tiers,
        &user_id,
        &payload.ref_id,
        payload.delta_points,
        &payload.reason,
        &payload.actor,
    )
    .await?;
    Ok(Json(result))
}

/// `POST /api/vip/members/:user_id/reversals` - takes back one award.
pub async fn reverse(
    State(context): State<AppContext>,
    Path(user_id): Path<String>,
    Json(payload): Json<ReversePayload>,
) -> Result<Json<ReversalResult>> {
    let source = PointSource::parse(&payload.source).ok_or_else(|| Error::Validation {
        message: format!("Unknown point source '{}'", payload.source),
    })?;
    let result =
        reversal::reverse_points(&context.database, &user_id, source, &payload.ref_id).await?;
    Ok(Json(result))
}

/// `GET /api/vip/rules` - active earning rules.
pub async fn list_rules(State(context): State<AppContext>) -> Result<Json<Vec<point_rule::Model>>> {
    Ok(Json(rules::get_active_rules(&context.database).await?))
}

/// `POST /api/vip/rules`
pub async fn create_rule(
    State(context): State<AppContext>,
    Json(payload): Json<CreateRulePayload>,
) -> Result<(StatusCode, Json<point_rule::Model>)> {
    let rule =
        rules::create_rule(&context.database, &payload.action_type, payload.points_per_unit)
            .await?;
    Ok((StatusCode::CREATED, Json(rule)))
}

/// `DELETE /api/vip/rules/:rule_id` - soft-deactivates a rule.
pub async fn deactivate_rule(
    State(context): State<AppContext>,
    Path(rule_id): Path<i64>,
) -> Result<Json<point_rule::Model>> {
    Ok(Json(rules::deactivate_rule(&context.database, rule_id).await?))
}
