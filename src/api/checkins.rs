use crate::{
    config::settings::AppContext,
    core::{
        award::PointsOutcome,
        checkin::{self, CheckInOutcome, NewCheckIn},
    },
    entities::checkin as checkin_entity,
    errors::Result,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;

/// `?limit=` for list endpoints
#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    /// Maximum rows to return
    pub limit: Option<u64>,
}

/// `POST /api/nfc/checkins` - records a card scan and its award.
pub async fn create_checkin(
    State(context): State<AppContext>,
    Json(payload): Json<NewCheckIn>,
) -> Result<(StatusCode, Json<CheckInOutcome>)> {
    let outcome = checkin::record_checkin(&context.database, &context.loyalty, payload).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

/// `POST /api/nfc/checkins/:checkin_id/award` - re-runs a failed check-in award.
pub async fn retry_award(
    State(context): State<AppContext>,
    Path(checkin_id): Path<i64>,
) -> Result<Json<PointsOutcome>> {
    let outcome =
        checkin::retry_checkin_award(&context.database, &context.loyalty, checkin_id).await?;
    Ok(Json(outcome))
}

/// `GET /api/nfc/users/:user_id/checkins?limit=`
pub async fn list_for_user(
    State(context): State<AppContext>,
    Path(user_id): Path<String>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<checkin_entity::Model>>> {
    let checkins = checkin::get_checkins_for_user(&context.database, &user_id, query.limit).await?;
    Ok(Json(checkins))
}
