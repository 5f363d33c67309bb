//! HTTP API - POS orders, Stripe webhook, NFC check-ins and VIP memberships.
//!
//! Handlers are thin: they decode the request, call into [`crate::core`] and let
//! [`Error`](crate::errors::Error) render itself through `IntoResponse`.

/// NFC check-in endpoints
pub mod checkins;
/// `IntoResponse` mapping for crate errors
pub mod error;
/// POS order endpoints
pub mod pos;
/// VIP membership, ledger and rule endpoints
pub mod vip;
/// Stripe webhook ingestion
pub mod webhooks;

use crate::{config::settings::AppContext, errors::Result};
use axum::{
    Router,
    http::StatusCode,
    routing::{delete, get, post, put},
};
use std::net::SocketAddr;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

/// Builds the API router over a shared context (separate from [`serve`] for testing)
pub fn router(context: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let pos_routes = Router::new()
        .route("/orders", post(pos::create_order))
        .route("/orders/:order_id", get(pos::get_order).put(pos::update_order))
        .route("/orders/:order_id/customer", put(pos::link_customer));

    let vip_routes = Router::new()
        .route("/members", post(vip::enroll))
        .route("/members/:user_id", get(vip::get_member))
        .route("/members/:user_id/status", put(vip::set_status))
        .route("/members/:user_id/ledger", get(vip::ledger))
        .route("/members/:user_id/audit", get(vip::audit))
        .route("/members/:user_id/adjustments", post(vip::adjust))
        .route("/members/:user_id/reversals", post(vip::reverse))
        .route("/rules", get(vip::list_rules).post(vip::create_rule))
        .route("/rules/:rule_id", delete(vip::deactivate_rule));

    let nfc_routes = Router::new()
        .route("/checkins", post(checkins::create_checkin))
        .route("/checkins/:checkin_id/award", post(checkins::retry_award))
        .route("/users/:user_id/checkins", get(checkins::list_for_user));

    Router::new()
        .route("/api/health", get(|| async { StatusCode::OK }))
        .nest("/api/pos", pos_routes)
        .nest("/api/vip", vip_routes)
        .nest("/api/nfc", nfc_routes)
        .route("/api/webhooks/stripe", post(webhooks::stripe))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(context)
}

/// Serves the API until `shutdown` resolves.
pub async fn serve<F>(context: AppContext, addr: SocketAddr, shutdown: F) -> Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "HTTP API listening");
    axum::serve(listener, router(context))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}


#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::{test_support::send, *};
    use crate::test_utils::setup_app_context;
    use axum::http::Method;

    #[tokio::test]
    async fn test_health() -> Result<()> {
        let app = router(setup_app_context().await?);

        let (status, _) = send(&app, Method::GET, "/api/health", None).await;
        assert_eq!(status, StatusCode::OK);

        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_route() -> Result<()> {
        let app = router(setup_app_context().await?);

        let (status, _) = send(&app, Method::GET, "/api/nothing", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        Ok(())
    }
}
