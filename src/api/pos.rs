use crate::{
    config::settings::AppContext,
    core::pos::{self as pos_core, SettlementChannel},
    entities::{OrderStatus, order},
    errors::{Error, Result},
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;

/// Body of `POST /api/pos/orders`
#[derive(Debug, Deserialize)]
pub struct CreateOrderPayload {
    /// Order total in minor currency units
    pub total_minor: i64,
    /// ISO currency code
    pub currency: String,
    /// VIP customer to credit, if known at creation
    #[serde(default)]
    pub customer_user_id: Option<String>,
}

/// Body of `PUT /api/pos/orders/:order_id`
#[derive(Debug, Deserialize)]
pub struct UpdateOrderPayload {
    /// Target status: `paid`, `refunded` or `cancelled`
    pub status: OrderStatus,
    /// Stripe payment intent the order was paid with
    #[serde(default)]
    pub payment_intent_id: Option<String>,
}

/// Body of `PUT /api/pos/orders/:order_id/customer`
#[derive(Debug, Deserialize)]
pub struct LinkCustomerPayload {
    /// VIP member to link
    pub user_id: String,
}

/// `POST /api/pos/orders` - opens an order.
pub async fn create_order(
    State(context): State<AppContext>,
    Json(payload): Json<CreateOrderPayload>,
) -> Result<(StatusCode, Json<order::Model>)> {
    let order = pos_core::create_order(
        &context.database,
        payload.total_minor,
        &payload.currency,
        payload.customer_user_id.as_deref(),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// `GET /api/pos/orders/:order_id`
pub async fn get_order(
    State(context): State<AppContext>,
    Path(order_id): Path<i64>,
) -> Result<Json<order::Model>> {
    pos_core::get_order(&context.database, order_id)
        .await?
        .map(Json)
        .ok_or(Error::OrderNotFound { order_id })
}

/// Staff-side status change. Marking paid runs the same settlement as the Stripe webhook.
pub async fn update_order(
    State(context): State<AppContext>,
    Path(order_id): Path<i64>,
    Json(payload): Json<UpdateOrderPayload>,
) -> Result<Response> {
    match payload.status {
        OrderStatus::Paid => {
            let outcome = pos_core::settle_order(
                &context.database,
                &context.loyalty,
                order_id,
                SettlementChannel::Staff,
                payload.payment_intent_id.as_deref(),
            )
            .await?;
            Ok(Json(outcome).into_response())
        }
        OrderStatus::Refunded | OrderStatus::Cancelled => {
            let outcome = pos_core::refund_order(&context.database, order_id).await?;
            Ok(Json(outcome).into_response())
        }
        OrderStatus::Open => Err(Error::Validation {
            message: "Orders cannot be moved back to open".to_string(),
        }),
    }
}

/// `PUT /api/pos/orders/:order_id/customer` - attaches a VIP customer to an open order.
pub async fn link_customer(
    State(context): State<AppContext>,
    Path(order_id): Path<i64>,
    Json(payload): Json<LinkCustomerPayload>,
) -> Result<Json<order::Model>> {
    let order = pos_core::link_customer(&context.database, order_id, &payload.user_id).await?;
    Ok(Json(order))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use crate::{
        api::{router, test_support::send},
        core::membership,
        errors::Result,
        test_utils::setup_app_context,
    };
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    #[tokio::test]
    async fn test_order_lifecycle_over_http() -> Result<()> {
        let context = setup_app_context().await?;
        membership::enroll_member(&context.database, "vip-1").await?;
        let app = router(context);

        let (status, order) = send(
            &app,
            Method::POST,
            "/api/pos/orders",
            Some(json!({ "total_minor": 900, "currency": "USD" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = order["id"].as_i64().unwrap();

        let (status, linked) = send(
            &app,
            Method::PUT,
            &format!("/api/pos/orders/{id}/customer"),
            Some(json!({ "user_id": "vip-1" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(linked["customer_user_id"], "vip-1");

        let (status, paid) = send(
            &app,
            Method::PUT,
            &format!("/api/pos/orders/{id}"),
            Some(json!({ "status": "paid" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(paid["order"]["status"], "paid");
        assert_eq!(paid["points"]["status"], "awarded");
        assert_eq!(paid["points"]["points_awarded"], 9);

        let (status, refunded) = send(
            &app,
            Method::PUT,
            &format!("/api/pos/orders/{id}"),
            Some(json!({ "status": "refunded" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(refunded["order"]["status"], "refunded");
        assert_eq!(refunded["points_reversed"], 9);

        Ok(())
    }

    #[tokio::test]
    async fn test_link_customer_without_membership() -> Result<()> {
        let app = router(setup_app_context().await?);

        let (_, order) = send(
            &app,
            Method::POST,
            "/api/pos/orders",
            Some(json!({ "total_minor": 900, "currency": "USD" })),
        )
        .await;
        let id = order["id"].as_i64().unwrap();

        let (status, body) = send(
            &app,
            Method::PUT,
            &format!("/api/pos/orders/{id}/customer"),
            Some(json!({ "user_id": "ghost" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("ghost"));

        Ok(())
    }

    #[tokio::test]
    async fn test_missing_order() -> Result<()> {
        let app = router(setup_app_context().await?);

        let (status, _) = send(&app, Method::GET, "/api/pos/orders/42", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        Ok(())
    }
}
