//! Stripe webhook ingestion.
//!
//! Stripe delivers at least once and in any order relative to the staff client, so
//! every branch here is idempotent and ends in the same core calls the staff API uses.
//! Events that cannot be acted on are acknowledged with `200` so Stripe stops
//! retrying; storage failures return `503` so it retries later.

use crate::{
    config::settings::AppContext,
    core::pos::{self, SettlementChannel},
    errors::{Error, Result},
};
use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, instrument, warn};

/// The subset of a Stripe event envelope this service reads
#[derive(Debug, Clone, Deserialize)]
pub struct StripeEvent {
    /// Stripe event id (`evt_...`)
    pub id: String,
    /// Event type, e.g. `payment_intent.succeeded`
    #[serde(rename = "type")]
    pub event_type: String,
    /// Event payload
    pub data: StripeEventData,
}

/// `data` member of a Stripe event
#[derive(Debug, Clone, Deserialize)]
pub struct StripeEventData {
    /// The Stripe object the event is about
    pub object: StripeObject,
}

/// Fields shared by the payment intent, checkout session and charge objects
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StripeObject {
    /// Object id (`pi_...`, `cs_...`, `ch_...`)
    #[serde(default)]
    pub id: Option<String>,
    /// Payment intent the object belongs to (sessions and charges)
    #[serde(default)]
    pub payment_intent: Option<String>,
    /// Free-form metadata set when the payment was created
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl StripeObject {
    /// `metadata.order_id`, accepted as a string or a number
    #[must_use]
    pub fn order_id(&self) -> Option<i64> {
        match self.metadata.get("order_id")? {
            Value::String(s) => s.trim().parse().ok(),
            Value::Number(n) => n.as_i64(),
            _ => None,
        }
    }
}

/// What an event asks the service to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookAction {
    /// Mark the order paid and award its points
    Settle {
        /// Order from `metadata.order_id`
        order_id: i64,
        /// Payment intent to record on the order
        payment_intent_id: Option<String>,
    },
    /// Refund the order (by id, or found through its payment intent)
    Refund {
        /// Order from `metadata.order_id`, if present
        order_id: Option<i64>,
        /// Payment intent of the refunded charge
        payment_intent_id: Option<String>,
    },
    /// Nothing to do
    Ignore {
        /// Why the event was skipped
        reason: String,
    },
}

/// Parses a raw webhook body.
pub fn parse_event(body: &str) -> Result<StripeEvent> {
    serde_json::from_str(body).map_err(Into::into)
}

/// Decides what an event means for POS orders.
#[must_use]
pub fn action_for(event: &StripeEvent) -> WebhookAction {
    let object = &event.data.object;
    match event.event_type.as_str() {
        "payment_intent.succeeded" | "checkout.session.completed" => {
            let payment_intent_id = if event.event_type == "payment_intent.succeeded" {
                object.id.clone()
            } else {
                object.payment_intent.clone()
            };
            match object.order_id() {
                Some(order_id) => WebhookAction::Settle {
                    order_id,
                    payment_intent_id,
                },
                None => WebhookAction::Ignore {
                    reason: "no order_id in metadata".to_string(),
                },
            }
        }
        "charge.refunded" => {
            let order_id = object.order_id();
            if order_id.is_none() && object.payment_intent.is_none() {
                WebhookAction::Ignore {
                    reason: "refund carries neither order_id nor payment intent".to_string(),
                }
            } else {
                WebhookAction::Refund {
                    order_id,
                    payment_intent_id: object.payment_intent.clone(),
                }
            }
        }
        other => WebhookAction::Ignore {
            reason: format!("unhandled event type {other}"),
        },
    }
}

/// Acknowledgement returned to Stripe
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebhookAck {
    /// Always true; failures that need a retry are returned as errors instead
    pub received: bool,
    /// What the service did: `settled`, `refunded` or `ignored`
    pub action: &'static str,
    /// Extra context, e.g. why the event was ignored
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl WebhookAck {
    const fn done(action: &'static str) -> Self {
        Self {
            received: true,
            action,
            detail: None,
        }
    }

    fn ignored(detail: impl Into<String>) -> Self {
        Self {
            received: true,
            action: "ignored",
            detail: Some(detail.into()),
        }
    }
}

/// `POST /api/webhooks/stripe`
#[instrument(skip(context, body))]
pub async fn stripe(State(context): State<AppContext>, body: String) -> Result<Json<WebhookAck>> {
    let event = parse_event(&body)?;
    info!(event_id = %event.id, event_type = %event.event_type, "Stripe event received");

    let ack = match action_for(&event) {
        WebhookAction::Settle {
            order_id,
            payment_intent_id,
        } => {
            match pos::settle_order(
                &context.database,
                &context.loyalty,
                order_id,
                SettlementChannel::StripeWebhook,
                payment_intent_id.as_deref(),
            )
            .await
            {
                Ok(_) => WebhookAck::done("settled"),
                Err(e @ (Error::OrderNotFound { .. } | Error::InvalidOrderState { .. })) => {
                    warn!(event_id = %event.id, error = %e, "Settlement event not applicable");
                    WebhookAck::ignored(e.to_string())
                }
                Err(e) => return Err(e),
            }
        }
        WebhookAction::Refund {
            order_id,
            payment_intent_id,
        } => {
            let order_id = match (order_id, payment_intent_id) {
                (Some(id), _) => Some(id),
                (None, Some(intent)) => {
                    pos::get_order_by_payment_intent(&context.database, &intent)
                        .await?
                        .map(|order| order.id)
                }
                (None, None) => None,
            };
            match order_id {
                Some(order_id) => match pos::refund_order(&context.database, order_id).await {
                    Ok(_) => WebhookAck::done("refunded"),
                    Err(e @ Error::OrderNotFound { .. }) => WebhookAck::ignored(e.to_string()),
                    Err(e) => return Err(e),
                },
                None => WebhookAck::ignored("no order matches the refunded payment"),
            }
        }
        WebhookAction::Ignore { reason } => WebhookAck::ignored(reason),
    };

    Ok(Json(ack))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::{
        api::{router, test_support::send},
        core::{ledger, membership},
        entities::OrderStatus,
        test_utils::{create_test_order, setup_app_context},
    };
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    fn event(event_type: &str, object: &Value) -> StripeEvent {
        serde_json::from_value(json!({
            "id": "evt_1",
            "type": event_type,
            "data": { "object": object },
        }))
        .unwrap()
    }

    #[test]
    fn test_action_for_payment_intent_succeeded() {
        let action = action_for(&event(
            "payment_intent.succeeded",
            &json!({ "id": "pi_1", "metadata": { "order_id": "12" } }),
        ));
        assert_eq!(
            action,
            WebhookAction::Settle {
                order_id: 12,
                payment_intent_id: Some("pi_1".to_string()),
            }
        );
    }

    #[test]
    fn test_action_for_checkout_session() {
        let action = action_for(&event(
            "checkout.session.completed",
            &json!({ "id": "cs_1", "payment_intent": "pi_9", "metadata": { "order_id": 7 } }),
        ));
        assert_eq!(
            action,
            WebhookAction::Settle {
                order_id: 7,
                payment_intent_id: Some("pi_9".to_string()),
            }
        );
    }

    #[test]
    fn test_action_for_ignored_events() {
        assert!(matches!(
            action_for(&event("payment_intent.succeeded", &json!({ "id": "pi_1" }))),
            WebhookAction::Ignore { .. }
        ));
        assert!(matches!(
            action_for(&event("customer.created", &json!({ "id": "cus_1" }))),
            WebhookAction::Ignore { .. }
        ));
        assert!(matches!(
            action_for(&event("charge.refunded", &json!({ "id": "ch_1" }))),
            WebhookAction::Ignore { .. }
        ));
    }

    #[test]
    fn test_parse_event_rejects_garbage() {
        assert!(matches!(parse_event("not json"), Err(Error::Webhook { .. })));
    }

    #[tokio::test]
    async fn test_webhook_settles_once_after_staff_settlement() -> Result<()> {
        let context = setup_app_context().await?;
        membership::enroll_member(&context.database, "vip-1").await?;
        let order = create_test_order(&context.database, 900, Some("vip-1")).await?;
        let app = router(context.clone());

        let (status, _) = send(
            &app,
            Method::PUT,
            &format!("/api/pos/orders/{}", order.id),
            Some(json!({ "status": "paid" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let body = json!({
            "id": "evt_1",
            "type": "payment_intent.succeeded",
            "data": { "object": { "id": "pi_1", "metadata": { "order_id": order.id.to_string() } } },
        });
        for _ in 0..2 {
            let (status, ack) = send(&app, Method::POST, "/api/webhooks/stripe", Some(body.clone())).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(ack["action"], "settled");
        }

        let stored = membership::get_membership(&context.database, "vip-1").await?.unwrap();
        assert_eq!(stored.points_balance, 9);
        assert_eq!(ledger::get_entries_for_user(&context.database, "vip-1", None).await?.len(), 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_webhook_refund_by_payment_intent() -> Result<()> {
        let context = setup_app_context().await?;
        membership::enroll_member(&context.database, "vip-1").await?;
        let order = create_test_order(&context.database, 900, Some("vip-1")).await?;
        pos::settle_order(
            &context.database,
            &context.loyalty,
            order.id,
            SettlementChannel::StripeWebhook,
            Some("pi_7"),
        )
        .await?;
        let app = router(context.clone());

        let body = json!({
            "id": "evt_2",
            "type": "charge.refunded",
            "data": { "object": { "id": "ch_1", "payment_intent": "pi_7" } },
        });
        let (status, ack) = send(&app, Method::POST, "/api/webhooks/stripe", Some(body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ack["action"], "refunded");

        let stored = pos::get_order(&context.database, order.id).await?.unwrap();
        assert_eq!(stored.status, OrderStatus::Refunded);
        let member = membership::get_membership(&context.database, "vip-1").await?.unwrap();
        assert_eq!(member.points_balance, 0);

        Ok(())
    }

    #[tokio::test]
    async fn test_webhook_unknown_order_is_acknowledged() -> Result<()> {
        let app = router(setup_app_context().await?);

        let body = json!({
            "id": "evt_3",
            "type": "payment_intent.succeeded",
            "data": { "object": { "id": "pi_1", "metadata": { "order_id": "999" } } },
        });
        let (status, ack) = send(&app, Method::POST, "/api/webhooks/stripe", Some(body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ack["action"], "ignored");

        Ok(())
    }

    #[tokio::test]
    async fn test_webhook_malformed_body() -> Result<()> {
        let app = router(setup_app_context().await?);

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/webhooks/stripe",
            Some(json!({ "hello": "world" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());

        Ok(())
    }
}
