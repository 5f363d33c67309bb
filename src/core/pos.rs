//! POS settlement - order lifecycle and the points side effect of payment.
//!
//! Settlement arrives from two unordered, at-least-once triggers: the staff client
//! confirming payment and the Stripe webhook. Both call [`settle_order`]. Marking the
//! order paid is a conditional update, and the award is keyed by the order id, so any
//! interleaving of the two ends with one paid order and one award.

use crate::{
    config::loyalty::LoyaltyConfig,
    core::{
        award::{self, AwardBasis, PointsOutcome},
        membership, reversal,
    },
    entities::{Order, OrderStatus, PointSource, order},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{Set, prelude::*, sea_query::Expr};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};

/// Who reported the payment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementChannel {
    /// Authenticated staff-facing API
    Staff,
    /// Stripe webhook delivery
    StripeWebhook,
}

/// Result of settling an order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettlementOutcome {
    /// The order after settlement
    pub order: order::Model,
    /// False when the order was already paid before this call
    pub newly_paid: bool,
    /// Best-effort points side effect
    pub points: PointsOutcome,
}

/// Result of refunding or cancelling an order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefundOutcome {
    /// The order after the call
    pub order: order::Model,
    /// Points reversed, if a reversal ran
    pub points_reversed: Option<i64>,
    /// Reversal failure, if any (the refund itself still stands)
    pub reversal_error: Option<String>,
}

fn normalize_currency(currency: &str) -> Result<String> {
    let code = currency.trim().to_uppercase();
    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(Error::Validation {
            message: format!("Invalid currency code '{currency}'"),
        });
    }
    Ok(code)
}

/// Opens a POS order. A customer, when given, must hold an active membership.
pub async fn create_order(
    db: &DatabaseConnection,
    total_minor: i64,
    currency: &str,
    customer_user_id: Option<&str>,
) -> Result<order::Model> {
    if total_minor < 0 {
        return Err(Error::InvalidAmount {
            amount: total_minor,
        });
    }
    let currency = normalize_currency(currency)?;

    if let Some(customer) = customer_user_id {
        membership::require_active_membership(db, customer).await?;
    }

    let now = Utc::now();
    let order = order::ActiveModel {
        customer_user_id: Set(customer_user_id.map(str::to_string)),
        total_minor: Set(total_minor),
        currency: Set(currency),
        status: Set(OrderStatus::Open),
        stripe_payment_intent_id: Set(None),
        paid_at: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    order.insert(db).await.map_err(Into::into)
}

/// Finds an order by id.
pub async fn get_order(db: &DatabaseConnection, order_id: i64) -> Result<Option<order::Model>> {
    Order::find_by_id(order_id).one(db).await.map_err(Into::into)
}

/// Finds the order a Stripe payment intent belongs to.
pub async fn get_order_by_payment_intent(
    db: &DatabaseConnection,
    payment_intent_id: &str,
) -> Result<Option<order::Model>> {
    Order::find()
        .filter(order::Column::StripePaymentIntentId.eq(payment_intent_id))
        .one(db)
        .await
        .map_err(Into::into)
}

async fn require_order(db: &DatabaseConnection, order_id: i64) -> Result<order::Model> {
    get_order(db, order_id)
        .await?
        .ok_or(Error::OrderNotFound { order_id })
}

/// Links a VIP customer to an open order.
///
/// # Errors
/// `NoMembership` / `MembershipInactive` for customers who cannot earn, and
/// `InvalidOrderState` once the order has left `open`.
pub async fn link_customer(
    db: &DatabaseConnection,
    order_id: i64,
    user_id: &str,
) -> Result<order::Model> {
    let order = require_order(db, order_id).await?;
    if order.status != OrderStatus::Open {
        return Err(Error::InvalidOrderState {
            order_id,
            status: order.status,
            action: "linked to a customer",
        });
    }

    membership::require_active_membership(db, user_id).await?;

    let mut active_model: order::ActiveModel = order.into();
    active_model.customer_user_id = Set(Some(user_id.to_string()));
    active_model.updated_at = Set(Utc::now());
    active_model.update(db).await.map_err(Into::into)
}

/// Records the Stripe payment intent an order is being paid with.
pub async fn attach_payment_intent(
    db: &DatabaseConnection,
    order_id: i64,
    payment_intent_id: &str,
) -> Result<order::Model> {
    let order = require_order(db, order_id).await?;
    if order.stripe_payment_intent_id.as_deref() == Some(payment_intent_id) {
        return Ok(order);
    }

    let mut active_model: order::ActiveModel = order.into();
    active_model.stripe_payment_intent_id = Set(Some(payment_intent_id.to_string()));
    active_model.updated_at = Set(Utc::now());
    active_model.update(db).await.map_err(Into::into)
}

/// Marks an order paid and awards its points to the linked customer.
///
/// Safe to call any number of times from either channel. The points award never
/// affects the payment outcome; its failure is logged and reported in the result.
#[instrument(skip(db, loyalty))]
pub async fn settle_order(
    db: &DatabaseConnection,
    loyalty: &LoyaltyConfig,
    order_id: i64,
    channel: SettlementChannel,
    payment_intent_id: Option<&str>,
) -> Result<SettlementOutcome> {
    let order = require_order(db, order_id).await?;

    let newly_paid = match order.status {
        OrderStatus::Open => mark_paid(db, order_id, payment_intent_id).await?,
        OrderStatus::Paid => false,
        OrderStatus::Refunded | OrderStatus::Cancelled => {
            warn!(status = %order.status, "Settlement received for a closed order");
            return Err(Error::InvalidOrderState {
                order_id,
                status: order.status,
                action: "settled",
            });
        }
    };
    let order = require_order(db, order_id).await?;
    if order.status != OrderStatus::Paid {
        // Cancelled between the status read and the conditional update
        warn!(status = %order.status, "Order closed while settling");
        return Err(Error::InvalidOrderState {
            order_id,
            status: order.status,
            action: "settled",
        });
    }

    if newly_paid {
        info!(total_minor = order.total_minor, "Order marked paid");
    } else {
        info!("Order already paid, re-running points settlement");
    }

    let points = match order.customer_user_id.as_deref() {
        None => PointsOutcome::NotApplicable,
        Some(customer) => {
            award::award_best_effort(
                db,
                &loyalty.tiers,
                customer,
                PointSource::ConsumptionPos,
                &order.id.to_string(),
                AwardBasis::Spend {
                    amount_minor: order.total_minor,
                    currency: order.currency.clone(),
                },
            )
            .await
        }
    };

    // A refund that closed the order before the award landed found nothing to reverse
    let order = require_order(db, order_id).await?;
    if order.status == OrderStatus::Refunded && matches!(points, PointsOutcome::Awarded(_)) {
        warn!("Order refunded while its points were being awarded, reversing");
        reverse_order_points(db, &order).await;
    }

    Ok(SettlementOutcome {
        order,
        newly_paid,
        points,
    })
}

/// Moves `open` to `paid` only if nobody else did first. Returns whether this call won.
async fn mark_paid(
    db: &DatabaseConnection,
    order_id: i64,
    payment_intent_id: Option<&str>,
) -> Result<bool> {
    let now = Utc::now();
    let mut update = Order::update_many()
        .col_expr(order::Column::Status, Expr::value(OrderStatus::Paid))
        .col_expr(order::Column::PaidAt, Expr::value(now))
        .col_expr(order::Column::UpdatedAt, Expr::value(now));
    if let Some(intent) = payment_intent_id {
        update = update.col_expr(
            order::Column::StripePaymentIntentId,
            Expr::value(intent.to_string()),
        );
    }

    let result = update
        .filter(order::Column::Id.eq(order_id))
        .filter(order::Column::Status.eq(OrderStatus::Open))
        .exec(db)
        .await?;
    Ok(result.rows_affected == 1)
}

/// Refunds a paid order (reversing its points) or cancels an open one.
///
/// Refunded and cancelled orders are returned unchanged. A reversal failure is logged
/// and reported; the refund still stands.
#[instrument(skip(db))]
pub async fn refund_order(db: &DatabaseConnection, order_id: i64) -> Result<RefundOutcome> {
    loop {
        let order = require_order(db, order_id).await?;

        let target = match order.status {
            OrderStatus::Paid => OrderStatus::Refunded,
            OrderStatus::Open => OrderStatus::Cancelled,
            OrderStatus::Refunded | OrderStatus::Cancelled => {
                return Ok(RefundOutcome {
                    order,
                    points_reversed: None,
                    reversal_error: None,
                });
            }
        };

        let result = Order::update_many()
            .col_expr(order::Column::Status, Expr::value(target))
            .col_expr(order::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(order::Column::Id.eq(order_id))
            .filter(order::Column::Status.eq(order.status))
            .exec(db)
            .await?;
        if result.rows_affected == 0 {
            // Settled or closed underneath us; decide again from the stored status
            debug!(status = %order.status, "Order changed during refund, retrying");
            continue;
        }

        let order = require_order(db, order_id).await?;
        info!(status = %target, "Order closed");

        let (points_reversed, reversal_error) = if target == OrderStatus::Refunded {
            reverse_order_points(db, &order).await
        } else {
            (None, None)
        };

        return Ok(RefundOutcome {
            order,
            points_reversed,
            reversal_error,
        });
    }
}

/// Takes back the points a refunded order earned. Failures are logged and returned.
async fn reverse_order_points(
    db: &DatabaseConnection,
    order: &order::Model,
) -> (Option<i64>, Option<String>) {
    let Some(customer) = order.customer_user_id.as_deref() else {
        return (None, None);
    };

    match reversal::reverse_points(
        db,
        customer,
        PointSource::ConsumptionPos,
        &order.id.to_string(),
    )
    .await
    {
        Ok(reversed) => (Some(reversed.points_reversed), None),
        Err(e) => {
            error!(
                user_id = customer,
                source = %PointSource::ConsumptionPos,
                ref_id = order.id,
                error = %e,
                "Points reversal failed, refund kept"
            );
            (None, Some(e.to_string()))
        }
    }
}
