//! POS order entity - The minimal slice of an order the settlement path needs.
use super::sea_orm_active_enums::OrderStatus;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// POS order database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "pos_orders")]
pub struct Model {
    /// Unique identifier, also the `ref_id` of the order's point award
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Linked VIP customer, if any
    pub customer_user_id: Option<String>,
    /// Order total in minor currency units (cents)
    pub total_minor: i64,
    /// ISO currency code
    pub currency: String,
    /// Lifecycle status
    pub status: OrderStatus,
    /// Stripe payment intent, once known
    pub stripe_payment_intent_id: Option<String>,
    /// When the order was settled
    pub paid_at: Option<DateTimeUtc>,
    /// When the order was opened
    pub created_at: DateTimeUtc,
    /// Last status change
    pub updated_at: DateTimeUtc,
}

/// Orders reference users by id only
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
