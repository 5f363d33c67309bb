//! Points ledger entity - Append-only log of every balance change.
//!
//! Rows are never updated or deleted. `(user_id, source, ref_id)` is unique; the
//! index is created alongside the table in `config::database::create_tables`.

use super::sea_orm_active_enums::PointSource;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Points ledger database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "points_ledger")]
pub struct Model {
    /// Unique identifier for the entry
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Member whose balance changed
    pub user_id: String,
    /// What caused the change
    pub source: PointSource,
    /// Id of the triggering order, check-in or staff action
    pub ref_id: String,
    /// Signed change (negative for reversals)
    pub delta_points: i64,
    /// Membership balance right after this entry was applied
    pub balance_after: i64,
    /// Amount, currency, rule rate or reason, depending on `source`
    pub metadata: Json,
    /// When the entry was written
    pub created_at: DateTimeUtc,
}

/// Defines relationships between ledger entries and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each entry belongs to one membership
    #[sea_orm(
        belongs_to = "super::membership::Entity",
        from = "Column::UserId",
        to = "super::membership::Column::UserId"
    )]
    Membership,
}

impl Related<super::membership::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Membership.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
