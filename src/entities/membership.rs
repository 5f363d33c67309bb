//! VIP membership entity - One row per member holding the cached point aggregates.
//!
//! `points_balance` and `lifetime_points` are only ever written by the award,
//! reversal and adjustment paths in `core`, inside the same database transaction
//! as the matching ledger entry.

use super::sea_orm_active_enums::{MembershipStatus, Tier};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// VIP membership database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "vip_memberships")]
pub struct Model {
    /// Owning user (1:1 with a user of the agency site)
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: String,
    /// Rank derived from `lifetime_points`
    pub tier: Tier,
    /// Spendable points, never negative
    pub points_balance: i64,
    /// Total ever earned, never decreases
    pub lifetime_points: i64,
    /// Only active memberships earn points or link to POS orders
    pub status: MembershipStatus,
    /// When the member enrolled
    pub created_at: DateTimeUtc,
    /// Last balance, tier or status change
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between memberships and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One membership has many ledger entries
    #[sea_orm(has_many = "super::points_ledger::Entity")]
    LedgerEntries,
}

impl Related<super::points_ledger::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::LedgerEntries.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
