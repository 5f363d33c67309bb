//! Point rule entity - Earning rates per action type.
//!
//! Rules are read-only at award time. When several active rules share an
//! `action_type`, the highest `points_per_unit` is used.
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Point rule database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "vip_point_rules")]
pub struct Model {
    /// Unique identifier for the rule
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Source-like tag, e.g. `"consumption_pos"` or `"event_checkin"`
    pub action_type: String,
    /// Points per currency unit, or per occurrence for flat sources
    pub points_per_unit: f64,
    /// Whether the rule may be selected
    pub is_active: bool,
    /// When the rule was created
    pub created_at: DateTimeUtc,
}

/// Point rules have no relationships with other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
