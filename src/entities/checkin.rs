//! NFC check-in entity - One row per recorded card scan.
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Check-in database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "nfc_checkins")]
pub struct Model {
    /// Unique identifier, also the `ref_id` of the check-in's point award
    #[sea_orm(primary_key)]
    pub id: i64,
    /// User who scanned
    pub user_id: String,
    /// Site role at scan time (decides VIP eligibility)
    pub user_role: String,
    /// Event the scan happened at
    pub event_id: Option<String>,
    /// UID read from the card
    pub card_uid: Option<String>,
    /// When the scan was recorded
    pub created_at: DateTimeUtc,
}

/// Check-ins reference users by id only
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
