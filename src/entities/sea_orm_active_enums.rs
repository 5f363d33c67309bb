//! String-backed enums shared by the VIP entities.
//!
//! Each enum is stored as its lowercase snake-case tag so the tables stay readable
//! from any SQL client.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What caused a ledger entry
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum PointSource {
    /// NFC card scan at an event
    #[sea_orm(string_value = "event_checkin")]
    EventCheckin,
    /// Paid POS order
    #[sea_orm(string_value = "consumption_pos")]
    ConsumptionPos,
    /// Staff adjustment or reversal
    #[sea_orm(string_value = "manual_adjust")]
    ManualAdjust,
}

impl PointSource {
    /// Stored tag of this source
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EventCheckin => "event_checkin",
            Self::ConsumptionPos => "consumption_pos",
            Self::ManualAdjust => "manual_adjust",
        }
    }

    /// Parses a stored tag, accepting a few legacy spellings
    #[must_use]
    pub fn parse(tag: &str) -> Option<Self> {
        match tag.trim().to_lowercase().as_str() {
            "event_checkin" | "checkin" => Some(Self::EventCheckin),
            "consumption_pos" | "pos_consumption" | "consumption" => Some(Self::ConsumptionPos),
            "manual_adjust" | "manual" => Some(Self::ManualAdjust),
            _ => None,
        }
    }
}

impl fmt::Display for PointSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// VIP rank, ordered from lowest to highest
#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Entry tier
    #[sea_orm(string_value = "silver")]
    Silver,
    /// Middle tier
    #[sea_orm(string_value = "gold")]
    Gold,
    /// Top tier
    #[sea_orm(string_value = "black")]
    Black,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Silver => "silver",
            Self::Gold => "gold",
            Self::Black => "black",
        })
    }
}

/// Whether a membership may earn points
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum MembershipStatus {
    /// Earning and linkable
    #[sea_orm(string_value = "active")]
    Active,
    /// Blocked from awards and POS customer linking
    #[sea_orm(string_value = "suspended")]
    Suspended,
}

impl fmt::Display for MembershipStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Active => "active",
            Self::Suspended => "suspended",
        })
    }
}

/// POS order lifecycle
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Awaiting payment
    #[sea_orm(string_value = "open")]
    Open,
    /// Settled
    #[sea_orm(string_value = "paid")]
    Paid,
    /// Paid, then refunded
    #[sea_orm(string_value = "refunded")]
    Refunded,
    /// Abandoned before payment
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Open => "open",
            Self::Paid => "paid",
            Self::Refunded => "refunded",
            Self::Cancelled => "cancelled",
        })
    }
}
