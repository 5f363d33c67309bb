//! Entity module - Contains all SeaORM entity definitions for the database.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod checkin;
pub mod membership;
pub mod order;
pub mod point_rule;
pub mod points_ledger;
pub mod sea_orm_active_enums;

// Re-export specific types to avoid conflicts
pub use checkin::{Column as CheckInColumn, Entity as CheckIn, Model as CheckInModel};
pub use membership::{Column as MembershipColumn, Entity as Membership, Model as MembershipModel};
pub use order::{Column as OrderColumn, Entity as Order, Model as OrderModel};
pub use point_rule::{Column as PointRuleColumn, Entity as PointRule, Model as PointRuleModel};
pub use points_ledger::{
    Column as PointsLedgerColumn, Entity as PointsLedger, Model as PointsLedgerModel,
};
pub use sea_orm_active_enums::{MembershipStatus, OrderStatus, PointSource, Tier};
