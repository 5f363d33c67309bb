//! Unified error types for the VIP points service.
//!
//! Every layer (core, HTTP API, staff bot) returns [`Error`] through the crate-wide
//! [`Result`] alias. "Already awarded" is deliberately absent: a repeated award is a
//! successful no-op and is reported through the award result instead.

use crate::entities::{MembershipStatus, OrderStatus};
use poise::serenity_prelude as serenity;
use thiserror::Error;

/// All errors that can occur in the VIP points service
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid or unreadable configuration
    #[error("Configuration error: {message}")]
    Config {
        /// Human-readable description of the problem
        message: String,
    },

    /// The persistence layer failed; the operation did not happen and may be retried
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// The user has no VIP membership
    #[error("No VIP membership for user {user_id}")]
    NoMembership {
        /// User the lookup was made for
        user_id: String,
    },

    /// The user's membership exists but is not active
    #[error("VIP membership for user {user_id} is {status}")]
    MembershipInactive {
        /// User the lookup was made for
        user_id: String,
        /// Current membership status
        status: MembershipStatus,
    },

    /// A monetary or point amount was out of range
    #[error("Invalid amount: {amount}")]
    InvalidAmount {
        /// The rejected amount
        amount: i64,
    },

    /// A point rule was given an unusable rate
    #[error("Invalid points-per-unit rate: {rate}")]
    InvalidRate {
        /// The rejected rate
        rate: f64,
    },

    /// No POS order with this id
    #[error("Order {order_id} not found")]
    OrderNotFound {
        /// Requested order id
        order_id: i64,
    },

    /// The order is in a status that does not allow the requested operation
    #[error("Order {order_id} is {status} and cannot be {action}")]
    InvalidOrderState {
        /// Order id
        order_id: i64,
        /// Current order status
        status: OrderStatus,
        /// What the caller tried to do
        action: &'static str,
    },

    /// No check-in with this id
    #[error("Check-in {checkin_id} not found")]
    CheckInNotFound {
        /// Requested check-in id
        checkin_id: i64,
    },

    /// No point rule with this id
    #[error("Point rule {rule_id} not found")]
    RuleNotFound {
        /// Requested rule id
        rule_id: i64,
    },

    /// Request payload failed validation
    #[error("Validation error: {message}")]
    Validation {
        /// What was wrong with the input
        message: String,
    },

    /// Stripe webhook body could not be interpreted
    #[error("Invalid webhook payload: {message}")]
    Webhook {
        /// What was wrong with the payload
        message: String,
    },

    /// I/O failure (config file, listener)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Missing or malformed environment variable
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    /// Discord framework failure
    #[error("Serenity/Poise framework error: {0}")]
    Framework(Box<serenity::Error>),
}

impl From<serenity::Error> for Error {
    fn from(value: serenity::Error) -> Self {
        Self::Framework(Box::new(value))
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Self::Webhook {
            message: value.to_string(),
        }
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
