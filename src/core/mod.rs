//! Core business logic for the VIP points program.
//!
//! Everything here is independent of the HTTP API and the staff bot: functions take a
//! database connection plus plain values and return the crate [`Result`](crate::errors::Result).

pub mod adjustment;
pub mod award;
pub mod checkin;
pub mod ledger;
pub mod membership;
pub mod pos;
pub mod reversal;
pub mod rules;
