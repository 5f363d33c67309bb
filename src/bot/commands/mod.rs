//! Discord command implementations organized by category.

#![allow(clippy::too_long_first_doc_paragraph)]

/// General utility commands
pub mod general;

/// Points lookup and correction commands
pub mod points;

// Export commands
pub use general::*;
pub use points::*;
