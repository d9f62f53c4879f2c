//! Configuration module
//!
//! Loads and validates `partyline` configuration files: engine timing,
//! game content sources and per-game rules.

pub mod loader;
pub mod validation;

pub use loader::{ConfigLoader, LoadResult, LoadWarning, LoaderOptions};
pub use partyline_core::config::schema;
pub use partyline_core::config::schema::*;
pub use validation::{ValidationResult, Validator};
