//! Command-line interface
//!
//! Argument definitions and per-command handlers for the `partyline`
//! binary.

pub mod args;
pub mod commands;
