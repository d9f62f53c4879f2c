//! `partyline` core: shared types and configuration schema
//!
//! Configuration and error types shared by the `partyline` engine and its
//! command-line front end.

pub mod config;
pub mod error;
