//! Configuration schema shared across the workspace.

pub mod schema;
