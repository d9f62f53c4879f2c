//! `partyline` - phase-cycle engine for chat-mediated social deduction games
//!
//! A game is a graph of phases driven by one task per game instance.
//! Sessions bind a core to a chat channel, route participant actions to
//! the active phase and guard each participant's private reply token.
//! `SpyCheck` and `SpyFall` are built on top of the engine; the platform
//! is reached through the [`transport::Messenger`] and
//! [`transport::AudioSink`] traits.

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod games;
pub mod observability;
pub mod transport;
