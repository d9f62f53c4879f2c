//! Platform abstraction layer.
//!
//! Provides the [`Messenger`] trait for public, private and reply
//! messaging and the [`AudioSink`] trait for voice cues. The engine only
//! needs success/failure signalling from either; rendering is the
//! adapter's concern.

pub mod message;
pub mod stdio;
pub mod wire;

pub use message::{Content, Control, Field, MessageRef, SelectOption};
pub use stdio::{StdioConfig, StdioPlatform};

use serde::{Deserialize, Serialize};

use crate::engine::action::{ChannelId, UserId};
use crate::error::TransportError;

/// Result type alias for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

/// Default maximum inbound line size in bytes (1 MiB).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Default buffer size for the stdio adapter (64 KB).
pub const DEFAULT_STDIO_BUFFER_SIZE: usize = 64 * 1024;

/// Outbound messaging.
///
/// Implementations must be cheap to call concurrently from many sessions.
/// Every method reports delivery failure as an error; callers decide
/// whether to degrade or ignore.
#[async_trait::async_trait]
pub trait Messenger: Send + Sync {
    /// Posts `content` to a public channel.
    async fn send_public(&self, channel: &ChannelId, content: &Content) -> Result<MessageRef>;

    /// Replaces the content of a public message.
    async fn edit_public(&self, message: &MessageRef, content: &Content) -> Result<()>;

    /// Deletes a public message.
    async fn delete_public(&self, message: &MessageRef) -> Result<()>;

    /// Sends a targeted private message using a live reply token.
    async fn send_private(&self, user: &UserId, token: &str, content: &Content) -> Result<()>;

    /// Sends a direct message that needs no token.
    async fn send_direct(&self, user: &UserId, content: &Content) -> Result<()>;

    /// Replies to an interaction.
    async fn reply(&self, token: &str, content: &Content, ephemeral: bool) -> Result<()>;
}

/// A short sound played into the group's voice channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cue {
    /// Ten seconds left on a countdown
    Countdown10,
    /// Generic notification
    Pling,
    /// Chat-style chime
    Chat,
    /// Someone joined
    Join,
    /// Game started
    GameStart,
    /// Interrogation begins
    Punch,
    /// Spy revealed
    GunShot,
    /// Innocent revealed
    Error,
    /// A side succeeded
    Success,
    /// A side failed
    Fail,
    /// Game finished
    Finish,
    /// Round result fanfare
    ScoreAlarm,
    /// Audio connection restored
    Reconnect,
}

/// Voice output for the voice room attached to a channel.
///
/// All calls are fire-and-forget.
pub trait AudioSink: Send + Sync {
    /// Starts playing a cue, replacing any current one.
    fn play_cue(&self, channel: &ChannelId, cue: Cue);

    /// Pauses the current cue.
    fn pause_cue(&self, channel: &ChannelId);

    /// Resumes a paused cue.
    fn resume_cue(&self, channel: &ChannelId);

    /// Stops playback.
    fn stop(&self, channel: &ChannelId);
}
