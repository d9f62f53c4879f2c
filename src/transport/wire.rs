//! NDJSON wire types for the stdio platform adapter.
//!
//! Inbound lines are [`InboundAction`] objects. Outbound lines are
//! [`Outbound`] operations tagged by `"op"`.

use serde::{Deserialize, Serialize};

use super::{Content, Cue};
use crate::engine::action::{ChannelId, UserId};

pub use crate::engine::action::InboundAction;

/// What an audio operation does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioAction {
    /// Start a cue
    Play,
    /// Pause playback
    Pause,
    /// Resume playback
    Resume,
    /// Stop playback
    Stop,
}

/// One outbound operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Outbound {
    /// A new public message
    SendPublic {
        /// Target channel
        channel: ChannelId,
        /// Id assigned to the message
        message_id: u64,
        /// Message body
        content: Content,
    },
    /// A public message edit
    EditPublic {
        /// Channel holding the message
        channel: ChannelId,
        /// Edited message id
        message_id: u64,
        /// Replacement body
        content: Content,
    },
    /// A public message deletion
    DeletePublic {
        /// Channel holding the message
        channel: ChannelId,
        /// Deleted message id
        message_id: u64,
    },
    /// A token-backed private message
    SendPrivate {
        /// Recipient
        user: UserId,
        /// Reply token used for delivery
        token: String,
        /// Message body
        content: Content,
    },
    /// A tokenless direct message
    SendDirect {
        /// Recipient
        user: UserId,
        /// Message body
        content: Content,
    },
    /// A reply to an interaction
    Reply {
        /// Interaction reply token
        token: String,
        /// Whether only the actor sees it
        ephemeral: bool,
        /// Message body
        content: Content,
    },
    /// A voice operation
    Audio {
        /// Channel whose voice room is addressed
        channel: ChannelId,
        /// Operation
        action: AudioAction,
        /// Cue for `play`
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cue: Option<Cue>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outbound_tagged_by_op() {
        let op = Outbound::SendPublic {
            channel: ChannelId::from("c1"),
            message_id: 4,
            content: Content::text("hello"),
        };
        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(json["op"], "send_public");
        assert_eq!(json["message_id"], 4);
        assert_eq!(json["content"]["body"], "hello");
    }

    #[test]
    fn test_audio_play_carries_cue() {
        let op = Outbound::Audio {
            channel: ChannelId::from("c1"),
            action: AudioAction::Play,
            cue: Some(Cue::Countdown10),
        };
        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(json["op"], "audio");
        assert_eq!(json["action"], "play");
        assert_eq!(json["cue"], "countdown10");

        let stop = Outbound::Audio {
            channel: ChannelId::from("c1"),
            action: AudioAction::Stop,
            cue: None,
        };
        assert!(serde_json::to_value(&stop).unwrap().get("cue").is_none());
    }
}
