//! Inbound platform actions and the identifiers they carry.

use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(
    /// Platform user identifier.
    UserId
);
string_id!(
    /// Platform channel identifier.
    ChannelId
);
string_id!(
    /// Hosting group (server/guild) identifier.
    GroupId
);

/// What kind of interaction produced an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// A button press
    Button,
    /// A select-menu choice
    Select,
    /// A submitted modal form
    Modal,
    /// A slash command
    Command,
}

impl ActionKind {
    /// Label used for metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Button => "button",
            Self::Select => "select",
            Self::Modal => "modal",
            Self::Command => "command",
        }
    }
}

/// Where an action came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Origin {
    /// A channel inside a hosting group
    Channel {
        /// The hosting group
        group: GroupId,
        /// The channel
        channel: ChannelId,
    },
    /// A private conversation with the bot
    Direct,
}

/// A single inbound interaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundAction {
    /// Interaction kind
    pub kind: ActionKind,
    /// Acting user
    pub actor: UserId,
    /// Acting user's display name
    #[serde(default)]
    pub actor_name: String,
    /// Component or command id (`"join"`, `"vote"`, `"play"`, ...)
    pub custom_id: String,
    /// Selected values, modal fields, or command arguments
    #[serde(default)]
    pub values: Vec<String>,
    /// Where the interaction happened
    pub origin: Origin,
    /// Token allowing a reply to this interaction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_token: Option<String>,
}

impl InboundAction {
    /// Returns `true` if this action has the given kind and custom id.
    #[must_use]
    pub fn is(&self, kind: ActionKind, custom_id: &str) -> bool {
        self.kind == kind && self.custom_id == custom_id
    }

    /// First selected value or argument, if any.
    #[must_use]
    pub fn first_value(&self) -> Option<&str> {
        self.values.first().map(String::as_str)
    }

    /// The channel this action came from, if it was not private.
    #[must_use]
    pub const fn channel(&self) -> Option<&ChannelId> {
        match &self.origin {
            Origin::Channel { channel, .. } => Some(channel),
            Origin::Direct => None,
        }
    }

    /// The hosting group this action came from, if it was not private.
    #[must_use]
    pub const fn group(&self) -> Option<&GroupId> {
        match &self.origin {
            Origin::Channel { group, .. } => Some(group),
            Origin::Direct => None,
        }
    }

    /// Display name, falling back to the user id.
    #[must_use]
    pub fn display_name(&self) -> &str {
        if self.actor_name.is_empty() {
            self.actor.as_str()
        } else {
            &self.actor_name
        }
    }
}
