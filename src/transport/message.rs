//! Outbound message content.
//!
//! `Content` is the platform-neutral shape of everything the engine
//! shows: a title, a body, labelled fields, and interactive controls.
//! The platform adapter decides how to render it.

use serde::{Deserialize, Serialize};

use crate::engine::action::ChannelId;

/// A reference to a public message that can later be edited or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageRef {
    /// Channel holding the message
    pub channel: ChannelId,
    /// Platform-assigned message id
    pub id: u64,
}

/// A labelled value inside a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    /// Field label
    pub name: String,
    /// Field value
    pub value: String,
}

/// One entry of a select menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    /// Visible label
    pub label: String,
    /// Value delivered back in the action
    pub value: String,
}

impl SelectOption {
    /// Creates an option whose label and value may differ.
    #[must_use]
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

/// An interactive control attached to a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Control {
    /// A push button
    Button {
        /// Custom id delivered back on press
        id: String,
        /// Button label
        label: String,
    },
    /// A single-choice select menu
    Select {
        /// Custom id delivered back on choice
        id: String,
        /// Placeholder text
        placeholder: String,
        /// Menu entries
        options: Vec<SelectOption>,
    },
    /// A button that opens a text-input form
    Modal {
        /// Custom id delivered back on submit
        id: String,
        /// Form title
        title: String,
    },
}

/// Platform-neutral message body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Content {
    /// Optional heading
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Main text
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub body: String,
    /// Labelled fields
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<Field>,
    /// Interactive controls
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub controls: Vec<Control>,
}

impl Content {
    /// Plain text message.
    #[must_use]
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            ..Self::default()
        }
    }

    /// Message with a heading.
    #[must_use]
    pub fn titled(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            body: body.into(),
            ..Self::default()
        }
    }

    /// Appends a labelled field.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push(Field {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    /// Appends a button.
    #[must_use]
    pub fn button(mut self, id: impl Into<String>, label: impl Into<String>) -> Self {
        self.controls.push(Control::Button {
            id: id.into(),
            label: label.into(),
        });
        self
    }

    /// Appends a select menu.
    #[must_use]
    pub fn select(
        mut self,
        id: impl Into<String>,
        placeholder: impl Into<String>,
        options: Vec<SelectOption>,
    ) -> Self {
        self.controls.push(Control::Select {
            id: id.into(),
            placeholder: placeholder.into(),
            options,
        });
        self
    }

    /// Appends a modal trigger.
    #[must_use]
    pub fn modal(mut self, id: impl Into<String>, title: impl Into<String>) -> Self {
        self.controls.push(Control::Modal {
            id: id.into(),
            title: title.into(),
        });
        self
    }

    /// Appends a line to the body.
    #[must_use]
    pub fn line(mut self, text: impl AsRef<str>) -> Self {
        if !self.body.is_empty() {
            self.body.push('\n');
        }
        self.body.push_str(text.as_ref());
        self
    }

    /// Returns `true` if any control carries `id`.
    #[must_use]
    pub fn has_control(&self, id: &str) -> bool {
        self.controls.iter().any(|c| match c {
            Control::Button { id: cid, .. }
            | Control::Select { id: cid, .. }
            | Control::Modal { id: cid, .. } => cid == id,
        })
    }
}
