//! Typed game options and the per-group options cache.

use dashmap::DashMap;
use indexmap::IndexMap;
use partyline_core::config::schema::GameKind;

use super::action::GroupId;
use crate::transport::{Content, SelectOption};

/// Select id of the option picker.
pub const OPTION_TYPE_SELECT: &str = "option_type_select";

/// Prefix of the value picker; the option id follows the `#`.
pub const OPTION_VALUE_SELECT: &str = "option_value_select#";

/// One allowed value of an option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    /// Menu label
    pub label: String,
    /// Stored value
    pub value: String,
}

/// One configurable setting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameOption {
    /// Stable id
    pub id: String,
    /// Menu label
    pub label: String,
    /// Allowed values
    pub choices: Vec<Choice>,
    /// Index into `choices`
    pub selected: usize,
}

impl GameOption {
    /// Builds an option whose labels equal their values.
    #[must_use]
    pub fn new(id: &str, label: &str, values: &[&str], default: &str) -> Self {
        let choices: Vec<Choice> = values
            .iter()
            .map(|v| Choice {
                label: (*v).to_string(),
                value: (*v).to_string(),
            })
            .collect();
        let selected = choices.iter().position(|c| c.value == default).unwrap_or(0);
        Self {
            id: id.to_string(),
            label: label.to_string(),
            choices,
            selected,
        }
    }

    /// Builds a numeric option over `start..=end` in `step`s.
    #[must_use]
    pub fn range(id: &str, label: &str, start: u64, end: u64, step: u64, default: u64) -> Self {
        let values: Vec<String> = (start..=end)
            .step_by(usize::try_from(step.max(1)).unwrap_or(1))
            .map(|v| v.to_string())
            .collect();
        let refs: Vec<&str> = values.iter().map(String::as_str).collect();
        Self::new(id, label, &refs, &default.to_string())
    }

    /// Builds an off/on option.
    #[must_use]
    pub fn toggle(id: &str, label: &str, default: bool) -> Self {
        Self::new(id, label, &["false", "true"], if default { "true" } else { "false" })
    }

    /// The selected choice.
    #[must_use]
    pub fn current(&self) -> Option<&Choice> {
        self.choices.get(self.selected)
    }
}

/// An ordered set of options keyed by id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GameOptions {
    options: IndexMap<String, GameOption>,
}

impl GameOptions {
    /// Collects options in menu order.
    #[must_use]
    pub fn new(options: impl IntoIterator<Item = GameOption>) -> Self {
        Self {
            options: options.into_iter().map(|o| (o.id.clone(), o)).collect(),
        }
    }

    /// Looks up an option.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&GameOption> {
        self.options.get(id)
    }

    /// Iterates options in menu order.
    pub fn iter(&self) -> impl Iterator<Item = &GameOption> {
        self.options.values()
    }

    /// Selects `value` for option `id`. Returns `false` if either is
    /// unknown.
    pub fn select(&mut self, id: &str, value: &str) -> bool {
        let Some(option) = self.options.get_mut(id) else {
            return false;
        };
        match option.choices.iter().position(|c| c.value == value) {
            Some(index) => {
                option.selected = index;
                true
            }
            None => false,
        }
    }

    /// Selected value of `id`.
    #[must_use]
    pub fn selected(&self, id: &str) -> Option<&str> {
        self.get(id)?.current().map(|c| c.value.as_str())
    }

    /// Selected value of `id` as a number.
    #[must_use]
    pub fn selected_u64(&self, id: &str) -> Option<u64> {
        self.selected(id)?.parse().ok()
    }

    /// Selected value of `id` as a boolean.
    #[must_use]
    pub fn selected_bool(&self, id: &str) -> Option<bool> {
        self.selected(id)?.parse().ok()
    }

    /// Applies configured defaults. Returns a message per entry that
    /// names an unknown option or value.
    pub fn apply_overrides<'a>(
        &mut self,
        overrides: impl IntoIterator<Item = (&'a String, &'a String)>,
    ) -> Vec<String> {
        overrides
            .into_iter()
            .filter(|(id, value)| !self.select(id, value))
            .map(|(id, value)| format!("option '{id}' has no choice '{value}'"))
            .collect()
    }

    /// Copies every selection of `other` that is valid here.
    pub fn merge_from(&mut self, other: &Self) {
        for option in other.iter() {
            if let Some(choice) = option.current() {
                self.select(&option.id, &choice.value);
            }
        }
    }

    /// The option picker shown by the lobby's settings button.
    #[must_use]
    pub fn type_menu(&self, title: &str) -> Content {
        let mut content = Content::titled(format!("{title} settings"), "Pick a setting to change.");
        for option in self.iter() {
            let value = option.current().map_or("-", |c| c.label.as_str());
            content = content.field(&option.label, value);
        }
        content.select(
            OPTION_TYPE_SELECT,
            "Setting",
            self.iter()
                .map(|o| SelectOption::new(&o.label, &o.id))
                .collect(),
        )
    }

    /// The value picker for option `id`.
    #[must_use]
    pub fn value_menu(&self, id: &str) -> Option<Content> {
        let option = self.get(id)?;
        let current = option.current().map_or("-", |c| c.label.as_str());
        Some(
            Content::titled(&option.label, format!("Current: {current}")).select(
                format!("{OPTION_VALUE_SELECT}{id}"),
                &option.label,
                option
                    .choices
                    .iter()
                    .map(|c| SelectOption::new(&c.label, &c.value))
                    .collect(),
            ),
        )
    }
}

/// Last-used options per hosting group and game.
#[derive(Debug, Default)]
pub struct OptionsStore {
    cache: DashMap<(GroupId, GameKind), GameOptions>,
}

impl OptionsStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached options for `group` and `kind`.
    #[must_use]
    pub fn load(&self, group: &GroupId, kind: GameKind) -> Option<GameOptions> {
        self.cache
            .get(&(group.clone(), kind))
            .map(|entry| entry.value().clone())
    }

    /// Stores a snapshot.
    pub fn save(&self, group: &GroupId, kind: GameKind, options: GameOptions) {
        self.cache.insert((group.clone(), kind), options);
    }
}
