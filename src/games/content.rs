//! Game content: the question bank and the place table.
//!
//! Phases reach content only through [`ContentProvider`]. The default
//! [`ContentLibrary`] merges inline config entries with entries from
//! YAML or JSON files and falls back to a small built-in set.

use std::path::{Path, PathBuf};

use partyline_core::config::schema::{ContentConfig, PlaceDef, QuestionDef};

use super::spycheck::data::QUESTIONS;
use super::spyfall::data::PLACES;
use crate::error::ContentError;

/// How a question is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerKind {
    /// Agree / Neutral / Disagree
    Agreement,
    /// Five-point agreement scale
    Likert,
    /// Always / Sometimes / Never
    Frequency,
    /// Yes / No
    YesNo,
    /// Pick a living participant
    Participant,
}

impl AnswerKind {
    /// Maps the numeric kind used in content files.
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Agreement),
            1 => Some(Self::Likert),
            2 => Some(Self::Frequency),
            3 => Some(Self::YesNo),
            4 => Some(Self::Participant),
            _ => None,
        }
    }

    /// Fixed choices; empty for [`AnswerKind::Participant`].
    #[must_use]
    pub const fn choices(self) -> &'static [&'static str] {
        match self {
            Self::Agreement => &["Agree", "Neutral", "Disagree"],
            Self::Likert => &[
                "Strongly agree",
                "Agree",
                "Neutral",
                "Disagree",
                "Strongly disagree",
            ],
            Self::Frequency => &["Always", "Sometimes", "Never"],
            Self::YesNo => &["Yes", "No"],
            Self::Participant => &[],
        }
    }
}

/// One question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    /// Text shown to citizens
    pub text: String,
    /// Answer kind
    pub kind: AnswerKind,
}

impl Question {
    /// Builds a question, rejecting unknown answer codes.
    ///
    /// # Errors
    ///
    /// Returns the offending code.
    pub fn new(text: impl Into<String>, code: u8) -> Result<Self, u8> {
        let kind = AnswerKind::from_code(code).ok_or(code)?;
        Ok(Self {
            text: text.into(),
            kind,
        })
    }
}

/// A place with its role deck.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Place {
    /// Place name
    pub name: String,
    /// Only dealt in extended mode
    pub extended: bool,
    /// Roles for non-spies
    pub roles: Vec<String>,
}

/// Source of game content.
pub trait ContentProvider: Send + Sync {
    /// The full question bank.
    fn question_pool(&self) -> Vec<Question>;

    /// Places to draw from; `extended` includes the extended-only ones.
    fn places(&self, extended: bool) -> Vec<Place>;
}

/// In-memory content loaded at startup.
#[derive(Debug, Clone, Default)]
pub struct ContentLibrary {
    questions: Vec<Question>,
    places: Vec<Place>,
}

impl ContentLibrary {
    /// The built-in content set.
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            questions: builtin_questions(),
            places: builtin_places(),
        }
    }

    /// Creates a library from explicit lists.
    #[must_use]
    pub const fn new(questions: Vec<Question>, places: Vec<Place>) -> Self {
        Self { questions, places }
    }

    /// Loads content from the config section.
    ///
    /// Relative file paths resolve against `base_dir`. A source that ends
    /// up empty falls back to the built-in set.
    ///
    /// # Errors
    ///
    /// Returns `ContentError` if a referenced file cannot be read or
    /// parsed, or names an unknown answer kind.
    pub fn from_config(config: &ContentConfig, base_dir: Option<&Path>) -> Result<Self, ContentError> {
        let mut question_defs = config.questions.clone().unwrap_or_default();
        if let Some(file) = &config.questions_file {
            let path = resolve(base_dir, file);
            question_defs.extend(read_list::<QuestionDef>(&path)?);
        }
        let mut questions = Vec::with_capacity(question_defs.len());
        for def in question_defs {
            let question = Question::new(def.text, def.answer_kind).map_err(|code| {
                ContentError::Parse {
                    path: config.questions_file.clone().unwrap_or_default(),
                    message: format!("unknown answer kind {code}"),
                }
            })?;
            questions.push(question);
        }

        let mut place_defs = config.places.clone().unwrap_or_default();
        if let Some(file) = &config.places_file {
            let path = resolve(base_dir, file);
            place_defs.extend(read_list::<PlaceDef>(&path)?);
        }
        let places: Vec<Place> = place_defs
            .into_iter()
            .map(|def| Place {
                name: def.name,
                extended: def.extended,
                roles: def.roles,
            })
            .collect();

        if questions.is_empty() {
            questions = builtin_questions();
        }
        Ok(Self {
            questions,
            places: if places.is_empty() {
                builtin_places()
            } else {
                places
            },
        })
    }
}

impl ContentProvider for ContentLibrary {
    fn question_pool(&self) -> Vec<Question> {
        self.questions.clone()
    }

    fn places(&self, extended: bool) -> Vec<Place> {
        self.places
            .iter()
            .filter(|p| extended || !p.extended)
            .cloned()
            .collect()
    }
}

fn resolve(base_dir: Option<&Path>, file: &Path) -> PathBuf {
    match base_dir {
        Some(dir) if file.is_relative() => dir.join(file),
        _ => file.to_path_buf(),
    }
}

fn read_list<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>, ContentError> {
    let text = std::fs::read_to_string(path).map_err(|source| ContentError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    // YAML is a superset of JSON, so one parser serves both.
    serde_yaml::from_str(&text).map_err(|e| ContentError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn builtin_questions() -> Vec<Question> {
    QUESTIONS
        .iter()
        .filter_map(|(text, code)| Question::new(*text, *code).ok())
        .collect()
}

fn builtin_places() -> Vec<Place> {
    PLACES
        .iter()
        .map(|(name, extended, roles)| Place {
            name: (*name).to_string(),
            extended: *extended,
            roles: roles.iter().map(|r| (*r).to_string()).collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_builtin_has_both_sets() {
        let lib = ContentLibrary::builtin();
        assert!(lib.question_pool().len() >= 10);
        let normal = lib.places(false);
        let all = lib.places(true);
        assert!(normal.iter().all(|p| !p.extended));
        assert!(all.len() > normal.len());
    }

    #[test]
    fn test_answer_kind_codes() {
        assert_eq!(AnswerKind::from_code(1).unwrap().choices().len(), 5);
        assert!(AnswerKind::Participant.choices().is_empty());
        assert!(AnswerKind::from_code(5).is_none());
    }

    #[test]
    fn test_loads_question_file_relative_to_base() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join("q.yaml")).unwrap();
        writeln!(file, "- text: Tea or coffee?\n  answer_kind: 3").unwrap();

        let config = ContentConfig {
            questions: Some(vec![QuestionDef {
                text: "Inline".to_string(),
                answer_kind: 0,
            }]),
            questions_file: Some(PathBuf::from("q.yaml")),
            ..ContentConfig::default()
        };
        let lib = ContentLibrary::from_config(&config, Some(dir.path())).unwrap();
        let pool = lib.question_pool();
        assert_eq!(pool.len(), 2);
        assert_eq!(pool[1].kind, AnswerKind::YesNo);
        assert!(!lib.places(false).is_empty());
    }

    #[test]
    fn test_json_place_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("places.json");
        std::fs::write(
            &path,
            r#"[{"name": "Library", "roles": ["Librarian", "Reader"]}]"#,
        )
        .unwrap();
        let config = ContentConfig {
            places_file: Some(path),
            ..ContentConfig::default()
        };
        let lib = ContentLibrary::from_config(&config, None).unwrap();
        assert_eq!(lib.places(false).len(), 1);
        assert_eq!(lib.places(true)[0].roles, vec!["Librarian", "Reader"]);
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let config = ContentConfig {
            questions_file: Some(PathBuf::from("/nonexistent/questions.yaml")),
            ..ContentConfig::default()
        };
        let err = ContentLibrary::from_config(&config, None).unwrap_err();
        assert!(matches!(err, ContentError::Read { .. }));
    }

    #[test]
    fn test_unknown_answer_kind_rejected() {
        let config = ContentConfig {
            questions: Some(vec![QuestionDef {
                text: "Bad".to_string(),
                answer_kind: 9,
            }]),
            ..ContentConfig::default()
        };
        assert!(ContentLibrary::from_config(&config, None).is_err());
    }
}
