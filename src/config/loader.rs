//! Configuration loader
//!
//! Loading runs in stages:
//! 1. Size check and read
//! 2. Environment variable expansion on the raw text
//! 3. YAML deserialization into [`PartylineConfig`]
//! 4. Validation, collecting every issue
//! 5. Freeze behind an `Arc`

use std::path::Path;
use std::sync::Arc;

use crate::config::schema::PartylineConfig;
use crate::config::validation::Validator;
use crate::error::ConfigError;

/// Options for the configuration loader.
#[derive(Debug, Clone)]
pub struct LoaderOptions {
    /// Largest accepted configuration file, in bytes.
    pub max_config_size: usize,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            max_config_size: env_or("PARTYLINE_MAX_CONFIG_SIZE", 1024 * 1024),
        }
    }
}

/// Result of loading a configuration file.
#[derive(Debug)]
pub struct LoadResult {
    /// The loaded and validated configuration.
    pub config: Arc<PartylineConfig>,

    /// Warnings encountered during loading.
    pub warnings: Vec<LoadWarning>,
}

/// Warning during configuration loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadWarning {
    /// Warning message.
    pub message: String,

    /// Location where the warning occurred.
    pub location: Option<String>,
}

impl std::fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.location {
            Some(location) => write!(f, "{} ({location})", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Configuration loader.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: LoaderOptions,
}

impl ConfigLoader {
    /// Creates a loader with the given options.
    #[must_use]
    pub const fn new(options: LoaderOptions) -> Self {
        Self { options }
    }

    /// Loads, expands and validates a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or too large, a required
    /// environment variable is unset, the YAML does not match the schema,
    /// or validation reports errors.
    pub fn load(&self, path: &Path) -> Result<LoadResult, ConfigError> {
        let metadata = std::fs::metadata(path).map_err(|_| ConfigError::MissingFile {
            path: path.to_path_buf(),
        })?;
        let size = usize::try_from(metadata.len()).unwrap_or(usize::MAX);
        if size > self.options.max_config_size {
            return Err(ConfigError::InvalidValue {
                field: "file_size".to_string(),
                value: format!("{size} bytes"),
                expected: format!("at most {} bytes", self.options.max_config_size),
            });
        }

        let raw = std::fs::read_to_string(path).map_err(|_| ConfigError::MissingFile {
            path: path.to_path_buf(),
        })?;
        self.load_str(&raw, path)
    }

    /// Loads configuration text as if it were read from `path`.
    ///
    /// # Errors
    ///
    /// See [`ConfigLoader::load`].
    pub fn load_str(&self, raw: &str, path: &Path) -> Result<LoadResult, ConfigError> {
        self.load_with(raw, path, |name| std::env::var(name).ok())
    }

    fn load_with(
        &self,
        raw: &str,
        path: &Path,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<LoadResult, ConfigError> {
        let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);

        let mut expander = EnvExpander::new(lookup, path);
        let expanded = expander.expand(raw)?;
        let mut warnings = expander.warnings;

        let config: PartylineConfig = if expanded.trim().is_empty() {
            warnings.push(LoadWarning {
                message: "configuration file is empty, using defaults".to_string(),
                location: Some(path.display().to_string()),
            });
            PartylineConfig::default()
        } else {
            serde_yaml::from_str(&expanded).map_err(|e| ConfigError::ParseError {
                path: path.to_path_buf(),
                line: e.location().map(|l| l.line()),
                message: e.to_string(),
            })?
        };

        let result = Validator::new().validate(&config);
        if result.has_errors() {
            return Err(ConfigError::ValidationError {
                path: path.display().to_string(),
                errors: result.errors,
            });
        }
        warnings.extend(result.warnings.into_iter().map(|issue| LoadWarning {
            message: issue.message,
            location: Some(issue.path),
        }));

        Ok(LoadResult {
            config: Arc::new(config),
            warnings,
        })
    }
}

// ============================================================================
// Environment Variable Expansion
// ============================================================================

/// Expands `${VAR}`, `${VAR:-default}`, `${VAR:?message}` and `$$` in raw
/// text before it is parsed, so substituted values keep YAML typing.
struct EnvExpander<'a, F> {
    lookup: F,
    source: &'a Path,
    warnings: Vec<LoadWarning>,
}

enum Fallback {
    None,
    Default(String),
    Required(String),
}

impl<'a, F: Fn(&str) -> Option<String>> EnvExpander<'a, F> {
    const fn new(lookup: F, source: &'a Path) -> Self {
        Self {
            lookup,
            source,
            warnings: Vec::new(),
        }
    }

    fn expand(&mut self, raw: &str) -> Result<String, ConfigError> {
        let mut out = String::with_capacity(raw.len());
        let mut chars = raw.chars().peekable();

        while let Some(c) = chars.next() {
            if c != '$' {
                out.push(c);
                continue;
            }
            match chars.peek() {
                Some('$') => {
                    chars.next();
                    out.push('$');
                }
                Some('{') => {
                    chars.next();
                    let (name, fallback) = self.read_reference(&mut chars)?;
                    match ((self.lookup)(&name), fallback) {
                        (Some(value), _) | (None, Fallback::Default(value)) => out.push_str(&value),
                        (None, Fallback::Required(message)) => {
                            return Err(ConfigError::EnvVarNotSet {
                                var: name,
                                location: if message.is_empty() {
                                    self.source.display().to_string()
                                } else {
                                    message
                                },
                            });
                        }
                        (None, Fallback::None) => self.warnings.push(LoadWarning {
                            message: format!(
                                "environment variable '{name}' is not set, using empty string"
                            ),
                            location: Some(self.source.display().to_string()),
                        }),
                    }
                }
                _ => out.push(c),
            }
        }
        Ok(out)
    }

    fn read_reference(
        &self,
        chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    ) -> Result<(String, Fallback), ConfigError> {
        let mut name = String::new();
        while let Some(c) = chars.next() {
            match c {
                '}' => return Ok((name, Fallback::None)),
                ':' if chars.peek() == Some(&'-') => {
                    chars.next();
                    return Ok((name, Fallback::Default(self.read_until_close(chars)?)));
                }
                ':' if chars.peek() == Some(&'?') => {
                    chars.next();
                    return Ok((name, Fallback::Required(self.read_until_close(chars)?)));
                }
                _ => name.push(c),
            }
        }
        Err(self.unclosed(&name))
    }

    /// Reads up to the matching `}`; nested braces are kept.
    fn read_until_close(
        &self,
        chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    ) -> Result<String, ConfigError> {
        let mut value = String::new();
        let mut depth = 1usize;
        for c in chars.by_ref() {
            match c {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(value);
                    }
                }
                _ => {}
            }
            value.push(c);
        }
        Err(self.unclosed(&value))
    }

    fn unclosed(&self, fragment: &str) -> ConfigError {
        ConfigError::ParseError {
            path: self.source.to_path_buf(),
            line: None,
            message: format!("unclosed environment variable reference near '${{{fragment}'"),
        }
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;
    use std::path::PathBuf;

    use super::*;
    use crate::config::schema::GameKind;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    fn load(raw: &str, env: &[(&str, &str)]) -> Result<LoadResult, ConfigError> {
        ConfigLoader::default().load_with(raw, Path::new("test.yaml"), vars(env))
    }

    #[test]
    fn test_expansion_forms() {
        let path = PathBuf::from("x.yaml");
        let mut expander = EnvExpander::new(vars(&[("TTL", "600s")]), &path);
        let out = expander
            .expand("a: ${TTL}\nb: ${MISSING:-7}\nc: $$HOME\nd: ${NOPE}\ne: ${X:-{a}}\n")
            .unwrap();
        assert_eq!(out, "a: 600s\nb: 7\nc: $HOME\nd: \ne: {a}\n");
        assert_eq!(expander.warnings.len(), 1);
        assert!(expander.warnings[0].message.contains("NOPE"));
    }

    #[test]
    fn test_required_variable_fails() {
        let err = load("engine:\n  reply_ttl: ${TTL:?reply ttl}\n", &[]).unwrap_err();
        assert!(matches!(err, ConfigError::EnvVarNotSet { ref var, .. } if var == "TTL"));
    }

    #[test]
    fn test_unclosed_reference() {
        let err = load("a: ${OOPS", &[]).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn test_substituted_values_keep_types() {
        let result = load(
            "engine:\n  dead_tick: ${DEAD}\n  pacing_scale: ${PACE:-0.5}\n",
            &[("DEAD", "20")],
        )
        .unwrap();
        assert_eq!(result.config.engine.dead_tick, 20);
        assert!((result.config.engine.pacing_scale - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let result = load("", &[]).unwrap();
        assert_eq!(result.config.engine.reply_ttl, "840s");
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn test_validation_errors_fail_load() {
        let err = load(
            "games:\n  spyfall:\n    min_players: 6\n    max_players: 4\n",
            &[],
        )
        .unwrap_err();
        match err {
            ConfigError::ValidationError { errors, .. } => {
                assert!(errors.iter().any(|e| e.path == "games.spyfall"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "engine:\n  reply_ttl: 10m\ngames:\n  spycheck:\n    options:\n      spy_count: \"2\""
        )
        .unwrap();

        let result = ConfigLoader::default().load(file.path()).unwrap();
        assert_eq!(result.config.engine.reply_ttl, "10m");
        assert_eq!(
            result
                .config
                .games
                .rules(GameKind::Spycheck)
                .options
                .get("spy_count")
                .map(String::as_str),
            Some("2")
        );
    }

    #[test]
    fn test_missing_and_oversized_files() {
        let err = ConfigLoader::default()
            .load(Path::new("/nonexistent/partyline.yaml"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingFile { .. }));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "engine: {{}}").unwrap();
        let tiny = ConfigLoader::new(LoaderOptions { max_config_size: 4 });
        assert!(matches!(
            tiny.load(file.path()),
            Err(ConfigError::InvalidValue { .. })
        ));
    }
}
