//! Configuration validation command
//!
//! Loads each file through the full pipeline, including content files it
//! references, and reports every issue found.

use std::path::Path;

use crate::cli::args::{OutputFormat, ValidateArgs};
use crate::config::loader::{ConfigLoader, LoadWarning};
use crate::error::{ConfigError, PartylineError};
use crate::games::ContentLibrary;

struct FileReport {
    file: String,
    errors: Vec<String>,
    warnings: Vec<String>,
}

impl FileReport {
    fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "file": self.file,
            "valid": self.errors.is_empty(),
            "errors": self.errors,
            "warnings": self.warnings,
        })
    }
}

/// Validate configuration files without starting the engine.
///
/// # Errors
///
/// Returns `ConfigError::ValidationFailed` if any file has errors, or
/// warnings when `--strict` is set.
pub fn run(args: &ValidateArgs) -> Result<(), PartylineError> {
    let loader = ConfigLoader::default();
    let reports: Vec<FileReport> = args.files.iter().map(|p| check(&loader, p)).collect();

    let failed = reports
        .iter()
        .filter(|r| !r.errors.is_empty() || (args.strict && !r.warnings.is_empty()))
        .count();

    match args.format {
        OutputFormat::Human => {
            for report in &reports {
                let status = if report.errors.is_empty() { "ok" } else { "FAILED" };
                println!("{}: {status}", report.file);
                for error in &report.errors {
                    println!("  error: {error}");
                }
                for warning in &report.warnings {
                    println!("  warning: {warning}");
                }
            }
        }
        OutputFormat::Json => {
            let out: Vec<_> = reports.iter().map(FileReport::to_json).collect();
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
    }

    if failed > 0 {
        return Err(ConfigError::ValidationFailed { count: failed }.into());
    }
    Ok(())
}

fn check(loader: &ConfigLoader, path: &Path) -> FileReport {
    tracing::info!(file = %path.display(), "validating configuration");
    let mut report = FileReport {
        file: path.display().to_string(),
        errors: Vec::new(),
        warnings: Vec::new(),
    };

    match loader.load(path) {
        Ok(loaded) => {
            report.warnings = loaded.warnings.iter().map(LoadWarning::to_string).collect();
            if let Err(e) = ContentLibrary::from_config(&loaded.config.content, path.parent()) {
                report.errors.push(e.to_string());
            }
        }
        Err(ConfigError::ValidationError { errors, .. }) => {
            report.errors = errors.iter().map(ToString::to_string).collect();
        }
        Err(e) => report.errors.push(e.to_string()),
    }
    report
}
