//! `run` command: serve games over NDJSON on stdin/stdout.

use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::cli::args::RunArgs;
use crate::config::loader::ConfigLoader;
use crate::config::schema::PartylineConfig;
use crate::engine::{EngineSettings, Registry};
use crate::error::PartylineError;
use crate::games::{ContentLibrary, GameCatalog};
use crate::observability::{EventEmitter, init_metrics};
use crate::transport::{AudioSink, Messenger, StdioConfig, StdioPlatform};

/// Serve games until stdin closes or `cancel` fires.
///
/// # Errors
///
/// Returns a config or content error if startup fails, or a transport
/// error if reading stdin fails.
pub async fn run(args: &RunArgs, cancel: CancellationToken) -> Result<(), PartylineError> {
    if let Some(port) = args.metrics_port {
        init_metrics(Some(port))?;
        tracing::info!(port, "Prometheus metrics endpoint started");
    }

    let (config, base_dir) = load_config(args)?;
    let settings = EngineSettings::from_config(&config.engine)?;
    let content = ContentLibrary::from_config(&config.content, base_dir.as_deref())?;

    let emitter = match &args.events_file {
        Some(path) => EventEmitter::from_file(path)?,
        None => EventEmitter::noop(),
    };

    let catalog = GameCatalog::new(config.games.clone(), Arc::new(content), settings)
        .with_enabled(&args.games);

    let (platform, _writer) = StdioPlatform::new(StdioConfig::from_env());
    let platform = Arc::new(platform);
    let messenger: Arc<dyn Messenger> = platform.clone();
    let audio: Arc<dyn AudioSink> = platform.clone();
    let registry = Registry::new(catalog, messenger, audio, Arc::new(emitter), settings);

    tracing::info!("serving games on stdio");
    let reason = loop {
        tokio::select! {
            () = cancel.cancelled() => break "shutting down",
            inbound = platform.receive() => match inbound? {
                Some(action) => registry.handle(action).await,
                None => break "input closed",
            },
        }
    };

    tracing::info!(reason, sessions = registry.session_count(), "stopping");
    registry.shutdown(reason);
    platform.flush().await;
    Ok(())
}

fn load_config(args: &RunArgs) -> Result<(Arc<PartylineConfig>, Option<PathBuf>), PartylineError> {
    let Some(path) = &args.config else {
        tracing::info!("no configuration given, using built-in defaults");
        return Ok((Arc::new(PartylineConfig::default()), None));
    };

    tracing::info!(config = %path.display(), "loading configuration");
    let loaded = ConfigLoader::default().load(path)?;
    for warning in &loaded.warnings {
        tracing::warn!(
            location = warning.location.as_deref().unwrap_or("<unknown>"),
            "{}",
            warning.message
        );
    }
    Ok((loaded.config, path.parent().map(PathBuf::from)))
}
