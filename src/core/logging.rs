use std::path::Path;
use std::sync::OnceLock;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::core::config::settings::{LogFormat, LoggingSettings};
use crate::core::config::AppPaths;

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

const QUIET_TARGETS: &str = "hyper=warn,h2=warn,reqwest=warn,sqlx=warn,rustls=warn";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Installs the global subscriber. `RUST_LOG` takes precedence over the
/// configured level. Safe to call more than once; later calls are no-ops.
pub fn init(settings: &LoggingSettings, paths: &AppPaths) {
    let mut layers: Vec<BoxedLayer> = vec![format_layer(settings.format, None)];

    if settings.file_enabled {
        let file_path = paths.ensure_parent(&settings.file_path);
        let directory = file_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| paths.project_root.clone());
        let file_name = file_path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| "api.log".to_string());

        let file_appender = tracing_appender::rolling::never(directory, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        let _ = LOG_GUARD.set(guard);
        layers.push(format_layer(settings.format, Some(non_blocking)));
    }

    let _ = tracing_subscriber::registry()
        .with(layers)
        .with(env_filter(settings))
        .try_init();
}

fn env_filter(settings: &LoggingSettings) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = settings.tracing_level().unwrap_or("info");
        EnvFilter::new(format!("{},{}", level, QUIET_TARGETS))
    })
}

fn format_layer(
    format: LogFormat,
    file: Option<tracing_appender::non_blocking::NonBlocking>,
) -> BoxedLayer {
    match (format, file) {
        (LogFormat::Json, None) => tracing_subscriber::fmt::layer().json().boxed(),
        (LogFormat::Json, Some(writer)) => tracing_subscriber::fmt::layer()
            .json()
            .with_ansi(false)
            .with_writer(writer)
            .boxed(),
        (LogFormat::Text, None) => tracing_subscriber::fmt::layer().with_target(true).boxed(),
        (LogFormat::Text, Some(writer)) => tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_ansi(false)
            .with_writer(writer)
            .boxed(),
    }
}
