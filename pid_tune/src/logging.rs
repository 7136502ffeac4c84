use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt as _,
};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

#[derive(Deserialize, Debug, Serialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directives used when `RUST_LOG` is not set.
    pub level: String,
    pub json: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

fn file_layer(path: &Path) -> anyhow::Result<BoxedLayer> {
    let directory = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let file_name = path
        .file_name()
        .with_context(|| format!("Log file path {} has no file name", path.display()))?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name.to_string_lossy())
        .build(directory)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;

    Ok(fmt::Layer::new()
        .with_writer(appender)
        .with_ansi(false)
        .boxed())
}

pub fn init(config: &LoggingConfig) -> anyhow::Result<()> {
    let stdout_layer: BoxedLayer = if config.json {
        fmt::Layer::new()
            .json()
            .with_writer(std::io::stdout)
            .boxed()
    } else {
        fmt::Layer::new()
            .with_writer(std::io::stdout)
            .with_ansi(true)
            .with_span_events(FmtSpan::CLOSE)
            .boxed()
    };

    let mut layers = vec![stdout_layer];
    if let Some(path) = &config.file {
        layers.push(file_layer(path)?);
    }

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .with_context(|| format!("Invalid log level {:?}", config.level))?;

    let subscriber = tracing_subscriber::registry().with(layers).with(filter);

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set global subscriber")?;

    Ok(())
}
