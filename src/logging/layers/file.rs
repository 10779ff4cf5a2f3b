use crate::logging::config::{FileFormat, LoggingConfig};
use crate::logging::layers::{noop_layer, BoxLayer};
use crate::Result;
use anyhow::{anyhow, Context};
use dirs_next::home_dir;
use std::fs::{self, OpenOptions};
use std::path::{Component, Path, PathBuf};
use tracing::Subscriber;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::{self as tracing_fmt, writer::BoxMakeWriter};
use tracing_subscriber::registry::LookupSpan;

const LOG_FILE_NAME: &str = "flowent.log";

/// Where node runs are logged: `<workspace>/.flowent/logs/flowent.log` unless
/// `logging.log_dir` says otherwise. Relative overrides stay inside the anchor.
pub fn log_file_path(config: &LoggingConfig, workspace_root: Option<&Path>) -> Result<PathBuf> {
    let anchor = match workspace_root {
        Some(workspace) => workspace.to_path_buf(),
        None => home_dir().ok_or_else(|| anyhow!("$HOME directory unavailable"))?,
    };

    let directory = match &config.log_dir {
        Some(custom) if custom.is_absolute() => custom.clone(),
        Some(custom) => {
            if escapes(custom) {
                return Err(anyhow!(
                    "logging.log_dir '{}' resolves outside {}",
                    custom.display(),
                    anchor.display()
                ));
            }
            anchor.join(custom)
        }
        None => anchor.join(".flowent").join("logs"),
    };
    Ok(directory.join(LOG_FILE_NAME))
}

/// Relative path climbing above its starting point.
fn escapes(path: &Path) -> bool {
    let mut depth: i32 = 0;
    for component in path.components() {
        match component {
            Component::ParentDir => depth -= 1,
            Component::Normal(_) => depth += 1,
            _ => {}
        }
        if depth < 0 {
            return true;
        }
    }
    false
}

/// File sink writing through a non-blocking appender. A disabled sink is a
/// no-op layer and holds no file open.
pub fn file_layer<S>(
    log_file: &Path,
    config: &LoggingConfig,
) -> Result<(BoxLayer<S>, Option<WorkerGuard>)>
where
    S: Subscriber + for<'a> LookupSpan<'a> + Send + Sync + 'static,
{
    if !config.enable_file {
        return Ok((noop_layer::<S>(), None));
    }

    if let Some(directory) = log_file.parent() {
        fs::create_dir_all(directory)
            .with_context(|| format!("failed to create log directory {}", directory.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .with_context(|| format!("failed to open log file {}", log_file.display()))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file);
    let writer = BoxMakeWriter::new(non_blocking);
    let layer: BoxLayer<S> = match config.file_format {
        FileFormat::Text => Box::new(
            tracing_fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true),
        ),
        FileFormat::Json => Box::new(
            tracing_fmt::layer()
                .json()
                .flatten_event(true)
                .with_current_span(false)
                .with_writer(writer),
        ),
    };
    Ok((layer, Some(guard)))
}
