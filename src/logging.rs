use anyhow::{Context, Result};
use std::{
    fs::{File, OpenOptions},
    path::Path,
    sync::Mutex,
};
use tracing::{warn, Subscriber};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Console + optional log-file subscriber. Both outputs are timestamped and
/// level-tagged; the file copy has no ANSI colouring.
pub fn subscriber(log_file: Option<File>) -> impl Subscriber + Send + Sync {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let file_layer = log_file.map(|f| {
        fmt::layer()
            .with_ansi(false)
            .with_target(false)
            .with_writer(Mutex::new(f))
    });
    tracing_subscriber::registry()
        .with(env)
        .with(fmt::layer().with_target(false))
        .with(file_layer)
}

pub fn open_log_file(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening log file {}", path.display()))
}

/// Install the process-wide subscriber. A log file that cannot be opened
/// degrades to console-only logging.
pub fn init(log_path: &Path) -> Result<()> {
    let (file, open_err) = match open_log_file(log_path) {
        Ok(f) => (Some(f), None),
        Err(e) => (None, Some(e)),
    };
    tracing::subscriber::set_global_default(subscriber(file))
        .context("installing tracing subscriber")?;
    if let Some(e) = open_err {
        warn!("logging to console only: {:#}", e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;
    use tracing::{error, info};

    #[test]
    fn writes_level_tagged_lines_to_file() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("etl.log");
        let sub = subscriber(Some(open_log_file(&path)?));
        tracing::subscriber::with_default(sub, || {
            info!(rows = 2, "load complete");
            error!("schema mismatch");
        });

        let text = fs::read_to_string(&path)?;
        assert!(text.contains("INFO"), "{text}");
        assert!(text.contains("load complete"), "{text}");
        assert!(text.contains("rows=2"), "{text}");
        assert!(text.contains("ERROR"), "{text}");
        assert!(!text.contains("\u{1b}["), "file log must not carry ANSI codes");
        Ok(())
    }

    #[test]
    fn appends_rather_than_truncates() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("etl.log");
        fs::write(&path, "previous run\n")?;
        let sub = subscriber(Some(open_log_file(&path)?));
        tracing::subscriber::with_default(sub, || info!("next run"));

        let text = fs::read_to_string(&path)?;
        assert!(text.starts_with("previous run\n"));
        assert!(text.contains("next run"));
        Ok(())
    }
}
