use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log files of one app kept on disk, the active one included.
pub const LOG_FILES_KEPT: usize = 3;

/// # Setup Logging
///
/// Routes `tracing` events to stdout and to `<log_dir>/<app_name>.<date>.log`.
/// `RUST_LOG`, when set, takes precedence over `log_level`.
///
/// The returned guard flushes the file writer on drop; hold it for the life
/// of the process.
pub fn setup_logging(log_dir: &Path, log_level: &str, app_name: &str) -> Result<WorkerGuard> {
    if !log_dir.exists() {
        fs::create_dir_all(log_dir)
            .with_context(|| format!("failed to create log directory {}", log_dir.display()))?;
    }

    cleanup_old_logs(log_dir, app_name, LOG_FILES_KEPT)?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(app_name)
        .filename_suffix("log")
        .build(log_dir)
        .context("failed to create rolling log file")?;
    let (non_blocking_appender, guard) = tracing_appender::non_blocking(file_appender);

    let console_layer = fmt::layer().with_target(true).with_ansi(true);
    let file_layer = fmt::layer()
        .with_ansi(false)
        .with_writer(non_blocking_appender)
        .json();

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .with_context(|| format!("invalid log level `{log_level}`"))?;

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("a global tracing subscriber is already installed")?;

    info!(app = app_name, level = log_level, dir = %log_dir.display(), "Logging initialized");
    Ok(guard)
}

/// Deletes all but the `keep` most recently modified log files of `app_name`.
/// Files of other apps and non-log files are left alone.
pub fn cleanup_old_logs(log_dir: &Path, app_name: &str, keep: usize) -> Result<()> {
    let prefix = format!("{app_name}.");
    let mut entries: Vec<_> = fs::read_dir(log_dir)?
        .filter_map(|res| res.ok())
        .filter(|e| {
            let name = e.file_name();
            let name = name.to_string_lossy();
            name.starts_with(&prefix) && name.ends_with(".log")
        })
        .filter_map(|e| {
            let modified = e.metadata().and_then(|m| m.modified()).ok()?;
            Some((modified, e.path()))
        })
        .collect();

    // Newest first
    entries.sort_by(|a, b| b.0.cmp(&a.0));

    for (_, path) in entries.iter().skip(keep) {
        if let Err(e) = fs::remove_file(path) {
            eprintln!("Failed to delete old log file {:?}: {}", path, e);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::time::{Duration, SystemTime};

    fn touch(dir: &Path, name: &str, age_secs: u64) {
        let file = File::create(dir.join(name)).unwrap();
        file.set_modified(SystemTime::now() - Duration::from_secs(age_secs))
            .unwrap();
    }

    #[test]
    fn test_cleanup_keeps_newest_of_app() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "server_quake.2025-10-25.log", 300);
        touch(dir.path(), "server_quake.2025-10-26.log", 200);
        touch(dir.path(), "server_quake.2025-10-27.log", 100);
        touch(dir.path(), "server_quake.2025-10-28.log", 0);

        cleanup_old_logs(dir.path(), "server_quake", 2).unwrap();

        assert!(!dir.path().join("server_quake.2025-10-25.log").exists());
        assert!(!dir.path().join("server_quake.2025-10-26.log").exists());
        assert!(dir.path().join("server_quake.2025-10-27.log").exists());
        assert!(dir.path().join("server_quake.2025-10-28.log").exists());
    }

    #[test]
    fn test_cleanup_ignores_other_apps_and_files() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "ingest_quake.2025-10-20.log", 500);
        touch(dir.path(), "notes.txt", 500);
        touch(dir.path(), "server_quake.2025-10-28.log", 0);

        cleanup_old_logs(dir.path(), "server_quake", 1).unwrap();

        assert!(dir.path().join("ingest_quake.2025-10-20.log").exists());
        assert!(dir.path().join("notes.txt").exists());
        assert!(dir.path().join("server_quake.2025-10-28.log").exists());
    }
}
