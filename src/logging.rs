//! Tracing setup for the command-line client.

use color_eyre::{eyre::eyre, Result};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const LOG_FILE: &str = "shopsync.log";

/// Where log lines go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
  Stderr,
  /// Append to `shopsync.log` in this directory
  File(PathBuf),
}

impl LogTarget {
  /// The log file in the user's data directory.
  pub fn default_file() -> Result<Self> {
    let dir = dirs::data_dir()
      .ok_or_else(|| eyre!("Could not determine data directory"))?
      .join("shopsync");
    Ok(Self::File(dir))
  }
}

/// Default filter directive for a `-v` count. `RUST_LOG` takes precedence.
pub fn level_for(verbosity: u8) -> &'static str {
  match verbosity {
    0 => "shopsync=info",
    1 => "shopsync=debug",
    _ => "shopsync=trace",
  }
}

/// Install the global subscriber.
///
/// The returned guard flushes buffered lines when dropped; keep it alive for
/// the life of the process.
pub fn init(target: &LogTarget, verbosity: u8) -> Result<WorkerGuard> {
  let filter =
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_for(verbosity)));

  let (writer, guard) = match target {
    LogTarget::Stderr => tracing_appender::non_blocking(std::io::stderr()),
    LogTarget::File(dir) => {
      std::fs::create_dir_all(dir)?;
      tracing_appender::non_blocking(file_appender(dir))
    }
  };

  tracing_subscriber::registry()
    .with(
      fmt::layer()
        .with_target(true)
        .with_ansi(*target == LogTarget::Stderr)
        .with_writer(writer),
    )
    .with(filter)
    .try_init()
    .map_err(|e| eyre!("Failed to install log subscriber: {}", e))?;

  Ok(guard)
}

fn file_appender(dir: &Path) -> tracing_appender::rolling::RollingFileAppender {
  tracing_appender::rolling::never(dir, LOG_FILE)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_verbosity_levels() {
    assert_eq!(level_for(0), "shopsync=info");
    assert_eq!(level_for(1), "shopsync=debug");
    assert_eq!(level_for(9), "shopsync=trace");
  }

  #[test]
  fn test_default_file_is_under_data_dir() {
    if let Ok(LogTarget::File(dir)) = LogTarget::default_file() {
      assert!(dir.ends_with("shopsync"));
    }
  }
}
