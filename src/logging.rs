//! Log setup for the command-line front end.

use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter (e.g. "pulpit=debug").
pub const LOG_ENV: &str = "PULPIT_LOG";

/// Default log directory: `<data_dir>/pulpit`.
pub fn default_log_dir() -> Option<PathBuf> {
  dirs::data_dir()
    .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
    .map(|p| p.join("pulpit"))
}

/// Install the global subscriber, writing to `<log_dir>/pulpit.log`.
///
/// Falls back to stderr if the directory cannot be created. Keep the
/// returned guard alive for the life of the process so buffered lines are
/// flushed on exit.
pub fn init(log_dir: Option<&Path>) -> Option<WorkerGuard> {
  let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));

  if let Some(dir) = log_dir.filter(|d| std::fs::create_dir_all(d).is_ok()) {
    let appender = tracing_appender::rolling::never(dir, "pulpit.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
      .with_env_filter(filter)
      .with_writer(writer)
      .with_ansi(false)
      .init();
    Some(guard)
  } else {
    tracing_subscriber::fmt()
      .with_env_filter(filter)
      .with_writer(std::io::stderr)
      .init();
    None
  }
}
