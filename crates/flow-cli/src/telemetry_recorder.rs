//! Wraps command execution with telemetry recording.
//!
//! Silently fails — telemetry never blocks the CLI.

use std::path::Path;
use std::time::Duration;

use flow_core::telemetry::{self, TelemetryStore};

/// Metrics collected during command execution. Every command currently
/// records with the defaults (command/duration/exit-code only); a command
/// that wants richer counts can populate these fields once it has a model
/// in hand.
#[derive(Debug, Default)]
pub struct EventMetrics {
    pub files_analyzed: u32,
    pub entrypoint_count: u32,
    pub escape_count: u32,
}

/// Record a telemetry event after a command completes. Only runs when the
/// project has been initialized — an uninitialized one-shot run has
/// nowhere to persist to and isn't worth creating a directory for.
pub fn record_event(flow_dir: &Path, command: &str, duration: Duration, exit_code: i32, metrics: EventMetrics) {
    if !flow_dir.exists() {
        return;
    }
    let db_path = flow_dir.join("telemetry.db");
    let store = match TelemetryStore::open(&db_path) {
        Ok(s) => s,
        Err(_) => return,
    };

    let mut event = telemetry::new_event(command, duration.as_millis() as u64, exit_code);
    event.files_analyzed = metrics.files_analyzed;
    event.entrypoint_count = metrics.entrypoint_count;
    event.escape_count = metrics.escape_count;

    let _ = store.record(&event);
}

/// Name used for telemetry's `command` column, kept stable across CLI
/// flag changes.
pub fn command_name(command: &crate::cli_args::Commands) -> &'static str {
    use crate::cli_args::Commands;
    match command {
        Commands::Init { .. } => "init",
        Commands::Audit { .. } => "audit",
        Commands::Raises { .. } => "raises",
        Commands::Catches { .. } => "catches",
        Commands::Escapes { .. } => "escapes",
        Commands::RoutesTo { .. } => "routes-to",
        Commands::Trace { .. } => "trace",
        Commands::Subclasses { .. } => "subclasses",
        Commands::Exceptions => "exceptions",
        Commands::Stats => "stats",
        Commands::Config { .. } => "config",
        Commands::Serve { .. } => "serve",
    }
}
