// crates/grantdesk-cli/src/main.rs
// ============================================================================
// Module: Grantdesk CLI Entry Point
// Description: Command dispatcher for the Grantdesk portal server.
// Purpose: Wire configuration, storage, and ports into the HTTP surface.
// Dependencies: clap, grantdesk-config, grantdesk-http, tokio, serde_json
// ============================================================================

//! ## Overview
//! The `grantdesk` binary starts the portal HTTP server (`serve`) and
//! offers configuration utilities (`config validate`, `config example`).
//! `serve` opens the SQLite store, mounts the filesystem document store,
//! starts the notification worker, sweeps expired sessions, and hands
//! everything to the axum surface.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use grantdesk_config::GrantdeskConfig;
use grantdesk_config::config_toml_example;
use grantdesk_core::DocumentStore;
use grantdesk_core::LifecycleEngine;
use grantdesk_core::Notifier;
use grantdesk_core::SharedStorage;
use grantdesk_core::Timestamp;
use grantdesk_docstore::FsDocumentStore;
use grantdesk_http::AppState;
use grantdesk_http::IdentityService;
use grantdesk_notify::QueueNotifier;
use grantdesk_notify::StderrDeliveryLog;
use grantdesk_store_sqlite::SqliteStorage;
use grantdesk_store_sqlite::SqliteStorageConfig;
use serde::Serialize;

// ============================================================================
// SECTION: Command Line Interface
// ============================================================================

/// Top-level argument parser.
#[derive(Parser, Debug)]
#[command(name = "grantdesk", version, disable_help_subcommand = true)]
struct Cli {
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the Grantdesk portal server.
    Serve(ServeCommand),
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Arguments for the `serve` command.
#[derive(Args, Debug)]
struct ServeCommand {
    /// Path to the configuration file (defaults to `GRANTDESK_CONFIG`
    /// or `grantdesk.toml`).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Configuration subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Load and validate a configuration file.
    Validate(ConfigValidateCommand),
    /// Print a documented example configuration.
    Example,
}

/// Arguments for `config validate`.
#[derive(Args, Debug)]
struct ConfigValidateCommand {
    /// Path to the configuration file (defaults to `GRANTDESK_CONFIG`
    /// or `grantdesk.toml`).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// A fatal CLI error carrying a user-facing message.
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Wraps a message as a fatal error.
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => {
            let _ = write_stderr_line(&err.message);
            ExitCode::FAILURE
        }
    }
}

/// Executes the CLI command dispatcher.
async fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Serve(command) => command_serve(command).await,
        Commands::Config {
            command,
        } => command_config(&command),
    }
}

// ============================================================================
// SECTION: Serve Command
// ============================================================================

/// Structured startup event emitted once the ports are wired.
#[derive(Serialize)]
struct PortalStartedEvent {
    /// Constant event tag.
    event: &'static str,
    /// Database file path.
    database: String,
    /// Document root directory.
    documents: String,
    /// Expired sessions removed during the startup sweep.
    sessions_swept: u64,
}

/// Executes the `serve` command.
async fn command_serve(command: ServeCommand) -> CliResult<ExitCode> {
    let config = GrantdeskConfig::load(command.config.as_deref())
        .map_err(|err| CliError::new(format!("failed to load config: {err}")))?;
    let addr = config
        .server
        .bind_addr()
        .map_err(|err| CliError::new(format!("invalid bind address: {err}")))?;

    let sqlite = SqliteStorage::new(&SqliteStorageConfig {
        path: PathBuf::from(&config.database.path),
        busy_timeout_ms: config.database.busy_timeout_ms,
        journal_mode: config.database.journal_mode,
        sync_mode: config.database.sync_mode,
    })
    .map_err(|err| CliError::new(format!("failed to open database: {err}")))?;
    let storage = SharedStorage::from_store(sqlite);

    let documents: Arc<dyn DocumentStore> = Arc::new(
        FsDocumentStore::new(&config.documents.root, &config.documents.public_base_url)
            .map_err(|err| CliError::new(format!("failed to open document store: {err}")))?,
    );

    let notifier: Arc<dyn Notifier> = Arc::new(QueueNotifier::start(
        Arc::new(storage.clone()),
        Arc::new(StderrDeliveryLog),
        config.notify.queue_capacity,
    ));

    let engine = Arc::new(LifecycleEngine::new(
        storage.clone(),
        documents,
        Arc::clone(&notifier),
    ));
    let identity = Arc::new(IdentityService::new(
        storage,
        Box::new(notifier),
        clamp_ttl(config.auth.session_ttl_ms),
        clamp_ttl(config.auth.reset_ttl_ms),
    ));

    let swept = identity
        .sweep_sessions(Timestamp::now())
        .map_err(|err| CliError::new(format!("session sweep failed: {err}")))?;
    log_started(&config, swept);

    let state = AppState::new(engine, identity, config.server.max_body_bytes);
    grantdesk_http::serve(addr, state)
        .await
        .map_err(|err| CliError::new(format!("server error: {err}")))?;
    Ok(ExitCode::SUCCESS)
}

/// Converts a config TTL to the signed millisecond form the identity
/// service uses for expiry arithmetic.
fn clamp_ttl(ttl_ms: u64) -> i64 {
    i64::try_from(ttl_ms).unwrap_or(i64::MAX)
}

/// Emits the startup event as one JSON line on stderr.
fn log_started(config: &GrantdeskConfig, sessions_swept: u64) {
    let event = PortalStartedEvent {
        event: "portal_started",
        database: config.database.path.clone(),
        documents: config.documents.root.clone(),
        sessions_swept,
    };
    if let Ok(payload) = serde_json::to_string(&event) {
        let _ = write_stderr_line(&payload);
    }
}

// ============================================================================
// SECTION: Config Commands
// ============================================================================

/// Dispatches configuration subcommands.
fn command_config(command: &ConfigCommand) -> CliResult<ExitCode> {
    match command {
        ConfigCommand::Validate(command) => command_config_validate(command),
        ConfigCommand::Example => command_config_example(),
    }
}

/// Executes the config validation command.
fn command_config_validate(command: &ConfigValidateCommand) -> CliResult<ExitCode> {
    let _config = GrantdeskConfig::load(command.config.as_deref())
        .map_err(|err| CliError::new(format!("invalid config: {err}")))?;
    write_stdout_line("config ok")
        .map_err(|err| CliError::new(format!("failed to write stdout: {err}")))?;
    Ok(ExitCode::SUCCESS)
}

/// Prints the documented example configuration.
fn command_config_example() -> CliResult<ExitCode> {
    write_stdout_line(&config_toml_example())
        .map_err(|err| CliError::new(format!("failed to write stdout: {err}")))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Writes one line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes one line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        reason = "Test fixtures use explicit asserts and unwraps for clarity."
    )]

    use clap::CommandFactory;
    use grantdesk_config::config_toml_example;

    use super::Cli;
    use super::ConfigValidateCommand;
    use super::clamp_ttl;
    use super::command_config_validate;

    #[test]
    fn cli_definition_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn example_config_passes_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grantdesk.toml");
        std::fs::write(&path, config_toml_example()).unwrap();
        let command = ConfigValidateCommand {
            config: Some(path),
        };
        assert!(command_config_validate(&command).is_ok());
    }

    #[test]
    fn broken_config_fails_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grantdesk.toml");
        std::fs::write(&path, "[server\nbind = 12").unwrap();
        let command = ConfigValidateCommand {
            config: Some(path),
        };
        assert!(command_config_validate(&command).is_err());
    }

    #[test]
    fn ttl_conversion_saturates_instead_of_wrapping() {
        assert_eq!(clamp_ttl(1_000), 1_000);
        assert_eq!(clamp_ttl(u64::MAX), i64::MAX);
    }
}
