//! quizline - a terminal client for leveled multiple-choice quizzes.
//!
//! Log in, play the questions for your current level, review past attempts
//! and move questions between levels.

mod app;
mod commands;
mod prompt;

use std::io;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use app::App;
use quizline_core::{ApiError, Config};

/// Log file name in the cache directory
const LOG_FILE: &str = "quizline.log";

#[derive(Parser)]
#[command(name = "quizline", version, about = "Leveled quizzes in the terminal")]
struct Cli {
    /// Quiz server URL (overrides config and QUIZLINE_API_URL)
    #[arg(long, global = true)]
    server: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and store the access token
    Login {
        #[arg(short, long)]
        username: Option<String>,
    },
    /// Create a new account
    Register {
        #[arg(short, long)]
        username: Option<String>,
    },
    /// Forget the stored token and cached data
    Logout,
    /// Show server and session state
    Status,
    /// Play the questions for your current level
    Play,
    /// List past quiz attempts
    History {
        /// Show the questions answered wrong in each attempt
        #[arg(short, long)]
        details: bool,
    },
    /// Show progress and unlock state per level
    Progress,
    /// List all questions grouped by level
    Questions {
        #[arg(short, long)]
        level: Option<u8>,
    },
    /// Move questions to other levels, e.g. `set-level 12=3 7=1`
    SetLevel {
        #[arg(required = true, value_name = "ID=LEVEL")]
        assignments: Vec<String>,
    },
}

/// Initialize the tracing subscriber for logging.
///
/// Warnings go to stderr, everything the filter allows goes to the log
/// file. Use RUST_LOG to control the level (e.g., RUST_LOG=debug).
fn init_tracing(config: &Config) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let file = config.cache_dir().ok().and_then(|dir| {
        std::fs::create_dir_all(&dir).ok()?;
        Some(tracing_appender::rolling::never(dir, LOG_FILE))
    });

    match file {
        Some(appender) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(writer).with_ansi(false))
                .with(
                    fmt::layer()
                        .with_writer(io::stderr)
                        .with_filter(EnvFilter::new("warn")),
                )
                .with(filter)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(io::stderr))
                .with(filter)
                .init();
            None
        }
    }
}

/// Follow-up hint for errors that end the session
fn login_hint(error: &anyhow::Error) -> Option<&'static str> {
    error
        .downcast_ref::<ApiError>()
        .is_some_and(ApiError::requires_login)
        .then_some("Run `quizline login` to start a new session.")
}

async fn run(app: &mut App, command: Commands) -> Result<()> {
    match command {
        Commands::Login { username } => commands::login(app, username).await,
        Commands::Register { username } => commands::register(app, username).await,
        Commands::Logout => commands::logout(app),
        Commands::Status => commands::status(app),
        Commands::Play => commands::play(app).await,
        Commands::History { details } => commands::history(app, details).await,
        Commands::Progress => commands::progress(app).await,
        Commands::Questions { level } => commands::questions(app, level).await,
        Commands::SetLevel { assignments } => commands::set_level(app, &assignments).await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let mut config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Some(server) = cli.server {
        config.base_url = Some(server);
    }

    // Dropped when main returns, which flushes the log file
    let _log_guard = init_tracing(&config);
    info!(base_url = config.base_url(), "quizline starting");

    let result = match App::new(config) {
        Ok(mut app) => run(&mut app, cli.command).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("Error: {:#}", e);
            if let Some(hint) = login_hint(&e) {
                eprintln!("{}", hint);
            }
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_hint_only_for_session_errors() {
        assert!(login_hint(&ApiError::SessionExpired.into()).is_some());
        assert!(login_hint(&ApiError::Unauthorized.into()).is_some());
        assert!(login_hint(&ApiError::NoCredential.into()).is_some());
        assert!(login_hint(&ApiError::Validation("Username is required".into()).into()).is_none());
        assert!(login_hint(&anyhow::anyhow!("Passwords do not match")).is_none());
    }

    #[test]
    fn test_cli_parses_set_level() {
        let cli = Cli::try_parse_from(["quizline", "--server", "http://quiz", "set-level", "12=3", "7=1"])
            .unwrap();
        assert_eq!(cli.server.as_deref(), Some("http://quiz"));
        match cli.command {
            Commands::SetLevel { assignments } => assert_eq!(assignments, vec!["12=3", "7=1"]),
            _ => panic!("expected set-level"),
        }
    }
}
