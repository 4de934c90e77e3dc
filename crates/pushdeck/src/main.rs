//! # pushdeck
//!
//! Command-line console for composing push notifications and sending them
//! through the gateway, one dispatch at a time.

#![deny(unsafe_code)]

mod compose;
mod console;
mod render;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pushdeck_core::ReadinessGate;
use pushdeck_core::logging::{LogFormat, init_subscriber};
use pushdeck_dispatch::{ApnsClientFactory, SchedulerConfig};
use pushdeck_settings::ConsoleSettings;

use crate::compose::{ComposeArgs, CredentialArgs, EndpointArgs};
use crate::console::Console;

/// Exit code when inputs are incomplete or invalid.
const EXIT_NOT_READY: u8 = 2;

/// Push notification console.
#[derive(Parser, Debug)]
#[command(name = "pushdeck", version, about = "Compose and send push notifications")]
struct Cli {
    /// Settings file (defaults to `~/.pushdeck/settings.json`).
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Log level or `EnvFilter` directive (overrides settings).
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Log as JSON.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send one notification.
    Send {
        #[command(flatten)]
        compose: ComposeArgs,
        #[command(flatten)]
        credentials: CredentialArgs,
        #[command(flatten)]
        endpoint: EndpointArgs,
    },
    /// Send every notification in a JSON-lines file, in order.
    Batch {
        /// JSON-lines file, one notification per line.
        file: PathBuf,
        #[command(flatten)]
        credentials: CredentialArgs,
        #[command(flatten)]
        endpoint: EndpointArgs,
    },
    /// Report which inputs are missing, without sending.
    Check {
        #[command(flatten)]
        compose: ComposeArgs,
        #[command(flatten)]
        credentials: CredentialArgs,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let settings = match cli.settings {
        Some(ref path) => pushdeck_settings::load_settings_from_path(path),
        None => pushdeck_settings::load_settings(),
    }
    .context("failed to load settings")?;

    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| settings.logging.level.clone());
    let format = if cli.json_logs {
        LogFormat::Json
    } else {
        settings.logging.format
    };
    init_subscriber(&level, format);

    match cli.command {
        Command::Send {
            compose,
            credentials,
            endpoint,
        } => {
            let notification = compose::notification(&compose, &settings.compose)?;
            let credentials = compose::credentials(&credentials, &settings.credentials)?;
            let endpoint = compose::endpoint(&endpoint, &settings.gateway);

            let mut console = start_console(&settings, endpoint);
            let _ = console.set_credentials(credentials);
            if !console.set_notification(notification) {
                eprintln!("{}", render::readiness_report(console.gate().readiness()));
                let _ = console.finish().await?;
                return Ok(ExitCode::from(EXIT_NOT_READY));
            }
            let _ = console.submit().await?;
            finish(console).await
        }
        Command::Batch {
            file,
            credentials,
            endpoint,
        } => {
            let entries = compose::batch(&file, &settings.compose)?;
            let credentials = compose::credentials(&credentials, &settings.credentials)?;
            let endpoint = compose::endpoint(&endpoint, &settings.gateway);

            let mut console = start_console(&settings, endpoint);
            let _ = console.set_credentials(credentials);
            for entry in entries {
                if !console.set_notification(Some(entry.notification)) {
                    let report = render::readiness_report(console.gate().readiness());
                    eprintln!("line {}: {report}", entry.line);
                    let _ = console.finish().await?;
                    return Ok(ExitCode::from(EXIT_NOT_READY));
                }
                let _ = console.submit().await?;
            }
            finish(console).await
        }
        Command::Check {
            compose,
            credentials,
        } => {
            let mut gate = ReadinessGate::new();
            let _ = gate.set_notification(compose::notification(&compose, &settings.compose)?);
            let _ = gate.set_credentials(
                compose::credentials(&credentials, &settings.credentials)?.map(Arc::new),
            );
            println!("{}", render::readiness_report(gate.readiness()));
            Ok(if gate.is_ready() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(EXIT_NOT_READY)
            })
        }
    }
}

fn start_console(
    settings: &ConsoleSettings,
    endpoint: pushdeck_core::Endpoint,
) -> Console<std::io::Stdout> {
    let factory = ApnsClientFactory::new(Duration::from_millis(settings.gateway.request_timeout_ms));
    let config = SchedulerConfig {
        queue_capacity: settings.scheduler.queue_capacity,
        close_timeout: Duration::from_millis(settings.gateway.close_timeout_ms),
    };
    Console::new(Arc::new(factory), config, endpoint, std::io::stdout())
}

async fn finish(console: Console<std::io::Stdout>) -> Result<ExitCode> {
    let (log, _) = console.finish().await?;
    Ok(if log.failure_count() > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
