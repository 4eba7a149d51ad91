//! MoogShip CLI - operator tools over the console client.
//!
//! # Usage
//!
//! ```bash
//! # List your shipments, most expensive first
//! moogship shipments list --sort total --order desc
//!
//! # Cancel a pending shipment
//! moogship shipments cancel 7
//!
//! # Follow carrier tracking
//! moogship shipments track 7 --watch
//!
//! # Approve a user and credit their balance
//! moogship users approve 12
//! moogship users add-balance 12 25.00
//! ```
//!
//! # Environment Variables
//!
//! See `ClientConfig::from_env`. `MOOGSHIP_LOG_JSON` switches logs to JSON.

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use moogship_client::{ClientConfig, Console};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::{CommandError, pricing::PricingAction, shipments::ShipmentAction, users::UserAction};

#[derive(Parser)]
#[command(name = "moogship")]
#[command(author, version, about = "MoogShip console tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List, inspect and act on shipments
    Shipments {
        #[command(subcommand)]
        action: ShipmentAction,
    },
    /// Manage users (admin)
    Users {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Manage price multiplier rules (admin)
    Pricing {
        #[command(subcommand)]
        action: PricingAction,
    },
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &ClientConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "moogship_cli=info,moogship_client=info".into());

    let json = std::env::var_os("MOOGSHIP_LOG_JSON").is_some();
    let json_layer = json.then(|| tracing_subscriber::fmt::layer().json().flatten_event(true));
    let text_layer = (!json).then(|| tracing_subscriber::fmt::layer().with_target(false));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Config first: Sentry must be initialized before the subscriber
    let config = ClientConfig::from_env();
    let sentry_guard = config.as_ref().ok().and_then(init_sentry);
    init_tracing();

    let result = match config {
        Ok(config) => run(cli, config).await,
        Err(e) => Err(CommandError::from(e)),
    };

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        // exit() skips the guard's drop, which would flush
        if let Some(guard) = sentry_guard {
            guard.flush(Some(std::time::Duration::from_secs(2)));
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: ClientConfig) -> Result<(), CommandError> {
    let console = Console::new(config)?;
    match cli.command {
        Commands::Shipments { action } => commands::shipments::run(&console, action).await,
        Commands::Users { action } => commands::users::run(&console, action).await,
        Commands::Pricing { action } => commands::pricing::run(&console, action).await,
    }
}
