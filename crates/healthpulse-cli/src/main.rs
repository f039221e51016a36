use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use healthpulse_config::{ConfigLoader, HealthPulseConfig};
use healthpulse_db::HealthStore;
use healthpulse_gateway::GatewayServer;
use healthpulse_security::hash_password;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(
    name = "healthpulse",
    version,
    about = "Personal health tracking service with an AI assistant"
)]
struct Cli {
    /// Path to the configuration file.
    #[arg(long, default_value = "healthpulse.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP gateway (default).
    Serve,
    /// Populate the database with a demo user and measurements.
    Seed,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = ConfigLoader::load(&cli.config)?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => GatewayServer::new(config).run().await?,
        Command::Seed => seed(&config)?,
    }
    Ok(())
}

fn seed(config: &HealthPulseConfig) -> Result<()> {
    let store = HealthStore::open(Path::new(&config.database.path))?;

    let password_hash = hash_password("password")?;
    let user = match store.create_user("user@test.com", Some("Test User"), &password_hash) {
        Ok(user) => user,
        Err(healthpulse_common::Error::Validation(_)) => store
            .user_with_password("user@test.com")?
            .map(|(user, _)| user)
            .context("seed user exists but could not be loaded")?,
        Err(e) => return Err(e.into()),
    };

    for (kind, value, unit) in [
        ("BPM", 72.0, "bpm"),
        ("BPM", 78.0, "bpm"),
        ("BPM", 65.0, "bpm"),
        ("Weight", 75.5, "kg"),
    ] {
        store.add_record(user.id, kind, value, Some(unit))?;
    }

    info!("seeded demo data for {}", user.email);
    Ok(())
}
