use std::io::{self, BufRead, Write};

use anyhow::Context;
use clap::{Parser, Subcommand};

mod app;
mod auth;
mod config;
mod error;
mod extract;
mod invitations;
mod items;
mod lists;
mod mail;
mod setup;
mod state;
mod store;
mod validation;

use crate::{config::AppConfig, setup::services::SetupService, state::AppState};

#[derive(Parser)]
#[command(name = "shoplist")]
#[command(about = "Shared shopping lists with passwordless login", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API (default)
    Serve,

    /// Create the first admin account and their default list
    Setup {
        /// Admin email; prompted for when omitted
        #[arg(short, long)]
        email: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve().await,
        Commands::Setup { email } => run_setup(email).await,
    }
}

fn init_tracing() {
    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "shoplist=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }
}

async fn serve() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    let state = AppState::init(config).await?;

    if !state.setup.is_system_setup().await? {
        tracing::error!("system is not set up; run `shoplist setup` first");
        std::process::exit(1);
    }

    let config = state.config.clone();
    let app = app::build_app(state);
    app::serve(app, &config).await
}

async fn run_setup(email: Option<String>) -> anyhow::Result<()> {
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let store = state::connect_store(&database_url, 1).await?;
    let setup = SetupService::new(std::sync::Arc::new(store));

    if setup.is_system_setup().await? {
        println!("System is already set up.");
        return Ok(());
    }

    let email = match email {
        Some(email) => email,
        None => prompt("Admin email: ")?,
    };
    let admin = setup.setup_system(&email).await?;
    println!("System set up. Log in as {} to get started.", admin.email);
    Ok(())
}

fn prompt(label: &str) -> anyhow::Result<String> {
    print!("{label}");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line).context("read admin email")?;
    Ok(line.trim().to_string())
}
