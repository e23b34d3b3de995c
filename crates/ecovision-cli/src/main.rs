//! # ecovision
//!
//! Command-line client for the EcoVision backend.

#![deny(unsafe_code)]

mod commands;
mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use ecovision_api::{ApiError, NewWasteBank, user_message};
use ecovision_settings::get_settings;

use crate::commands::App;

/// EcoVision command-line client.
#[derive(Parser, Debug)]
#[command(name = "ecovision", version, about = "EcoVision command-line client")]
struct Cli {
    /// Log filter (overridden by `RUST_LOG`).
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in and store the session.
    Login {
        /// Account email.
        #[arg(long)]
        email: String,
        /// Account password.
        #[arg(long)]
        password: String,
    },
    /// Create an account and sign in.
    Register {
        /// Public user name.
        #[arg(long)]
        username: String,
        /// Account email.
        #[arg(long)]
        email: String,
        /// Account password.
        #[arg(long)]
        password: String,
    },
    /// Forget the stored session.
    Logout,
    /// Show the signed-in user.
    Whoami,
    /// Check that the backend answers.
    Health,
    /// Show the leaderboard.
    Leaderboard,
    /// List or add waste banks.
    #[command(subcommand)]
    WasteBanks(WasteBankCommand),
    /// List trash cans.
    TrashCans,
    /// Classify a photo of waste.
    Classify {
        /// Image file (at most 5 MiB).
        image: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
enum WasteBankCommand {
    /// List waste banks.
    List,
    /// Register a new waste bank.
    Add {
        /// Name.
        #[arg(long)]
        name: String,
        /// Street address.
        #[arg(long)]
        address: Option<String>,
        /// Latitude.
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
        /// Longitude.
        #[arg(long, allow_negative_numbers = true)]
        lng: f64,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_subscriber(&cli.log_level, cli.log_json);

    match run(cli.command).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {}", describe_error(&err));
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command) -> Result<ExitCode> {
    let settings = get_settings();
    tracing::debug!(base_url = %settings.api.base_url, "starting");
    let app = App::from_settings(settings)?;

    match command {
        Command::Login { email, password } => app.login(&email, &password).await?,
        Command::Register {
            username,
            email,
            password,
        } => app.register(&username, &email, &password).await?,
        Command::Logout => app.logout()?,
        Command::Whoami => app.whoami(),
        Command::Health => {
            if !app.health().await {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Leaderboard => app.leaderboard().await?,
        Command::WasteBanks(WasteBankCommand::List) => app.waste_banks().await?,
        Command::WasteBanks(WasteBankCommand::Add {
            name,
            address,
            lat,
            lng,
        }) => {
            let bank = NewWasteBank {
                name,
                address,
                latitude: lat,
                longitude: lng,
                ..NewWasteBank::default()
            };
            app.add_waste_bank(&bank).await?;
        }
        Command::TrashCans => app.trash_cans().await?,
        Command::Classify { image } => app.classify(&image).await?,
    }
    Ok(ExitCode::SUCCESS)
}

/// End-user text for an error: the short API message when there is one.
fn describe_error(err: &anyhow::Error) -> String {
    match err.downcast_ref::<ApiError>() {
        Some(api) => user_message(api),
        None => format!("{err:#}"),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
