mod api;
mod cli;
mod config;
mod models;
mod services;
mod snapshot;
mod utils;

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::cli::{DailyOptions, OutputFormat};
use crate::config::Settings;

#[derive(Parser)]
#[command(name = "oddsbot")]
#[command(about = "Daily football predictions from bookmaker odds, delivered to Telegram")]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Env file to load instead of ./.env
    #[arg(long, global = true)]
    env: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Serve {
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },
    /// Analyze match records from a JSON file
    Analyze {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Competition catalogue overriding COMPETITIONS_PATH
        #[arg(long)]
        competitions: Option<PathBuf>,
    },
    /// Fetch today's fixtures, analyze them and send the daily message
    Run {
        /// Day to fetch (YYYY-MM-DD), defaults to today
        #[arg(short, long)]
        date: Option<NaiveDate>,
        /// Print the message instead of sending it
        #[arg(long)]
        dry_run: bool,
        #[arg(long)]
        chat_id: Option<String>,
        /// Write the full run payload as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Skip the fixtures snapshot fallback
        #[arg(long)]
        no_cache: bool,
    },
    /// Answer owner commands sent to the bot
    Listen {
        /// Long-poll timeout in seconds
        #[arg(long, default_value = "30")]
        poll_interval: u64,
    },
    /// List supported regions and competitions
    Regions,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let settings = Settings::load(cli.env.as_deref()).context("loading settings")?;

    match cli.command {
        Some(Commands::Serve { port }) => {
            let index = cli::load_index(&settings.competitions_path)?;
            tracing::info!("Starting oddsbot API server on port {}", port);
            api::serve(port, api::AppState::from_settings(&settings, index)).await?;
        }
        Some(Commands::Analyze {
            input,
            format,
            output,
            competitions,
        }) => {
            let index = cli::load_index(competitions.as_deref().unwrap_or(settings.competitions_path.as_path()))?;
            cli::analyze_file(&input, format, output.as_deref(), &index)?;
        }
        Some(Commands::Run {
            date,
            dry_run,
            chat_id,
            output,
            no_cache,
        }) => {
            let index = cli::load_index(&settings.competitions_path)?;
            let options = DailyOptions {
                date,
                dry_run,
                chat_id,
                output,
                no_cache,
            };
            cli::run_daily(&settings, &index, options).await?;
        }
        Some(Commands::Listen { poll_interval }) => {
            let index = cli::load_index(&settings.competitions_path)?;
            cli::listen(&settings, &index, poll_interval).await?;
        }
        Some(Commands::Regions) => {
            let index = cli::load_index(&settings.competitions_path)?;
            cli::show_regions(&index);
        }
        None => {
            // Default to the daily run
            let index = cli::load_index(&settings.competitions_path)?;
            let options = DailyOptions {
                date: None,
                dry_run: false,
                chat_id: None,
                output: None,
                no_cache: false,
            };
            cli::run_daily(&settings, &index, options).await?;
        }
    }

    Ok(())
}
