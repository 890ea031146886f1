//! comfortcast - city weather ranked by comfort.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use comfortcast_core::{AppError, Config};
use comfortcast_weather::{ServiceError, WeatherPipeline};
use serde::Serialize;

#[derive(Debug, Parser)]
#[command(name = "comfortcast", version, about = "Current weather ranked by how comfortable it is")]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Serve deterministic mock data instead of calling the provider
    #[arg(long, global = true)]
    mock: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Rank every supported city, most comfortable first
    Rank {
        /// Bypass cached entries
        #[arg(long)]
        refresh: bool,
    },
    /// Weather and comfort for one city
    City {
        id: String,
        #[arg(long)]
        refresh: bool,
    },
    /// Comfort breakdown for one city
    Comfort { id: String },
    /// List supported cities
    Cities,
    /// Service information
    Info,
    /// Cache status of one city
    CacheStatus { id: String },
    /// Cumulative cache statistics
    Stats,
    /// Rank repeatedly, logging cache statistics after each round
    Watch {
        /// Seconds between rounds
        #[arg(long, default_value_t = 60)]
        interval: u64,
        #[arg(long, default_value_t = 3)]
        rounds: u32,
        /// Clear the whole cache every N rounds (0 = never)
        #[arg(long, default_value_t = 0)]
        clear_every: u32,
    },
    /// Print the effective configuration with secrets masked
    Config,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn service_error(err: ServiceError) -> anyhow::Error {
    tracing::error!("{}", err.user_message());
    AppError::from(err).into()
}

fn load_config(cli: &Cli) -> Result<Config> {
    let (mut config, validation) = Config::load_validated(cli.config.as_deref())
        .map_err(|e| {
            tracing::error!("{}", e.user_message());
            AppError::from(e)
        })
        .context("Failed to load configuration")?;

    if !validation.warnings.is_empty() {
        tracing::debug!("Configuration loaded with {} warnings", validation.warnings.len());
    }
    if cli.mock {
        config.weather.mock_enabled = true;
    }
    Ok(config)
}

async fn watch(pipeline: &WeatherPipeline, interval: u64, rounds: u32, clear_every: u32) -> Result<()> {
    let mut ticker = tokio::time::interval(Duration::from_secs(interval.max(1)));

    for round in 1..=rounds {
        ticker.tick().await;

        if clear_every > 0 && round > 1 && (round - 1) % clear_every == 0 {
            let removed = pipeline.evict_all().await;
            tracing::info!("Round {}: cleared {} cached cities", round, removed);
        }

        let ranked = pipeline.get_all(false).await;
        if let Some(top) = ranked.first() {
            tracing::info!(
                "Round {}: {} is most comfortable ({} / {})",
                round,
                top.report.snapshot.city_name,
                top.report.comfort.comfort_score,
                top.report.comfort.comfort_level
            );
        }

        let stats = pipeline.cache_statistics();
        tracing::info!(
            round,
            hits = stats.hit_count,
            misses = stats.miss_count,
            cached = stats.current_size,
            hit_rate = stats.hit_rate,
            "Cache statistics"
        );
    }

    print_json(&pipeline.cache_statistics())
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;

    if let Command::Config = cli.command {
        print!("{}", config.to_redacted_toml()?);
        return Ok(());
    }

    let pipeline = WeatherPipeline::from_config(&config).context("Failed to set up weather source")?;

    match cli.command {
        Command::Rank { refresh } => print_json(&pipeline.get_all(refresh).await),
        Command::City { id, refresh } => {
            let report = pipeline.get_city(&id, refresh).await.map_err(service_error)?;
            print_json(&report)
        }
        Command::Comfort { id } => {
            let breakdown = pipeline.comfort_index(&id).await.map_err(service_error)?;
            print_json(&breakdown)
        }
        Command::Cities => print_json(&pipeline.supported_cities()),
        Command::Info => print_json(&pipeline.system_info()),
        Command::CacheStatus { id } => print_json(&pipeline.cache_status(&id)),
        Command::Stats => print_json(&pipeline.cache_statistics()),
        Command::Watch {
            interval,
            rounds,
            clear_every,
        } => watch(&pipeline, interval, rounds, clear_every).await,
        Command::Config => Ok(()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    comfortcast_core::init()?;
    run(Cli::parse()).await
}
