#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line viewer for the visitor analytics layer.
//!
//! Prints the same series the dashboard charts consume, which makes it a
//! quick way to check what a configured remote (or the bundled datasets)
//! would render.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use aforo_service::{
    DashboardService, DetectionFeed, LocalDetections, RemoteDetections, ServiceConfig,
    VisitDataset,
};

#[derive(Parser)]
#[command(name = "aforo", about = "Visitor analytics viewer")]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Force the local datasets, never touching the remote.
    #[arg(long)]
    local: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Visitors per age range
    Ages,
    /// Visitors per hour of day
    Hours,
    /// Visitors per gender
    Genders,
    /// Visitors per type
    Types {
        /// Only count visitors with this exact gender label
        #[arg(long, default_value = "")]
        gender: String,
    },
    /// Age-by-type cross table
    Cross,
    /// Remote reachability check
    Status,
    /// Detection capture instants, most recent first
    Timestamps,
    /// Detection counts grouped into timeline intervals
    Timeline,
    /// Detected coordinates for the heatmap
    Heatmap {
        /// Capture instant to inspect; defaults to the most recent
        #[arg(long)]
        at: Option<String>,
    },
    /// Overview statistics of the zone visitor dataset
    Stats,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init_custom_env("RUST_LOG");

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ServiceConfig::from_path(path)?,
        None => ServiceConfig::default(),
    }
    .with_env_overrides();
    if cli.local {
        config.use_remote = false;
    }

    match cli.command {
        Commands::Ages => {
            let service = DashboardService::new(&config)?;
            print_series(&service.age_series().await?);
        }
        Commands::Hours => {
            let service = DashboardService::new(&config)?;
            print_series(&service.hourly_series().await?);
        }
        Commands::Genders => {
            let service = DashboardService::new(&config)?;
            print_series(&service.gender_series().await?);
        }
        Commands::Types { gender } => {
            let service = DashboardService::new(&config)?;
            print_series(&service.type_series(&gender).await?);
        }
        Commands::Cross => {
            let service = DashboardService::new(&config)?;
            for (age, row) in service.cross_table().await? {
                println!("{age}");
                for (tipo, count) in row {
                    println!("  {tipo:<16} {count}");
                }
            }
        }
        Commands::Status => {
            let service = DashboardService::new(&config)?;
            let reachable = service.check_remote_status().await;
            println!(
                "{} -> {}",
                config.base_url,
                if reachable { "reachable" } else { "unreachable" }
            );
        }
        Commands::Timestamps => {
            for timestamp in timestamps(&config).await? {
                println!("{timestamp}");
            }
        }
        Commands::Timeline => {
            let groups = if config.use_remote {
                detection_feed_remote(&config)?.grouped().await
            } else {
                detection_feed_local(&config)?.grouped().await
            };
            for (slot, count) in groups {
                println!("{slot}  {count}");
            }
        }
        Commands::Heatmap { at } => {
            for [x, y] in heatmap(&config, at.as_deref()).await? {
                println!("{x:.2}, {y:.2}");
            }
        }
        Commands::Stats => {
            let dataset = VisitDataset::new(&config)?;
            match dataset.stats() {
                Some(stats) => {
                    println!("total visitors       {}", stats.total_visitors);
                    println!(
                        "adults / children    {}% / {}%",
                        stats.adult_percentage, stats.children_percentage
                    );
                    println!(
                        "male / female        {}% / {}%",
                        stats.male_percentage, stats.female_percentage
                    );
                    println!(
                        "peak hour            {}:00 ({} visitors)",
                        stats.peak_hour, stats.peak_hour_visitors
                    );
                    println!(
                        "most popular zone    {} ({} visitors)",
                        stats.most_popular_zone, stats.most_popular_zone_visitors
                    );
                    println!("avg visitors / hour  {}", stats.average_visitors_per_hour);
                }
                None => println!("no visitor samples available"),
            }
        }
    }

    Ok(())
}

async fn timestamps(config: &ServiceConfig) -> Result<Vec<String>, Box<dyn std::error::Error>> {
    if config.use_remote {
        let feed = detection_feed_remote(config)?;
        let list = feed.unique_timestamps().await;
        if !list.is_empty() {
            return Ok(list);
        }
        log::warn!("remote detection feed empty or unreachable, using local dataset");
    }
    Ok(detection_feed_local(config)?.unique_timestamps().await)
}

async fn heatmap(
    config: &ServiceConfig,
    at: Option<&str>,
) -> Result<Vec<[f64; 2]>, Box<dyn std::error::Error>> {
    if config.use_remote {
        let feed = detection_feed_remote(config)?;
        let coordinates = feed.heatmap_coordinates(at).await;
        if !coordinates.is_empty() {
            return Ok(coordinates);
        }
        log::warn!("remote detection feed empty or unreachable, using local dataset");
    }
    Ok(detection_feed_local(config)?.heatmap_coordinates(at).await)
}

fn detection_feed_remote(
    config: &ServiceConfig,
) -> Result<DetectionFeed<RemoteDetections>, Box<dyn std::error::Error>> {
    Ok(DetectionFeed::new(
        RemoteDetections::new(config)?,
        config.detection_group_minutes,
        config.aggregate.time_reference,
    ))
}

fn detection_feed_local(
    config: &ServiceConfig,
) -> Result<DetectionFeed<LocalDetections>, Box<dyn std::error::Error>> {
    Ok(DetectionFeed::new(
        LocalDetections::new(config)?,
        config.detection_group_minutes,
        config.aggregate.time_reference,
    ))
}

fn print_series(series: &[aforo_service::SeriesPoint]) {
    if series.is_empty() {
        println!("no data");
        return;
    }
    let width = series.iter().map(|p| p.bucket.len()).max().unwrap_or(0);
    for point in series {
        println!("{:<width$}  {}", point.bucket, point.total);
    }
}
