//! Wayfare CLI.
//!
//! Starts a grid and prints every camera frame to stdout. Logs go to stderr.

use std::io::Write;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use wayfare::prelude::*;

#[derive(Parser)]
#[command(name = "wayfare")]
#[command(version)]
#[command(about = "Travelers wandering a grid of concurrent cells")]
struct Cli {
    /// Grid width (1..=10)
    #[arg(short = 'W', long, default_value_t = 6)]
    width: u32,

    /// Grid height (1..=10)
    #[arg(short = 'H', long, default_value_t = 4)]
    height: u32,

    /// Maximum number of ordinary travelers ever created
    #[arg(short = 'T', long, default_value_t = 10)]
    max_travelers: u32,

    /// Per-tick chance an empty cell spawns a traveler
    #[arg(short, long, default_value_t = 0.1)]
    spawn_prob: f64,

    /// Per-tick chance a traveler tries to move
    #[arg(short, long, default_value_t = 0.5)]
    move_prob: f64,

    /// Per-tick chance an empty cell spawns a feral traveler
    #[arg(short, long, default_value_t = 0.025)]
    wild_prob: f64,

    /// Per-tick chance an empty cell turns hazardous
    #[arg(short, long, default_value_t = 0.025)]
    danger_prob: f64,

    /// Idle tick of cells and travelers, in milliseconds
    #[arg(long, default_value_t = 2000)]
    tick_ms: u64,

    /// Time between camera pictures, in milliseconds
    #[arg(long, default_value_t = 2000)]
    camera_ms: u64,

    /// Seed for reproducible randomness
    #[arg(long)]
    seed: Option<u64>,

    /// Stop after this many pictures (default: run until killed)
    #[arg(long)]
    pictures: Option<usize>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn grid_config(&self) -> GridConfig {
        GridConfig {
            width: self.width,
            height: self.height,
            max_travelers: self.max_travelers,
            spawn_probability: self.spawn_prob,
            move_probability: self.move_prob,
            feral_probability: self.wild_prob,
            hazard_probability: self.danger_prob,
            tick_interval: Duration::from_millis(self.tick_ms),
            camera_interval: Some(Duration::from_millis(self.camera_ms)),
            seed: self.seed,
            ..GridConfig::default()
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to install log subscriber")?;

    let mut grid = Grid::start(cli.grid_config()).context("invalid grid configuration")?;
    info!(
        width = cli.width,
        height = cli.height,
        pictures = ?cli.pictures,
        "grid running"
    );

    let limit = cli.pictures.unwrap_or(usize::MAX);
    let mut stdout = std::io::stdout().lock();
    for frame in grid.frames().iter().take(limit) {
        write!(stdout, "{frame}").context("failed to write picture")?;
        stdout.flush().context("failed to flush stdout")?;
    }

    let report = grid.shutdown();
    info!(
        total_ms = report.total_ms,
        tasks_stopped = report.tasks_stopped,
        "grid stopped"
    );
    Ok(())
}
