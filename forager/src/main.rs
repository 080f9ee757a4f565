use std::path::PathBuf;

use clap::Parser;
use forager::app;
use forager::config::{SimulationConfig, window_conf};

/// Command-line arguments for the forager simulator.
#[derive(Parser)]
#[command(name = "Forager", version, about = "Swarm foraging simulation")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run without a window, unthrottled, and print the run counters.
    #[arg(long)]
    headless: bool,

    /// Override the number of robots.
    #[arg(long)]
    robots: Option<u32>,

    /// Override the number of resources.
    #[arg(long)]
    resources: Option<u32>,

    /// Override the simulated-seconds budget.
    #[arg(long)]
    max_seconds: Option<f32>,
}

/// Loads the simulation configuration from a TOML file or uses defaults.
fn load_config(path: Option<PathBuf>) -> anyhow::Result<SimulationConfig> {
    match path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .map_err(|e| anyhow::anyhow!("failed to read config file '{}': {e}", path.display()))?;
            let config: SimulationConfig = toml::from_str(&content)
                .map_err(|e| anyhow::anyhow!("failed to parse config file: {e}"))?;
            println!("Loaded config from '{}'", path.display());
            Ok(config)
        }
        None => {
            println!("No config file provided, using defaults.");
            Ok(SimulationConfig::default())
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config)?;
    if let Some(robots) = cli.robots {
        config.robot_count = robots;
    }
    if let Some(resources) = cli.resources {
        config.resource_count = resources;
    }
    if let Some(max_seconds) = cli.max_seconds {
        config.max_sim_seconds = Some(max_seconds);
    }
    if cli.headless {
        config.realtime = false;
    }

    if config.realtime {
        macroquad::Window::from_config(window_conf(), app::run_realtime(config));
        Ok(())
    } else {
        let report = app::run_batch(&config)?;
        app::print_report(&report);
        Ok(())
    }
}
