use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use cellgrid::cli::commands;
use cellgrid::config::generation::WorldParams;
use cellgrid::config::simulation::SimulationConfig;
use cellgrid::persistence;
use cellgrid::world::Coord;
use cellgrid::world::generation::{generate_world, print_world_summary};

#[derive(Parser)]
#[command(name = "cellgrid")]
#[command(about = "A tile-grid artificial life simulator where every cell runs its genome")]
#[command(version)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate and seed a new world
    Generate {
        /// Path to world generation config file
        #[arg(short, long, default_value = "worldgen.toml")]
        worldgen: String,

        /// Output snapshot directory
        #[arg(short, long, default_value = "snapshots")]
        output: String,
    },

    /// Run the simulation and serve the live feed
    Run {
        /// Path to a specific world snapshot to load
        #[arg(short, long)]
        world: Option<String>,
    },

    /// Inspect a tile or the whole world in the latest snapshot
    Inspect {
        #[arg(short, long, requires = "y")]
        x: Option<i32>,

        #[arg(short, long, requires = "x")]
        y: Option<i32>,

        /// Show world-level summary
        #[arg(long, conflicts_with = "x")]
        world: bool,
    },

    /// Manage world snapshots
    Snapshots {
        #[command(subcommand)]
        action: SnapshotAction,
    },

    /// Save or place cell samples
    Sample {
        #[command(subcommand)]
        action: SampleAction,
    },
}

#[derive(Subcommand)]
enum SnapshotAction {
    /// List available snapshots
    List {
        /// Snapshot directory
        #[arg(short, long, default_value = "snapshots")]
        dir: String,
    },

    /// Restore and display a world from a snapshot file
    Restore {
        /// Path to the snapshot file
        file: String,
    },
}

#[derive(Subcommand)]
enum SampleAction {
    /// List saved sample files
    List,

    /// Save the cell at a coordinate as a sample file
    Save {
        #[arg(short, long)]
        x: i32,
        #[arg(short, long)]
        y: i32,
    },

    /// Place a sample as a new cell at an empty coordinate
    Load {
        /// Path to the sample file
        file: PathBuf,
        #[arg(short, long)]
        x: i32,
        #[arg(short, long)]
        y: i32,
    },
}

fn init_tracing(default_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr);
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

fn require_config(config: Result<SimulationConfig, String>) -> SimulationConfig {
    match config {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            std::process::exit(1);
        }
    }
}

fn exit_on_error(result: Result<(), String>) {
    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = SimulationConfig::from_file(Path::new(&cli.config));
    let level = config.as_ref().map(|c| c.log_level.as_str()).unwrap_or("info");
    init_tracing(level, cli.json_logs);

    match cli.command {
        Commands::Generate { worldgen, output } => {
            let params = match WorldParams::from_file(Path::new(&worldgen)) {
                Ok(p) => p,
                Err(e) => {
                    eprintln!("Error loading generation config: {}", e);
                    std::process::exit(1);
                }
            };
            println!("Generating world from {}...", worldgen);
            let world = generate_world(&params);
            print_world_summary(&world);

            match persistence::save_snapshot(&world, Path::new(&output)) {
                Ok(path) => println!("\nWorld saved to {}", path.display()),
                Err(e) => {
                    eprintln!("Cannot save snapshot: {}", e);
                    std::process::exit(1);
                }
            }
        }

        Commands::Run { world } => {
            let config = require_config(config);
            if let Err(e) = commands::run_simulation(&config, world.as_deref()).await {
                eprintln!("Simulation error: {}", e);
                std::process::exit(1);
            }
        }

        Commands::Inspect { x, y, world } => {
            let config = require_config(config);
            let coord = x.zip(y).map(|(x, y)| Coord::new(x, y));
            exit_on_error(commands::inspect(&config, coord, world));
        }

        Commands::Snapshots { action } => match action {
            SnapshotAction::List { dir } => {
                let snapshot_dir = Path::new(&dir);
                match persistence::list_snapshots(snapshot_dir) {
                    Ok(snapshots) if snapshots.is_empty() => {
                        println!("No snapshots found in {}", snapshot_dir.display());
                    }
                    Ok(snapshots) => {
                        println!("{:<40} {:>8} {:>12}", "File", "Tick", "Size");
                        println!("{}", "-".repeat(62));
                        for s in &snapshots {
                            let name = s.path.file_name().and_then(|n| n.to_str()).unwrap_or("?");
                            println!("{:<40} {:>8} {:>9} KB", name, s.tick_count, s.file_size / 1024);
                        }
                        println!("\n{} snapshot(s) in {}", snapshots.len(), snapshot_dir.display());
                    }
                    Err(e) => {
                        eprintln!("Error listing snapshots: {}", e);
                        std::process::exit(1);
                    }
                }
            }
            SnapshotAction::Restore { file } => {
                let path = Path::new(&file);
                match persistence::load_snapshot(path) {
                    Ok(world) => {
                        println!("Restored world from {}", path.display());
                        print_world_summary(&world);
                    }
                    Err(e) => {
                        eprintln!("Error restoring snapshot: {}", e);
                        std::process::exit(1);
                    }
                }
            }
        },

        Commands::Sample { action } => {
            let config = require_config(config);
            match action {
                SampleAction::List => exit_on_error(commands::list_samples(&config)),
                SampleAction::Save { x, y } => {
                    exit_on_error(commands::save_sample(&config, Coord::new(x, y)));
                }
                SampleAction::Load { file, x, y } => {
                    exit_on_error(commands::load_sample(&config, &file, Coord::new(x, y)));
                }
            }
        }
    }
}
