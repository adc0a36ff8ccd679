use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::config::simulation::SimulationConfig;
use crate::persistence;
use crate::server::{self, ServerState};
use crate::simulation;
use crate::world::{Body, Coord, EntityId, EntityKind, World};

/// Ticks between progress log lines.
const MILESTONE_TICKS: u64 = 1000;

fn load_world(config: &SimulationConfig, world_path: Option<&str>) -> Result<World, String> {
    let result = match world_path {
        Some(path) => persistence::load_snapshot(Path::new(path)),
        None => persistence::load_latest_valid_snapshot(Path::new(&config.snapshot_directory)),
    };
    result.map_err(|e| format!("Failed to load snapshot: {}", e))
}

/// Save a snapshot and prune old ones. Returns the tick saved, if any.
fn autosave(world: &World, config: &SimulationConfig) -> Option<u64> {
    let snapshot_dir = Path::new(&config.snapshot_directory);
    match persistence::save_snapshot(world, snapshot_dir) {
        Ok(path) => {
            info!(tick = world.tick_count, path = %path.display(), "Snapshot saved");
            if let Err(e) = persistence::prune_snapshots(snapshot_dir, config.max_snapshots as usize) {
                warn!(error = %e, "Snapshot pruning failed");
            }
            Some(world.tick_count)
        }
        Err(e) => {
            warn!(tick = world.tick_count, error = %e, "Snapshot save failed");
            None
        }
    }
}

/// Run the simulation: load world, start the feed server, run the tick loop.
pub async fn run_simulation(
    config: &SimulationConfig,
    world_path: Option<&str>,
) -> Result<(), String> {
    let mut world = load_world(config, world_path)?;
    info!(
        world = %world.name,
        tick = world.tick_count,
        entities = world.registry.len(),
        cells = world.live_cells(),
        "World loaded"
    );

    let state = Arc::new(ServerState::new(server::build_snapshot_json(&world)));
    let addr: SocketAddr = format!("{}:{}", config.websocket_bind, config.websocket_port)
        .parse()
        .map_err(|e| format!("Invalid bind address: {}", e))?;

    let server_state = Arc::clone(&state);
    tokio::spawn(async move {
        if let Err(e) = server::start_server(server_state, addr).await {
            warn!(error = %e, "Server stopped");
        }
    });

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let tick_interval = Duration::from_secs_f64(1.0 / f64::from(config.tick_rate_hz));
    let start_tick = world.tick_count;
    let mut last_snapshot_tick = world.tick_count;

    info!(
        tick_rate_hz = config.tick_rate_hz,
        snapshot_interval = config.snapshot_interval,
        max_ticks = config.max_ticks,
        "Simulation running"
    );

    loop {
        let tick_start = Instant::now();

        let result = simulation::execute_tick(&mut world);
        let diff_json = server::build_diff_json(&result);
        state
            .on_tick(
                Some(server::build_snapshot_json(&world)),
                diff_json,
                &result,
                last_snapshot_tick,
            )
            .await;

        if world.tick_count - last_snapshot_tick >= u64::from(config.snapshot_interval) {
            if let Some(tick) = autosave(&world, config) {
                last_snapshot_tick = tick;
            }
        }

        if world.tick_count % MILESTONE_TICKS == 0 {
            let stats = &result.statistics;
            info!(
                tick = world.tick_count,
                cells = stats.kind_counts.get(&EntityKind::Cell).copied().unwrap_or(0),
                births = stats.births,
                deaths = stats.deaths,
                total_energy = stats.total_energy,
                diversity = stats.lineage_diversity,
                "Tick milestone"
            );
        }

        if config.max_ticks > 0 && world.tick_count - start_tick >= config.max_ticks {
            info!(tick = world.tick_count, "Tick limit reached");
            break;
        }

        let elapsed = tick_start.elapsed();
        let remaining = tick_interval.saturating_sub(elapsed);
        tokio::select! {
            biased;
            _ = &mut shutdown => {
                info!("Shutdown signal received");
                break;
            }
            _ = tokio::time::sleep(remaining) => {}
        }
    }

    autosave(&world, config);
    info!(tick = world.tick_count, "Simulation stopped");
    Ok(())
}

/// Inspect one tile, or the world as a whole, from the latest snapshot.
pub fn inspect(
    config: &SimulationConfig,
    coord: Option<Coord>,
    show_world: bool,
) -> Result<(), String> {
    let world = load_world(config, None)?;
    let lines = match coord {
        Some(coord) => describe_tile(&world, coord)?,
        None if show_world => describe_world(&world),
        None => return Err("Specify --x and --y, or --world".to_string()),
    };
    for line in lines {
        println!("{line}");
    }
    Ok(())
}

/// Text shown when inspecting one tile.
pub fn describe_tile(world: &World, coord: Coord) -> Result<Vec<String>, String> {
    if !world.bounds().contains(coord) {
        return Err(format!(
            "{} is outside the {}x{} grid",
            coord, world.params.width, world.params.height
        ));
    }
    let Some(entity) = world.registry.entity_at(coord) else {
        return Ok(vec![format!("{coord}: empty")]);
    };

    let mut lines = vec![format!("{coord}: {entity}")];
    match &entity.body {
        Body::Cell(cell) => {
            lines.extend(cell.describe());
            lines.push(format!(
                "Color: #{:02x}{:02x}{:02x}, instruction pointer: {}",
                cell.color.r, cell.color.g, cell.color.b, cell.instruction_pointer
            ));
            lines.push("Genome:".to_string());
            for (row, genes) in cell.genome.tape().chunks(10).enumerate() {
                let genes: Vec<String> = genes.iter().map(|g| format!("{g:>3}")).collect();
                lines.push(format!("  {:>3}: {}", row * 10, genes.join(" ")));
            }
        }
        Body::Energy { energy } | Body::Geyser { energy } => {
            lines.push(format!("Energy: {energy}"));
        }
        Body::Rock => {}
    }
    Ok(lines)
}

/// Text shown by `inspect --world`.
pub fn describe_world(world: &World) -> Vec<String> {
    let env = &world.environment;
    let mut lines = vec![
        format!("=== World: {} ===", world.name),
        format!("ID: {}", world.id),
        format!("Tick: {}", world.tick_count),
        format!("Size: {}x{}", world.params.width, world.params.height),
        format!("Entities: {}", world.registry.len()),
        format!("Cells: {}", world.live_cells()),
        format!("Total energy: {}", world.total_energy()),
        format!(
            "Sun: {} (level {}), entropy: {}, geysers: {}, rain: {}",
            env.sun, env.sun_level, env.entropy, env.geyser, env.rain
        ),
    ];
    let mut colors: Vec<_> = world
        .registry
        .active()
        .filter_map(|e| e.as_cell().map(|c| c.color))
        .collect();
    colors.sort_by_key(|c| (c.r, c.g, c.b));
    colors.dedup();
    lines.push(format!("Distinct lineages: {}", colors.len()));
    lines
}

/// Save the cell at `coord` in the latest snapshot as a sample.
pub fn save_sample(config: &SimulationConfig, coord: Coord) -> Result<(), String> {
    let world = load_world(config, None)?;
    let cell = world
        .registry
        .entity_at(coord)
        .and_then(|e| e.as_cell())
        .ok_or_else(|| format!("No cell at {coord}"))?;
    let path = persistence::save_sample(cell, Path::new(&config.sample_directory))
        .map_err(|e| format!("Cannot save sample: {}", e))?;
    println!("Sample saved to {}", path.display());
    Ok(())
}

/// Place a saved sample at `coord` in the latest snapshot and save the result
/// as a new snapshot.
pub fn load_sample(config: &SimulationConfig, file: &Path, coord: Coord) -> Result<(), String> {
    let mut world = load_world(config, None)?;
    let id = place_sample(&mut world, file, coord)?;
    world.drain_events();
    let path = persistence::save_snapshot(&world, Path::new(&config.snapshot_directory))
        .map_err(|e| format!("Cannot save snapshot: {}", e))?;
    println!("Cell {id} placed at {coord}; world saved to {}", path.display());
    Ok(())
}

/// Print the sample files in the configured sample directory.
pub fn list_samples(config: &SimulationConfig) -> Result<(), String> {
    for line in describe_samples(Path::new(&config.sample_directory))? {
        println!("{line}");
    }
    Ok(())
}

/// One line per sample: file name, lineage color and start address.
pub fn describe_samples(sample_dir: &Path) -> Result<Vec<String>, String> {
    let paths = persistence::list_samples(sample_dir)
        .map_err(|e| format!("Cannot list samples: {}", e))?;
    if paths.is_empty() {
        return Ok(vec![format!("No samples found in {}", sample_dir.display())]);
    }

    let mut lines = Vec::with_capacity(paths.len() + 1);
    for path in &paths {
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("?");
        match persistence::load_sample(path) {
            Ok((color, genome)) => lines.push(format!(
                "{:<32} #{:02x}{:02x}{:02x} start {}",
                name,
                color.r,
                color.g,
                color.b,
                genome.start_address()
            )),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Unreadable sample");
                lines.push(format!("{name:<32} unreadable"));
            }
        }
    }
    lines.push(format!("{} sample(s) in {}", paths.len(), sample_dir.display()));
    Ok(lines)
}

fn place_sample(world: &mut World, file: &Path, coord: Coord) -> Result<EntityId, String> {
    let (color, genome) =
        persistence::load_sample(file).map_err(|e| format!("Cannot load sample: {}", e))?;
    world
        .place_sample(coord, color, genome)
        .map_err(|e| format!("Cannot place sample: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::generation::WorldParams;
    use crate::world::cell::Cell;
    use crate::world::generation::generate_world;
    use crate::world::{Color, Genome, Orientation};
    use tempfile::TempDir;

    fn config_in(dir: &Path) -> SimulationConfig {
        SimulationConfig {
            snapshot_directory: dir.join("snapshots").to_string_lossy().into_owned(),
            sample_directory: dir.join("samples").to_string_lossy().into_owned(),
            max_snapshots: 2,
            ..SimulationConfig::default()
        }
    }

    fn world_with_cell() -> (World, Coord) {
        let mut world = generate_world(&WorldParams {
            seed: 11,
            width: 10,
            height: 10,
            initial_cells: 0,
            geyser_count: 0,
            ..WorldParams::default()
        });
        let coord = Coord::new(4, 4);
        let cell = Cell::new(
            Genome::filled(12),
            Color::rgb(100, 150, 200),
            Some(77),
            Orientation::wrapping(1),
            None,
        );
        world.spawn_cell(coord, cell).unwrap();
        world.drain_events();
        (world, coord)
    }

    #[test]
    fn describe_cell_shows_parameters_and_tape() {
        let (world, coord) = world_with_cell();
        let lines = describe_tile(&world, coord).unwrap();
        assert!(lines[0].contains("(4, 4)"));
        assert!(lines.iter().any(|l| l.starts_with("Start: 12")));
        assert!(lines.iter().any(|l| l.contains("#6496c8")));
        let rows = lines.iter().filter(|l| l.starts_with("  ") && l.contains(':')).count();
        assert_eq!(rows, 11);
        assert!(lines.last().unwrap().trim_start().starts_with("100:"));
    }

    #[test]
    fn describe_empty_rock_and_outside() {
        let (world, _) = world_with_cell();
        assert_eq!(
            describe_tile(&world, Coord::new(5, 5)).unwrap(),
            vec!["(5, 5): empty".to_string()]
        );
        assert_eq!(describe_tile(&world, Coord::new(0, 0)).unwrap().len(), 1);
        assert!(describe_tile(&world, Coord::new(10, 3)).is_err());
    }

    #[test]
    fn describe_world_counts_lineages() {
        let (world, _) = world_with_cell();
        let lines = describe_world(&world);
        assert!(lines.contains(&"Cells: 1".to_string()));
        assert!(lines.contains(&"Distinct lineages: 1".to_string()));
    }

    #[test]
    fn autosave_writes_and_prunes() {
        let dir = TempDir::new().unwrap();
        let config = config_in(dir.path());
        let (mut world, _) = world_with_cell();
        for tick in 1..=4 {
            world.tick_count = tick;
            assert_eq!(autosave(&world, &config), Some(tick));
        }
        let snapshots = persistence::list_snapshots(Path::new(&config.snapshot_directory)).unwrap();
        assert_eq!(snapshots.len(), 2);
    }

    #[test]
    fn sample_round_trip_through_snapshots() {
        let dir = TempDir::new().unwrap();
        let config = config_in(dir.path());
        let (world, coord) = world_with_cell();
        persistence::save_snapshot(&world, Path::new(&config.snapshot_directory)).unwrap();

        save_sample(&config, coord).unwrap();
        let samples = persistence::list_samples(Path::new(&config.sample_directory)).unwrap();
        assert_eq!(samples.len(), 1);

        let mut world = load_world(&config, None).unwrap();
        let target = Coord::new(2, 7);
        let id = place_sample(&mut world, &samples[0], target).unwrap();
        let placed = world.registry.get(id).unwrap();
        assert_eq!(placed.kind(), EntityKind::Cell);
        let cell = placed.as_cell().unwrap();
        assert_eq!(cell.genome, Genome::filled(12));
        assert_eq!(cell.energy, cell.max_energy);

        assert!(place_sample(&mut world, &samples[0], coord).is_err());
    }

    #[test]
    fn sample_listing_shows_each_file() {
        let dir = TempDir::new().unwrap();
        let config = config_in(dir.path());
        let sample_dir = Path::new(&config.sample_directory);
        assert!(describe_samples(sample_dir).unwrap()[0].starts_with("No samples"));

        let (world, coord) = world_with_cell();
        persistence::save_snapshot(&world, Path::new(&config.snapshot_directory)).unwrap();
        save_sample(&config, coord).unwrap();
        std::fs::write(sample_dir.join("sample-0.json"), "not json").unwrap();

        let lines = describe_samples(sample_dir).unwrap();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("unreadable"));
        assert!(lines[1].contains("#6496c8 start 12"));
        assert!(lines[2].starts_with("2 sample(s)"));
    }

    #[test]
    fn save_sample_needs_a_cell() {
        let dir = TempDir::new().unwrap();
        let config = config_in(dir.path());
        let (world, _) = world_with_cell();
        persistence::save_snapshot(&world, Path::new(&config.snapshot_directory)).unwrap();
        assert!(save_sample(&config, Coord::new(0, 0)).unwrap_err().contains("No cell"));
    }

    #[test]
    fn missing_snapshots_are_reported() {
        let dir = TempDir::new().unwrap();
        let err = load_world(&config_in(dir.path()), None).unwrap_err();
        assert!(err.contains("cellgrid generate"));
    }
}
