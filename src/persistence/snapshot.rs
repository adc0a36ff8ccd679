use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;
use tracing::{debug, warn};

use crate::world::{LoadError, World, WorldRecord};

const PREFIX: &str = "world-tick";
const EXTENSION: &str = ".bin";

/// Metadata about a snapshot file on disk, taken from its name.
#[derive(Debug, Clone)]
pub struct SnapshotMetadata {
    pub path: PathBuf,
    pub tick_count: u64,
    pub timestamp: u64,
    pub file_size: u64,
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Serialization error: {0}")]
    Serialize(String),
    #[error("Deserialization error: {0}")]
    Deserialize(String),
    #[error("Invalid world in {}: {source}", .path.display())]
    Invalid { path: PathBuf, source: LoadError },
    #[error("No valid snapshots found. Generate a new world with: cellgrid generate")]
    NoValidSnapshots,
}

fn snapshot_filename(tick_count: u64, timestamp: u64) -> String {
    format!("{PREFIX}{tick_count}-{timestamp}{EXTENSION}")
}

/// Parses `world-tick{N}-{timestamp}.bin`.
fn parse_snapshot_filename(filename: &str) -> Option<(u64, u64)> {
    let rest = filename.strip_suffix(EXTENSION)?.strip_prefix(PREFIX)?;
    let (tick, timestamp) = rest.split_once('-')?;
    Some((tick.parse().ok()?, timestamp.parse().ok()?))
}

fn unix_timestamp_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Save a world snapshot into `snapshot_dir`.
///
/// The record is written to a hidden temp file and renamed into place, so a
/// partial write never replaces a good snapshot.
pub fn save_snapshot(world: &World, snapshot_dir: &Path) -> Result<PathBuf, SnapshotError> {
    fs::create_dir_all(snapshot_dir)?;

    let filename = snapshot_filename(world.tick_count, unix_timestamp_now());
    let target = snapshot_dir.join(&filename);
    let tmp = snapshot_dir.join(format!(".{}.tmp", filename));

    let encoded = bincode::serialize(&world.to_record())
        .map_err(|e| SnapshotError::Serialize(e.to_string()))?;

    let written = fs::write(&tmp, &encoded).and_then(|()| fs::rename(&tmp, &target));
    if let Err(e) = written {
        let _ = fs::remove_file(&tmp);
        return Err(SnapshotError::Io(e));
    }

    debug!(path = %target.display(), bytes = encoded.len(), "Snapshot written");
    Ok(target)
}

/// Read the raw record without validating it.
pub fn read_record(path: &Path) -> Result<WorldRecord, SnapshotError> {
    let data = fs::read(path)?;
    bincode::deserialize(&data).map_err(|e| SnapshotError::Deserialize(e.to_string()))
}

/// Load and validate a world from a snapshot file.
pub fn load_snapshot(path: &Path) -> Result<World, SnapshotError> {
    let record = read_record(path)?;
    World::from_record(record).map_err(|source| SnapshotError::Invalid {
        path: path.to_path_buf(),
        source,
    })
}

/// List snapshots in a directory, newest first.
pub fn list_snapshots(snapshot_dir: &Path) -> Result<Vec<SnapshotMetadata>, SnapshotError> {
    if !snapshot_dir.exists() {
        return Ok(Vec::new());
    }

    let mut snapshots = Vec::new();
    for entry in fs::read_dir(snapshot_dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(filename) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        // Hidden names are in-flight temp files.
        if filename.starts_with('.') {
            continue;
        }
        if let Some((tick_count, timestamp)) = parse_snapshot_filename(filename) {
            snapshots.push(SnapshotMetadata {
                file_size: entry.metadata().map(|m| m.len()).unwrap_or(0),
                path,
                tick_count,
                timestamp,
            });
        }
    }

    snapshots.sort_by(|a, b| {
        b.timestamp
            .cmp(&a.timestamp)
            .then(b.tick_count.cmp(&a.tick_count))
    });
    Ok(snapshots)
}

/// Delete all but the `max_snapshots` newest snapshots. Returns what was deleted.
pub fn prune_snapshots(
    snapshot_dir: &Path,
    max_snapshots: usize,
) -> Result<Vec<PathBuf>, SnapshotError> {
    let snapshots = list_snapshots(snapshot_dir)?;
    let mut deleted = Vec::new();
    for snapshot in snapshots.iter().skip(max_snapshots) {
        fs::remove_file(&snapshot.path)?;
        deleted.push(snapshot.path.clone());
    }
    Ok(deleted)
}

/// Load the newest snapshot that decodes and validates, skipping bad ones.
pub fn load_latest_valid_snapshot(snapshot_dir: &Path) -> Result<World, SnapshotError> {
    for snapshot in list_snapshots(snapshot_dir)? {
        match load_snapshot(&snapshot.path) {
            Ok(world) => return Ok(world),
            Err(e) => {
                warn!(
                    path = %snapshot.path.display(),
                    error = %e,
                    "Unusable snapshot, trying next"
                );
            }
        }
    }
    Err(SnapshotError::NoValidSnapshots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::generation::WorldParams;
    use crate::world::entity::EntityKind;
    use crate::world::generation::generate_world;
    use tempfile::TempDir;

    fn make_test_world() -> World {
        generate_world(&WorldParams {
            seed: 42,
            width: 40,
            height: 30,
            initial_cells: 150,
            geyser_count: 3,
            ..WorldParams::default()
        })
    }

    fn encoded(world: &World) -> Vec<u8> {
        bincode::serialize(&world.to_record()).unwrap()
    }

    #[test]
    fn save_and_load_round_trip_identical() {
        let dir = TempDir::new().unwrap();
        let world = make_test_world();

        let path = save_snapshot(&world, dir.path()).unwrap();
        let restored = load_snapshot(&path).unwrap();

        assert_eq!(world.to_record(), restored.to_record());
        assert_eq!(world.registry.next_id(), restored.registry.next_id());
        assert_eq!(world.environment, restored.environment);
    }

    #[test]
    fn snapshot_filename_parse_round_trip() {
        let filename = snapshot_filename(500, 1708300000);
        assert_eq!(filename, "world-tick500-1708300000.bin");
        assert_eq!(parse_snapshot_filename(&filename), Some((500, 1708300000)));
    }

    #[test]
    fn parse_invalid_filename_returns_none() {
        assert!(parse_snapshot_filename("random.bin").is_none());
        assert!(parse_snapshot_filename("world-tick.bin").is_none());
        assert!(parse_snapshot_filename("world-tickabc-123.bin").is_none());
        assert!(parse_snapshot_filename("world-tick100-abc.bin").is_none());
        assert!(parse_snapshot_filename("sample-100.json").is_none());
    }

    #[test]
    fn list_snapshots_returns_sorted_newest_first() {
        let dir = TempDir::new().unwrap();
        let data = encoded(&make_test_world());
        for name in ["world-tick10-1000.bin", "world-tick30-3000.bin", "world-tick20-2000.bin"] {
            fs::write(dir.path().join(name), &data).unwrap();
        }

        let ticks: Vec<u64> = list_snapshots(dir.path())
            .unwrap()
            .iter()
            .map(|s| s.tick_count)
            .collect();
        assert_eq!(ticks, vec![30, 20, 10]);
    }

    #[test]
    fn list_snapshots_skips_other_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("world-tick10-1000.bin"), encoded(&make_test_world())).unwrap();
        fs::write(dir.path().join("notes.txt"), "not a snapshot").unwrap();
        fs::write(dir.path().join(".world-tick99-9999.bin.tmp"), "temp file").unwrap();

        assert_eq!(list_snapshots(dir.path()).unwrap().len(), 1);
    }

    #[test]
    fn list_snapshots_nonexistent_dir() {
        let dir = TempDir::new().unwrap();
        assert!(list_snapshots(&dir.path().join("missing")).unwrap().is_empty());
    }

    #[test]
    fn prune_keeps_max_snapshots() {
        let dir = TempDir::new().unwrap();
        let data = encoded(&make_test_world());
        for i in 0..6u64 {
            fs::write(dir.path().join(snapshot_filename(i * 10, 1000 + i)), &data).unwrap();
        }

        assert_eq!(prune_snapshots(dir.path(), 3).unwrap().len(), 3);
        let remaining: Vec<u64> = list_snapshots(dir.path())
            .unwrap()
            .iter()
            .map(|s| s.timestamp)
            .collect();
        assert_eq!(remaining, vec![1005, 1004, 1003]);
        assert!(prune_snapshots(dir.path(), 5).unwrap().is_empty());
    }

    #[test]
    fn load_corrupt_or_truncated_snapshot_fails() {
        let dir = TempDir::new().unwrap();
        let garbage = dir.path().join("world-tick0-1000.bin");
        fs::write(&garbage, b"this is not valid bincode data").unwrap();
        assert!(matches!(load_snapshot(&garbage), Err(SnapshotError::Deserialize(_))));

        let data = encoded(&make_test_world());
        let truncated = dir.path().join("world-tick0-1001.bin");
        fs::write(&truncated, &data[..data.len() / 2]).unwrap();
        assert!(load_snapshot(&truncated).is_err());
    }

    #[test]
    fn load_rejects_invalid_world() {
        let dir = TempDir::new().unwrap();
        let mut record = make_test_world().to_record();
        let cell = record
            .entities
            .iter_mut()
            .find(|e| e.kind == EntityKind::Cell)
            .unwrap();
        cell.genome = Some(vec![0; 12]);
        let path = dir.path().join("world-tick0-1000.bin");
        fs::write(&path, bincode::serialize(&record).unwrap()).unwrap();

        let err = load_snapshot(&path).unwrap_err();
        assert!(matches!(err, SnapshotError::Invalid { .. }));
        assert!(err.to_string().contains("genome"));
    }

    #[test]
    fn load_latest_valid_falls_back_on_bad_files() {
        let dir = TempDir::new().unwrap();
        let world = make_test_world();
        fs::write(dir.path().join("world-tick10-1000.bin"), encoded(&world)).unwrap();
        fs::write(dir.path().join("world-tick20-2000.bin"), b"corrupt data here").unwrap();

        let restored = load_latest_valid_snapshot(dir.path()).unwrap();
        assert_eq!(restored.registry.len(), world.registry.len());
    }

    #[test]
    fn load_latest_valid_without_usable_files() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            load_latest_valid_snapshot(dir.path()),
            Err(SnapshotError::NoValidSnapshots)
        ));

        fs::write(dir.path().join("world-tick10-1000.bin"), b"corrupt1").unwrap();
        fs::write(dir.path().join("world-tick20-2000.bin"), b"corrupt2").unwrap();
        assert!(matches!(
            load_latest_valid_snapshot(dir.path()),
            Err(SnapshotError::NoValidSnapshots)
        ));
    }

    #[test]
    fn save_leaves_no_temp_files_and_creates_dirs() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("deep").join("snapshots");
        let path = save_snapshot(&make_test_world(), &nested).unwrap();
        assert!(path.exists());

        let hidden = fs::read_dir(&nested)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_str().is_some_and(|n| n.starts_with('.')))
            .count();
        assert_eq!(hidden, 0);
    }
}
