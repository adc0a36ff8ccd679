use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::world::genome::GenomeError;
use crate::world::{Cell, Color, Genome};

#[derive(Debug, Error)]
pub enum SampleError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Invalid sample JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid genome in {}: {source}", .path.display())]
    Genome { path: PathBuf, source: GenomeError },
}

/// A cell's heritable part, as stored in `sample-{ts}.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellSample {
    pub color: Color,
    /// Kept wide so out-of-range genes surface as a genome error, not a parse error.
    pub genome: Vec<i64>,
}

impl CellSample {
    pub fn from_cell(cell: &Cell) -> Self {
        CellSample {
            color: cell.color,
            genome: cell.genome.genes().iter().map(|&g| i64::from(g)).collect(),
        }
    }

    pub fn genome(&self) -> Result<Genome, GenomeError> {
        Genome::from_genes(&self.genome)
    }
}

fn unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
}

/// Writes `cell` to a new sample file in `sample_dir`.
pub fn save_sample(cell: &Cell, sample_dir: &Path) -> Result<PathBuf, SampleError> {
    fs::create_dir_all(sample_dir)?;

    let stamp = unix_millis();
    let mut path = sample_dir.join(format!("sample-{stamp}.json"));
    let mut suffix = 1;
    while path.exists() {
        path = sample_dir.join(format!("sample-{stamp}-{suffix}.json"));
        suffix += 1;
    }

    let json = serde_json::to_string_pretty(&CellSample::from_cell(cell))?;
    fs::write(&path, json)?;
    debug!(path = %path.display(), "Sample saved");
    Ok(path)
}

/// Sample files in `sample_dir`, sorted by name.
pub fn list_samples(sample_dir: &Path) -> Result<Vec<PathBuf>, SampleError> {
    if !sample_dir.exists() {
        return Ok(Vec::new());
    }
    let mut samples: Vec<PathBuf> = fs::read_dir(sample_dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("sample-") && n.ends_with(".json"))
        })
        .collect();
    samples.sort();
    Ok(samples)
}

/// Reads a sample and validates its genome.
pub fn load_sample(path: &Path) -> Result<(Color, Genome), SampleError> {
    let content = fs::read_to_string(path)?;
    let sample: CellSample = serde_json::from_str(&content)?;
    let genome = sample.genome().map_err(|source| SampleError::Genome {
        path: path.to_path_buf(),
        source,
    })?;
    Ok((sample.color, genome))
}
