pub mod sample;
pub mod snapshot;

pub use sample::{list_samples, load_sample, save_sample, CellSample, SampleError};
pub use snapshot::{
    list_snapshots, load_latest_valid_snapshot, load_snapshot, prune_snapshots, read_record,
    save_snapshot, SnapshotError, SnapshotMetadata,
};
