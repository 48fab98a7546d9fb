//! Common test utilities and mock implementations

pub mod mock_board;

pub use mock_board::{MockBoard, MockHandle, Operation, create_mock_board};

use cluster_core::ambient::LuxPrefill;
use cluster_core::app_state::{Cluster, ClusterSnapshot, FatalError};
use cluster_core::config::{
    CalibrationStore, ClusterConfig, ConfigError, ConfiguredFilter, ConfiguredGuard, FilterKind,
};
use embassy_time::{Duration, Instant};
use std::collections::HashMap;

pub const FRAME: Duration = Duration::from_millis(16);

/// Defaults with the lux window seeded from the first reading, so a bright
/// cabin starts at Day without the zero-prefill dip.
pub fn test_config() -> ClusterConfig {
    let mut config = ClusterConfig::default();
    config.ambient.filter = FilterKind::Median {
        prefill: LuxPrefill::FirstSample,
    };
    config
}

/// A cluster wired to a mock board with a simulated clock
pub struct Rig {
    pub cluster: Cluster<ConfiguredFilter, ConfiguredGuard>,
    pub board: MockBoard,
    pub hw: MockHandle,
    pub now: Instant,
}

impl Rig {
    pub fn new(config: ClusterConfig) -> Self {
        let (board, hw) = create_mock_board();
        Self {
            cluster: Cluster::from_config(config),
            board,
            hw,
            now: Instant::from_millis(0),
        }
    }

    /// Advance one frame and poll the cluster
    pub fn frame(&mut self) -> Result<ClusterSnapshot, FatalError> {
        self.now += FRAME;
        self.cluster.poll(self.now, &mut self.board)
    }

    /// Run frames for `ms` of simulated time, returning the last snapshot
    pub fn run_for(&mut self, ms: u64) -> ClusterSnapshot {
        let end = self.now + Duration::from_millis(ms);
        let mut snapshot = self.frame().unwrap();
        while self.now < end {
            snapshot = self.frame().unwrap();
        }
        snapshot
    }
}

/// In-memory key/value store
#[derive(Default)]
pub struct MemStore {
    pub floats: HashMap<String, f32>,
    pub blobs: HashMap<String, Vec<u8>>,
}

impl CalibrationStore for MemStore {
    fn load_float(&mut self, key: &str, default: f32) -> f32 {
        self.floats.get(key).copied().unwrap_or(default)
    }

    fn save_float(&mut self, key: &str, value: f32) -> Result<(), ConfigError> {
        self.floats.insert(key.to_string(), value);
        Ok(())
    }

    fn load_blob(&mut self, key: &str, buf: &mut [u8]) -> Result<Option<usize>, ConfigError> {
        let Some(data) = self.blobs.get(key) else {
            return Ok(None);
        };
        buf[..data.len()].copy_from_slice(data);
        Ok(Some(data.len()))
    }

    fn save_blob(&mut self, key: &str, data: &[u8]) -> Result<(), ConfigError> {
        self.blobs.insert(key.to_string(), data.to_vec());
        Ok(())
    }
}
