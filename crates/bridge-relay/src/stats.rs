use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RelayStats {
    pub mesh_to_secure: u64,
    pub secure_to_mesh: u64,
    pub duplicates_dropped: u64,
    pub active_mappings: usize,
}
