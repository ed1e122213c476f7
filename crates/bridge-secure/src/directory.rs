use std::collections::HashMap;
use std::path::{Path, PathBuf};

use bridge_model::KnownDestination;

fn directory_file(storage_path: &str) -> PathBuf {
    Path::new(storage_path).join("destinations.json")
}

pub fn load(storage_path: &str) -> anyhow::Result<HashMap<String, KnownDestination>> {
    let path = directory_file(storage_path);
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let raw = std::fs::read(&path)?;
    Ok(serde_json::from_slice(&raw)?)
}

pub fn save(storage_path: &str, directory: &HashMap<String, KnownDestination>) -> anyhow::Result<()> {
    let path = directory_file(storage_path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let raw = serde_json::to_vec_pretty(directory)?;
    std::fs::write(path, raw)?;
    Ok(())
}
