//! Snapshot export/import

use std::{fs, path::Path};

use anyhow::{Context, Result};

use super::PolicySnapshot;

impl PolicySnapshot {
    /// Save snapshot to a JSON file
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }

    /// Load and validate a snapshot from a JSON file
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents =
            fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let snapshot: Self = serde_json::from_str(&contents)
            .with_context(|| format!("parsing {}", path.display()))?;
        snapshot.validate()?;
        Ok(snapshot)
    }
}
