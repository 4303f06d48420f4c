//! Ledger Snapshot Persistence
//!
//! The full ledger state is written as a JSON snapshot after every applied
//! trade so a restart resumes with balances, positions, and history intact.
//! A failed write is surfaced to the caller; the ledger rolls the in-memory
//! mutation back rather than diverging from disk.

use std::path::{Path, PathBuf};

use thiserror::Error;

use super::ledger::LedgerState;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Failed to read snapshot: {0}")]
    Read(#[from] std::io::Error),

    #[error("Snapshot serialization failed: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("Failed to write snapshot {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Load a snapshot if one exists at `path`
pub fn load(path: &Path) -> Result<Option<LedgerState>, SnapshotError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)?;
    let state: LedgerState = serde_json::from_str(&content)?;
    Ok(Some(state))
}

/// Persist the ledger state to `path`, creating parent directories as needed
pub fn save(path: &Path, state: &LedgerState) -> Result<(), SnapshotError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| SnapshotError::Write {
            path: path.to_path_buf(),
            source,
        })?;
    }
    let content = serde_json::to_string_pretty(state)?;
    std::fs::write(path, content).map_err(|source| SnapshotError::Write {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        assert!(load(&path).unwrap().is_none());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state/ledger.json");

        let state = LedgerState::default();
        save(&path, &state).unwrap();

        let loaded = load(&path).unwrap().unwrap();
        assert_eq!(loaded.next_trade_id, state.next_trade_id);
        assert!(loaded.portfolios.is_empty());
    }

    #[test]
    fn test_corrupt_snapshot_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(load(&path), Err(SnapshotError::Codec(_))));
    }
}
