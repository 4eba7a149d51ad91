//! Bulk-action selection, persisted between runs.
//!
//! The selected ids live in `<state_dir>/moogship_selected_shipments.json`.
//! The file is removed when the [`SelectionStore`] is dropped.

use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};

use moogship_core::ShipmentId;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::ClientConfig;

pub const SELECTION_FILE: &str = "moogship_selected_shipments.json";

#[derive(Debug, Error)]
pub enum SelectionError {
    #[error("selection file error: {0}")]
    Io(#[from] io::Error),

    #[error("selection encoding error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Selected shipment ids for batch print and batch pickup.
#[derive(Debug)]
pub struct SelectionStore {
    path: PathBuf,
    ids: BTreeSet<ShipmentId>,
}

impl SelectionStore {
    /// Open the selection under `state_dir`, restoring any saved ids.
    ///
    /// A corrupt file is discarded.
    ///
    /// # Errors
    ///
    /// Returns `SelectionError::Io` if the file exists but cannot be read.
    pub fn open(state_dir: &Path) -> Result<Self, SelectionError> {
        let path = state_dir.join(SELECTION_FILE);
        let ids = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice::<Vec<ShipmentId>>(&bytes)
                .map(|ids| ids.into_iter().collect())
                .unwrap_or_else(|err| {
                    warn!(path = %path.display(), error = %err, "Discarding corrupt selection file");
                    BTreeSet::new()
                }),
            Err(err) if err.kind() == io::ErrorKind::NotFound => BTreeSet::new(),
            Err(err) => return Err(err.into()),
        };
        debug!(path = %path.display(), count = ids.len(), "Selection opened");
        Ok(Self { path, ids })
    }

    /// # Errors
    ///
    /// See [`SelectionStore::open`].
    pub fn from_config(config: &ClientConfig) -> Result<Self, SelectionError> {
        Self::open(&config.state_dir)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flip one id; returns whether it is now selected.
    ///
    /// # Errors
    ///
    /// Returns a `SelectionError` if the file cannot be written.
    pub fn toggle(&mut self, id: ShipmentId) -> Result<bool, SelectionError> {
        let selected = if self.ids.remove(&id) {
            false
        } else {
            self.ids.insert(id);
            true
        };
        self.persist()?;
        Ok(selected)
    }

    /// # Errors
    ///
    /// Returns a `SelectionError` if the file cannot be written.
    pub fn select(&mut self, ids: impl IntoIterator<Item = ShipmentId>) -> Result<(), SelectionError> {
        self.ids.extend(ids);
        self.persist()
    }

    /// # Errors
    ///
    /// Returns a `SelectionError` if the file cannot be written.
    pub fn deselect(&mut self, id: ShipmentId) -> Result<(), SelectionError> {
        if self.ids.remove(&id) {
            self.persist()?;
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns a `SelectionError` if the file cannot be written.
    pub fn clear(&mut self) -> Result<(), SelectionError> {
        self.ids.clear();
        self.persist()
    }

    #[must_use]
    pub fn contains(&self, id: ShipmentId) -> bool {
        self.ids.contains(&id)
    }

    /// Selected ids in ascending order.
    #[must_use]
    pub fn ids(&self) -> Vec<ShipmentId> {
        self.ids.iter().copied().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    fn persist(&self) -> Result<(), SelectionError> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let ids: Vec<ShipmentId> = self.ids();
        std::fs::write(&self.path, serde_json::to_vec(&ids)?)?;
        Ok(())
    }
}

impl Drop for SelectionStore {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Selection cleared"),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => warn!(path = %self.path.display(), error = %err, "Failed to clear selection"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_persists() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SelectionStore::open(dir.path()).unwrap();

        assert!(store.toggle(ShipmentId::new(7)).unwrap());
        store.select([ShipmentId::new(3), ShipmentId::new(7)]).unwrap();
        assert_eq!(store.ids(), vec![ShipmentId::new(3), ShipmentId::new(7)]);

        let saved: Vec<i64> =
            serde_json::from_slice(&std::fs::read(store.path()).unwrap()).unwrap();
        assert_eq!(saved, vec![3, 7]);

        assert!(!store.toggle(ShipmentId::new(7)).unwrap());
        assert!(!store.contains(ShipmentId::new(7)));
    }

    #[test]
    fn test_drop_clears_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = {
            let mut store = SelectionStore::open(dir.path()).unwrap();
            store.toggle(ShipmentId::new(1)).unwrap();
            let path = store.path().to_path_buf();
            assert!(path.exists());
            path
        };
        assert!(!path.exists());
    }

    #[test]
    fn test_restores_and_discards_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(SELECTION_FILE), b"[4, 2]").unwrap();
        let store = SelectionStore::open(dir.path()).unwrap();
        assert_eq!(store.ids(), vec![ShipmentId::new(2), ShipmentId::new(4)]);
        drop(store);

        std::fs::write(dir.path().join(SELECTION_FILE), b"not json").unwrap();
        let store = SelectionStore::open(dir.path()).unwrap();
        assert!(store.is_empty());
    }
}
