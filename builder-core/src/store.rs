//! State storage shared by builder instances.
//!
//! [`StateStore`] owns the [`GridState`]. Reads go through closures or
//! snapshots; writes are crate-internal so every mutation passes through the
//! lifecycle operations in [`crate::builder`]. Each write bumps a revision
//! counter that observers can compare to detect change.
//!
//! Builders that should edit the same page share one store through a
//! [`SharedStateRegistry`]: the first lease for a key creates the store, the
//! last lease to drop disposes it.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, RwLock};

use crate::{BuilderResult, GridState, StateDocument};

#[derive(Debug, Default)]
struct StoreInner {
    state: GridState,
    revision: u64,
}

/// Handle to a builder state. Clones share the same state.
///
/// # Example
///
/// ```
/// use builder_core::StateStore;
///
/// let store = StateStore::new();
/// let shared = store.clone();
/// assert!(store.ptr_eq(&shared));
/// assert_eq!(store.read(|state| state.canvases.len()), 0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct StateStore {
    inner: Arc<RwLock<StoreInner>>,
}

impl StateStore {
    /// Create a store holding an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding `state`.
    #[must_use]
    pub fn from_state(state: GridState) -> Self {
        Self {
            inner: Arc::new(RwLock::new(StoreInner { state, revision: 0 })),
        }
    }

    /// Read the state through a closure.
    pub fn read<R>(&self, f: impl FnOnce(&GridState) -> R) -> R {
        let inner = self
            .inner
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        f(&inner.state)
    }

    /// Mutate the state through a closure and bump the revision.
    pub(crate) fn update<R>(&self, f: impl FnOnce(&mut GridState) -> R) -> R {
        let mut inner = self
            .inner
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        inner.revision += 1;
        f(&mut inner.state)
    }

    /// Mutate the state through a fallible closure. The revision is bumped
    /// only when the closure succeeds; on error it must leave the state as
    /// it found it.
    pub(crate) fn try_update<R>(
        &self,
        f: impl FnOnce(&mut GridState) -> BuilderResult<R>,
    ) -> BuilderResult<R> {
        let mut inner = self
            .inner
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let result = f(&mut inner.state)?;
        inner.revision += 1;
        Ok(result)
    }

    /// Clone of the current state.
    #[must_use]
    pub fn snapshot(&self) -> GridState {
        self.read(Clone::clone)
    }

    /// Change counter, incremented by every mutation.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.inner
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .revision
    }

    /// Whether two handles point at the same state.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Restore the empty initial state.
    pub(crate) fn reset(&self) {
        self.update(|state| *state = GridState::default());
    }

    /// Export the state as a document.
    #[must_use]
    pub fn export(&self) -> StateDocument {
        self.read(|state| StateDocument::from(state))
    }

    /// Replace the state with the contents of `document`.
    pub(crate) fn import(&self, document: StateDocument) {
        let state = document.into_state();
        self.update(|current| *current = state);
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// Write the exported document to `path` as JSON, creating parent
    /// directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save_to_path(&self, path: impl AsRef<Path>) -> BuilderResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = self.export().to_json()?;
        std::fs::write(path, json)?;
        tracing::debug!("Saved builder state to {}", path.display());
        Ok(())
    }

    /// Read a document from `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file can't be read or parsed.
    pub fn read_document(path: impl AsRef<Path>) -> BuilderResult<StateDocument> {
        let contents = std::fs::read_to_string(path)?;
        StateDocument::from_json(&contents)
    }
}

#[derive(Debug)]
struct SharedEntry {
    store: StateStore,
    refs: usize,
}

/// Registry of stores shared between builder instances by key.
#[derive(Debug, Clone, Default)]
pub struct SharedStateRegistry {
    entries: Arc<Mutex<HashMap<String, SharedEntry>>>,
}

impl SharedStateRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a lease on the store for `key`, creating it on first use.
    #[must_use]
    pub fn acquire(&self, key: &str) -> SharedStateLease {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let entry = entries.entry(key.to_string()).or_insert_with(|| {
            tracing::debug!("Creating shared state {key}");
            SharedEntry {
                store: StateStore::new(),
                refs: 0,
            }
        });
        entry.refs += 1;
        SharedStateLease {
            key: key.to_string(),
            store: entry.store.clone(),
            registry: self.clone(),
        }
    }

    /// Number of live leases for `key`.
    #[must_use]
    pub fn ref_count(&self, key: &str) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(key)
            .map_or(0, |entry| entry.refs)
    }

    /// Whether a store exists for `key`.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.ref_count(key) > 0
    }

    fn release(&self, key: &str) {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let dispose = match entries.get_mut(key) {
            Some(entry) => {
                entry.refs = entry.refs.saturating_sub(1);
                entry.refs == 0
            }
            None => false,
        };
        if dispose {
            entries.remove(key);
            tracing::debug!("Disposed shared state {key}");
        }
    }
}

/// A counted reference to a shared store. Dropping it releases the lease.
#[derive(Debug)]
pub struct SharedStateLease {
    key: String,
    store: StateStore,
    registry: SharedStateRegistry,
}

impl SharedStateLease {
    /// The shared store.
    #[must_use]
    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// The key this lease was acquired under.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for SharedStateLease {
    fn drop(&mut self) {
        self.registry.release(&self.key);
    }
}
