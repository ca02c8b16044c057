//! Capture/restore engine.
//!
//! The only component with policy. Mediates between the state provider and
//! the snapshot store, scoped to the registry's active profile, and owns the
//! current-index concept:
//! - capture reads live state and appends it as a new snapshot
//! - restore pushes a stored snapshot back out to the provider
//! - clear deletes one snapshot or the whole active profile
//!
//! Consistency rules:
//! - capture/restore/clear are serialized per profile; a clear can never
//!   remove the snapshot a concurrent restore is reading mid-flight
//! - a failed restore (PartialApply) leaves the current index unchanged:
//!   only live state is suspect, the stored snapshot is untouched, and
//!   re-issuing the same restore is always safe
//! - nothing is retried automatically; every failure goes back to the caller

use log::{debug, warn};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::provider::StateProvider;
use crate::registry::Registry;
use crate::store::{SnapshotMeta, Store};

/// Which snapshot the live external state is believed to match. Tied to the
/// profile it was established under; a profile switch makes it absent.
#[derive(Debug, Clone)]
struct CurrentMark {
    profile: String,
    name: String,
    ordinal: u64,
}

pub struct Engine<P: StateProvider> {
    store: Mutex<Store>,
    registry: Mutex<Registry>,
    provider: P,
    // per-profile locks, held across the combined provider + store sequence
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    current: Mutex<Option<CurrentMark>>,
}

impl<P: StateProvider> Engine<P> {
    pub fn new(store: Store, registry: Registry, provider: P) -> Self {
        Engine {
            store: Mutex::new(store),
            registry: Mutex::new(registry),
            provider,
            locks: Mutex::new(HashMap::new()),
            current: Mutex::new(None),
        }
    }

    /// Access the provider, e.g. to inspect live state in tests or embedders.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    fn profile_lock(&self, profile: &str) -> Arc<Mutex<()>> {
        self.locks
            .lock()
            .entry(profile.to_string())
            .or_default()
            .clone()
    }

    /// Switch the active profile, creating it implicitly if unknown.
    /// Switching away from the current profile makes the current index
    /// absent; re-selecting the already active profile is a no-op for it.
    pub fn set_profile(&self, name: &str) -> Result<()> {
        let mut registry = self.registry.lock();
        let switched = registry.get_active() != name;
        registry.set_active(name)?;

        if switched {
            *self.current.lock() = None;
        }
        Ok(())
    }

    pub fn active_profile(&self) -> String {
        self.registry.lock().get_active().to_string()
    }

    /// Union of registry-known names and profiles discovered in the store.
    pub fn profiles(&self) -> Result<Vec<String>> {
        let mut names: std::collections::BTreeSet<String> =
            self.registry.lock().list().into_iter().collect();
        names.extend(self.store.lock().list_profiles()?);
        Ok(names.into_iter().collect())
    }

    /// Ordinal of the snapshot the live state currently matches, or `None`
    /// before any capture/restore, after a profile switch, or after the
    /// referenced snapshot was deleted.
    pub fn current_index(&self) -> Option<u64> {
        let active = self.active_profile();
        self.current
            .lock()
            .as_ref()
            .filter(|mark| mark.profile == active)
            .map(|mark| mark.ordinal)
    }

    /// Snapshot listing for the active profile, ordinal ascending.
    pub fn snapshots(&self) -> Result<Vec<SnapshotMeta>> {
        let profile = self.active_profile();
        self.store.lock().list(&profile)
    }

    /// Read live state from the provider and append it as a new snapshot.
    /// Never overwrites: a duplicate name fails with `SnapshotExists` and
    /// the stored set is unchanged. On success the new snapshot becomes
    /// current. Returns the assigned ordinal.
    pub fn capture(&self, name: &str) -> Result<u64> {
        let profile = self.active_profile();
        let lock = self.profile_lock(&profile);
        let _guard = lock.lock();

        let payload = self.provider.read().map_err(Error::Provider)?;
        let ordinal = self.store.lock().put(&profile, name, &payload, false)?;

        *self.current.lock() = Some(CurrentMark {
            profile: profile.clone(),
            name: name.to_string(),
            ordinal,
        });

        debug!("captured {profile}/{name} as ordinal {ordinal}");
        Ok(ordinal)
    }

    /// Push a stored snapshot back out to the provider. If the provider's
    /// write fails partway the error surfaces as `PartialApply` and the
    /// current index stays where it was; retrying with the same name is
    /// always safe since the payload is re-read from the store.
    pub fn restore(&self, name: &str) -> Result<()> {
        let profile = self.active_profile();
        let lock = self.profile_lock(&profile);
        let _guard = lock.lock();

        let (meta, payload) = {
            let store = self.store.lock();
            (store.meta(&profile, name)?, store.get(&profile, name)?)
        };

        if let Err(e) = self.provider.write(&payload) {
            warn!("restore of {profile}/{name} failed mid-apply: {e}");
            return Err(Error::PartialApply {
                name: name.to_string(),
                source: e,
            });
        }

        *self.current.lock() = Some(CurrentMark {
            profile,
            name: name.to_string(),
            ordinal: meta.ordinal,
        });

        debug!("restored snapshot '{name}' (ordinal {})", meta.ordinal);
        Ok(())
    }

    /// Delete one snapshot from the active profile, or every snapshot when
    /// no name is given. Deleting the snapshot the current index refers to
    /// (or clearing everything) makes the current index absent.
    pub fn clear(&self, name: Option<&str>) -> Result<()> {
        let profile = self.active_profile();
        let lock = self.profile_lock(&profile);
        let _guard = lock.lock();

        match name {
            Some(name) => {
                self.store.lock().delete(&profile, name)?;

                let mut current = self.current.lock();
                if current
                    .as_ref()
                    .is_some_and(|mark| mark.profile == profile && mark.name == name)
                {
                    *current = None;
                }
            }
            None => {
                self.store.lock().delete_all(&profile)?;

                let mut current = self.current.lock();
                if current.as_ref().is_some_and(|mark| mark.profile == profile) {
                    *current = None;
                }
            }
        }

        Ok(())
    }

    /// Destroy a profile entirely: its snapshots and its registry entry.
    /// If it was active, the default profile becomes active.
    pub fn delete_profile(&self, name: &str) -> Result<()> {
        let lock = self.profile_lock(name);
        let _guard = lock.lock();

        self.store.lock().delete_all(name)?;
        self.registry.lock().remove(name)?;

        let mut current = self.current.lock();
        if current.as_ref().is_some_and(|mark| mark.profile == name) {
            *current = None;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MemoryProvider;

    fn engine(dir: &tempfile::TempDir) -> Engine<MemoryProvider> {
        let store = Store::open(&dir.path().join("vault.db")).unwrap();
        let registry = Registry::open(&dir.path().join("registry.json")).unwrap();
        Engine::new(store, registry, MemoryProvider::new(b""))
    }

    #[test]
    fn capture_then_restore_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(&dir);

        engine.provider.set_state(b"P");
        engine.capture("s1").unwrap();

        engine.provider.set_state(b"drifted");
        engine.restore("s1").unwrap();

        assert_eq!(engine.provider.state(), b"P");
    }

    #[test]
    fn capture_sets_current_index() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(&dir);

        assert_eq!(engine.current_index(), None);
        assert_eq!(engine.capture("s1").unwrap(), 0);
        assert_eq!(engine.current_index(), Some(0));
        assert_eq!(engine.capture("s2").unwrap(), 1);
        assert_eq!(engine.current_index(), Some(1));
    }

    #[test]
    fn duplicate_capture_rejected_store_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(&dir);

        engine.provider.set_state(b"X");
        engine.capture("s1").unwrap();

        engine.provider.set_state(b"Y");
        let err = engine.capture("s1").unwrap_err();
        assert!(matches!(err, Error::SnapshotExists(_, _)));

        let snapshots = engine.snapshots().unwrap();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].ordinal, 0);

        // restoring still yields the first payload
        engine.restore("s1").unwrap();
        assert_eq!(engine.provider.state(), b"X");
    }

    #[test]
    fn profiles_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(&dir);

        engine.set_profile("a").unwrap();
        engine.provider.set_state(b"P1");
        engine.capture("s").unwrap();

        engine.set_profile("b").unwrap();
        assert!(engine.snapshots().unwrap().is_empty());

        engine.set_profile("a").unwrap();
        let snapshots = engine.snapshots().unwrap();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].name, "s");
    }

    #[test]
    fn profile_switch_clears_current_index() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(&dir);

        engine.set_profile("a").unwrap();
        engine.capture("s").unwrap();
        assert_eq!(engine.current_index(), Some(0));

        engine.set_profile("b").unwrap();
        assert_eq!(engine.current_index(), None);

        // switching back does not resurrect it
        engine.set_profile("a").unwrap();
        assert_eq!(engine.current_index(), None);
    }

    #[test]
    fn clearing_current_snapshot_clears_index() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(&dir);

        engine.capture("s1").unwrap();
        engine.capture("s2").unwrap();
        engine.restore("s1").unwrap();
        assert_eq!(engine.current_index(), Some(0));

        engine.clear(Some("s1")).unwrap();
        assert_eq!(engine.current_index(), None);

        // the other snapshot is still there
        assert_eq!(engine.snapshots().unwrap().len(), 1);
    }

    #[test]
    fn clearing_other_snapshot_keeps_index() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(&dir);

        engine.capture("s1").unwrap();
        engine.capture("s2").unwrap();
        assert_eq!(engine.current_index(), Some(1));

        engine.clear(Some("s1")).unwrap();
        assert_eq!(engine.current_index(), Some(1));
    }

    #[test]
    fn clear_all_empties_profile_and_index() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(&dir);

        engine.capture("s1").unwrap();
        engine.capture("s2").unwrap();

        engine.clear(None).unwrap();
        assert_eq!(engine.current_index(), None);
        assert!(engine.snapshots().unwrap().is_empty());

        // clearing an already empty profile succeeds
        engine.clear(None).unwrap();
    }

    #[test]
    fn clear_missing_name_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(&dir);
        assert!(matches!(engine.clear(Some("nope")), Err(Error::NotFound(_))));
    }

    #[test]
    fn failed_restore_keeps_index_and_retry_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(&dir);

        engine.provider.set_state(b"P");
        engine.capture("s1").unwrap();
        engine.provider.set_state(b"Q");
        engine.capture("s2").unwrap();
        assert_eq!(engine.current_index(), Some(1));

        engine.provider.fail_next_write();
        let err = engine.restore("s1").unwrap_err();
        assert!(matches!(err, Error::PartialApply { .. }));

        // index untouched, live state suspect but snapshot intact
        assert_eq!(engine.current_index(), Some(1));

        engine.restore("s1").unwrap();
        assert_eq!(engine.provider.state(), b"P");
        assert_eq!(engine.current_index(), Some(0));
        // the payload was applied exactly once
        assert_eq!(engine.provider.write_count(), 1);
    }

    #[test]
    fn restore_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(&dir);
        assert!(matches!(engine.restore("ghost"), Err(Error::NotFound(_))));
        assert_eq!(engine.current_index(), None);
    }

    #[test]
    fn profiles_union_registry_and_store() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(&dir);

        engine.set_profile("empty-one").unwrap();
        engine.set_profile("with-data").unwrap();
        engine.capture("s").unwrap();

        let profiles = engine.profiles().unwrap();
        assert!(profiles.contains(&"default".to_string()));
        assert!(profiles.contains(&"empty-one".to_string()));
        assert!(profiles.contains(&"with-data".to_string()));
    }

    #[test]
    fn delete_profile_removes_data_and_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(&dir);

        engine.set_profile("doomed").unwrap();
        engine.capture("s").unwrap();

        engine.delete_profile("doomed").unwrap();

        assert_eq!(engine.active_profile(), "default");
        assert_eq!(engine.current_index(), None);
        assert!(!engine.profiles().unwrap().contains(&"doomed".to_string()));
    }

    #[test]
    fn scripted_session() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(&dir);

        engine.set_profile("work").unwrap();

        engine.provider.set_state(b"X");
        engine.capture("s1").unwrap();
        assert_eq!(engine.current_index(), Some(0));

        engine.provider.set_state(b"Y");
        assert!(matches!(
            engine.capture("s1"),
            Err(Error::SnapshotExists(_, _))
        ));

        let snapshots = engine.snapshots().unwrap();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].name, "s1");
        assert_eq!(snapshots[0].ordinal, 0);

        engine.restore("s1").unwrap();
        assert_eq!(engine.provider.state(), b"X");

        engine.clear(Some("s1")).unwrap();
        assert!(engine.snapshots().unwrap().is_empty());
        assert_eq!(engine.current_index(), None);
    }
}
