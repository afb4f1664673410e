//! The app index: scans a container root and answers lookups.
//!
//! # Scanning
//!
//! On the modern layout the bundle and data directories are listed
//! independently and correlated by bundle ID. Only bundle containers open a
//! [`PendingApp`] slot; data containers without a matching bundle container
//! (built-in apps) are ignored. Once both listings are done each pending app
//! is finished into a record, and failures are dropped before anything is
//! indexed.
//!
//! On the legacy layout every container is both the bundle and the data
//! container of its app.
//!
//! # Consistency
//!
//! The three lookup structures live together in one [`Snapshot`]. A scan
//! builds a new snapshot off to the side and swaps it in under a write lock,
//! so readers see either the old index or the new one, never a mix. Scans
//! are serialised by their own mutex.

use crate::models::app::{App, AppError, AppRecord, PendingApp};
use crate::models::container::{
    Container, ContainerClass, ContainerError, ContainerLayout, ContainerRoot, sorted_entries,
};
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use thiserror::Error;

/// Errors that abort a whole scan
#[derive(Error, Debug)]
pub enum AppListError {
    #[error(transparent)]
    Root(#[from] ContainerError),

    #[error("Failed to list {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Malformed lookups
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("{0:?} is not a valid mode")]
    InvalidMode(String),

    #[error("Please specify an app to find")]
    EmptyQuery,

    #[error("Invalid key {0:?}")]
    UnknownField(String),
}

/// What to look an app up by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    BundleId(String),
    /// Container UUID, matched case-insensitively
    Uuid(String),
    /// Path of one of the app's containers
    Path(Utf8PathBuf),
    /// Position in discovery order
    Position(usize),
}

impl Query {
    /// Builds a query from a mode name (`bundle_id`, `uuid` or `path`) and value.
    pub fn from_mode(mode: &str, value: &str) -> Result<Self, QueryError> {
        if value.is_empty() {
            return Err(QueryError::EmptyQuery);
        }
        match mode {
            "bundle_id" => Ok(Query::BundleId(value.to_string())),
            "uuid" => Ok(Query::Uuid(value.to_string())),
            "path" => Ok(Query::Path(Utf8PathBuf::from(value))),
            other => Err(QueryError::InvalidMode(other.to_string())),
        }
    }
}

/// One complete, immutable generation of the index.
#[derive(Debug)]
pub struct Snapshot<A> {
    apps: Vec<Arc<A>>,
    by_bundle_id: HashMap<String, Arc<A>>,
    by_uuid: HashMap<String, Arc<A>>,
}

impl<A> Default for Snapshot<A> {
    fn default() -> Self {
        Self {
            apps: Vec::new(),
            by_bundle_id: HashMap::new(),
            by_uuid: HashMap::new(),
        }
    }
}

impl<A: AppRecord> Snapshot<A> {
    /// Adds an app to all three structures. A second app with an already
    /// indexed bundle ID is refused.
    fn insert(&mut self, app: A) -> bool {
        if self.by_bundle_id.contains_key(app.bundle_id()) {
            return false;
        }
        let app = Arc::new(app);
        for container in [app.bundle_container(), app.data_container()] {
            if let Some(uuid) = container.uuid() {
                self.by_uuid.insert(uuid.to_uppercase(), Arc::clone(&app));
            }
        }
        self.by_bundle_id
            .insert(app.bundle_id().to_string(), Arc::clone(&app));
        self.apps.push(app);
        true
    }

    pub fn by_bundle_id(&self, bundle_id: &str) -> Option<Arc<A>> {
        self.by_bundle_id.get(bundle_id).cloned()
    }

    pub fn by_uuid(&self, uuid: &str) -> Option<Arc<A>> {
        self.by_uuid.get(&uuid.to_uppercase()).cloned()
    }

    pub fn nth(&self, position: usize) -> Option<Arc<A>> {
        self.apps.get(position).cloned()
    }

    pub fn apps(&self) -> &[Arc<A>] {
        &self.apps
    }

    pub fn len(&self) -> usize {
        self.apps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.apps.is_empty()
    }
}

/// Index of the apps under one container root.
///
/// Empty until the first scan. Lookups scan on demand and rescan at most once
/// when a lookup misses against an index that was not just rebuilt.
///
/// # Example
///
/// ```no_run
/// use iosapplist::services::{AppList, Query};
///
/// let list = AppList::new("/var/mobile")?;
/// if let Some(app) = list.find(&Query::BundleId("com.example.Foo".into()))? {
///     println!("{}", app.info_str(true));
/// }
/// # Ok::<(), anyhow::Error>(())
/// ```
#[derive(Debug)]
pub struct AppList<A: AppRecord = App> {
    root: ContainerRoot,
    snapshot: RwLock<Option<Arc<Snapshot<A>>>>,
    scan_lock: Mutex<()>,
    generation: AtomicU64,
}

impl AppList {
    /// Resolves `root` and creates an index of [`App`] records.
    pub fn new(root: impl AsRef<Utf8Path>) -> Result<Self, ContainerError> {
        Self::open(root)
    }
}

impl<A: AppRecord> AppList<A> {
    /// Resolves `root` and creates an index of `A` records.
    pub fn open(root: impl AsRef<Utf8Path>) -> Result<Self, ContainerError> {
        Ok(Self::from_root(ContainerRoot::resolve(root)?))
    }

    pub fn from_root(root: ContainerRoot) -> Self {
        Self {
            root,
            snapshot: RwLock::new(None),
            scan_lock: Mutex::new(()),
            generation: AtomicU64::new(0),
        }
    }

    pub fn root(&self) -> &ContainerRoot {
        &self.root
    }

    /// Number of completed scans.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// True once a scan has completed, even if it found no apps.
    pub fn is_populated(&self) -> bool {
        self.current().is_some()
    }

    pub fn len(&self) -> usize {
        self.current().map_or(0, |s| s.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The current snapshot, if any scan has completed.
    pub fn snapshot(&self) -> Option<Arc<Snapshot<A>>> {
        self.current()
    }

    /// Apps in discovery order.
    pub fn apps(&self) -> Vec<Arc<A>> {
        self.current()
            .map(|s| s.apps().to_vec())
            .unwrap_or_default()
    }

    pub fn iter(&self) -> std::vec::IntoIter<Arc<A>> {
        self.apps().into_iter()
    }

    /// Rebuilds the whole index from disk.
    ///
    /// Containers and candidates that fail validation are skipped. Only a
    /// failure to list one of the root's container directories is an error.
    pub fn scan(&self) -> Result<&Self, AppListError> {
        let _guard = self.scan_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let snapshot = match self.root.layout() {
            ContainerLayout::Modern {
                bundle_root,
                data_root,
            } => self.scan_modern(bundle_root, data_root)?,
            ContainerLayout::Legacy { legacy_root } => self.scan_legacy(legacy_root)?,
        };

        tracing::info!(
            "Found {} apps under {} (iOS >= {})",
            snapshot.len(),
            self.root.path(),
            self.root.min_ios_version()
        );

        let mut current = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
        *current = Some(Arc::new(snapshot));
        drop(current);
        self.generation.fetch_add(1, Ordering::SeqCst);
        Ok(self)
    }

    fn scan_modern(
        &self,
        bundle_root: &Utf8Path,
        data_root: &Utf8Path,
    ) -> Result<Snapshot<A>, AppListError> {
        let mut pending: IndexMap<String, PendingApp> = IndexMap::new();

        for type_root in [bundle_root, data_root] {
            for entry in list_root(type_root)? {
                let Some(container) = self.classify(&entry) else {
                    continue;
                };
                let Some(bundle_id) = container.bundle_id().map(str::to_string) else {
                    tracing::debug!("Skipping {}: no bundle ID", entry);
                    continue;
                };

                let slot = match container.class() {
                    ContainerClass::Bundle => pending
                        .entry(bundle_id.clone())
                        .or_insert_with(|| PendingApp::new(bundle_id)),
                    ContainerClass::Data => match pending.get_mut(&bundle_id) {
                        Some(slot) => slot,
                        None => {
                            tracing::debug!(
                                "Skipping data container {}: no bundle container for {}",
                                entry,
                                bundle_id
                            );
                            continue;
                        }
                    },
                    ContainerClass::Legacy => continue,
                };

                if !slot.attach(Arc::new(container)) {
                    tracing::debug!("Skipping duplicate container {}", entry);
                }
            }
        }

        let mut snapshot = Snapshot::default();
        for (bundle_id, candidate) in pending {
            match candidate.finish::<A>() {
                Ok(app) => {
                    snapshot.insert(app);
                }
                Err(e) => drop_candidate(&bundle_id, &e),
            }
        }
        Ok(snapshot)
    }

    fn scan_legacy(&self, legacy_root: &Utf8Path) -> Result<Snapshot<A>, AppListError> {
        let mut snapshot = Snapshot::default();

        for entry in list_root(legacy_root)? {
            let Some(container) = self.classify(&entry) else {
                continue;
            };
            let Some(bundle_id) = container.bundle_id().map(str::to_string) else {
                tracing::debug!("Skipping {}: no bundle ID", entry);
                continue;
            };
            if snapshot.by_bundle_id.contains_key(&bundle_id) {
                tracing::debug!("Skipping duplicate container {} for {}", entry, bundle_id);
                continue;
            }

            let container = Arc::new(container);
            match A::from_containers(Arc::clone(&container), container) {
                Ok(app) => {
                    snapshot.insert(app);
                }
                Err(e) => drop_candidate(&bundle_id, &e),
            }
        }
        Ok(snapshot)
    }

    fn classify(&self, entry: &Utf8Path) -> Option<Container> {
        match Container::classify(entry, &self.root) {
            Ok(container) => Some(container),
            Err(e) => {
                tracing::debug!("Skipping {}: {}", entry, e);
                None
            }
        }
    }

    /// Looks up one app.
    ///
    /// Scans first if the index has never been populated. A miss against an
    /// index that was not rebuilt by this call triggers exactly one rescan
    /// and retry. Not finding an app is `Ok(None)`.
    pub fn find(&self, query: &Query) -> Result<Option<Arc<A>>, AppListError> {
        match query {
            Query::BundleId(bundle_id) => self.lookup(|s| s.by_bundle_id(bundle_id)),
            Query::Uuid(uuid) => self.lookup(|s| s.by_uuid(uuid)),
            Query::Position(position) => self.lookup(|s| s.nth(*position)),
            Query::Path(path) => {
                let bundle_id = match Container::classify(path, &self.root) {
                    Ok(container) => container.bundle_id().map(str::to_string),
                    Err(e) => {
                        tracing::debug!("{} is not a container: {}", path, e);
                        None
                    }
                };
                match bundle_id {
                    Some(bundle_id) => self.lookup(|s| s.by_bundle_id(&bundle_id)),
                    None => Ok(None),
                }
            }
        }
    }

    /// Looks up `key` as a bundle ID, then as a container UUID.
    pub fn get(&self, key: &str) -> Result<Option<Arc<A>>, AppListError> {
        self.lookup(|s| s.by_bundle_id(key).or_else(|| s.by_uuid(key)))
    }

    pub fn contains(&self, key: &str) -> Result<bool, AppListError> {
        Ok(self.get(key)?.is_some())
    }

    fn lookup<F>(&self, probe: F) -> Result<Option<Arc<A>>, AppListError>
    where
        F: Fn(&Snapshot<A>) -> Option<Arc<A>>,
    {
        let (snapshot, fresh) = match self.current() {
            Some(snapshot) => (snapshot, false),
            None => (self.scan()?.current_or_default(), true),
        };

        if let Some(found) = probe(&snapshot) {
            return Ok(Some(found));
        }
        if fresh {
            return Ok(None);
        }

        tracing::debug!("Lookup missed, rescanning {}", self.root.path());
        let snapshot = self.scan()?.current_or_default();
        Ok(probe(&snapshot))
    }

    /// Apps ordered by their sort key.
    pub fn sorted(&self) -> Vec<Arc<A>> {
        self.sorted_by_key(|app| app.sort_key().to_string())
    }

    /// Apps ordered by a caller-supplied key. Ties keep discovery order.
    ///
    /// `key` is called once per app.
    pub fn sorted_by_key<K, F>(&self, mut key: F) -> Vec<Arc<A>>
    where
        K: Ord,
        F: FnMut(&A) -> K,
    {
        let mut apps = self.apps();
        apps.sort_by_cached_key(|app| key(app.as_ref()));
        apps
    }

    /// Apps ordered by the named field.
    pub fn sorted_by_field(&self, field: &str) -> Result<Vec<Arc<A>>, QueryError> {
        if !A::field_labels().iter().any(|(key, _)| *key == field) {
            return Err(QueryError::UnknownField(field.to_string()));
        }
        Ok(self.sorted_by_key(|app| app.field(field)))
    }

    fn current(&self) -> Option<Arc<Snapshot<A>>> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn current_or_default(&self) -> Arc<Snapshot<A>> {
        self.current().unwrap_or_default()
    }
}

fn list_root(dir: &Utf8Path) -> Result<Vec<Utf8PathBuf>, AppListError> {
    sorted_entries(dir).map_err(|source| AppListError::Io {
        path: dir.to_string(),
        source,
    })
}

fn drop_candidate(bundle_id: &str, error: &AppError) {
    tracing::debug!("Dropping {}: {}", bundle_id, error);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_from_mode() {
        assert_eq!(
            Query::from_mode("bundle_id", "com.example.Foo"),
            Ok(Query::BundleId("com.example.Foo".to_string()))
        );
        assert_eq!(
            Query::from_mode("uuid", "abcd"),
            Ok(Query::Uuid("abcd".to_string()))
        );
        assert_eq!(
            Query::from_mode("path", "/var/mobile"),
            Ok(Query::Path(Utf8PathBuf::from("/var/mobile")))
        );
    }

    #[test]
    fn test_query_from_mode_rejects_bad_input() {
        assert_eq!(Query::from_mode("uuid", ""), Err(QueryError::EmptyQuery));
        assert_eq!(
            Query::from_mode("name", "Foo"),
            Err(QueryError::InvalidMode("name".to_string()))
        );
    }

    #[test]
    fn test_empty_snapshot_lookups() {
        let snapshot: Snapshot<App> = Snapshot::default();
        assert!(snapshot.is_empty());
        assert!(snapshot.by_bundle_id("x").is_none());
        assert!(snapshot.by_uuid("x").is_none());
        assert!(snapshot.nth(0).is_none());
    }
}
