//! On-disk container directories and the root of the container hierarchy.
//!
//! iOS has used two layouts for third-party apps:
//!
//! - **Modern** (iOS 8 and later): each app has a bundle container under
//!   `Containers/Bundle/Application/<UUID>` and a separate data container under
//!   `Containers/Data/Application/<UUID>`. Both carry a container-manager marker
//!   file naming the bundle identifier.
//! - **Legacy** (iOS 7 and earlier): one directory under `Applications/<UUID>`
//!   holds both the `.app` bundle and the app's data.

use crate::services::metadata::{
    self, BUNDLE_IDENTIFIER_KEY, CONTAINER_IDENTIFIER_KEY, CONTAINER_MARKER_FILE,
};
use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use std::fmt;
use std::io;
use thiserror::Error;

/// Suffix of an application bundle directory.
pub const APP_BUNDLE_SUFFIX: &str = ".app";

const CONTAINERS_DIR: &str = "Containers";
const BUNDLE_DIR: &str = "Bundle";
const DATA_DIR: &str = "Data";
const APPLICATION_DIR: &str = "Application";
const LEGACY_APPLICATIONS_DIR: &str = "Applications";

/// Errors for paths that are not containers or container roots
#[derive(Error, Debug)]
pub enum ContainerError {
    #[error("Path does not exist: {0}")]
    NotFound(String),

    #[error("Not a directory: {0}")]
    NotADirectory(String),

    #[error("Path is not valid UTF-8: {0}")]
    NonUtf8Path(String),

    #[error("{0} is not inside a known container directory")]
    OutsideRoot(String),

    #[error("No iOS container structure found at or above {0}")]
    NoRoot(String),

    #[error("Failed to resolve {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// What a container holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerClass {
    /// App binaries (`Containers/Bundle/Application/<UUID>`)
    Bundle,
    /// App data (`Containers/Data/Application/<UUID>`)
    Data,
    /// Both together, pre-iOS 8 (`Applications/<UUID>`)
    Legacy,
}

impl ContainerClass {
    pub fn name(self) -> &'static str {
        match self {
            ContainerClass::Bundle => "bundle",
            ContainerClass::Data => "data",
            ContainerClass::Legacy => "legacy",
        }
    }

    /// Whether a container of this class may stand in where `wanted` is expected.
    ///
    /// Legacy containers substitute for either bundle or data containers.
    pub fn satisfies(self, wanted: ContainerClass) -> bool {
        self == wanted || self == ContainerClass::Legacy
    }
}

impl fmt::Display for ContainerClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which container-layout era a root uses. Fixed once resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerLayout {
    Modern {
        bundle_root: Utf8PathBuf,
        data_root: Utf8PathBuf,
    },
    Legacy {
        legacy_root: Utf8PathBuf,
    },
}

/// The resolved root of a container hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerRoot {
    path: Utf8PathBuf,
    layout: ContainerLayout,
}

impl ContainerRoot {
    /// Locates the container hierarchy for `start`.
    ///
    /// `start` may be the mobile home directory (or a simulator's data
    /// directory), a `Containers` directory, its `Bundle` or `Data`
    /// subdirectory, their `Application` subdirectory, a legacy `Applications`
    /// directory, or a path inside one of their containers. Only directories
    /// with the layout's names are climbed; an unrelated path is an error even
    /// if some ancestor happens to hold an `Applications` directory.
    ///
    /// All stored paths are canonical, so symlinked layout directories still
    /// match the canonical parents of their containers.
    ///
    /// # Errors
    ///
    /// [`ContainerError::NoRoot`] if no recognizable layout is found, or a
    /// resolution error if `start` itself cannot be canonicalized.
    pub fn resolve(start: impl AsRef<Utf8Path>) -> Result<Self, ContainerError> {
        let start = canonicalize(start.as_ref())?;

        let root = Self::detect_home(&start)
            .or_else(|| Self::detect_enclosing(&start))
            .ok_or_else(|| ContainerError::NoRoot(start.to_string()))?;

        tracing::debug!(
            "Resolved container root {} (iOS >= {}) from {}",
            root.path,
            root.min_ios_version(),
            start
        );
        Ok(root)
    }

    /// `home` holds `Containers` or `Applications`. Modern wins when both exist.
    fn detect_home(home: &Utf8Path) -> Option<Self> {
        if let Some(root) = Self::modern_at(&home.join(CONTAINERS_DIR)) {
            return Some(root);
        }
        let legacy = home.join(LEGACY_APPLICATIONS_DIR);
        if legacy.is_dir() {
            return Self::legacy_at(&legacy);
        }
        None
    }

    /// `start` is a layout directory itself or lies inside one.
    fn detect_enclosing(start: &Utf8Path) -> Option<Self> {
        let mut below: Option<&Utf8Path> = None;

        for dir in start.ancestors() {
            if let Some(root) = Self::modern_at(dir) {
                return Some(root);
            }
            if dir.file_name() == Some(LEGACY_APPLICATIONS_DIR) {
                // Climbing into Applications only from one of its app containers
                let from_container = match below {
                    None => true,
                    Some(container) => find_app_bundle(container).is_some(),
                };
                if from_container {
                    return Self::legacy_at(dir);
                }
            }
            below = Some(dir);
        }

        None
    }

    fn modern_at(containers: &Utf8Path) -> Option<Self> {
        let bundle_root = containers.join(BUNDLE_DIR).join(APPLICATION_DIR);
        let data_root = containers.join(DATA_DIR).join(APPLICATION_DIR);
        if !(bundle_root.is_dir() && data_root.is_dir()) {
            return None;
        }
        Some(Self {
            path: containers.canonicalize_utf8().ok()?,
            layout: ContainerLayout::Modern {
                bundle_root: bundle_root.canonicalize_utf8().ok()?,
                data_root: data_root.canonicalize_utf8().ok()?,
            },
        })
    }

    fn legacy_at(dir: &Utf8Path) -> Option<Self> {
        let legacy_root = dir.canonicalize_utf8().ok()?;
        Some(Self {
            path: legacy_root.clone(),
            layout: ContainerLayout::Legacy { legacy_root },
        })
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    pub fn layout(&self) -> &ContainerLayout {
        &self.layout
    }

    pub fn is_modern(&self) -> bool {
        matches!(self.layout, ContainerLayout::Modern { .. })
    }

    /// Lowest iOS major version consistent with the detected layout.
    pub fn min_ios_version(&self) -> u32 {
        if self.is_modern() { 8 } else { 7 }
    }

    pub fn bundle_root(&self) -> Option<&Utf8Path> {
        match &self.layout {
            ContainerLayout::Modern { bundle_root, .. } => Some(bundle_root),
            ContainerLayout::Legacy { .. } => None,
        }
    }

    pub fn data_root(&self) -> Option<&Utf8Path> {
        match &self.layout {
            ContainerLayout::Modern { data_root, .. } => Some(data_root),
            ContainerLayout::Legacy { .. } => None,
        }
    }

    pub fn legacy_root(&self) -> Option<&Utf8Path> {
        match &self.layout {
            ContainerLayout::Legacy { legacy_root } => Some(legacy_root),
            ContainerLayout::Modern { .. } => None,
        }
    }

    /// Class of the containers directly under `parent`, if it is one of this
    /// root's container directories.
    pub fn class_of(&self, parent: &Utf8Path) -> Option<ContainerClass> {
        match &self.layout {
            ContainerLayout::Modern {
                bundle_root,
                data_root,
            } => {
                if parent == bundle_root {
                    Some(ContainerClass::Bundle)
                } else if parent == data_root {
                    Some(ContainerClass::Data)
                } else {
                    None
                }
            }
            ContainerLayout::Legacy { legacy_root } => {
                (parent == legacy_root).then_some(ContainerClass::Legacy)
            }
        }
    }
}

/// One container directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    path: Utf8PathBuf,
    class: ContainerClass,
    bundle_id: Option<String>,
    uuid: Option<String>,
}

impl Container {
    /// Classifies `path` as a container of `root`.
    ///
    /// The class comes only from which of the root's directories `path` sits
    /// directly under. A missing or unreadable marker is not an error; the
    /// container just has no bundle identifier.
    ///
    /// # Errors
    ///
    /// [`ContainerError`] if `path` does not exist, is not a directory, or is
    /// not a direct child of one of the root's container directories.
    pub fn classify(
        path: impl AsRef<Utf8Path>,
        root: &ContainerRoot,
    ) -> Result<Self, ContainerError> {
        let given = path.as_ref();
        let file_name = given
            .file_name()
            .ok_or_else(|| ContainerError::OutsideRoot(given.to_string()))?;
        let parent = match given.parent() {
            Some(parent) if !parent.as_str().is_empty() => parent,
            _ => Utf8Path::new("."),
        };

        let class = root
            .class_of(&canonicalize(parent)?)
            .ok_or_else(|| ContainerError::OutsideRoot(given.to_string()))?;

        let resolved = canonicalize(given)?;
        if !resolved.is_dir() {
            return Err(ContainerError::NotADirectory(resolved.to_string()));
        }

        let (bundle_id, uuid) = match class {
            ContainerClass::Bundle | ContainerClass::Data => (
                read_marker_identifier(&resolved),
                Some(file_name.to_uppercase()),
            ),
            ContainerClass::Legacy => (read_legacy_identifier(&resolved), None),
        };

        Ok(Self {
            path: resolved,
            class,
            bundle_id,
            uuid,
        })
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    pub fn class(&self) -> ContainerClass {
        self.class
    }

    /// Bundle identifier, or `None` when this is not an app container.
    pub fn bundle_id(&self) -> Option<&str> {
        self.bundle_id.as_deref()
    }

    /// Upper-cased directory name on the modern layout; `None` on legacy.
    pub fn uuid(&self) -> Option<&str> {
        self.uuid.as_deref()
    }

    /// Locates the `.app` directory inside this container.
    pub fn app_bundle(&self) -> Option<AppBundleDir> {
        find_app_bundle(&self.path)
    }
}

/// An `.app` directory found inside a bundle or legacy container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppBundleDir {
    /// Directory name, including the `.app` suffix
    pub name: String,
    pub path: Utf8PathBuf,
}

impl AppBundleDir {
    pub fn info_plist(&self) -> Utf8PathBuf {
        self.path.join("Info.plist")
    }
}

/// First `*.app` directory (by name) inside `dir`.
pub fn find_app_bundle(dir: &Utf8Path) -> Option<AppBundleDir> {
    sorted_entries(dir)
        .ok()?
        .into_iter()
        .find(|entry| {
            entry
                .file_name()
                .is_some_and(|name| name.ends_with(APP_BUNDLE_SUFFIX))
                && entry.is_dir()
        })
        .and_then(|entry| {
            let name = entry.file_name()?.to_string();
            let path = entry.canonicalize_utf8().unwrap_or(entry);
            Some(AppBundleDir { name, path })
        })
}

/// Entries of `dir` sorted by file name. Entries that vanish or have
/// non-UTF-8 names are skipped.
pub(crate) fn sorted_entries(dir: &Utf8Path) -> io::Result<Vec<Utf8PathBuf>> {
    let mut entries: Vec<Utf8PathBuf> = dir
        .read_dir_utf8()?
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry.into_path()),
            Err(e) => {
                tracing::debug!("Skipping unreadable entry in {}: {}", dir, e);
                None
            }
        })
        .collect();
    entries.sort();
    Ok(entries)
}

fn read_marker_identifier(container: &Utf8Path) -> Option<String> {
    let marker = container.join(CONTAINER_MARKER_FILE);
    match metadata::load(&marker) {
        Ok(meta) => non_empty(meta.string(CONTAINER_IDENTIFIER_KEY)),
        Err(e) => {
            tracing::debug!("No usable container marker in {}: {}", container, e);
            None
        }
    }
}

fn read_legacy_identifier(container: &Utf8Path) -> Option<String> {
    let app = find_app_bundle(container)?;
    match metadata::load(&app.info_plist()) {
        Ok(meta) => non_empty(meta.string(BUNDLE_IDENTIFIER_KEY)),
        Err(e) => {
            tracing::debug!("No usable Info.plist in {}: {}", app.path, e);
            None
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_string)
}

fn canonicalize(path: &Utf8Path) -> Result<Utf8PathBuf, ContainerError> {
    path.canonicalize_utf8().map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => ContainerError::NotFound(path.to_string()),
        io::ErrorKind::InvalidData => ContainerError::NonUtf8Path(path.to_string()),
        _ => ContainerError::Io {
            path: path.to_string(),
            source,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn utf8(dir: &TempDir) -> Utf8PathBuf {
        Utf8PathBuf::try_from(dir.path().to_path_buf())
            .unwrap()
            .canonicalize_utf8()
            .unwrap()
    }

    #[test]
    fn test_class_substitution() {
        assert!(ContainerClass::Bundle.satisfies(ContainerClass::Bundle));
        assert!(ContainerClass::Legacy.satisfies(ContainerClass::Bundle));
        assert!(ContainerClass::Legacy.satisfies(ContainerClass::Data));
        assert!(!ContainerClass::Data.satisfies(ContainerClass::Bundle));
        assert!(!ContainerClass::Bundle.satisfies(ContainerClass::Legacy));
    }

    #[test]
    fn test_find_app_bundle_ignores_files_and_picks_first() {
        let temp = TempDir::new().unwrap();
        let dir = utf8(&temp);
        fs::write(dir.join("Fake.app"), "not a dir").unwrap();
        fs::create_dir(dir.join("Zed.app")).unwrap();
        fs::create_dir(dir.join("Beta.app")).unwrap();
        fs::create_dir(dir.join("Documents")).unwrap();

        let found = find_app_bundle(&dir).unwrap();
        assert_eq!(found.name, "Beta.app");
        assert_eq!(found.info_plist(), dir.join("Beta.app").join("Info.plist"));
    }

    #[test]
    fn test_find_app_bundle_none() {
        let temp = TempDir::new().unwrap();
        assert!(find_app_bundle(&utf8(&temp)).is_none());
    }

    #[test]
    fn test_class_of_modern() {
        let temp = TempDir::new().unwrap();
        let home = utf8(&temp);
        fs::create_dir_all(home.join("Containers/Bundle/Application")).unwrap();
        fs::create_dir_all(home.join("Containers/Data/Application")).unwrap();

        let root = ContainerRoot::resolve(&home).unwrap();
        assert_eq!(
            root.class_of(&home.join("Containers/Bundle/Application")),
            Some(ContainerClass::Bundle)
        );
        assert_eq!(
            root.class_of(&home.join("Containers/Data/Application")),
            Some(ContainerClass::Data)
        );
        assert_eq!(root.class_of(&home), None);
    }
}
