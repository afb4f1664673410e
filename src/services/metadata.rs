//! Property-list reader for app and container metadata files.
//!
//! Both the app's `Info.plist` and the container manager's marker file are
//! property lists whose top-level value is a dictionary. This module turns
//! such a file into a [`Metadata`] lookup or a typed [`ParseError`].

use camino::Utf8Path;
use std::fs;
use std::io::Cursor;
use thiserror::Error;

/// Bundle identifier key in an app's `Info.plist`.
pub const BUNDLE_IDENTIFIER_KEY: &str = "CFBundleIdentifier";

/// Optional human-friendly name key in an app's `Info.plist`.
pub const DISPLAY_NAME_KEY: &str = "CFBundleDisplayName";

/// Bundle identifier key in a modern container's marker file.
pub const CONTAINER_IDENTIFIER_KEY: &str = "MCMMetadataIdentifier";

/// Name of the marker file found at the top of every modern container.
pub const CONTAINER_MARKER_FILE: &str = ".com.apple.mobile_container_manager.metadata.plist";

/// Errors raised while reading a metadata file
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed property list {path}: {source}")]
    Malformed {
        path: String,
        #[source]
        source: plist::Error,
    },

    #[error("Property list {0} is not a dictionary")]
    NotADictionary(String),
}

/// Parsed key/value content of a property-list dictionary.
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    entries: plist::Dictionary,
}

impl Metadata {
    /// Returns the trimmed string stored under `key`, if it is a string.
    pub fn string(&self, key: &str) -> Option<&str> {
        self.entries
            .get(key)
            .and_then(plist::Value::as_string)
            .map(str::trim)
    }
}

impl From<plist::Dictionary> for Metadata {
    fn from(entries: plist::Dictionary) -> Self {
        Self { entries }
    }
}

/// Loads a property list (XML or binary) from `path`.
///
/// # Errors
///
/// - [`ParseError::Io`] if the file is missing or unreadable
/// - [`ParseError::Malformed`] if the bytes are not a property list
/// - [`ParseError::NotADictionary`] if the top-level value is not a dictionary
pub fn load(path: &Utf8Path) -> Result<Metadata, ParseError> {
    let bytes = fs::read(path).map_err(|source| ParseError::Io {
        path: path.to_string(),
        source,
    })?;

    let value =
        plist::Value::from_reader(Cursor::new(bytes)).map_err(|source| ParseError::Malformed {
            path: path.to_string(),
            source,
        })?;

    value
        .into_dictionary()
        .map(Metadata::from)
        .ok_or_else(|| ParseError::NotADictionary(path.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, contents: &str) -> Utf8PathBuf {
        let path = Utf8PathBuf::try_from(dir.path().join(name)).unwrap();
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_load_xml_dictionary() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "Info.plist",
            r#"<?xml version="1.0" encoding="UTF-8"?>
<plist version="1.0">
<dict>
    <key>CFBundleIdentifier</key>
    <string>com.example.Foo</string>
    <key>CFBundleDisplayName</key>
    <string>  Foo App  </string>
    <key>CFBundleVersion</key>
    <integer>3</integer>
</dict>
</plist>"#,
        );

        let metadata = load(&path).unwrap();
        assert_eq!(metadata.string(BUNDLE_IDENTIFIER_KEY), Some("com.example.Foo"));
        assert_eq!(metadata.string(DISPLAY_NAME_KEY), Some("Foo App"));
        assert_eq!(metadata.string("CFBundleVersion"), None);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let path = Utf8PathBuf::try_from(dir.path().join("nope.plist")).unwrap();
        assert!(matches!(load(&path), Err(ParseError::Io { .. })));
    }

    #[test]
    fn test_garbage_is_malformed() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "Info.plist", "this is not a plist");
        assert!(matches!(load(&path), Err(ParseError::Malformed { .. })));
    }

    #[test]
    fn test_array_root_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "Info.plist",
            r#"<?xml version="1.0" encoding="UTF-8"?>
<plist version="1.0">
<array><string>a</string></array>
</plist>"#,
        );
        assert!(matches!(load(&path), Err(ParseError::NotADictionary(_))));
    }
}
