//! Builders for on-disk container trees used by the integration tests.

#![allow(dead_code)]

use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use tempfile::TempDir;

pub const MARKER: &str = ".com.apple.mobile_container_manager.metadata.plist";

/// Render a flat string dictionary as an XML property list.
pub fn plist_xml(entries: &[(&str, &str)]) -> String {
    let mut xml = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <!DOCTYPE plist PUBLIC \"-//Apple//DTD PLIST 1.0//EN\" \
         \"http://www.apple.com/DTDs/PropertyList-1.0.dtd\">\n\
         <plist version=\"1.0\">\n<dict>\n",
    );
    for (key, value) in entries {
        xml.push_str(&format!("\t<key>{key}</key>\n\t<string>{value}</string>\n"));
    }
    xml.push_str("</dict>\n</plist>\n");
    xml
}

/// A temporary mobile home directory.
pub struct Fixture {
    _temp: TempDir,
    pub home: Utf8PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let home = Utf8PathBuf::try_from(temp.path().to_path_buf())
            .unwrap()
            .canonicalize_utf8()
            .unwrap();
        Self { _temp: temp, home }
    }

    /// `Containers/Bundle/Application` + `Containers/Data/Application`
    pub fn modern() -> Self {
        let fixture = Self::new();
        fs::create_dir_all(fixture.bundle_root()).unwrap();
        fs::create_dir_all(fixture.data_root()).unwrap();
        fixture
    }

    /// `Applications`
    pub fn legacy() -> Self {
        let fixture = Self::new();
        fs::create_dir_all(fixture.legacy_root()).unwrap();
        fixture
    }

    /// A home directory with nothing in it.
    pub fn empty() -> Self {
        Self::new()
    }

    pub fn containers(&self) -> Utf8PathBuf {
        self.home.join("Containers")
    }

    pub fn bundle_root(&self) -> Utf8PathBuf {
        self.containers().join("Bundle/Application")
    }

    pub fn data_root(&self) -> Utf8PathBuf {
        self.containers().join("Data/Application")
    }

    pub fn legacy_root(&self) -> Utf8PathBuf {
        self.home.join("Applications")
    }

    /// A bundle container, with a marker file when `bundle_id` is given.
    pub fn bundle_container(&self, uuid: &str, bundle_id: Option<&str>) -> Utf8PathBuf {
        make_modern_container(&self.bundle_root().join(uuid), bundle_id)
    }

    /// A data container, with a marker file when `bundle_id` is given.
    pub fn data_container(&self, uuid: &str, bundle_id: Option<&str>) -> Utf8PathBuf {
        make_modern_container(&self.data_root().join(uuid), bundle_id)
    }

    /// A complete modern app: bundle container with `<app_name>.app` and an
    /// Info.plist, plus a matching data container.
    pub fn modern_app(
        &self,
        bundle_uuid: &str,
        data_uuid: &str,
        bundle_id: &str,
        app_name: &str,
        display_name: Option<&str>,
    ) -> (Utf8PathBuf, Utf8PathBuf) {
        let bundle = self.bundle_container(bundle_uuid, Some(bundle_id));
        let app_dir = make_app_dir(&bundle, app_name);
        write_info_plist(&app_dir, Some(bundle_id), display_name);
        let data = self.data_container(data_uuid, Some(bundle_id));
        (bundle, data)
    }

    /// A complete legacy app container.
    pub fn legacy_app(
        &self,
        uuid: &str,
        bundle_id: &str,
        app_name: &str,
        display_name: Option<&str>,
    ) -> Utf8PathBuf {
        let container = self.legacy_root().join(uuid);
        fs::create_dir_all(&container).unwrap();
        let app_dir = make_app_dir(&container, app_name);
        write_info_plist(&app_dir, Some(bundle_id), display_name);
        fs::create_dir_all(container.join("Documents")).unwrap();
        container
    }
}

fn make_modern_container(path: &Utf8Path, bundle_id: Option<&str>) -> Utf8PathBuf {
    fs::create_dir_all(path).unwrap();
    if let Some(bundle_id) = bundle_id {
        fs::write(
            path.join(MARKER),
            plist_xml(&[("MCMMetadataIdentifier", bundle_id)]),
        )
        .unwrap();
    }
    path.to_path_buf()
}

/// Create `<container>/<app_name>.app`.
pub fn make_app_dir(container: &Utf8Path, app_name: &str) -> Utf8PathBuf {
    let app_dir = container.join(format!("{app_name}.app"));
    fs::create_dir_all(&app_dir).unwrap();
    app_dir
}

/// Write `Info.plist` with the given identifier and display name keys.
pub fn write_info_plist(app_dir: &Utf8Path, bundle_id: Option<&str>, display_name: Option<&str>) {
    let mut entries = vec![("CFBundleExecutable", "App")];
    if let Some(bundle_id) = bundle_id {
        entries.push(("CFBundleIdentifier", bundle_id));
    }
    if let Some(display_name) = display_name {
        entries.push(("CFBundleDisplayName", display_name));
    }
    fs::write(app_dir.join("Info.plist"), plist_xml(&entries)).unwrap();
}
