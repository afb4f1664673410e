//! Discovered applications.
//!
//! An [`App`] is built from a matched bundle/data container pair (or a single
//! legacy container used as both) plus the app's `Info.plist`. On the modern
//! layout the index first collects containers into a [`PendingApp`] and only
//! turns it into an [`App`] once both slots are filled.

use crate::models::container::{Container, ContainerClass};
use crate::services::metadata::{self, BUNDLE_IDENTIFIER_KEY, DISPLAY_NAME_KEY};
use crate::services::normalize;
use indexmap::IndexMap;
use regex::{Captures, Regex};
use serde::Serialize;
use serde::ser::{SerializeMap, Serializer};
use std::fmt;
use std::sync::{Arc, LazyLock};
use thiserror::Error;

/// `$key` or `${key}` placeholders in info templates.
static RE_PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$(?:\{([-._a-z][-._a-z0-9]*)\}|([-._a-z][-._a-z0-9]*))")
        .expect("Invalid placeholder regex")
});

/// Errors that make a container pair unusable as an app
#[derive(Error, Debug, PartialEq, Eq)]
pub enum AppError {
    #[error("{role} container must be a {role} or legacy container, not a {actual} container")]
    WrongContainerClass {
        role: ContainerClass,
        actual: ContainerClass,
    },

    #[error("The bundle and data containers have different bundle IDs ({bundle:?} vs {data:?})")]
    BundleIdMismatch {
        bundle: Option<String>,
        data: Option<String>,
    },

    #[error("Container has no bundle ID: {0}")]
    MissingBundleId(String),

    #[error("Missing {0} container")]
    MissingContainer(ContainerClass),

    #[error("This is not a valid iOS App Store app: no .app bundle in {0}")]
    NoAppBundle(String),

    #[error(
        "The bundle ID in Info.plist ({found}) does not match the bundle ID of the bundle container ({expected})"
    )]
    InfoPlistMismatch { expected: String, found: String },
}

/// A single field value in an app's key/value view.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Str(String),
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Str(value)
    }
}

impl From<Option<&str>> for FieldValue {
    fn from(value: Option<&str>) -> Self {
        value.map_or(FieldValue::Null, |v| FieldValue::Str(v.to_string()))
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => f.write_str("None"),
            FieldValue::Bool(true) => f.write_str("True"),
            FieldValue::Bool(false) => f.write_str("False"),
            FieldValue::Str(s) => f.write_str(s),
        }
    }
}

/// The record type an [`AppList`](crate::services::AppList) builds for each app.
///
/// [`App`] is the stock implementation; wrap it to attach extra data.
pub trait AppRecord: Sized {
    /// Builds a record from a bundle container and a data container.
    fn from_containers(bundle: Arc<Container>, data: Arc<Container>) -> Result<Self, AppError>;

    fn bundle_id(&self) -> &str;

    fn bundle_container(&self) -> &Arc<Container>;

    fn data_container(&self) -> &Arc<Container>;

    fn sort_key(&self) -> &str;

    /// Field keys in declared order, with human-readable labels.
    fn field_labels() -> &'static [(&'static str, &'static str)];

    /// Value of a named field, or `None` for an unknown key.
    fn field(&self, key: &str) -> Option<FieldValue>;
}

/// An installed App Store app.
#[derive(Debug, Clone)]
pub struct App {
    bundle_id: String,
    name: String,
    display_name: String,
    sort_key: String,
    bundle: Arc<Container>,
    data: Arc<Container>,
    usable: bool,
}

impl App {
    /// Field keys in their declared order, with human-readable labels.
    pub const FIELD_LABELS: &'static [(&'static str, &'static str)] = &[
        ("bundle_id", "Bundle ID"),
        ("name", "Bundle name"),
        ("display_name", "Name"),
        ("sort_key", "Sort key"),
        ("bundle_path", "Bundle container path"),
        ("bundle_uuid", "Bundle container UUID"),
        ("data_path", "Data container path"),
        ("data_uuid", "Data container UUID"),
        ("usable", "Usable"),
    ];

    /// Default template for [`info_str`](Self::info_str).
    pub const INFO_TEMPLATE: &'static str = "$display_name ($bundle_id)";

    /// Builds an app from its containers.
    ///
    /// A missing or corrupt `Info.plist` is tolerated: the app is returned with
    /// `usable == false` and names derived from the `.app` directory. A missing
    /// `.app` directory is not.
    ///
    /// # Errors
    ///
    /// [`AppError`] when a container has the wrong class, the containers
    /// disagree on the bundle ID, there is no `.app` directory, or `Info.plist`
    /// names a different bundle ID than the containers.
    pub fn build(bundle: Arc<Container>, data: Arc<Container>) -> Result<Self, AppError> {
        check_class(&bundle, ContainerClass::Bundle)?;
        check_class(&data, ContainerClass::Data)?;

        if bundle.bundle_id() != data.bundle_id() {
            return Err(AppError::BundleIdMismatch {
                bundle: bundle.bundle_id().map(str::to_string),
                data: data.bundle_id().map(str::to_string),
            });
        }
        let bundle_id = bundle
            .bundle_id()
            .ok_or_else(|| AppError::MissingBundleId(bundle.path().to_string()))?
            .to_string();

        let app_dir = bundle
            .app_bundle()
            .ok_or_else(|| AppError::NoAppBundle(bundle.path().to_string()))?;

        let name = app_dir.name.clone();
        let mut display_name = bundle_stem(&name).to_string();
        let mut usable = false;

        match metadata::load(&app_dir.info_plist()) {
            Ok(info) => {
                if let Some(found) = info.string(BUNDLE_IDENTIFIER_KEY) {
                    if found != bundle_id {
                        return Err(AppError::InfoPlistMismatch {
                            expected: bundle_id,
                            found: found.to_string(),
                        });
                    }
                    match info.string(DISPLAY_NAME_KEY) {
                        Some(friendly) if !friendly.is_empty() => {
                            display_name = friendly.to_string();
                        }
                        _ => {}
                    }
                    usable = true;
                } else {
                    tracing::debug!(
                        "{} has no {}",
                        app_dir.info_plist(),
                        BUNDLE_IDENTIFIER_KEY
                    );
                }
            }
            Err(e) => {
                tracing::debug!("Unusable app {}: {}", bundle_id, e);
            }
        }

        let sort_key = normalize::sort_key(&display_name, &bundle_id);

        Ok(Self {
            bundle_id,
            name,
            display_name,
            sort_key,
            bundle,
            data,
            usable,
        })
    }

    pub fn bundle_id(&self) -> &str {
        &self.bundle_id
    }

    /// Name of the `.app` directory.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn sort_key(&self) -> &str {
        &self.sort_key
    }

    /// True only if `Info.plist` was read and agreed with the containers.
    pub fn usable(&self) -> bool {
        self.usable
    }

    pub fn bundle_container(&self) -> &Arc<Container> {
        &self.bundle
    }

    pub fn data_container(&self) -> &Arc<Container> {
        &self.data
    }

    /// Human-readable label for a field key.
    pub fn label(key: &str) -> Option<&'static str> {
        Self::FIELD_LABELS
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, label)| *label)
    }

    pub fn keys() -> impl Iterator<Item = &'static str> {
        Self::FIELD_LABELS.iter().map(|(k, _)| *k)
    }

    pub fn get(&self, key: &str) -> Option<FieldValue> {
        let value = match key {
            "bundle_id" => self.bundle_id.clone().into(),
            "name" => self.name.clone().into(),
            "display_name" => self.display_name.clone().into(),
            "sort_key" => self.sort_key.clone().into(),
            "bundle_path" => self.bundle.path().to_string().into(),
            "bundle_uuid" => self.bundle.uuid().into(),
            "data_path" => self.data.path().to_string().into(),
            "data_uuid" => self.data.uuid().into(),
            "usable" => self.usable.into(),
            _ => return None,
        };
        Some(value)
    }

    /// Every field as an ordered key/value map.
    pub fn fields(&self) -> IndexMap<&'static str, FieldValue> {
        Self::keys()
            .filter_map(|key| self.get(key).map(|value| (key, value)))
            .collect()
    }

    /// Renders [`INFO_TEMPLATE`](Self::INFO_TEMPLATE), optionally followed by
    /// one labelled line per remaining field.
    pub fn info_str(&self, verbose: bool) -> String {
        let fields = self.fields();
        let mut info = render_template(Self::INFO_TEMPLATE, &fields);

        if verbose {
            let padding = Self::FIELD_LABELS
                .iter()
                .map(|(_, label)| label.len())
                .max()
                .unwrap_or(0)
                + 2;
            info.push_str(":\n");
            for (key, value) in &fields {
                if matches!(*key, "bundle_id" | "display_name" | "sort_key") {
                    continue;
                }
                if let Some(label) = Self::label(key) {
                    info.push_str(&format!("{label:>padding$}:  {value}\n"));
                }
            }
        }

        info
    }
}

impl AppRecord for App {
    fn from_containers(bundle: Arc<Container>, data: Arc<Container>) -> Result<Self, AppError> {
        App::build(bundle, data)
    }

    fn bundle_id(&self) -> &str {
        &self.bundle_id
    }

    fn bundle_container(&self) -> &Arc<Container> {
        &self.bundle
    }

    fn data_container(&self) -> &Arc<Container> {
        &self.data
    }

    fn sort_key(&self) -> &str {
        &self.sort_key
    }

    fn field_labels() -> &'static [(&'static str, &'static str)] {
        Self::FIELD_LABELS
    }

    fn field(&self, key: &str) -> Option<FieldValue> {
        self.get(key)
    }
}

impl Serialize for App {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let fields = self.fields();
        let mut map = serializer.serialize_map(Some(fields.len()))?;
        for (key, value) in &fields {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl fmt::Display for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.info_str(false))
    }
}

/// Containers collected for one bundle ID while correlating a modern layout.
#[derive(Debug, Clone)]
pub struct PendingApp {
    bundle_id: String,
    bundle: Option<Arc<Container>>,
    data: Option<Arc<Container>>,
}

impl PendingApp {
    pub fn new(bundle_id: impl Into<String>) -> Self {
        Self {
            bundle_id: bundle_id.into(),
            bundle: None,
            data: None,
        }
    }

    pub fn bundle_id(&self) -> &str {
        &self.bundle_id
    }

    /// Fills the slot matching the container's class. The first container
    /// for a slot wins; returns whether it was attached.
    pub fn attach(&mut self, container: Arc<Container>) -> bool {
        let slot = match container.class() {
            ContainerClass::Bundle => &mut self.bundle,
            ContainerClass::Data => &mut self.data,
            ContainerClass::Legacy => return false,
        };
        if slot.is_some() {
            return false;
        }
        *slot = Some(container);
        true
    }

    pub fn is_complete(&self) -> bool {
        self.bundle.is_some() && self.data.is_some()
    }

    /// Turns the collected containers into a record.
    pub fn finish<A: AppRecord>(self) -> Result<A, AppError> {
        let bundle = self
            .bundle
            .ok_or(AppError::MissingContainer(ContainerClass::Bundle))?;
        let data = self
            .data
            .ok_or(AppError::MissingContainer(ContainerClass::Data))?;
        A::from_containers(bundle, data)
    }
}

fn check_class(container: &Container, role: ContainerClass) -> Result<(), AppError> {
    if container.class().satisfies(role) {
        Ok(())
    } else {
        Err(AppError::WrongContainerClass {
            role,
            actual: container.class(),
        })
    }
}

/// `Foo.app` -> `Foo`
fn bundle_stem(name: &str) -> &str {
    match name.rfind(crate::models::container::APP_BUNDLE_SUFFIX) {
        Some(idx) => &name[..idx],
        None => name,
    }
}

fn render_template(template: &str, fields: &IndexMap<&'static str, FieldValue>) -> String {
    RE_PLACEHOLDER
        .replace_all(template, |caps: &Captures| {
            let key = caps.get(1).or_else(|| caps.get(2)).map_or("", |m| m.as_str());
            match fields.get(key) {
                Some(value) => value.to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}
