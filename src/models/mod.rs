//! Data models for iosapplist.
//!
//! - [`Container`] / [`ContainerRoot`]: on-disk container directories and the
//!   root of the hierarchy they live in, for both the modern (iOS 8+) and
//!   legacy layouts
//! - [`App`]: one discovered app, built from its containers and `Info.plist`
//! - [`PendingApp`]: containers collected for an app that is not built yet
//! - [`Settings`]: user settings loaded from `iosapplist.yaml`

pub mod app;
pub mod config;
pub mod container;

pub use app::{App, AppError, AppRecord, FieldValue, PendingApp};
pub use config::Settings;
pub use container::{
    AppBundleDir, Container, ContainerClass, ContainerError, ContainerLayout, ContainerRoot,
};
