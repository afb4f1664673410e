// iosapplist - Lists installed iOS App Store apps
//
// This is the library crate containing container discovery, app correlation
// and the app index. The binary crate (main.rs) provides the command line.

pub mod cli;
pub mod config;
pub mod logging;
pub mod models;
pub mod services;

// Re-export commonly used types for convenience
pub use crate::config::ConfigManager;
pub use crate::models::{
    App, AppError, AppRecord, Container, ContainerClass, ContainerError, ContainerRoot,
};
pub use crate::services::{AppList, AppListError, Query, QueryError};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
