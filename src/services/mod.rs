//! Services module - scanning, correlation and metadata reading.
//!
//! # Components
//!
//! - [`AppList`]: the app index. Scans a [`ContainerRoot`](crate::models::ContainerRoot),
//!   correlates bundle and data containers, and serves lookups by bundle ID,
//!   container UUID, container path or position.
//! - [`metadata`]: reads property lists (`Info.plist`, container markers).
//! - [`normalize`]: diacritic stripping and sort keys.
//!
//! Nothing here writes to the scanned tree.

pub mod app_list;
pub mod metadata;
pub mod normalize;

pub use app_list::{AppList, AppListError, Query, QueryError, Snapshot};
pub use metadata::{Metadata, ParseError};
