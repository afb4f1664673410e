use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

/// Default container root on a jailbroken device.
pub const DEFAULT_ROOT: &str = "/var/mobile";

/// User settings from `iosapplist.yaml`
///
/// Every field may also be set through an `IOSAPPLIST_<FIELD>` environment
/// variable, and command-line flags override both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Directory to search for apps
    #[serde(default = "default_root")]
    pub root: Utf8PathBuf,

    /// Write a daily log file here in addition to stderr
    #[serde(default)]
    pub log_dir: Option<Utf8PathBuf>,

    /// Log at debug level
    #[serde(default)]
    pub debug: bool,

    /// Emit JSON instead of human-readable text
    #[serde(default)]
    pub json: bool,
}

fn default_root() -> Utf8PathBuf {
    Utf8PathBuf::from(DEFAULT_ROOT)
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            root: default_root(),
            log_dir: None,
            debug: false,
            json: false,
        }
    }
}
