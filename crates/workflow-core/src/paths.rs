/// Path constants and utilities for the workflow store
use std::path::PathBuf;
use once_cell::sync::OnceCell;

// Static storage for configurable data root
static DATA_ROOT: OnceCell<String> = OnceCell::new();

// Default root constants
const DEFAULT_WORKFLOW_DATA_ROOT: &str = "/data/workflows";
pub const APP_ROOT: &str = "/app";

/// Initialize the data root directory. Can only be called once.
/// If not called, the default `/data/workflows` will be used.
pub fn init_data_root(path: String) -> Result<(), String> {
    DATA_ROOT.set(path).map_err(|_| "Data root already initialized".to_string())
}

/// Get the configured data root or the default
fn get_data_root() -> &'static str {
    DATA_ROOT.get().map(|s| s.as_str()).unwrap_or(DEFAULT_WORKFLOW_DATA_ROOT)
}

// Record directories (relative to the data root)
pub const ENTITIES_DIR_NAME: &str = "entities";
pub const ACTORS_DIR_NAME: &str = "actors";
pub const CONFIGS_DIR_NAME: &str = "configs";
pub const APPROVALS_DIR_NAME: &str = "approvals";
pub const AUDIT_DIR_NAME: &str = "audit";
pub const RELATIONSHIPS_DIR_NAME: &str = "relationships";
pub const JOURNAL_DIR_NAME: &str = "journal";

/// Every directory a file store creates under its root
pub const STORE_DIR_NAMES: [&str; 7] = [
    ENTITIES_DIR_NAME,
    ACTORS_DIR_NAME,
    CONFIGS_DIR_NAME,
    APPROVALS_DIR_NAME,
    AUDIT_DIR_NAME,
    RELATIONSHIPS_DIR_NAME,
    JOURNAL_DIR_NAME,
];

// App subdirectories
pub const CONFIG_DIR_NAME: &str = "config";

// Path builder functions
pub fn workflow_data_root() -> PathBuf {
    PathBuf::from(get_data_root())
}

pub fn app_root() -> PathBuf {
    PathBuf::from(APP_ROOT)
}

pub fn config_dir() -> PathBuf {
    app_root().join(CONFIG_DIR_NAME)
}

/// Default location of the service configuration file
pub fn service_config_path() -> PathBuf {
    config_dir().join("workflow.json")
}
