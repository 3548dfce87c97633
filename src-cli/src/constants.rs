//! Application-wide constants

/// Execution service defaults
pub mod service {
    /// Base URL of a locally started execution service
    pub const URL: &str = "http://127.0.0.1:8000";
    /// Upper bound on one request, including the whole run
    pub const REQUEST_TIMEOUT_SECS: u64 = 120;
}

/// On-disk layout
pub mod paths {
    /// Data directory name under the home directory
    pub const DATA_DIR: &str = ".blockflow";
    /// Configuration file name inside the data directory
    pub const CONFIG_FILE: &str = "config.json";
    /// Snapshot directory name inside the data directory
    pub const SNAPSHOT_DIR: &str = "snapshots";
}

/// Local snapshot slot used by `save` and `restore`
pub const SNAPSHOT_KEY: &str = "graph_autosave";
