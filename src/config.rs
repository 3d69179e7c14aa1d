//! Runtime configuration from environment variables.

use std::path::PathBuf;

/// Where the binary sends its logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogMode {
    /// File when stdout is a terminal, stdout otherwise
    Auto,
    Stdout,
    File,
}

impl LogMode {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "auto" => Some(Self::Auto),
            "stdout" => Some(Self::Stdout),
            "file" => Some(Self::File),
            _ => None,
        }
    }

    /// Resolve `Auto` against whether stdout is interactive.
    #[must_use]
    pub fn use_file(self, interactive: bool) -> bool {
        match self {
            Self::File => true,
            Self::Stdout => false,
            Self::Auto => interactive,
        }
    }
}

/// Configuration for a vault run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultConfig {
    /// SQLite database for the ledger mirror
    pub db_path: PathBuf,

    /// Base64 Ed25519 seed for the oracle authority; a fresh key is
    /// generated when unset
    pub oracle_seed_file: Option<PathBuf>,

    /// Base64 verifying key the oracle authority must match
    pub oracle_pubkey: Option<String>,

    pub log_mode: LogMode,
    pub log_file: PathBuf,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("genovault.db"),
            oracle_seed_file: None,
            oracle_pubkey: None,
            log_mode: LogMode::Auto,
            log_file: PathBuf::from("genovault.log"),
        }
    }
}

impl VaultConfig {
    /// Load config overrides from environment (best-effort).
    ///
    /// Supported:
    /// - GENOVAULT_DB_PATH
    /// - GENOVAULT_ORACLE_SEED_FILE
    /// - GENOVAULT_ORACLE_PUBKEY (base64)
    /// - GENOVAULT_LOG_MODE=auto|stdout|file
    /// - GENOVAULT_LOG_FILE
    ///
    /// Empty or unparseable values are ignored.
    #[must_use]
    pub fn from_env_or_default() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = non_empty("GENOVAULT_DB_PATH") {
            cfg.db_path = PathBuf::from(v.trim());
        }

        if let Some(v) = non_empty("GENOVAULT_ORACLE_SEED_FILE") {
            cfg.oracle_seed_file = Some(PathBuf::from(v.trim()));
        }

        if let Some(v) = non_empty("GENOVAULT_ORACLE_PUBKEY") {
            cfg.oracle_pubkey = Some(v.trim().to_string());
        }

        if let Some(mode) = non_empty("GENOVAULT_LOG_MODE").and_then(|v| LogMode::parse(&v)) {
            cfg.log_mode = mode;
        }

        if let Some(v) = non_empty("GENOVAULT_LOG_FILE") {
            cfg.log_file = PathBuf::from(v.trim());
        }

        cfg
    }
}
