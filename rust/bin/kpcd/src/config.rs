//! Server configuration file.
//!
//! A context name such as `prod` resolves to `/etc/kpc/prod.toml`; anything
//! that looks like a path is used as given.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Directory searched for bare context names.
pub const CONFIG_DIR: &str = "/etc/kpc";

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub root: RootConfig,
    pub storage: StorageConfig,
    pub jwt: JwtConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RootConfig {
    /// argon2id PHC string for the `root` account.
    #[serde(default)]
    pub password_hash: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub data_dir: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    #[serde(default)]
    pub secret: String,
    #[serde(default = "default_expire_secs")]
    pub expire_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
    /// Number given to the first receipt ever issued.
    #[serde(default = "default_receipt_seed")]
    pub receipt_number_seed: i64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            receipt_number_seed: default_receipt_seed(),
        }
    }
}

fn default_expire_secs() -> u64 {
    86400
}

fn default_receipt_seed() -> i64 {
    1
}

impl ServerConfig {
    /// Map a `-c` argument to a file path.
    pub fn resolve_path(name_or_path: &str) -> PathBuf {
        if name_or_path.contains('/') || name_or_path.contains('.') {
            PathBuf::from(name_or_path)
        } else {
            Path::new(CONFIG_DIR).join(format!("{}.toml", name_or_path))
        }
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("cannot read {}: {}", path.display(), e))?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> anyhow::Result<Self> {
        toml::from_str(text).map_err(|e| anyhow::anyhow!("invalid configuration: {}", e))
    }
}
