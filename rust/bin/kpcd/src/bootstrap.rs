//! Startup checks.
//!
//! kpcd refuses to start without a root password hash, a JWT secret and a
//! data directory.

use crate::config::ServerConfig;

/// Verify server configuration is ready for production use.
pub fn verify_config(config: &ServerConfig) -> anyhow::Result<()> {
    if config.root.password_hash.is_empty() {
        anyhow::bail!(
            "No root password hash found in configuration.\n\
             Set [root] password_hash to an argon2id hash before starting kpcd."
        );
    }
    if config.jwt.secret.is_empty() {
        anyhow::bail!("JWT secret is empty in configuration.");
    }
    if config.storage.data_dir.is_empty() {
        anyhow::bail!("Storage data_dir is empty in configuration.");
    }
    if config.registry.receipt_number_seed < 1 {
        anyhow::bail!("registry.receipt_number_seed must be at least 1.");
    }
    Ok(())
}

/// Verify a root login attempt against the stored argon2id hash.
pub fn verify_root_password(password: &str, hash: &str) -> bool {
    kpc::password::verify_password(password, hash)
}
