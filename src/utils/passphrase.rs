//! Passphrase loading for SQLCipher: env var → .env in dir → secure prompt.

use anyhow::{Context, Result};
use colored::Colorize;
use log::info;
use std::path::Path;

use crate::utils::config::PackagePaths;

fn try_env_then_dotenv(dir: &Path) -> Option<String> {
    let key = PackagePaths::get().passphrase_env();
    let read = || {
        std::env::var(key)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    };
    if let Some(s) = read() {
        return Some(s);
    }
    let env_path = dir.join(".env");
    if env_path.is_file() {
        let _ = dotenvy::from_path(&env_path);
        return read();
    }
    None
}

/// Read the catalog passphrase: env (CATFIND_DB_KEY) → .env in `dir` → secure prompt.
pub fn get_passphrase(dir: &Path) -> Result<String> {
    info!("Catalog is not readable without a key, assuming SQLCipher encryption");
    if let Some(s) = try_env_then_dotenv(dir) {
        info!("Passphrase found in environment");
        return Ok(s);
    }
    let label = format!("[{}]", env!("CARGO_PKG_NAME")).cyan().bold();
    let pass = rpassword::prompt_password(format!("{} Enter catalog passphrase: ", label))
        .context("read passphrase")?;
    Ok(pass.trim().to_string())
}
