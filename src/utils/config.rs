//! Application configuration constants.
//! Limits and defaults in one place.

use std::sync::OnceLock;
use std::time::Duration;

// ---- Package / paths (from CARGO_PKG_NAME, cached) ----

/// Package-derived names: built once from `CARGO_PKG_NAME`, then cached.
pub struct PackagePaths {
    pkg_name: &'static str,
    catalog_filename: String,
    config_filename: String,
    passphrase_env: String,
}

static PACKAGE_PATHS: OnceLock<PackagePaths> = OnceLock::new();

impl PackagePaths {
    /// Build and cache names from `CARGO_PKG_NAME`. Called once on first use.
    pub fn get() -> &'static PackagePaths {
        PACKAGE_PATHS.get_or_init(|| {
            let pkg = env!("CARGO_PKG_NAME");
            PackagePaths {
                pkg_name: pkg,
                catalog_filename: format!("{pkg}.db"),
                config_filename: format!(".{pkg}.toml"),
                passphrase_env: format!("{}_DB_KEY", pkg.to_uppercase()),
            }
        })
    }

    /// Crate name, used as the log prefix and module filter.
    pub fn pkg_name(&self) -> &'static str {
        self.pkg_name
    }

    /// Catalog used when neither `--catalog` nor the config file names one.
    pub fn catalog_filename(&self) -> &str {
        &self.catalog_filename
    }

    /// `.catfind.toml`, looked up in the current directory.
    pub fn config_filename(&self) -> &str {
        &self.config_filename
    }

    /// `CATFIND_DB_KEY`: SQLCipher passphrase for an encrypted catalog.
    pub fn passphrase_env(&self) -> &str {
        &self.passphrase_env
    }
}

// ---- Sizes ----

/// Hard limits and size defaults.
pub struct Limits;

impl Limits {
    /// Upper bound on parallel tasks per batch.
    pub const MAX_TASKS: usize = 64;
    /// Default maximum composed path length (bytes).
    pub const PATHNAME_LENGTH: usize = 65536;
    /// Default maximum rendered command length (bytes).
    pub const COMMAND_LENGTH: usize = 65536;
    /// Rows per cursor fetch.
    pub const DEFAULT_PAGE_SIZE: usize = 1024;
    /// Commands per task when `--task-capacity` is not given.
    pub const DEFAULT_TASK_CAPACITY: usize = 1024;
}

// ---- Retry ----

/// Defaults for `--retry` fields left empty (`-R ,,100` keeps retries and delay).
pub struct RetryDefaults;

impl RetryDefaults {
    pub const RETRIES: u32 = 3;
    pub const DELAY_SECS: u64 = 59;
    pub const MAX_FAILURES: u64 = 32768;

    pub fn delay() -> Duration {
        Duration::from_secs(Self::DELAY_SECS)
    }
}

// ---- Output ----

/// Width of the label and id columns in summary and id output.
pub const COLUMN_WIDTH: usize = 24;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_derive_from_package() {
        let paths = PackagePaths::get();
        assert_eq!(paths.pkg_name(), "catfind");
        assert_eq!(paths.catalog_filename(), "catfind.db");
        assert_eq!(paths.config_filename(), ".catfind.toml");
        assert_eq!(paths.passphrase_env(), "CATFIND_DB_KEY");
    }
}
