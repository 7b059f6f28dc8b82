//! Load `.catfind.toml` (CLI only). Values from the file are applied first; flags on the
//! command line override them.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::catalog::SortOrder;
use crate::error::CatfindError;
use crate::types::{Opts, RetrySettings};
use crate::utils::config::PackagePaths;

#[derive(Debug, Default, Deserialize)]
pub struct CatfindToml {
    #[serde(default)]
    settings: SettingsSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SettingsSection {
    catalog: Option<String>,
    dirs_only: Option<bool>,
    resource: Option<String>,
    replica: Option<u32>,
    print_ids: Option<bool>,
    statement: Option<String>,
    /// Same `n,w,m` form as `--retry`.
    retry: Option<String>,
    summary: Option<bool>,
    regex: Option<String>,
    substitute: Option<String>,
    batch_size: Option<usize>,
    command: Option<String>,
    force: Option<bool>,
    check_length: Option<usize>,
    tasks: Option<usize>,
    task_capacity: Option<usize>,
    progress: Option<u64>,
    quiet: Option<bool>,
    sort: Option<u8>,
    check_encoding: Option<bool>,
    verbose: Option<bool>,
    max_path_length: Option<usize>,
    max_command_length: Option<usize>,
}

fn parse(path: &Path, text: &str) -> Result<CatfindToml, CatfindError> {
    toml::from_str(text).map_err(|e| CatfindError::Config(format!("{}: {}", path.display(), e)))
}

/// Load `.catfind.toml` from `dir` if present. A missing file is not an error; an
/// unreadable one is logged and skipped.
pub fn load_catfind_toml(dir: &Path) -> Option<CatfindToml> {
    let path = dir.join(PackagePaths::get().config_filename());
    let s = std::fs::read_to_string(&path).ok()?;
    parse(&path, &s).map_err(|e| log::warn!("{}", e)).ok()
}

/// Load an explicitly named config file. Errors are fatal here.
pub fn load_catfind_toml_from(path: &Path) -> Result<CatfindToml, CatfindError> {
    let s = std::fs::read_to_string(path)
        .map_err(|e| CatfindError::Config(format!("{}: {}", path.display(), e)))?;
    parse(path, &s)
}

/// Overwrite opts field from file when present.
macro_rules! apply_file_opt {
    ($section:expr, $opts:expr, $field:ident => $opts_field:ident) => {
        if let Some(v) = $section.$field.clone() {
            $opts.$opts_field = v;
        }
    };
    ($section:expr, $opts:expr, some $field:ident) => {
        if let Some(v) = $section.$field.clone() {
            $opts.$field = Some(v);
        }
    };
}

/// Apply file config to opts (only fields present in the file). Call before applying
/// the command line. Dry run and debug are never taken from the file.
pub fn apply_file_to_opts(file: &CatfindToml, opts: &mut Opts) -> Result<(), CatfindError> {
    let s = &file.settings;
    if let Some(ref p) = s.catalog {
        opts.catalog = PathBuf::from(p);
    }
    apply_file_opt!(s, opts, dirs_only => dirs_only);
    apply_file_opt!(s, opts, some resource);
    apply_file_opt!(s, opts, some replica);
    apply_file_opt!(s, opts, print_ids => print_ids);
    apply_file_opt!(s, opts, some statement);
    if let Some(ref r) = s.retry {
        let retry: RetrySettings = r
            .parse()
            .map_err(|e| CatfindError::Config(format!("retry: {e}")))?;
        opts.retry = Some(retry);
    }
    apply_file_opt!(s, opts, summary => summary);
    apply_file_opt!(s, opts, some regex);
    apply_file_opt!(s, opts, some substitute);
    apply_file_opt!(s, opts, batch_size => page_size);
    apply_file_opt!(s, opts, some command);
    apply_file_opt!(s, opts, force => force);
    apply_file_opt!(s, opts, some check_length);
    apply_file_opt!(s, opts, tasks => tasks);
    apply_file_opt!(s, opts, task_capacity => task_capacity);
    apply_file_opt!(s, opts, some progress);
    apply_file_opt!(s, opts, quiet => quiet);
    if let Some(sort) = s.sort {
        opts.sort = SortOrder::try_from(sort).map_err(|e| CatfindError::Config(e.to_string()))?;
    }
    apply_file_opt!(s, opts, check_encoding => check_encoding);
    apply_file_opt!(s, opts, verbose => verbose);
    apply_file_opt!(s, opts, max_path_length => max_path_length);
    apply_file_opt!(s, opts, max_command_length => max_command_length);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_values_land_in_opts() {
        let file = parse(
            Path::new("test.toml"),
            "[settings]\ncommand = \"echo %s\"\ntasks = 4\nretry = \"2,1,10\"\nsort = 1\n",
        )
        .unwrap();
        let mut opts = Opts::default();
        apply_file_to_opts(&file, &mut opts).unwrap();
        assert_eq!(opts.command.as_deref(), Some("echo %s"));
        assert_eq!(opts.tasks, 4);
        assert_eq!(opts.retry.map(|r| r.max_failures), Some(10));
        assert_eq!(opts.sort, SortOrder::Ascending);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(parse(Path::new("test.toml"), "[settings]\nhash = true\n").is_err());
    }
}
