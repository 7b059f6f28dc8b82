//! CLI command handler: resolve options, open the catalog, run one traversal.

use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::catalog::{SortOrder, SqliteCatalog, open_catalog_or_detect_encrypted};
use crate::engine::arg_parser::Cli;
use crate::engine::cancel::CancelToken;
use crate::engine::runner::ShellExecutor;
use crate::error::CatfindError;
use crate::pipeline::find;
use crate::report::print_summary;
use crate::types::Opts;
use crate::utils::catfind_toml::{apply_file_to_opts, load_catfind_toml, load_catfind_toml_from};
use crate::utils::config::PackagePaths;
use crate::utils::{level_for, setup_logging};

/// Overwrite opts field from the command line when given.
macro_rules! apply_cli_opt {
    ($cli:expr, $opts:expr, $field:ident => $opts_field:ident) => {
        if let Some(v) = $cli.$field.clone() {
            $opts.$opts_field = v;
        }
    };
    ($cli:expr, $opts:expr, some $field:ident) => {
        if let Some(v) = $cli.$field.clone() {
            $opts.$field = Some(v);
        }
    };
}

fn apply_cli_to_opts(cli: &Cli, opts: &mut Opts) -> Result<(), CatfindError> {
    opts.root = cli.root.clone();
    if let Some(ref p) = cli.catalog {
        opts.catalog = p.clone();
    }
    apply_cli_opt!(cli, opts, dirs_only => dirs_only);
    apply_cli_opt!(cli, opts, some resource);
    apply_cli_opt!(cli, opts, some replica);
    apply_cli_opt!(cli, opts, print_ids => print_ids);
    apply_cli_opt!(cli, opts, some statement);
    apply_cli_opt!(cli, opts, some retry);
    apply_cli_opt!(cli, opts, summary => summary);
    apply_cli_opt!(cli, opts, some regex);
    apply_cli_opt!(cli, opts, some substitute);
    apply_cli_opt!(cli, opts, batch_size => page_size);
    apply_cli_opt!(cli, opts, some command);
    opts.debug = cli.debug;
    apply_cli_opt!(cli, opts, force => force);
    apply_cli_opt!(cli, opts, some check_length);
    apply_cli_opt!(cli, opts, tasks => tasks);
    apply_cli_opt!(cli, opts, task_capacity => task_capacity);
    apply_cli_opt!(cli, opts, some progress);
    apply_cli_opt!(cli, opts, quiet => quiet);
    if let Some(sort) = cli.sort {
        opts.sort = SortOrder::try_from(sort).map_err(|e| CatfindError::Config(e.to_string()))?;
    }
    opts.dry_run = cli.dry_run;
    apply_cli_opt!(cli, opts, check_encoding => check_encoding);
    apply_cli_opt!(cli, opts, verbose => verbose);
    apply_cli_opt!(cli, opts, max_path_length => max_path_length);
    apply_cli_opt!(cli, opts, max_command_length => max_command_length);
    Ok(())
}

/// Config file first, then the command line on top.
pub fn setup_opts(cli: &Cli) -> Result<Opts, CatfindError> {
    let mut opts = Opts::default();
    let file = match &cli.config {
        Some(path) => Some(load_catfind_toml_from(path)?),
        None => load_catfind_toml(Path::new(".")),
    };
    if let Some(file) = &file {
        apply_file_to_opts(file, &mut opts)?;
    }
    apply_cli_to_opts(cli, &mut opts)?;
    if opts.catalog.as_os_str().is_empty() {
        opts.catalog = PathBuf::from(PackagePaths::get().catalog_filename());
    }
    Ok(opts)
}

/// Run one traversal as configured by `cli`. The summary, when asked for, is printed on
/// success and on every fatal path after the traversal started.
pub fn handle_run(cli: &Cli) -> Result<()> {
    let opts = setup_opts(cli)?;
    setup_logging(level_for(opts.quiet, opts.debug));
    debug!(
        "{} CONFIG:{:#?}",
        env!("CARGO_PKG_NAME").to_string().to_uppercase(),
        opts
    );
    opts.validate()?;

    let cancel = CancelToken::new();
    cancel.install_handler()?;

    let env_dir = opts
        .catalog
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let (conn, encrypted) = open_catalog_or_detect_encrypted(&opts.catalog, env_dir)
        .map_err(CatfindError::from)
        .with_context(|| format!("open catalog {}", opts.catalog.display()))?;
    if encrypted {
        info!("Catalog {} is encrypted", opts.catalog.display());
    }
    let mut session = SqliteCatalog::new(conn).with_file_filter(opts.file_filter());

    if opts.dry_run {
        warn!("RUNNING IN DRY-RUN MODE. COMMANDS AND STATEMENTS ARE PRINTED, NOT EXECUTED.");
    }
    let outcome = find(&mut session, &opts, Arc::new(ShellExecutor::default()), cancel)?;

    if opts.summary {
        print_summary(&outcome.counters, outcome.elapsed);
    }
    if let Err(e) = outcome.result {
        if !outcome.last_path.is_empty() {
            error!("Last path was '{}'", outcome.last_path);
        }
        if let Some(cmd) = &outcome.last_command {
            error!("Last command was '{}'", cmd);
        }
        return Err(e.into());
    }
    Ok(())
}
