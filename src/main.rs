//! catfind CLI: walk a catalog and list or act on every entry.

use catfind::CatfindError;
use catfind::engine::arg_parser::Cli;
use catfind::engine::handle_run;
use clap::Parser;
use colored::Colorize;
use std::process::ExitCode;
use std::time::Instant;

fn main() -> ExitCode {
    let start_time = Instant::now();
    let cli = Cli::parse();
    let result = handle_run(&cli);
    log::debug!("Total time: {:?}", start_time.elapsed());
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let code = e
                .downcast_ref::<CatfindError>()
                .map_or(1, CatfindError::exit_code);
            eprintln!(
                "[{} {}] {:#}",
                env!("CARGO_PKG_NAME").cyan(),
                "ERROR".red(),
                e
            );
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}
