pub mod cli;
pub mod dialect;
pub mod directory;
pub mod encoding;
pub mod import;
pub mod input;
pub mod preflight;
pub mod recode;
pub mod report;
pub mod rows;
pub mod store;

use std::{env, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, debug, info};

use crate::{
    cli::Cli,
    import::Importer,
    input::InputOptions,
    preflight::ColumnCheck,
    report::Reporter,
    store::LocalDirectory,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging(verbose: bool) {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            let level = if verbose {
                LevelFilter::Debug
            } else {
                LevelFilter::Info
            };
            builder.filter_module("csv_directory", level);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

/// Parses the command line and runs the import; `Ok(false)` means some row failed.
pub fn run() -> Result<bool> {
    let cli = Cli::parse();
    execute(&cli)
}

pub fn execute(cli: &Cli) -> Result<bool> {
    init_logging(cli.verbose);
    if cli.no_color || env::var_os("NO_COLOR").is_some() {
        colored::control::set_override(false);
    }

    let options = InputOptions {
        encoding: cli.encoding.clone(),
        delimiter: cli.delimiter,
        sample_bytes: cli.sample_bytes,
    };
    let input = input::load_rows(&cli.file, &options)?;

    let mut directory = LocalDirectory::load(&cli.directory)?;
    let mut importer = Importer::new(&mut directory, &cli.module, cli.action)
        .with_context(|| format!("Loading module '{}'", cli.module))?;
    let check = importer
        .check(&input.rows)
        .with_context(|| format!("Checking columns of {:?}", cli.file))?;
    if check == ColumnCheck::Passed {
        debug!("All columns are known to '{}'", cli.module);
    }

    let mut reporter = Reporter::stdio();
    if cli.dry_run {
        reporter.info(format!(
            "dry run: {} row(s) of '{}' would be {}",
            input.rows.len(),
            cli.module,
            cli.action.past_tense()
        ));
        return Ok(true);
    }

    let summary = importer.run(&input.rows, &mut reporter)?;
    info!(
        "Finished {}: {} processed, {} failed",
        cli.action, summary.processed, summary.errors
    );
    Ok(summary.succeeded())
}
