mod cli;
mod error;

use std::process;

use clap::{CommandFactory, Parser};
use tracing::{Level, error, info, warn};
use tracing_indicatif::IndicatifLayer;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};
use tunedl_engine::{
    ItemOutcome, MetadataProvider, StreamSelector, YtDlpProvider, plan_downloads, run_pipeline,
};

use crate::cli::Args;
use crate::error::{AppError, Result};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let Some(url) = args.url.clone() else {
        if let Err(e) = print_help() {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
        return;
    };

    if let Err(e) = init_logging(args.verbose, args.quiet) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }

    if let Err(e) = run(&args, &url).await {
        error!("{}", e);
        process::exit(1);
    }
}

fn print_help() -> Result<()> {
    Args::command().print_help()?;
    println!();
    Ok(())
}

async fn run(args: &Args, url: &str) -> Result<()> {
    let config = args.pipeline_config()?;
    let provider = YtDlpProvider::new(args.ytdlp_options());

    info!("Resolving {}", url);
    let items = provider.resolve(url).await?;

    let selector = StreamSelector::with_config(config.selection.clone());
    let planned = plan_downloads(&items, &selector);
    if planned.is_empty() {
        warn!("Nothing to download");
    }

    let outcomes = run_pipeline(&config, &planned, None).await?;
    summarize(&outcomes)
}

fn summarize(outcomes: &[ItemOutcome]) -> Result<()> {
    let failed: Vec<&ItemOutcome> = outcomes.iter().filter(|o| !o.is_success()).collect();
    info!(
        "Finished: {} converted, {} failed",
        outcomes.len() - failed.len(),
        failed.len()
    );

    for outcome in &failed {
        if let Err(e) = &outcome.result {
            error!("  {} [{}]: {}", outcome.title, e.stage(), e);
        }
    }

    if failed.is_empty() {
        Ok(())
    } else {
        Err(AppError::ItemsFailed {
            failed: failed.len(),
            total: outcomes.len(),
        })
    }
}

fn init_logging(verbose: bool, quiet: bool) -> Result<()> {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    // Log lines go through the indicatif writer so they do not tear progress bars.
    let indicatif_layer = IndicatifLayer::new();

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_level(verbose)
                .with_writer(indicatif_layer.get_stderr_writer()),
        )
        .with(indicatif_layer)
        .try_init()
        .map_err(|e| AppError::Logging(e.to_string()))
}
