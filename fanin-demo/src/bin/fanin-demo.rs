// Demo for the counted callback barrier.
// - starts --jobs jobs on a thread pool of --threads workers
// - every --fail-every-th job reports an error, the others report a value
// - one completion callback receives the collated error and every report
// - --extra-calls reports are sent after completion to show the overflow policy
use anyhow::{Context, Result};
use clap::Parser;
use fanin_demo::common::{cli, jobs, utils};
use log::{info, warn};
use std::path::Path;

fn main() -> Result<()> {
    utils::init_logging("info");
    let args = cli::DemoCli::parse();
    let report = jobs::run(&args)?;

    match &report.collated_error {
        Some(msg) => warn!(
            "{} of {} jobs failed:\n{}",
            report.error_count,
            report.records.len(),
            msg
        ),
        None => info!("All {} jobs succeeded", report.records.len()),
    }
    for outcome in &report.extra_calls {
        info!("Extra call after completion: {}", outcome);
    }

    let output_json = serde_json::to_string_pretty(&report)?;
    if args.output.is_empty() {
        println!("{}", output_json);
        return Ok(());
    }
    info!("Dumping report to {}", args.output);
    if let Some(parent) = Path::new(&args.output).parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(&args.output, output_json)
        .with_context(|| format!("Failed to write {}", args.output))?;
    Ok(())
}
