use crate::cli::ExtractArgs;
use crate::config::build_config;
use crate::error::Result;
use crate::utils::progress::CliProgressHandler;
use tasse::engine::{progress::ProgressReporter, workers::CancelToken};
use tasse::workflows;
use tracing::{info, warn};

pub fn run(args: ExtractArgs, threads: Option<usize>) -> Result<()> {
    info!("Merging configuration from file and CLI arguments...");
    let config = build_config(&args, threads)?;

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!("Starting solvent extraction...");
    info!("Invoking the core extraction workflow...");
    let cancel = CancelToken::new();
    let summary = workflows::extract::run(&config, &reporter, &cancel)?;

    if summary.cancelled {
        warn!("Extraction was cancelled.");
        println!("Warning: extraction was cancelled, no output written.");
        return Ok(());
    }

    let Some(selection) = &summary.selection else {
        warn!("Trajectory contained no snapshots.");
        println!("Warning: TASSE finished but the trajectory contained no snapshots.");
        return Ok(());
    };

    println!(
        "Processed {} snapshot(s) in {:.1}s.",
        summary.processed,
        summary.elapsed.as_secs_f64()
    );
    println!(
        "✓ {} solvent placement(s) kept ({} culled, occurrence >= {} snapshots) written to: {}",
        selection.retained_count(),
        selection.culled,
        selection.snapshot_cutoff,
        config.output_path.display()
    );
    if let (Some(report), Some(path)) = (&summary.report, &config.report_path) {
        println!(
            "  {} pair(s) and {} triplet(s) written to: {}",
            report.pairs.len(),
            report.triplets.len(),
            path.display()
        );
    }
    Ok(())
}
