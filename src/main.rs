use anyhow::{Context, Result};
use tracing::info;

use ffl_auction::config::AnalysisConfig;
use ffl_auction::dataset::{FlatFileSource, LeagueSource};
use ffl_auction::diagnostics::{DiagnosticKind, Diagnostics};
use ffl_auction::export;
use ffl_auction::logging;
use ffl_auction::pipeline;

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    logging::init_logging();

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let cfg = AnalysisConfig::resolve(&args)?;
    info!(data_dir = %cfg.data_dir.display(), out = %cfg.output_dir.display(), "starting");

    let mut diags = Diagnostics::new();
    let source = FlatFileSource::new(&cfg.data_dir);
    let tables = source
        .load(cfg.season_filter(), &mut diags)
        .with_context(|| format!("load league tables from {}", cfg.data_dir.display()))?;

    let output = pipeline::run_pipeline(&tables, &cfg.pipeline_options(), diags)?;
    let report = export::write_outputs(&output, &cfg.output_dir, &cfg)?;

    let missing = output
        .diagnostics
        .iter()
        .filter(|d| d.kind == DiagnosticKind::MissingResult)
        .count();
    println!(
        "seasons {}..={} (prices in {} dollars)",
        output.seasons.first().copied().unwrap_or_default(),
        output.seasons.last().copied().unwrap_or_default(),
        output.baseline_season
    );
    println!(
        "analysis rows: {}  lifecycle: {}  profiles: {}",
        output.rows.len(),
        output.lifecycle.len(),
        output.strategy_profiles.len()
    );
    println!(
        "diagnostics: {} ({} drafted players without results)",
        output.diagnostics.len(),
        missing
    );
    if !output.champions.top_differentiators.is_empty() {
        println!(
            "champion differentiators: {}",
            output.champions.top_differentiators.join(", ")
        );
    }
    println!(
        "wrote {} files to {}",
        report.files.len() + usize::from(report.workbook.is_some()),
        cfg.output_dir.display()
    );
    Ok(())
}
