use std::path::PathBuf;

use anyhow::{Context, Result};

use ffl_auction::config::arg_value;
use ffl_auction::dataset;
use ffl_auction::logging;
use ffl_auction::synthetic::SyntheticLeague;

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    logging::init_logging();

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let out = arg_value(&args, "--out")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("data"));
    let mut league = SyntheticLeague::default();
    if let Some(v) = arg_value(&args, "--seed") {
        league.seed = v.parse().with_context(|| format!("--seed {v}"))?;
    }
    if let Some(v) = arg_value(&args, "--teams") {
        league.num_teams = v.parse().with_context(|| format!("--teams {v}"))?;
    }
    if let Some(v) = arg_value(&args, "--first-season") {
        league.first_season = v.parse().with_context(|| format!("--first-season {v}"))?;
    }
    if let Some(v) = arg_value(&args, "--seasons") {
        league.seasons = v.parse().with_context(|| format!("--seasons {v}"))?;
    }

    let tables = league.generate();
    dataset::write_tables(&tables, &out)?;
    println!(
        "synthetic league written: {} ({} picks, {} results, {} transactions)",
        out.display(),
        tables.drafts.len(),
        tables.results.len(),
        tables.transactions.len()
    );
    Ok(())
}
