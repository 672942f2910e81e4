use anyhow::{Context, Result, bail};

use ffl_auction::config::{AnalysisConfig, arg_value};
use ffl_auction::dataset::{FlatFileSource, LeagueSource};
use ffl_auction::diagnostics::Diagnostics;
use ffl_auction::logging;
use ffl_auction::pipeline;
use ffl_auction::records::Season;

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    logging::init_logging();

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let cfg = AnalysisConfig::resolve(&args)?;
    let mut diags = Diagnostics::new();
    let tables = FlatFileSource::new(&cfg.data_dir)
        .load(cfg.season_filter(), &mut diags)
        .with_context(|| format!("load league tables from {}", cfg.data_dir.display()))?;
    let output = pipeline::run_pipeline(&tables, &cfg.pipeline_options(), diags)?;

    let season: Season = match arg_value(&args, "--season") {
        Some(v) => v.parse().with_context(|| format!("--season {v}"))?,
        None => output.seasons.last().copied().context("no seasons analysed")?,
    };
    if !output.seasons.contains(&season) {
        bail!("season {season} has no draft data");
    }

    println!("== {season} (prices in {} dollars) ==", output.baseline_season);
    if let Some(factor) = output.factors.get(&season) {
        println!(
            "budget per open spot: {}  price factor: {}",
            fmt_opt(factor.effective_budget_per_spot),
            fmt_opt(factor.price_factor)
        );
    }

    println!();
    println!("{:<4} {:>4} {:>7} {:>9} {:>9} {:>9}", "pos", "tier", "players", "hit", "bust", "avg VAR");
    for row in output.tier_summary.iter().filter(|r| r.season == Some(season)) {
        println!(
            "{:<4} {:>4} {:>7} {:>9} {:>9} {:>9}",
            row.position.label(),
            row.expected_tier,
            row.players,
            row.hit_rate.to_string(),
            row.bust_rate.to_string(),
            row.avg_var.to_string()
        );
    }

    println!();
    println!("{:<16} {:>9} {:>7} {:>7} {:>7} {:>7}  archetype", "manager", "VAR", "draft%", "keep%", "wire%", "trade%");
    for p in output.profiles_for_season(season) {
        println!(
            "{:<16} {:>9.1} {:>7.1} {:>7.1} {:>7.1} {:>7.1}  {}",
            p.manager,
            p.total_var,
            p.pct_var_from_draft,
            p.pct_var_from_keeper,
            p.pct_var_from_waiver,
            p.pct_var_from_trade,
            p.archetype.label()
        );
    }

    let best: Vec<_> = {
        let mut rows: Vec<_> = output
            .rows_for_season(season)
            .filter(|r| r.var_per_dollar.is_some())
            .collect();
        rows.sort_by(|a, b| {
            b.var_per_dollar
                .unwrap_or(f64::MIN)
                .total_cmp(&a.var_per_dollar.unwrap_or(f64::MIN))
        });
        rows.into_iter().take(5).collect()
    };
    println!();
    println!("best value picks:");
    for r in best {
        println!(
            "  {:<24} {:<3} ${:<5} VAR {:>7.1}  VAR/$ {:.2}",
            r.player_name,
            r.position.label(),
            r.cost,
            r.var.unwrap_or_default(),
            r.var_per_dollar.unwrap_or_default()
        );
    }
    Ok(())
}

fn fmt_opt(v: Option<f64>) -> String {
    v.map(|v| format!("{v:.3}")).unwrap_or_else(|| "n/a".to_string())
}
