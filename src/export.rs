use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rust_xlsxwriter::{Workbook, Worksheet};
use serde::Serialize;
use tracing::info;

use crate::config::AnalysisConfig;
use crate::consistency::ConsistencyArchetypeRow;
use crate::keepers::KeeperSummaryRow;
use crate::pipeline::PipelineOutput;
use crate::records::{AnalysisRow, ManagerStrategyProfile};
use crate::reporting::{CareerLeaderboardRow, ChampionComparisonRow, PositionEfficiencyRow};
use crate::tiers::TierSummaryRow;

pub const WORKBOOK_FILE: &str = "analysis_summary.xlsx";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedFile {
    pub name: String,
    pub rows: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ExportReport {
    pub files: Vec<ExportedFile>,
    pub workbook: Option<PathBuf>,
}

impl ExportReport {
    pub fn rows_in(&self, name: &str) -> Option<usize> {
        self.files.iter().find(|f| f.name == name).map(|f| f.rows)
    }

    fn record(&mut self, name: impl Into<String>, rows: usize) {
        self.files.push(ExportedFile {
            name: name.into(),
            rows,
        });
    }
}

/// Write every output table under `dir`, creating it if needed.
pub fn write_outputs(output: &PipelineOutput, dir: &Path, cfg: &AnalysisConfig) -> Result<ExportReport> {
    fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    let mut report = ExportReport::default();

    if cfg.write_season_json {
        for &season in &output.seasons {
            let rows: Vec<&AnalysisRow> = output.rows_for_season(season).collect();
            let name = format!("analysis_ready_{season}.json");
            write_json_atomic(&dir.join(&name), &rows)?;
            report.record(name, rows.len());
        }
    }

    write_csv(&mut report, dir, "analysis_rows.csv", &output.rows)?;
    write_csv(&mut report, dir, "tier_summary.csv", &output.tier_summary)?;
    write_csv(&mut report, dir, "position_efficiency.csv", &output.position_efficiency)?;
    write_csv(&mut report, dir, "keeper_surplus_summary.csv", &output.keeper_summary)?;
    write_csv(&mut report, dir, "missing_players.csv", &output.missing_players)?;
    write_csv(&mut report, dir, "lifecycle_table.csv", &output.lifecycle)?;
    write_csv(&mut report, dir, "trade_impact.csv", &output.trade_impact)?;
    write_csv(&mut report, dir, "waiver_pickups.csv", &output.waiver_pickups)?;
    write_csv(&mut report, dir, "manager_strategy_profiles.csv", &output.strategy_profiles)?;
    write_csv(&mut report, dir, "draft_hit_rates.csv", &output.draft_hit_rates)?;
    write_csv(&mut report, dir, "manager_season_value.csv", &output.manager_values)?;
    write_csv(&mut report, dir, "champion_comparison.csv", &output.champions.comparison)?;
    write_csv(&mut report, dir, "champion_blueprint.csv", &output.champion_blueprint)?;
    write_csv(&mut report, dir, "career_leaderboard.csv", &output.career_leaderboard)?;
    write_csv(&mut report, dir, "schedule_luck.csv", &output.schedule)?;
    write_csv(&mut report, dir, "luck_profiles.csv", &output.luck_profiles)?;
    write_csv(&mut report, dir, "consistency.csv", &output.outcome_distributions)?;
    write_csv(&mut report, dir, "consistency_scores.csv", &output.consistency_scores)?;
    write_csv(&mut report, dir, "consistency_archetypes.csv", &output.consistency_archetypes)?;
    write_csv(&mut report, dir, "diagnostics.csv", &output.diagnostics)?;

    if cfg.write_workbook {
        let path = dir.join(WORKBOOK_FILE);
        write_workbook(output, &path)?;
        report.workbook = Some(path);
    }

    info!(
        dir = %dir.display(),
        files = report.files.len(),
        workbook = report.workbook.is_some(),
        "outputs written"
    );
    Ok(report)
}

/// One line per row, header from the first row's field names.
fn write_csv<T: Serialize>(report: &mut ExportReport, dir: &Path, name: &str, rows: &[T]) -> Result<()> {
    let path = dir.join(name);
    let mut writer =
        csv::Writer::from_path(&path).with_context(|| format!("create {}", path.display()))?;
    for row in rows {
        writer
            .serialize(row)
            .with_context(|| format!("write row to {}", path.display()))?;
    }
    writer.flush().with_context(|| format!("flush {}", path.display()))?;
    report.record(name, rows.len());
    Ok(())
}

fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("serialize json output")?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).with_context(|| format!("write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("rename into {}", path.display()))?;
    Ok(())
}

pub fn write_workbook(output: &PipelineOutput, path: &Path) -> Result<()> {
    let mut summary_rows = vec![vec!["Metric".to_string(), "Value".to_string()]];
    summary_rows.push(vec!["Baseline season".into(), output.baseline_season.to_string()]);
    summary_rows.push(vec![
        "Seasons".into(),
        output
            .seasons
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(", "),
    ]);
    summary_rows.push(vec!["Drafted player-seasons".into(), output.rows.len().to_string()]);
    summary_rows.push(vec!["Missing results".into(), output.missing_players.len().to_string()]);
    summary_rows.push(vec!["Diagnostics".into(), output.diagnostics.len().to_string()]);
    summary_rows.push(vec![
        "Champion differentiators".into(),
        output.champions.top_differentiators.join(", "),
    ]);

    let mut tier_rows = vec![header(&[
        "Season", "Position", "Tier", "Players", "Evaluated", "Hit Rate", "Bust Rate", "Avg VAR",
        "Median VAR", "Avg Price", "Avg Points",
    ])];
    tier_rows.extend(output.tier_summary.iter().map(tier_row));

    let mut efficiency_rows = vec![header(&[
        "Position", "Tier", "Players", "Avg VAR/$", "Median VAR/$", "Avg $/VAR", "Median $/VAR",
        "Avg Price", "Avg VAR",
    ])];
    efficiency_rows.extend(output.position_efficiency.iter().map(efficiency_row));

    let mut keeper_rows = vec![header(&[
        "Position", "Keepers", "Mean Surplus", "Median Surplus", "Std Surplus", "Positive Rate",
        "Mean VAR", "Mean Keeper Cost", "Mean Market Price", "Surplus/VAR r",
    ])];
    keeper_rows.extend(output.keeper_summary.iter().map(keeper_row));

    let mut strategy_rows = vec![header(&[
        "Season", "Manager", "Draft VAR", "Keeper VAR", "Waiver VAR", "Trade VAR", "Total VAR",
        "FAAB Spent", "FAAB Efficiency", "Players", "Archetype",
    ])];
    strategy_rows.extend(output.strategy_profiles.iter().map(strategy_row));

    let mut champion_rows = vec![header(&[
        "Metric", "Champion Mean", "Field Mean", "Difference", "% Difference", "Cohen's d",
    ])];
    champion_rows.extend(output.champions.comparison.iter().map(champion_row));

    let mut career_rows = vec![header(&[
        "Manager", "Seasons", "First", "Last", "Wins", "Titles", "Total VAR", "Avg VAR",
        "Avg VAR/$", "Best Season",
    ])];
    career_rows.extend(output.career_leaderboard.iter().map(career_row));

    let mut consistency_rows = vec![header(&[
        "Manager", "Seasons", "Archetype", "Median Wins", "Std Wins", "Titles", "Title Rate",
    ])];
    consistency_rows.extend(output.consistency_archetypes.iter().map(consistency_row));

    let mut workbook = Workbook::new();
    for (name, rows) in [
        ("Summary", &summary_rows),
        ("TierSummary", &tier_rows),
        ("PositionEfficiency", &efficiency_rows),
        ("KeeperSurplus", &keeper_rows),
        ("Strategy", &strategy_rows),
        ("Champions", &champion_rows),
        ("Career", &career_rows),
        ("Consistency", &consistency_rows),
    ] {
        let sheet = workbook.add_worksheet();
        sheet.set_name(name)?;
        write_rows(sheet, rows)?;
    }

    workbook
        .save(path)
        .with_context(|| format!("failed writing workbook to {}", path.display()))?;
    Ok(())
}

fn header(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

fn opt<T: ToString>(v: Option<T>) -> String {
    v.map(|v| v.to_string()).unwrap_or_default()
}

fn tier_row(r: &TierSummaryRow) -> Vec<String> {
    vec![
        r.season.map(|s| s.to_string()).unwrap_or_else(|| "all".to_string()),
        r.position.to_string(),
        r.expected_tier.to_string(),
        r.players.to_string(),
        r.evaluated.to_string(),
        r.hit_rate.to_string(),
        r.bust_rate.to_string(),
        r.avg_var.to_string(),
        r.median_var.to_string(),
        r.avg_normalized_price.to_string(),
        r.avg_points.to_string(),
    ]
}

fn efficiency_row(r: &PositionEfficiencyRow) -> Vec<String> {
    vec![
        r.position.to_string(),
        r.expected_tier.to_string(),
        r.players.to_string(),
        r.avg_var_per_dollar.to_string(),
        r.median_var_per_dollar.to_string(),
        r.avg_dollar_per_var.to_string(),
        r.median_dollar_per_var.to_string(),
        r.avg_price.to_string(),
        r.avg_var.to_string(),
    ]
}

fn keeper_row(r: &KeeperSummaryRow) -> Vec<String> {
    vec![
        r.position.map(|p| p.to_string()).unwrap_or_else(|| "ALL".to_string()),
        r.keepers.to_string(),
        r.mean_surplus.to_string(),
        r.median_surplus.to_string(),
        r.std_surplus.to_string(),
        r.positive_surplus_rate.to_string(),
        r.mean_var.to_string(),
        r.mean_keeper_cost.to_string(),
        r.mean_market_price.to_string(),
        r.surplus_var_correlation.to_string(),
    ]
}

fn strategy_row(p: &ManagerStrategyProfile) -> Vec<String> {
    vec![
        p.season.to_string(),
        p.manager.clone(),
        format!("{:.2}", p.draft_var),
        format!("{:.2}", p.keeper_var),
        format!("{:.2}", p.waiver_var),
        format!("{:.2}", p.trade_var),
        format!("{:.2}", p.total_var),
        format!("{:.2}", p.faab_spent),
        p.faab_efficiency.to_string(),
        p.unique_players.to_string(),
        p.archetype.label().to_string(),
    ]
}

fn champion_row(r: &ChampionComparisonRow) -> Vec<String> {
    vec![
        r.metric.clone(),
        format!("{:.4}", r.champion_mean),
        format!("{:.4}", r.field_mean),
        format!("{:.4}", r.difference),
        r.pct_difference.to_string(),
        r.cohens_d.to_string(),
    ]
}

fn career_row(r: &CareerLeaderboardRow) -> Vec<String> {
    vec![
        r.manager.clone(),
        r.seasons.to_string(),
        r.first_season.to_string(),
        r.last_season.to_string(),
        r.total_wins.to_string(),
        r.championships.to_string(),
        format!("{:.2}", r.total_var),
        r.avg_var_per_season.to_string(),
        r.avg_var_per_dollar.to_string(),
        opt(r.best_season),
    ]
}

fn consistency_row(r: &ConsistencyArchetypeRow) -> Vec<String> {
    vec![
        r.manager.clone(),
        r.seasons_played.to_string(),
        r.archetype.label().to_string(),
        r.median_wins.to_string(),
        r.std_wins.to_string(),
        r.championships.to_string(),
        r.championship_rate.to_string(),
    ]
}

fn write_rows(worksheet: &mut Worksheet, rows: &[Vec<String>]) -> Result<()> {
    for (row_idx, row) in rows.iter().enumerate() {
        for (col_idx, value) in row.iter().enumerate() {
            worksheet
                .write_string(row_idx as u32, col_idx as u16, value)
                .with_context(|| format!("write cell ({row_idx},{col_idx})"))?;
        }
    }
    Ok(())
}
