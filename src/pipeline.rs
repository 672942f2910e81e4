use std::collections::BTreeMap;

use anyhow::{Context, Result};
use rayon::prelude::*;
use tracing::{debug, info};

use crate::consistency::{
    self, ConsistencyArchetypeRow, ConsistencyScore, OutcomeDistribution,
};
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::error::SchemaError;
use crate::keepers::{self, KeeperSummaryRow};
use crate::lifecycle::{self, TradeImpactRow, WaiverPickupRow};
use crate::normalize::{self, SeasonFactor};
use crate::records::{
    AnalysisRow, DraftPick, LeagueSettings, LeagueTables, LifecycleRecord, ManagerStrategyProfile,
    Season,
};
use crate::reporting::{
    self, CareerLeaderboardRow, ChampionBlueprintRow, ChampionReport, DraftHitRateRow,
    ManagerSeasonValue, MissingPlayerRow, PositionEfficiencyRow,
};
use crate::schedule_luck::{self, ExpectedWins, LuckProfile, ManagerSchedule};
use crate::strategy;
use crate::tiers::{self, TierSummaryRow};
use crate::var::{self, SeasonBaselines, VarTable};

#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    /// Season whose dollars every price is expressed in. Defaults to the latest drafted season.
    pub baseline_season: Option<Season>,
    /// Worker threads for the per-season stages; `None` lets rayon decide.
    pub threads: Option<usize>,
}

/// Every table the analysis produces, sorted by season where one applies.
#[derive(Debug, Clone, Default)]
pub struct PipelineOutput {
    pub baseline_season: Season,
    pub seasons: Vec<Season>,
    pub settings: BTreeMap<Season, LeagueSettings>,
    pub factors: BTreeMap<Season, SeasonFactor>,
    pub baselines: BTreeMap<Season, SeasonBaselines>,
    pub rows: Vec<AnalysisRow>,
    pub tier_summary: Vec<TierSummaryRow>,
    pub position_efficiency: Vec<PositionEfficiencyRow>,
    pub keeper_summary: Vec<KeeperSummaryRow>,
    pub missing_players: Vec<MissingPlayerRow>,
    pub lifecycle: Vec<LifecycleRecord>,
    pub trade_impact: Vec<TradeImpactRow>,
    pub waiver_pickups: Vec<WaiverPickupRow>,
    pub strategy_profiles: Vec<ManagerStrategyProfile>,
    pub draft_hit_rates: Vec<DraftHitRateRow>,
    pub manager_values: Vec<ManagerSeasonValue>,
    pub champions: ChampionReport,
    pub champion_blueprint: Vec<ChampionBlueprintRow>,
    pub career_leaderboard: Vec<CareerLeaderboardRow>,
    pub expected_wins: Vec<ExpectedWins>,
    pub schedule: Vec<ManagerSchedule>,
    pub luck_profiles: Vec<LuckProfile>,
    pub outcome_distributions: Vec<OutcomeDistribution>,
    pub consistency_scores: Vec<ConsistencyScore>,
    pub consistency_archetypes: Vec<ConsistencyArchetypeRow>,
    pub diagnostics: Vec<Diagnostic>,
}

impl PipelineOutput {
    pub fn rows_for_season(&self, season: Season) -> impl Iterator<Item = &AnalysisRow> {
        self.rows.iter().filter(move |r| r.season == season)
    }

    pub fn profiles_for_season(&self, season: Season) -> impl Iterator<Item = &ManagerStrategyProfile> {
        self.strategy_profiles.iter().filter(move |p| p.season == season)
    }
}

struct SeasonOutput {
    season: Season,
    baselines: SeasonBaselines,
    rows: Vec<AnalysisRow>,
    diags: Diagnostics,
}

/// Run every stage over the given tables.
///
/// `diags` carries whatever the loader already reported; the output's
/// diagnostics table includes those plus everything found here.
pub fn run_pipeline(
    tables: &LeagueTables,
    options: &PipelineOptions,
    mut diags: Diagnostics,
) -> Result<PipelineOutput> {
    if tables.drafts.is_empty() {
        return Err(SchemaError::EmptyTable("drafts".to_string()).into());
    }
    let seasons = tables.seasons();
    let baseline_season = match options.baseline_season {
        Some(s) => s,
        None => *seasons.last().context("no drafted seasons")?,
    };
    info!(
        seasons = seasons.len(),
        baseline_season,
        picks = tables.drafts.len(),
        results = tables.results.len(),
        "running analysis"
    );

    let settings = normalize::resolve_settings(&seasons, &tables.settings, &mut diags);
    let prices = normalize::normalize_prices(&tables.drafts, &settings, baseline_season, &mut diags)?;

    // map: every season is independent until the cross-season reports
    let mut picks_by_season: BTreeMap<Season, (Vec<DraftPick>, Vec<Option<f64>>)> = BTreeMap::new();
    for (pick, price) in tables.drafts.iter().zip(&prices.per_pick) {
        let entry = picks_by_season.entry(pick.season).or_default();
        entry.0.push(pick.clone());
        entry.1.push(*price);
    }
    let pool = build_pool(options.threads)?;
    let work: Vec<(Season, &(Vec<DraftPick>, Vec<Option<f64>>))> =
        picks_by_season.iter().map(|(s, v)| (*s, v)).collect();
    let mut per_season: Vec<SeasonOutput> = pool.install(|| {
        work.par_iter()
            .map(|(season, (picks, normalized))| {
                run_season(*season, picks, normalized, tables, &settings)
            })
            .collect()
    });
    per_season.sort_by_key(|s| s.season);

    // reduce
    let mut baselines = BTreeMap::new();
    let mut rows = Vec::with_capacity(tables.drafts.len());
    for season in per_season {
        baselines.insert(season.season, season.baselines);
        rows.extend(season.rows);
        diags.extend(season.diags);
    }
    keepers::apply_keeper_surplus(&mut rows);

    let managers = tables.team_managers();
    let mut values = VarTable::from_results(&tables.results, &baselines);
    values.overlay_rows(&rows);
    let events = lifecycle::acquisition_events(&tables.drafts, &tables.transactions, &settings);
    let kept = lifecycle::keeper_set(&tables.drafts);
    let lifecycle_records = lifecycle::build_lifecycle(&events, &values, &kept);
    let trade_impact = lifecycle::trade_impact(&tables.transactions, &values, &settings, &managers);
    let waiver_pickups = lifecycle::waiver_pickups(&lifecycle_records, &managers);
    let strategy_profiles = strategy::build_strategy_profiles(&lifecycle_records, &managers);
    debug!(
        events = events.len(),
        lifecycle = lifecycle_records.len(),
        trades = trade_impact.len(),
        "lifecycle built"
    );

    let tier_summary = tiers::tier_hit_rates(&rows);
    let position_efficiency = reporting::position_efficiency(&rows);
    let keeper_summary = keepers::keeper_summary(&rows, &mut diags);
    let missing_players = reporting::missing_players(&tables.drafts, &tables.results);
    let draft_hit_rates = reporting::draft_hit_rates(&rows, &managers);
    let manager_values =
        reporting::manager_season_value(&rows, &strategy_profiles, &tables.teams, &managers);
    let champions = reporting::champion_comparison(&manager_values, &mut diags);
    let champion_blueprint = reporting::champion_blueprint(&champions.champions, &draft_hit_rates);
    let career_leaderboard = reporting::career_leaderboard(&manager_values);

    let weeks = schedule_luck::team_weeks(&tables.matchups, &managers);
    let expected_wins = schedule_luck::expected_wins(&weeks, &tables.teams, &tables.matchups);
    let mut schedule = schedule_luck::manager_schedule(&weeks, &tables.teams);
    schedule_luck::attach_expected_wins(&mut schedule, &expected_wins);
    let luck_profiles = schedule_luck::luck_profiles(&schedule);

    let outcome_distributions = consistency::outcome_distributions(&manager_values, &mut diags);
    let consistency_scores = consistency::consistency_scores(&outcome_distributions);
    let consistency_archetypes = consistency::consistency_archetypes(&outcome_distributions);

    info!(
        rows = rows.len(),
        lifecycle = lifecycle_records.len(),
        profiles = strategy_profiles.len(),
        diagnostics = diags.len(),
        "analysis complete"
    );

    Ok(PipelineOutput {
        baseline_season,
        seasons,
        settings,
        factors: prices.factors,
        baselines,
        rows,
        tier_summary,
        position_efficiency,
        keeper_summary,
        missing_players,
        lifecycle: lifecycle_records,
        trade_impact,
        waiver_pickups,
        strategy_profiles,
        draft_hit_rates,
        manager_values,
        champions,
        champion_blueprint,
        career_leaderboard,
        expected_wins,
        schedule,
        luck_profiles,
        outcome_distributions,
        consistency_scores,
        consistency_archetypes,
        diagnostics: diags.into_sorted(),
    })
}

fn run_season(
    season: Season,
    picks: &[DraftPick],
    normalized: &[Option<f64>],
    tables: &LeagueTables,
    settings: &BTreeMap<Season, LeagueSettings>,
) -> SeasonOutput {
    let mut diags = Diagnostics::new();
    let season_settings = settings
        .get(&season)
        .cloned()
        .unwrap_or_else(|| LeagueSettings::defaults(season));
    let baselines =
        var::replacement_baselines(season, &tables.results, &season_settings, &mut diags);
    let mut by_season = BTreeMap::from([(season, baselines)]);
    let mut rows = var::build_analysis_rows(picks, normalized, &tables.results, &by_season, &mut diags);
    tiers::assign_tiers(&mut rows, settings);
    debug!(season, rows = rows.len(), "season stages done");
    let baselines = by_season.remove(&season).unwrap_or_default();
    SeasonOutput {
        season,
        baselines,
        rows,
        diags,
    }
}

fn build_pool(threads: Option<usize>) -> Result<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads.unwrap_or(0))
        .build()
        .context("build season worker pool")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{PlayerSeasonResult, Position};

    fn pick(season: Season, id: &str, pos: Position, cost: f64) -> DraftPick {
        DraftPick {
            season,
            round: 1,
            pick_number: 1,
            team_id: "t1".into(),
            player_id: id.into(),
            player_name: id.into(),
            position: pos,
            cost,
            is_keeper: false,
            keeper_cost: None,
        }
    }

    fn result(season: Season, id: &str, pos: Position, pts: f64) -> PlayerSeasonResult {
        PlayerSeasonResult {
            season,
            player_id: id.into(),
            player_name: id.into(),
            position: pos,
            fantasy_points_total: Some(pts),
            games_played: Some(17),
        }
    }

    #[test]
    fn empty_drafts_is_fatal() {
        let err = run_pipeline(&LeagueTables::default(), &PipelineOptions::default(), Diagnostics::new())
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<SchemaError>(),
            Some(&SchemaError::EmptyTable("drafts".into()))
        );
    }

    #[test]
    fn baseline_defaults_to_latest_season() {
        let tables = LeagueTables {
            drafts: vec![pick(2020, "a", Position::QB, 30.0), pick(2021, "b", Position::QB, 30.0)],
            results: vec![result(2020, "a", Position::QB, 300.0), result(2021, "b", Position::QB, 250.0)],
            ..Default::default()
        };
        let out = run_pipeline(&tables, &PipelineOptions::default(), Diagnostics::new()).unwrap();
        assert_eq!(out.baseline_season, 2021);
        assert_eq!(out.seasons, vec![2020, 2021]);
        assert_eq!(out.rows.len(), 2);
        assert_eq!(out.rows[0].season, 2020);
        assert_eq!(out.baselines.len(), 2);
    }
}
