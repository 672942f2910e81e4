use std::fs;
use std::path::PathBuf;

use ffl_auction::config::AnalysisConfig;
use ffl_auction::dataset::{FlatFileSource, LeagueSource, SeasonFilter};
use ffl_auction::diagnostics::{DiagnosticKind, Diagnostics};
use ffl_auction::export;
use ffl_auction::lifecycle::TradeOutcome;
use ffl_auction::pipeline::{PipelineOptions, PipelineOutput, run_pipeline};
use ffl_auction::records::{AcquisitionType, LeagueTables, Position};
use ffl_auction::reporting::HitRateScope;
use ffl_auction::stats::Stat;

fn fixture_dir() -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push("league");
    path
}

fn load_fixture() -> (LeagueTables, Diagnostics) {
    let mut diags = Diagnostics::new();
    let tables = FlatFileSource::new(fixture_dir())
        .load(SeasonFilter::all(), &mut diags)
        .expect("fixture league should load");
    (tables, diags)
}

fn run_fixture(threads: Option<usize>) -> PipelineOutput {
    let (tables, diags) = load_fixture();
    let options = PipelineOptions {
        baseline_season: Some(2022),
        threads,
    };
    run_pipeline(&tables, &options, diags).expect("pipeline should run")
}

#[test]
fn fixture_loads_every_table() {
    let (tables, diags) = load_fixture();
    assert_eq!(tables.drafts.len(), 32);
    assert_eq!(tables.results.len(), 34);
    assert_eq!(tables.settings.len(), 2);
    assert_eq!(tables.transactions.len(), 5);
    assert_eq!(tables.teams.len(), 8);
    assert_eq!(tables.matchups.len(), 4);
    assert!(diags.is_empty(), "{:?}", diags.iter().collect::<Vec<_>>());
    let keepers = tables.drafts.iter().filter(|p| p.is_keeper).count();
    assert_eq!(keepers, 4);
}

#[test]
fn prices_are_expressed_in_baseline_dollars() {
    let out = run_fixture(None);
    let f2021 = &out.factors[&2021];
    let f2022 = &out.factors[&2022];
    assert!((f2021.effective_budget_per_spot.unwrap() - 400.0 / 12.0).abs() < 1e-9);
    assert_eq!(f2022.effective_budget_per_spot, Some(30.0));
    assert_eq!(f2022.keeper_spend, 40.0);

    let q1_2021 = out
        .rows_for_season(2021)
        .find(|r| r.player_id == "q1")
        .unwrap();
    assert!((q1_2021.normalized_price.unwrap() - 27.0).abs() < 1e-9);
    let q1_2022 = out
        .rows_for_season(2022)
        .find(|r| r.player_id == "q1")
        .unwrap();
    assert_eq!(q1_2022.normalized_price, Some(28.0));
}

#[test]
fn var_uses_each_seasons_replacement_level() {
    let out = run_fixture(None);
    let rb_2021 = out.baselines[&2021][&Position::RB].as_ref().unwrap();
    assert_eq!(rb_2021.points, 150.0);
    assert_eq!(rb_2021.rank_used, 4);
    let rb_2022 = out.baselines[&2022][&Position::RB].as_ref().unwrap();
    assert_eq!(rb_2022.points, 180.0);
    // no kicker slots in this league
    assert!(out.baselines[&2021][&Position::K].is_none());

    let r1 = out.rows_for_season(2021).find(|r| r.player_id == "r1").unwrap();
    assert_eq!(r1.var, Some(100.0));
    assert_eq!(r1.expected_tier, Some(1));
    let r5 = out.rows_for_season(2021).find(|r| r.player_id == "r5").unwrap();
    assert_eq!(r5.var, Some(-30.0));
    assert_eq!(r5.expected_tier, Some(2));
    assert_eq!(r5.actual_finish_tier, Some(2));
    assert_eq!(r5.dollar_per_var, None);
}

#[test]
fn missing_result_stays_null_and_is_reported() {
    let out = run_fixture(None);
    let x1 = out.rows.iter().find(|r| r.player_id == "x1").unwrap();
    assert_eq!(x1.fantasy_points_total, None);
    assert_eq!(x1.var, None);
    assert_eq!(x1.var_per_dollar, None);
    assert_eq!(out.missing_players.len(), 1);
    assert_eq!(out.missing_players[0].player_id, "x1");
    let missing_diags = out
        .diagnostics
        .iter()
        .filter(|d| d.kind == DiagnosticKind::MissingResult)
        .count();
    assert_eq!(missing_diags, 1);
}

#[test]
fn tier_summary_rates_are_fractions() {
    let out = run_fixture(None);
    for row in &out.tier_summary {
        for rate in [row.hit_rate, row.bust_rate] {
            if let Some(v) = rate.value() {
                assert!((0.0..=1.0).contains(&v), "{row:?}");
            }
        }
    }
    let rb_t1 = out
        .tier_summary
        .iter()
        .find(|r| r.season == Some(2021) && r.position == Position::RB && r.expected_tier == 1)
        .unwrap();
    assert_eq!(rb_t1.players, 4);
    assert_eq!(rb_t1.hit_rate, Stat::Value(1.0));
    assert_eq!(rb_t1.bust_rate, Stat::Value(0.0));
}

#[test]
fn keepers_get_surplus_against_market_price() {
    let out = run_fixture(None);
    let r1 = out.rows_for_season(2022).find(|r| r.player_id == "r1").unwrap();
    assert!(r1.is_keeper);
    assert_eq!(r1.market_price_estimate, Some(45.0));
    assert_eq!(r1.keeper_surplus, Some(30.0));
    let q1 = out.rows_for_season(2022).find(|r| r.player_id == "q1").unwrap();
    assert_eq!(q1.keeper_surplus, None);

    let all = out.keeper_summary.iter().find(|k| k.position.is_none()).unwrap();
    assert_eq!(all.keepers, 4);
    assert_eq!(all.mean_surplus, Stat::Value(22.5));
    let r = all.surplus_var_correlation.value().unwrap();
    assert!(r > 0.9 && r <= 1.0, "{r}");
}

#[test]
fn lifecycle_follows_first_acquisition() {
    let out = run_fixture(None);
    let find = |season: i32, id: &str| {
        out.lifecycle
            .iter()
            .find(|l| l.season == season && l.player_id == id)
            .unwrap()
    };

    let w5 = find(2022, "w5");
    assert_eq!(w5.acquisition_type, AcquisitionType::Waiver);
    assert_eq!(w5.acquisition_week, 3);
    assert_eq!(w5.acquisition_cost, 7.0);
    assert_eq!(w5.team_id, "t1");
    assert_eq!(w5.var_total, Some(-30.0));

    let r6 = find(2021, "r6");
    assert_eq!(r6.acquisition_type, AcquisitionType::FreeAgent);
    assert_eq!(r6.acquisition_week, 2);

    let r2 = find(2022, "r2");
    assert_eq!(r2.acquisition_type, AcquisitionType::Draft);
    assert_eq!(r2.team_id, "t2");
    assert_eq!(r2.teams_played_for, 2);

    assert!(find(2021, "r1").became_keeper);
    assert!(!find(2021, "q1").became_keeper);
    assert_eq!(find(2022, "w2").acquisition_type, AcquisitionType::Keeper);
}

#[test]
fn waiver_pickups_report_cost_efficiency() {
    let out = run_fixture(None);
    assert_eq!(out.waiver_pickups.len(), 2);
    let w5 = out.waiver_pickups.iter().find(|p| p.player_id == "w5").unwrap();
    assert_eq!(w5.manager, "Avery");
    assert_eq!(w5.acquisition_cost, 7.0);
    assert_eq!(w5.var_after_pickup, Some(-30.0));
    assert_eq!(w5.cost_efficiency, Stat::Value(-30.0 / 7.0));
    let r6 = out.waiver_pickups.iter().find(|p| p.player_id == "r6").unwrap();
    assert_eq!(r6.acquisition_type, AcquisitionType::FreeAgent);
    assert_eq!(r6.cost_efficiency, Stat::NotApplicable);
}

#[test]
fn trade_impact_compares_both_sides() {
    let out = run_fixture(None);
    assert_eq!(out.trade_impact.len(), 1);
    let t = &out.trade_impact[0];
    assert_eq!(t.trade_week, 6);
    assert_eq!(t.team_a, "t3");
    assert_eq!(t.manager_b, "Blake");
    assert_eq!(t.team_a_net_var, -50.0);
    assert_eq!(t.team_b_net_var, 50.0);
    assert_eq!(t.team_a_result, TradeOutcome::Loss);
    assert_eq!(t.team_b_result, TradeOutcome::Win);
}

#[test]
fn profiles_split_var_by_channel() {
    let out = run_fixture(None);
    let avery = out
        .profiles_for_season(2022)
        .find(|p| p.manager == "Avery")
        .unwrap();
    assert_eq!(avery.total_var, 120.0);
    assert_eq!(avery.keeper_var, 90.0);
    assert_eq!(avery.waiver_var, -30.0);
    assert_eq!(avery.faab_spent, 7.0);
    for p in &out.strategy_profiles {
        if p.total_var != 0.0 {
            let sum = p.draft_var + p.keeper_var + p.waiver_var + p.trade_var;
            assert!((sum - p.total_var).abs() < 1e-9);
            let pct = p.pct_var_from_draft
                + p.pct_var_from_keeper
                + p.pct_var_from_waiver
                + p.pct_var_from_trade;
            assert!((pct - 100.0).abs() < 1e-9);
        }
    }
}

#[test]
fn champions_and_careers_cover_every_manager() {
    let out = run_fixture(None);
    let champs: Vec<(i32, &str)> = out
        .champions
        .champions
        .iter()
        .map(|c| (c.season, c.manager.as_str()))
        .collect();
    assert_eq!(champs, vec![(2021, "Blake"), (2022, "Avery")]);
    assert_eq!(out.champion_blueprint.len(), 2);
    for bp in &out.champion_blueprint {
        let draft = out.draft_hit_rates.iter().find(|h| {
            h.scope == HitRateScope::ManagerSeason
                && h.season == Some(bp.season)
                && h.manager.as_deref() == Some(bp.manager.as_str())
        });
        assert_eq!(bp.hit_rate, draft.map(|h| h.hit_rate).unwrap_or(Stat::InsufficientData));
    }
    assert_eq!(out.career_leaderboard.len(), 4);
    assert_eq!(out.outcome_distributions.len(), 4);
    assert_eq!(out.consistency_archetypes.len(), 4);
}

#[test]
fn thread_count_does_not_change_results() {
    let one = run_fixture(Some(1));
    let many = run_fixture(Some(4));
    assert_eq!(one.rows, many.rows);
    assert_eq!(one.lifecycle, many.lifecycle);
    assert_eq!(one.strategy_profiles, many.strategy_profiles);
    assert_eq!(one.diagnostics, many.diagnostics);
}

#[test]
fn outputs_are_written_without_nan() {
    let out = run_fixture(None);
    let dir = std::env::temp_dir().join(format!("ffl_auction_export_{}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    let cfg = AnalysisConfig::default();
    let report = export::write_outputs(&out, &dir, &cfg).expect("export should succeed");

    assert_eq!(report.rows_in("analysis_rows.csv"), Some(32));
    assert_eq!(report.rows_in("analysis_ready_2021.json"), Some(16));
    assert_eq!(report.rows_in("missing_players.csv"), Some(1));
    assert_eq!(report.rows_in("waiver_pickups.csv"), Some(2));
    assert_eq!(report.rows_in("champion_blueprint.csv"), Some(2));
    assert!(report.workbook.as_ref().is_some_and(|p| p.exists()));
    assert!(!dir.join("analysis_ready_2022.json.tmp").exists());

    for name in ["consistency.csv", "keeper_surplus_summary.csv", "tier_summary.csv"] {
        let raw = fs::read_to_string(dir.join(name)).unwrap();
        assert!(!raw.contains("NaN") && !raw.contains("inf"), "{name}: {raw}");
    }
    let json = fs::read_to_string(dir.join("analysis_ready_2022.json")).unwrap();
    let rows: Vec<serde_json::Value> = serde_json::from_str(&json).unwrap();
    assert_eq!(rows.len(), 16);
    let _ = fs::remove_dir_all(&dir);
}
