use std::collections::BTreeMap;

use ffl_auction::diagnostics::{DiagnosticKind, Diagnostics};
use ffl_auction::keepers::apply_keeper_surplus;
use ffl_auction::normalize::{effective_budget_per_spot, normalize_prices};
use ffl_auction::records::{
    AnalysisRow, Archetype, DraftPick, LeagueSettings, PlayerSeasonResult, Position, Season,
};
use ffl_auction::reporting::missing_players;
use ffl_auction::strategy::classify_archetype;
use ffl_auction::var::{build_analysis_rows, replacement_baselines};

fn pick(season: Season, id: &str, position: Position, cost: f64) -> DraftPick {
    DraftPick {
        season,
        round: 1,
        pick_number: 1,
        team_id: "t1".to_string(),
        player_id: id.to_string(),
        player_name: id.to_string(),
        position,
        cost,
        is_keeper: false,
        keeper_cost: None,
    }
}

fn result(season: Season, id: &str, position: Position, points: f64) -> PlayerSeasonResult {
    PlayerSeasonResult {
        season,
        player_id: id.to_string(),
        player_name: id.to_string(),
        position,
        fantasy_points_total: Some(points),
        games_played: Some(17),
    }
}

#[test]
fn rb_var_is_points_over_the_24th_back() {
    let settings = LeagueSettings::defaults(2020);
    assert_eq!(settings.replacement_rank(Position::RB), 24);

    // 320, 310, ..., 90 at rank 24, ..., 30
    let results: Vec<PlayerSeasonResult> = (0..30)
        .map(|i| result(2020, &format!("rb{i:02}"), Position::RB, 320.0 - 10.0 * i as f64))
        .collect();
    let mut diags = Diagnostics::new();
    let baselines = replacement_baselines(2020, &results, &settings, &mut diags);
    let rb = baselines[&Position::RB].as_ref().unwrap();
    assert_eq!(rb.points, 90.0);
    assert_eq!(rb.rank_used, 24);

    let picks: Vec<DraftPick> = results
        .iter()
        .map(|r| pick(2020, &r.player_id, Position::RB, 10.0))
        .collect();
    let prices = vec![Some(10.0); picks.len()];
    let all = BTreeMap::from([(2020, baselines)]);
    let rows = build_analysis_rows(&picks, &prices, &results, &all, &mut diags);
    for (row, res) in rows.iter().zip(&results) {
        assert_eq!(row.var, Some(res.fantasy_points_total.unwrap() - 90.0));
        assert_eq!(row.replacement_baseline_points, Some(90.0));
    }
}

#[test]
fn thin_position_uses_last_available_player() {
    let settings = LeagueSettings::defaults(2020);
    let results = vec![
        result(2020, "te1", Position::TE, 150.0),
        result(2020, "te2", Position::TE, 80.0),
    ];
    let mut diags = Diagnostics::new();
    let baselines = replacement_baselines(2020, &results, &settings, &mut diags);
    let te = baselines[&Position::TE].as_ref().unwrap();
    assert_eq!(te.points, 80.0);
    assert_eq!(te.rank_used, 2);
    assert!(baselines[&Position::QB].is_none());
    assert!(diags.count(DiagnosticKind::UndefinedBaseline) >= 1);
}

#[test]
fn fifty_dollars_at_ten_per_spot_is_sixty_at_twelve() {
    // 10 teams x (8 starters + 2 bench), no keepers
    let mut season = LeagueSettings::defaults(2016);
    season.num_teams = 10;
    season.bench_slots = 2;
    season.num_keepers = 0;
    season.auction_budget = 100.0;
    let mut baseline = season.clone();
    baseline.season = 2020;
    baseline.auction_budget = 120.0;

    let picks = vec![pick(2016, "p", Position::WR, 50.0), pick(2020, "q", Position::WR, 50.0)];
    assert_eq!(effective_budget_per_spot(&season, &picks), Some(10.0));
    assert_eq!(effective_budget_per_spot(&baseline, &picks), Some(12.0));

    let settings = BTreeMap::from([(2016, season), (2020, baseline)]);
    let mut diags = Diagnostics::new();
    let first = normalize_prices(&picks, &settings, 2020, &mut diags).unwrap();
    assert_eq!(first.per_pick[0], Some(60.0));
    assert_eq!(first.per_pick[1], Some(50.0));

    let second = normalize_prices(&picks, &settings, 2020, &mut diags).unwrap();
    let bits = |v: &[Option<f64>]| v.iter().map(|p| p.map(f64::to_bits)).collect::<Vec<_>>();
    assert_eq!(bits(&first.per_pick), bits(&second.per_pick));
}

#[test]
fn all_keeper_league_has_no_normalized_price() {
    let mut settings = LeagueSettings::defaults(2019);
    settings.num_keepers = settings.total_starters() + settings.bench_slots;
    let picks = vec![pick(2019, "p", Position::QB, 20.0)];
    let map = BTreeMap::from([(2019, settings)]);
    let mut diags = Diagnostics::new();
    let prices = normalize_prices(&picks, &map, 2019, &mut diags).unwrap();
    assert_eq!(prices.per_pick, vec![None]);
    assert_eq!(diags.count(DiagnosticKind::DegenerateNormalization), 1);
}

#[test]
fn five_dollar_keeper_worth_forty_has_thirty_five_surplus() {
    let mut row = AnalysisRow {
        season: 2021,
        player_id: "k".into(),
        player_name: "Kept".into(),
        position: Position::RB,
        team_id: "t1".into(),
        cost: 5.0,
        is_keeper: true,
        keeper_cost: Some(5.0),
        normalized_price: Some(40.0),
        fantasy_points_total: Some(200.0),
        replacement_baseline_points: Some(100.0),
        var: Some(100.0),
        var_per_dollar: Some(2.5),
        dollar_per_var: Some(0.4),
        price_rank_within_position: Some(3),
        points_rank_within_position: Some(2),
        expected_tier: Some(1),
        actual_finish_tier: Some(1),
        market_price_estimate: None,
        keeper_surplus: None,
    };
    let mut rows = vec![row.clone()];
    apply_keeper_surplus(&mut rows);
    assert_eq!(rows[0].market_price_estimate, Some(40.0));
    assert_eq!(rows[0].keeper_surplus, Some(35.0));

    row.is_keeper = false;
    let mut rows = vec![row];
    apply_keeper_surplus(&mut rows);
    assert_eq!(rows[0].keeper_surplus, None);
}

#[test]
fn draft_and_hold_shadows_trader() {
    assert_eq!(classify_archetype(70.0, 5.0, 25.0), Archetype::DraftAndHold);
}

#[test]
fn archetype_is_total() {
    let grid = [-50.0, 0.0, 5.0, 10.0, 20.0, 30.0, 31.0, 60.0, 61.0, 100.0, 150.0];
    for &d in &grid {
        for &w in &grid {
            for &t in &grid {
                let a = classify_archetype(d, w, t);
                if d > 60.0 && w < 10.0 {
                    assert_eq!(a, Archetype::DraftAndHold);
                } else if w > 30.0 {
                    assert_eq!(a, Archetype::WaiverHawk);
                }
            }
        }
    }
}

#[test]
fn undrafted_result_gap_is_reported_not_zeroed() {
    let picks = vec![
        pick(2022, "here", Position::WR, 30.0),
        pick(2022, "gone", Position::WR, 12.0),
    ];
    let results = vec![
        result(2022, "here", Position::WR, 180.0),
        result(2022, "other", Position::WR, 90.0),
    ];
    let settings = LeagueSettings::defaults(2022);
    let mut diags = Diagnostics::new();
    let baselines = BTreeMap::from([(
        2022,
        replacement_baselines(2022, &results, &settings, &mut diags),
    )]);
    let rows = build_analysis_rows(&picks, &[Some(30.0), Some(12.0)], &results, &baselines, &mut diags);

    let gone = rows.iter().find(|r| r.player_id == "gone").unwrap();
    assert_eq!(gone.var, None);
    assert_eq!(gone.fantasy_points_total, None);
    assert_eq!(diags.count(DiagnosticKind::MissingResult), 1);

    let report = missing_players(&picks, &results);
    assert_eq!(report.len(), 1);
    assert_eq!(report[0].player_id, "gone");
}
