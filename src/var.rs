use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use tracing::debug;

use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::records::{AnalysisRow, DraftPick, LeagueSettings, PlayerSeasonResult, Position, Season};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Baseline {
    /// 1-based rank actually used; smaller than the nominal rank when the pool is thin.
    pub rank_used: usize,
    pub points: f64,
    pub eligible: usize,
}

pub type SeasonBaselines = BTreeMap<Position, Option<Baseline>>;

/// Replacement points per position for one season's results.
pub fn replacement_baselines(
    season: Season,
    results: &[PlayerSeasonResult],
    settings: &LeagueSettings,
    diags: &mut Diagnostics,
) -> SeasonBaselines {
    let mut by_pos: BTreeMap<Position, Vec<(&str, f64)>> = BTreeMap::new();
    for r in results.iter().filter(|r| r.season == season) {
        let Some(points) = r.fantasy_points_total.filter(|p| p.is_finite()) else {
            continue;
        };
        by_pos
            .entry(r.position)
            .or_default()
            .push((r.player_id.as_str(), points));
    }

    let mut out = BTreeMap::new();
    for position in Position::ALL {
        let mut pool = by_pos.remove(&position).unwrap_or_default();
        let rank = settings.replacement_rank(position);
        if rank == 0 {
            if !pool.is_empty() {
                diags.push(
                    Some(season),
                    DiagnosticKind::UndefinedBaseline,
                    position.label(),
                    "no starting slots for position",
                );
            }
            out.insert(position, None);
            continue;
        }
        if pool.is_empty() {
            diags.push(
                Some(season),
                DiagnosticKind::UndefinedBaseline,
                position.label(),
                "no eligible players with points",
            );
            out.insert(position, None);
            continue;
        }
        sort_by_points_desc(&mut pool);
        let rank_used = rank.min(pool.len());
        let points = pool[rank_used - 1].1;
        debug!(season, %position, rank, rank_used, points, "replacement baseline");
        out.insert(
            position,
            Some(Baseline {
                rank_used,
                points,
                eligible: pool.len(),
            }),
        );
    }
    out
}

/// Points descending, ties by player id.
pub(crate) fn sort_by_points_desc(pool: &mut [(&str, f64)]) {
    pool.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
}

pub fn baseline_points(
    baselines: &BTreeMap<Season, SeasonBaselines>,
    season: Season,
    position: Position,
) -> Option<f64> {
    baselines
        .get(&season)
        .and_then(|b| b.get(&position))
        .and_then(|b| b.as_ref())
        .map(|b| b.points)
}

/// Left join of picks onto season results. Picks without a result keep null
/// points and VAR and are reported as `MissingResult`.
pub fn build_analysis_rows(
    picks: &[DraftPick],
    normalized: &[Option<f64>],
    results: &[PlayerSeasonResult],
    baselines: &BTreeMap<Season, SeasonBaselines>,
    diags: &mut Diagnostics,
) -> Vec<AnalysisRow> {
    let index = results_index(results);
    let mut rows = Vec::with_capacity(picks.len());

    for (i, pick) in picks.iter().enumerate() {
        let normalized_price = normalized.get(i).copied().flatten();
        let result = index.get(&(pick.season, pick.player_id.as_str()));
        if result.is_none() {
            diags.push(
                Some(pick.season),
                DiagnosticKind::MissingResult,
                pick.player_id.clone(),
                format!("{} ({}) drafted by {} for ${}", pick.player_name, pick.position, pick.team_id, pick.cost),
            );
        }
        let points = result.and_then(|r| r.fantasy_points_total).filter(|p| p.is_finite());
        let baseline = baseline_points(baselines, pick.season, pick.position);
        let var = match (points, baseline) {
            (Some(p), Some(b)) => Some(p - b),
            _ => None,
        };
        let var_per_dollar = match (var, normalized_price) {
            (Some(v), Some(price)) if price > 0.0 => Some(v / price),
            _ => None,
        };
        let dollar_per_var = match (var, normalized_price) {
            (Some(v), Some(price)) if v > 0.0 => Some(price / v),
            _ => None,
        };

        rows.push(AnalysisRow {
            season: pick.season,
            player_id: pick.player_id.clone(),
            player_name: pick.player_name.clone(),
            position: pick.position,
            team_id: pick.team_id.clone(),
            cost: pick.cost,
            is_keeper: pick.is_keeper,
            keeper_cost: pick.keeper_cost,
            normalized_price,
            fantasy_points_total: points,
            replacement_baseline_points: baseline,
            var,
            var_per_dollar,
            dollar_per_var,
            price_rank_within_position: None,
            points_rank_within_position: None,
            expected_tier: None,
            actual_finish_tier: None,
            market_price_estimate: None,
            keeper_surplus: None,
        });
    }
    rows
}

fn results_index(results: &[PlayerSeasonResult]) -> HashMap<(Season, &str), &PlayerSeasonResult> {
    let mut index = HashMap::with_capacity(results.len());
    for r in results {
        index.entry((r.season, r.player_id.as_str())).or_insert(r);
    }
    index
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerValue {
    pub player_name: String,
    pub position: Position,
    pub points: Option<f64>,
    pub var: Option<f64>,
}

/// VAR for every player-season with a result, drafted or not.
#[derive(Debug, Clone, Default)]
pub struct VarTable {
    by_player: HashMap<(Season, String), PlayerValue>,
}

impl VarTable {
    pub fn from_results(
        results: &[PlayerSeasonResult],
        baselines: &BTreeMap<Season, SeasonBaselines>,
    ) -> Self {
        let mut by_player = HashMap::with_capacity(results.len());
        for r in results {
            let points = r.fantasy_points_total.filter(|p| p.is_finite());
            let var = match (points, baseline_points(baselines, r.season, r.position)) {
                (Some(p), Some(b)) => Some(p - b),
                _ => None,
            };
            by_player
                .entry((r.season, r.player_id.clone()))
                .or_insert(PlayerValue {
                    player_name: r.player_name.clone(),
                    position: r.position,
                    points,
                    var,
                });
        }
        Self { by_player }
    }

    /// Drafted rows are authoritative for their player-season.
    pub fn overlay_rows(&mut self, rows: &[AnalysisRow]) {
        for row in rows {
            if row.fantasy_points_total.is_none() {
                continue;
            }
            self.by_player.insert(
                (row.season, row.player_id.clone()),
                PlayerValue {
                    player_name: row.player_name.clone(),
                    position: row.position,
                    points: row.fantasy_points_total,
                    var: row.var,
                },
            );
        }
    }

    pub fn get(&self, season: Season, player_id: &str) -> Option<&PlayerValue> {
        self.by_player.get(&(season, player_id.to_string()))
    }

    pub fn var(&self, season: Season, player_id: &str) -> Option<f64> {
        self.get(season, player_id).and_then(|v| v.var)
    }

    pub fn len(&self) -> usize {
        self.by_player.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_player.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(season: Season, id: &str, pos: Position, pts: Option<f64>) -> PlayerSeasonResult {
        PlayerSeasonResult {
            season,
            player_id: id.into(),
            player_name: id.into(),
            position: pos,
            fantasy_points_total: pts,
            games_played: Some(16),
        }
    }

    #[test]
    fn twelve_team_two_rb_league_uses_24th_back() {
        let settings = LeagueSettings::defaults(2020);
        // 30 backs: 300, 290, ... with the 24th at 70
        let results: Vec<_> = (0..30)
            .map(|i| result(2020, &format!("rb{i:02}"), Position::RB, Some(300.0 - 10.0 * i as f64)))
            .collect();
        let mut diags = Diagnostics::new();
        let b = replacement_baselines(2020, &results, &settings, &mut diags);
        let rb = b[&Position::RB].as_ref().unwrap();
        assert_eq!(rb.rank_used, 24);
        assert_eq!(rb.points, 70.0);
        assert_eq!(rb.eligible, 30);
    }

    #[test]
    fn thin_pool_uses_last_available_player() {
        let settings = LeagueSettings::defaults(2020);
        let results = vec![
            result(2020, "te1", Position::TE, Some(150.0)),
            result(2020, "te2", Position::TE, Some(90.0)),
            result(2020, "te3", Position::TE, None),
        ];
        let mut diags = Diagnostics::new();
        let b = replacement_baselines(2020, &results, &settings, &mut diags);
        let te = b[&Position::TE].as_ref().unwrap();
        assert_eq!(te.rank_used, 2);
        assert_eq!(te.points, 90.0);
        assert!(b[&Position::QB].is_none());
        assert_eq!(diags.count(DiagnosticKind::UndefinedBaseline), 5);
    }

    #[test]
    fn missing_result_keeps_var_null() {
        let settings = LeagueSettings::defaults(2020);
        let results = vec![result(2020, "wr1", Position::WR, Some(200.0))];
        let mut diags = Diagnostics::new();
        let baselines = BTreeMap::from([(2020, replacement_baselines(2020, &results, &settings, &mut diags))]);
        let picks = vec![
            DraftPick {
                season: 2020,
                round: 1,
                pick_number: 1,
                team_id: "t1".into(),
                player_id: "wr1".into(),
                player_name: "wr1".into(),
                position: Position::WR,
                cost: 20.0,
                is_keeper: false,
                keeper_cost: None,
            },
            DraftPick {
                season: 2020,
                round: 2,
                pick_number: 2,
                team_id: "t2".into(),
                player_id: "ghost".into(),
                player_name: "Ghost".into(),
                position: Position::WR,
                cost: 5.0,
                is_keeper: false,
                keeper_cost: None,
            },
        ];
        let rows = build_analysis_rows(&picks, &[Some(20.0), Some(0.0)], &results, &baselines, &mut diags);
        assert_eq!(rows[0].var, Some(0.0));
        assert_eq!(rows[0].dollar_per_var, None);
        assert_eq!(rows[0].var_per_dollar, Some(0.0));
        assert_eq!(rows[1].var, None);
        assert_eq!(rows[1].fantasy_points_total, None);
        assert_eq!(rows[1].var_per_dollar, None);
        assert_eq!(diags.count(DiagnosticKind::MissingResult), 1);
    }

    #[test]
    fn var_table_covers_undrafted_players() {
        let settings = LeagueSettings::defaults(2020);
        let results = vec![
            result(2020, "k1", Position::K, Some(140.0)),
            result(2020, "k2", Position::K, Some(120.0)),
        ];
        let mut diags = Diagnostics::new();
        let baselines = BTreeMap::from([(2020, replacement_baselines(2020, &results, &settings, &mut diags))]);
        let table = VarTable::from_results(&results, &baselines);
        assert_eq!(table.var(2020, "k1"), Some(20.0));
        assert_eq!(table.var(2020, "k2"), Some(0.0));
        assert_eq!(table.var(2021, "k1"), None);
    }
}
