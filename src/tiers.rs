use std::collections::BTreeMap;

use serde::Serialize;

use crate::records::{AnalysisRow, LeagueSettings, Position, Season};
use crate::stats::{self, Stat};

pub fn tier_for_rank(rank: u32, tier_size: usize) -> Option<u32> {
    if tier_size == 0 || rank == 0 {
        return None;
    }
    Some((rank - 1) / tier_size as u32 + 1)
}

/// Rank players within (season, position) by normalized price and by points,
/// then bucket both ranks into tiers of `num_teams * starters` players.
pub fn assign_tiers(rows: &mut [AnalysisRow], settings: &BTreeMap<Season, LeagueSettings>) {
    let mut groups: BTreeMap<(Season, Position), Vec<usize>> = BTreeMap::new();
    for (i, row) in rows.iter().enumerate() {
        groups.entry((row.season, row.position)).or_default().push(i);
    }

    for ((season, position), idxs) in groups {
        let tier_size = settings
            .get(&season)
            .map(|s| s.replacement_rank(position))
            .unwrap_or(0);

        let mut priced: Vec<usize> = idxs
            .iter()
            .copied()
            .filter(|&i| rows[i].normalized_price.is_some())
            .collect();
        priced.sort_by(|&a, &b| {
            let pa = rows[a].normalized_price.unwrap_or(0.0);
            let pb = rows[b].normalized_price.unwrap_or(0.0);
            pb.total_cmp(&pa).then_with(|| rows[a].player_id.cmp(&rows[b].player_id))
        });
        for (rank0, &i) in priced.iter().enumerate() {
            let rank = rank0 as u32 + 1;
            rows[i].price_rank_within_position = Some(rank);
            rows[i].expected_tier = tier_for_rank(rank, tier_size);
        }

        let mut scored: Vec<usize> = idxs
            .iter()
            .copied()
            .filter(|&i| rows[i].fantasy_points_total.is_some())
            .collect();
        scored.sort_by(|&a, &b| {
            let pa = rows[a].fantasy_points_total.unwrap_or(0.0);
            let pb = rows[b].fantasy_points_total.unwrap_or(0.0);
            pb.total_cmp(&pa).then_with(|| rows[a].player_id.cmp(&rows[b].player_id))
        });
        for (rank0, &i) in scored.iter().enumerate() {
            let rank = rank0 as u32 + 1;
            rows[i].points_rank_within_position = Some(rank);
            rows[i].actual_finish_tier = tier_for_rank(rank, tier_size);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierSummaryRow {
    /// `None` for the all-seasons pool.
    pub season: Option<Season>,
    pub position: Position,
    pub expected_tier: u32,
    pub players: usize,
    /// Players whose finish is known; the hit-rate denominator.
    pub evaluated: usize,
    pub hit_rate: Stat,
    pub bust_rate: Stat,
    pub avg_var: Stat,
    pub median_var: Stat,
    pub avg_normalized_price: Stat,
    pub avg_points: Stat,
}

pub fn tier_hit_rates(rows: &[AnalysisRow]) -> Vec<TierSummaryRow> {
    let mut per_season: BTreeMap<(Season, Position, u32), Vec<&AnalysisRow>> = BTreeMap::new();
    let mut pooled: BTreeMap<(Position, u32), Vec<&AnalysisRow>> = BTreeMap::new();
    for row in rows {
        let Some(tier) = row.expected_tier else { continue };
        per_season
            .entry((row.season, row.position, tier))
            .or_default()
            .push(row);
        pooled.entry((row.position, tier)).or_default().push(row);
    }

    let mut out = Vec::with_capacity(per_season.len() + pooled.len());
    for ((season, position, tier), group) in per_season {
        out.push(summarize_tier(Some(season), position, tier, &group));
    }
    for ((position, tier), group) in pooled {
        out.push(summarize_tier(None, position, tier, &group));
    }
    out
}

fn summarize_tier(
    season: Option<Season>,
    position: Position,
    expected_tier: u32,
    group: &[&AnalysisRow],
) -> TierSummaryRow {
    let finishes: Vec<u32> = group.iter().filter_map(|r| r.actual_finish_tier).collect();
    let hits = finishes.iter().filter(|&&t| t <= expected_tier).count();
    let vars: Vec<f64> = group.iter().filter_map(|r| r.var).collect();
    let busts = vars.iter().filter(|&&v| v < 0.0).count();
    let prices: Vec<f64> = group.iter().filter_map(|r| r.normalized_price).collect();
    let points: Vec<f64> = group.iter().filter_map(|r| r.fantasy_points_total).collect();

    let rate = |n: usize, d: usize| {
        if d == 0 {
            Stat::InsufficientData
        } else {
            Stat::Value(n as f64 / d as f64)
        }
    };

    TierSummaryRow {
        season,
        position,
        expected_tier,
        players: group.len(),
        evaluated: finishes.len(),
        hit_rate: rate(hits, finishes.len()),
        bust_rate: rate(busts, vars.len()),
        avg_var: stats::mean_stat(&vars),
        median_var: stats::median_stat(&vars),
        avg_normalized_price: stats::mean_stat(&prices),
        avg_points: stats::mean_stat(&points),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str, price: Option<f64>, points: Option<f64>, var: Option<f64>) -> AnalysisRow {
        AnalysisRow {
            season: 2021,
            player_id: id.into(),
            player_name: id.into(),
            position: Position::QB,
            team_id: "t".into(),
            cost: price.unwrap_or(0.0),
            is_keeper: false,
            keeper_cost: None,
            normalized_price: price,
            fantasy_points_total: points,
            replacement_baseline_points: None,
            var,
            var_per_dollar: None,
            dollar_per_var: None,
            price_rank_within_position: None,
            points_rank_within_position: None,
            expected_tier: None,
            actual_finish_tier: None,
            market_price_estimate: None,
            keeper_surplus: None,
        }
    }

    fn two_team_settings() -> BTreeMap<Season, LeagueSettings> {
        let mut s = LeagueSettings::defaults(2021);
        s.num_teams = 2;
        BTreeMap::from([(2021, s)])
    }

    #[test]
    fn tier_boundaries() {
        assert_eq!(tier_for_rank(1, 12), Some(1));
        assert_eq!(tier_for_rank(12, 12), Some(1));
        assert_eq!(tier_for_rank(13, 12), Some(2));
        assert_eq!(tier_for_rank(5, 0), None);
    }

    #[test]
    fn equal_prices_break_ties_by_player_id() {
        let mut rows = vec![
            row("b", Some(30.0), Some(100.0), Some(10.0)),
            row("a", Some(30.0), Some(200.0), Some(110.0)),
            row("c", Some(10.0), Some(250.0), Some(160.0)),
        ];
        assign_tiers(&mut rows, &two_team_settings());
        assert_eq!(rows[1].price_rank_within_position, Some(1));
        assert_eq!(rows[0].price_rank_within_position, Some(2));
        assert_eq!(rows[2].expected_tier, Some(2));
        assert_eq!(rows[2].actual_finish_tier, Some(1));
        assert_eq!(rows[0].actual_finish_tier, Some(2));
    }

    #[test]
    fn hit_and_bust_rates_stay_in_unit_interval() {
        let mut rows = vec![
            row("a", Some(40.0), Some(90.0), Some(-10.0)),
            row("b", Some(35.0), Some(300.0), Some(200.0)),
            row("c", Some(20.0), None, None),
            row("d", Some(5.0), Some(120.0), Some(20.0)),
        ];
        assign_tiers(&mut rows, &two_team_settings());
        let summary = tier_hit_rates(&rows);
        // one per-season row and one pooled row for each of the two tiers
        assert_eq!(summary.len(), 4);
        for s in &summary {
            for rate in [s.hit_rate, s.bust_rate] {
                if let Some(v) = rate.value() {
                    assert!((0.0..=1.0).contains(&v));
                }
            }
        }
        let top = summary.iter().find(|s| s.season.is_some() && s.expected_tier == 1).unwrap();
        assert_eq!(top.players, 2);
        // b finished 1st, a 3rd (tier 2)
        assert_eq!(top.hit_rate, Stat::Value(0.5));
        assert_eq!(top.bust_rate, Stat::Value(0.5));
    }
}
