use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::Serialize;
use tracing::{info, warn};

use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::records::{
    AnalysisRow, DraftPick, ManagerStrategyProfile, PlayerSeasonResult, Position, Season,
    TeamManagers, TeamSeason,
};
use crate::stats::{self, Stat};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionEfficiencyRow {
    pub position: Position,
    pub expected_tier: u32,
    pub players: usize,
    pub avg_var_per_dollar: Stat,
    pub median_var_per_dollar: Stat,
    pub avg_dollar_per_var: Stat,
    pub median_dollar_per_var: Stat,
    pub avg_price: Stat,
    pub avg_var: Stat,
}

/// Price efficiency per (position, expected tier) over rows that were priced and scored.
pub fn position_efficiency(rows: &[AnalysisRow]) -> Vec<PositionEfficiencyRow> {
    let mut groups: BTreeMap<(Position, u32), Vec<&AnalysisRow>> = BTreeMap::new();
    for row in rows {
        let Some(tier) = row.expected_tier else { continue };
        if row.var.is_none() || !row.normalized_price.is_some_and(|p| p > 0.0) {
            continue;
        }
        groups.entry((row.position, tier)).or_default().push(row);
    }

    groups
        .into_iter()
        .map(|((position, expected_tier), group)| {
            let vpd: Vec<f64> = group.iter().filter_map(|r| r.var_per_dollar).collect();
            let dpv: Vec<f64> = group.iter().filter_map(|r| r.dollar_per_var).collect();
            let prices: Vec<f64> = group.iter().filter_map(|r| r.normalized_price).collect();
            let vars: Vec<f64> = group.iter().filter_map(|r| r.var).collect();
            PositionEfficiencyRow {
                position,
                expected_tier,
                players: group.len(),
                avg_var_per_dollar: stats::mean_stat(&vpd),
                median_var_per_dollar: stats::median_stat(&vpd),
                avg_dollar_per_var: stats::mean_stat(&dpv),
                median_dollar_per_var: stats::median_stat(&dpv),
                avg_price: stats::mean_stat(&prices),
                avg_var: stats::mean_stat(&vars),
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MissingPlayerRow {
    pub season: Season,
    pub player_id: String,
    pub player_name: String,
    pub position: Position,
    pub team_id: String,
    pub cost: f64,
}

/// Drafted players with no season result, by season then most expensive first.
pub fn missing_players(picks: &[DraftPick], results: &[PlayerSeasonResult]) -> Vec<MissingPlayerRow> {
    let known: HashSet<(Season, &str)> = results
        .iter()
        .map(|r| (r.season, r.player_id.as_str()))
        .collect();
    let mut out: Vec<MissingPlayerRow> = picks
        .iter()
        .filter(|p| !known.contains(&(p.season, p.player_id.as_str())))
        .map(|p| MissingPlayerRow {
            season: p.season,
            player_id: p.player_id.clone(),
            player_name: p.player_name.clone(),
            position: p.position,
            team_id: p.team_id.clone(),
            cost: p.cost,
        })
        .collect();
    out.sort_by(|a, b| {
        a.season
            .cmp(&b.season)
            .then(b.cost.total_cmp(&a.cost))
            .then(a.player_id.cmp(&b.player_id))
    });
    if !out.is_empty() {
        warn!(missing = out.len(), "drafted players missing from season results");
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HitRateScope {
    League,
    ManagerSeason,
    ManagerCareer,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DraftHitRateRow {
    pub scope: HitRateScope,
    pub manager: Option<String>,
    pub season: Option<Season>,
    pub expected_tier: Option<u32>,
    pub players: usize,
    pub hit_rate: Stat,
    pub bust_rate: Stat,
    pub avg_var: Stat,
    pub median_var: Stat,
    pub avg_normalized_price: Stat,
    /// Summed VAR of the three priciest picks; career rows average it over seasons.
    pub top3_pick_var: Stat,
    pub top5_spend_var: Stat,
}

/// Hit and bust rates for drafted players whose expected and actual tiers are both known.
pub fn draft_hit_rates(rows: &[AnalysisRow], managers: &TeamManagers) -> Vec<DraftHitRateRow> {
    let tiered: Vec<(&AnalysisRow, String)> = rows
        .iter()
        .filter(|r| r.expected_tier.is_some() && r.actual_finish_tier.is_some())
        .map(|r| (r, managers.manager_for(r.season, &r.team_id)))
        .collect();
    if tiered.is_empty() {
        warn!("no drafted players with both expected and actual tiers");
        return Vec::new();
    }

    let mut by_tier: BTreeMap<u32, Vec<&AnalysisRow>> = BTreeMap::new();
    let mut by_manager_season: BTreeMap<(Season, &str), Vec<&AnalysisRow>> = BTreeMap::new();
    let mut by_manager: BTreeMap<&str, Vec<&AnalysisRow>> = BTreeMap::new();
    for (row, manager) in &tiered {
        let row: &AnalysisRow = row;
        if let Some(tier) = row.expected_tier {
            by_tier.entry(tier).or_default().push(row);
        }
        by_manager_season
            .entry((row.season, manager.as_str()))
            .or_default()
            .push(row);
        by_manager.entry(manager.as_str()).or_default().push(row);
    }

    let mut out = Vec::new();
    for (tier, group) in &by_tier {
        out.push(hit_rate_row(HitRateScope::League, None, None, Some(*tier), group));
    }
    for ((season, manager), group) in &by_manager_season {
        let mut row = hit_rate_row(
            HitRateScope::ManagerSeason,
            Some(manager.to_string()),
            Some(*season),
            None,
            group,
        );
        row.top3_pick_var = top_priced_var(group, 3);
        row.top5_spend_var = top_priced_var(group, 5);
        out.push(row);
    }
    for (manager, group) in &by_manager {
        let mut seasons: BTreeMap<Season, Vec<&AnalysisRow>> = BTreeMap::new();
        for &row in group {
            seasons.entry(row.season).or_default().push(row);
        }
        let per_season: Vec<f64> = seasons
            .values()
            .filter_map(|g| top_priced_var(g, 3).value())
            .collect();
        let mut row = hit_rate_row(HitRateScope::ManagerCareer, Some(manager.to_string()), None, None, group);
        row.top3_pick_var = stats::mean_stat(&per_season);
        row.top5_spend_var = Stat::NotApplicable;
        out.push(row);
    }
    info!(rows = out.len(), "built draft hit rates");
    out
}

fn hit_rate_row(
    scope: HitRateScope,
    manager: Option<String>,
    season: Option<Season>,
    expected_tier: Option<u32>,
    group: &[&AnalysisRow],
) -> DraftHitRateRow {
    let hits = group
        .iter()
        .filter(|r| match (r.actual_finish_tier, r.expected_tier) {
            (Some(actual), Some(expected)) => actual <= expected,
            _ => false,
        })
        .count();
    let vars: Vec<f64> = group.iter().filter_map(|r| r.var).collect();
    let busts = vars.iter().filter(|&&v| v < 0.0).count();
    let prices: Vec<f64> = group.iter().filter_map(|r| r.normalized_price).collect();

    DraftHitRateRow {
        scope,
        manager,
        season,
        expected_tier,
        players: group.len(),
        hit_rate: stats::ratio_stat(hits as f64, group.len() as f64),
        bust_rate: if vars.is_empty() {
            Stat::InsufficientData
        } else {
            Stat::Value(busts as f64 / vars.len() as f64)
        },
        avg_var: stats::mean_stat(&vars),
        median_var: stats::median_stat(&vars),
        avg_normalized_price: stats::mean_stat(&prices),
        top3_pick_var: Stat::NotApplicable,
        top5_spend_var: Stat::NotApplicable,
    }
}

fn top_priced_var(group: &[&AnalysisRow], n: usize) -> Stat {
    let mut priced: Vec<&&AnalysisRow> = group.iter().filter(|r| r.normalized_price.is_some()).collect();
    priced.sort_by(|a, b| {
        b.normalized_price
            .unwrap_or(0.0)
            .total_cmp(&a.normalized_price.unwrap_or(0.0))
            .then_with(|| a.player_id.cmp(&b.player_id))
    });
    let vars: Vec<f64> = priced.iter().take(n).filter_map(|r| r.var).collect();
    if vars.is_empty() {
        Stat::InsufficientData
    } else {
        Stat::Value(vars.iter().sum())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManagerSeasonValue {
    pub season: Season,
    pub manager: String,
    pub wins: u32,
    pub champion: bool,
    pub points_for: f64,
    pub draft_spend: f64,
    pub keeper_spend: f64,
    pub auction_spend: f64,
    pub keeper_spending_pct: Stat,
    pub draft_var: f64,
    pub keeper_var: f64,
    pub waiver_var: f64,
    pub trade_var: f64,
    pub total_var: f64,
    pub var_per_dollar: Stat,
    pub pct_var_from_draft: f64,
    pub pct_var_from_keeper: f64,
    pub pct_var_from_waiver: f64,
    pub pct_var_from_trade: f64,
}

/// One row per (season, manager): results from the teams table, spend from the
/// draft, channel VAR from the strategy profiles.
pub fn manager_season_value(
    rows: &[AnalysisRow],
    profiles: &[ManagerStrategyProfile],
    teams: &[TeamSeason],
    managers: &TeamManagers,
) -> Vec<ManagerSeasonValue> {
    #[derive(Default)]
    struct Acc {
        wins: u32,
        champion: bool,
        points_for: f64,
        draft_spend: f64,
        keeper_spend: f64,
        profile: Option<ManagerStrategyProfile>,
    }

    let mut acc: BTreeMap<(Season, String), Acc> = BTreeMap::new();
    for team in teams {
        let a = acc.entry((team.season, team.manager.clone())).or_default();
        a.wins += team.wins;
        a.points_for += team.points_for;
        a.champion |= team.is_champion();
    }
    for row in rows {
        let manager = managers.manager_for(row.season, &row.team_id);
        let a = acc.entry((row.season, manager)).or_default();
        if row.is_keeper {
            let paid = row.keeper_cost.unwrap_or(row.cost);
            a.draft_spend += paid;
            a.keeper_spend += paid;
        } else {
            a.draft_spend += row.cost;
        }
    }
    for p in profiles {
        acc.entry((p.season, p.manager.clone())).or_default().profile = Some(p.clone());
    }

    acc.into_iter()
        .map(|((season, manager), a)| {
            let (draft_var, keeper_var, waiver_var, trade_var, total_var) = a
                .profile
                .as_ref()
                .map(|p| (p.draft_var, p.keeper_var, p.waiver_var, p.trade_var, p.total_var))
                .unwrap_or_default();
            let pct = |v: f64| if total_var != 0.0 { v / total_var * 100.0 } else { 0.0 };
            ManagerSeasonValue {
                season,
                manager,
                wins: a.wins,
                champion: a.champion,
                points_for: a.points_for,
                draft_spend: a.draft_spend,
                keeper_spend: a.keeper_spend,
                auction_spend: a.draft_spend - a.keeper_spend,
                keeper_spending_pct: stats::ratio_stat(a.keeper_spend * 100.0, a.draft_spend),
                draft_var,
                keeper_var,
                waiver_var,
                trade_var,
                total_var,
                var_per_dollar: stats::ratio_stat(total_var, a.draft_spend),
                pct_var_from_draft: pct(draft_var),
                pct_var_from_keeper: pct(keeper_var),
                pct_var_from_waiver: pct(waiver_var),
                pct_var_from_trade: pct(trade_var),
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChampionComparisonRow {
    pub metric: String,
    pub champion_mean: f64,
    pub field_mean: f64,
    pub difference: f64,
    pub pct_difference: Stat,
    pub cohens_d: Stat,
    pub champion_n: usize,
    pub field_n: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ChampionReport {
    pub champions: Vec<ManagerSeasonValue>,
    /// Sorted by |Cohen's d|, undefined effect sizes last.
    pub comparison: Vec<ChampionComparisonRow>,
    pub top_differentiators: Vec<String>,
}

type Metric = (&'static str, fn(&ManagerSeasonValue) -> Option<f64>);

const CHAMPION_METRICS: [Metric; 11] = [
    ("total_var", |v| Some(v.total_var)),
    ("var_per_dollar", |v| v.var_per_dollar.value()),
    ("pct_var_from_draft", |v| Some(v.pct_var_from_draft)),
    ("pct_var_from_keeper", |v| Some(v.pct_var_from_keeper)),
    ("pct_var_from_waiver", |v| Some(v.pct_var_from_waiver)),
    ("pct_var_from_trade", |v| Some(v.pct_var_from_trade)),
    ("draft_var", |v| Some(v.draft_var)),
    ("keeper_var", |v| Some(v.keeper_var)),
    ("waiver_var", |v| Some(v.waiver_var)),
    ("trade_var", |v| Some(v.trade_var)),
    ("keeper_spending_pct", |v| v.keeper_spending_pct.value()),
];

/// What champions did differently from the rest of the league.
pub fn champion_comparison(values: &[ManagerSeasonValue], diags: &mut Diagnostics) -> ChampionReport {
    let (champs, field): (Vec<&ManagerSeasonValue>, Vec<&ManagerSeasonValue>) =
        values.iter().partition(|v| v.champion);
    if champs.is_empty() {
        warn!("no champions in manager-season values");
        return ChampionReport::default();
    }

    let mut comparison = Vec::new();
    for (name, metric) in CHAMPION_METRICS {
        let a: Vec<f64> = champs.iter().filter_map(|v| metric(v)).collect();
        let b: Vec<f64> = field.iter().filter_map(|v| metric(v)).collect();
        let (Some(champion_mean), Some(field_mean)) = (stats::mean(&a), stats::mean(&b)) else {
            continue;
        };
        let difference = champion_mean - field_mean;
        if a.len() < 2 || b.len() < 2 {
            diags.push(
                None,
                DiagnosticKind::InsufficientSample,
                format!("champion_comparison/{name}"),
                format!("{} champion and {} field seasons for Cohen's d", a.len(), b.len()),
            );
        }
        comparison.push(ChampionComparisonRow {
            metric: name.to_string(),
            champion_mean,
            field_mean,
            difference,
            pct_difference: stats::ratio_stat(difference * 100.0, field_mean),
            cohens_d: Stat::from_option(stats::cohens_d(&a, &b)),
            champion_n: a.len(),
            field_n: b.len(),
        });
    }
    comparison.sort_by(|x, y| {
        let dx = x.cohens_d.value().map(f64::abs);
        let dy = y.cohens_d.value().map(f64::abs);
        match (dx, dy) {
            (Some(a), Some(b)) => b.total_cmp(&a),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        }
        .then_with(|| x.metric.cmp(&y.metric))
    });
    let top_differentiators: Vec<String> = comparison
        .iter()
        .filter(|c| c.cohens_d.is_value())
        .take(3)
        .map(|c| c.metric.clone())
        .collect();
    info!(champions = champs.len(), top = ?top_differentiators, "built champion comparison");

    ChampionReport {
        champions: champs.into_iter().cloned().collect(),
        comparison,
        top_differentiators,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChampionBlueprintRow {
    pub season: Season,
    pub manager: String,
    pub wins: u32,
    pub points_for: f64,
    pub total_var: f64,
    pub var_per_dollar: Stat,
    pub pct_var_from_draft: f64,
    pub pct_var_from_keeper: f64,
    pub pct_var_from_waiver: f64,
    pub pct_var_from_trade: f64,
    pub draft_var: f64,
    pub keeper_var: f64,
    pub waiver_var: f64,
    pub trade_var: f64,
    pub keeper_spending_pct: Stat,
    pub hit_rate: Stat,
    pub bust_rate: Stat,
}

/// One row per title-winning season, with that manager-season's draft hit and bust rates.
pub fn champion_blueprint(
    champions: &[ManagerSeasonValue],
    hit_rates: &[DraftHitRateRow],
) -> Vec<ChampionBlueprintRow> {
    champions
        .iter()
        .map(|c| {
            let draft = hit_rates.iter().find(|h| {
                h.scope == HitRateScope::ManagerSeason
                    && h.season == Some(c.season)
                    && h.manager.as_deref() == Some(c.manager.as_str())
            });
            ChampionBlueprintRow {
                season: c.season,
                manager: c.manager.clone(),
                wins: c.wins,
                points_for: c.points_for,
                total_var: c.total_var,
                var_per_dollar: c.var_per_dollar,
                pct_var_from_draft: c.pct_var_from_draft,
                pct_var_from_keeper: c.pct_var_from_keeper,
                pct_var_from_waiver: c.pct_var_from_waiver,
                pct_var_from_trade: c.pct_var_from_trade,
                draft_var: c.draft_var,
                keeper_var: c.keeper_var,
                waiver_var: c.waiver_var,
                trade_var: c.trade_var,
                keeper_spending_pct: c.keeper_spending_pct,
                hit_rate: draft.map(|h| h.hit_rate).unwrap_or(Stat::InsufficientData),
                bust_rate: draft.map(|h| h.bust_rate).unwrap_or(Stat::InsufficientData),
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CareerLeaderboardRow {
    pub manager: String,
    pub seasons: usize,
    pub first_season: Season,
    pub last_season: Season,
    pub total_wins: u32,
    pub championships: u32,
    pub total_var: f64,
    pub avg_var_per_season: Stat,
    pub avg_var_per_dollar: Stat,
    pub best_season: Option<Season>,
    pub best_season_var: Stat,
}

/// Runs after every season is complete. Ordered by total VAR, best first.
pub fn career_leaderboard(values: &[ManagerSeasonValue]) -> Vec<CareerLeaderboardRow> {
    let mut by_manager: BTreeMap<&str, Vec<&ManagerSeasonValue>> = BTreeMap::new();
    for v in values {
        by_manager.entry(v.manager.as_str()).or_default().push(v);
    }

    let mut out: Vec<CareerLeaderboardRow> = by_manager
        .into_iter()
        .map(|(manager, seasons)| {
            let years: BTreeSet<Season> = seasons.iter().map(|v| v.season).collect();
            let vars: Vec<f64> = seasons.iter().map(|v| v.total_var).collect();
            let vpd: Vec<f64> = seasons.iter().filter_map(|v| v.var_per_dollar.value()).collect();
            let best = seasons
                .iter()
                .max_by(|a, b| a.total_var.total_cmp(&b.total_var).then(b.season.cmp(&a.season)));
            CareerLeaderboardRow {
                manager: manager.to_string(),
                seasons: years.len(),
                first_season: years.first().copied().unwrap_or_default(),
                last_season: years.last().copied().unwrap_or_default(),
                total_wins: seasons.iter().map(|v| v.wins).sum(),
                championships: seasons.iter().filter(|v| v.champion).count() as u32,
                total_var: vars.iter().sum(),
                avg_var_per_season: stats::mean_stat(&vars),
                avg_var_per_dollar: stats::mean_stat(&vpd),
                best_season: best.map(|v| v.season),
                best_season_var: Stat::from_option(best.map(|v| v.total_var)),
            }
        })
        .collect();
    out.sort_by(|a, b| b.total_var.total_cmp(&a.total_var).then(a.manager.cmp(&b.manager)));
    out
}
