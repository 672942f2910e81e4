use std::collections::BTreeMap;

use serde::Serialize;
use tracing::info;

use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::reporting::ManagerSeasonValue;
use crate::stats::{self, Stat};

/// Managers with fewer seasons than this are low-sample when nothing else fits.
const MIN_SEASONS_FOR_PROFILE: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutcomeDistribution {
    pub manager: String,
    pub seasons_played: usize,
    pub mean_wins: Stat,
    pub median_wins: Stat,
    pub std_wins: Stat,
    pub cv_wins: Stat,
    pub p25_wins: Stat,
    pub p50_wins: Stat,
    pub p75_wins: Stat,
    pub min_wins: Stat,
    pub max_wins: Stat,
    pub championships: u32,
    pub championship_rate: Stat,
    pub mean_var: Stat,
    pub median_var: Stat,
    pub std_var: Stat,
    pub cv_var: Stat,
    pub p25_var: Stat,
    pub p75_var: Stat,
    pub mean_var_per_dollar: Stat,
    pub median_var_per_dollar: Stat,
    pub std_var_per_dollar: Stat,
}

/// Spread statistics need two seasons; managers with one are reported as
/// insufficient samples.
pub fn outcome_distributions(values: &[ManagerSeasonValue], diags: &mut Diagnostics) -> Vec<OutcomeDistribution> {
    let mut by_manager: BTreeMap<&str, Vec<&ManagerSeasonValue>> = BTreeMap::new();
    for v in values {
        by_manager.entry(v.manager.as_str()).or_default().push(v);
    }

    by_manager
        .into_iter()
        .map(|(manager, seasons)| {
            let wins: Vec<f64> = seasons.iter().map(|v| v.wins as f64).collect();
            let var: Vec<f64> = seasons.iter().map(|v| v.total_var).collect();
            let vpd: Vec<f64> = seasons.iter().filter_map(|v| v.var_per_dollar.value()).collect();
            let championships = seasons.iter().filter(|v| v.champion).count() as u32;
            if seasons.len() < 2 {
                diags.push(
                    None,
                    DiagnosticKind::InsufficientSample,
                    format!("consistency/{manager}"),
                    format!("{} season; std and cv undefined", seasons.len()),
                );
            }
            let q = |xs: &[f64], p: f64| Stat::from_option(stats::quantile(xs, p));
            OutcomeDistribution {
                manager: manager.to_string(),
                seasons_played: seasons.len(),
                mean_wins: stats::mean_stat(&wins),
                median_wins: stats::median_stat(&wins),
                std_wins: stats::std_stat(&wins),
                cv_wins: Stat::from_option(stats::coefficient_of_variation(&wins)),
                p25_wins: q(&wins, 0.25),
                p50_wins: q(&wins, 0.50),
                p75_wins: q(&wins, 0.75),
                min_wins: Stat::from_option(stats::min(&wins)),
                max_wins: Stat::from_option(stats::max(&wins)),
                championships,
                championship_rate: stats::ratio_stat(championships as f64, seasons.len() as f64),
                mean_var: stats::mean_stat(&var),
                median_var: stats::median_stat(&var),
                std_var: stats::std_stat(&var),
                cv_var: Stat::from_option(stats::coefficient_of_variation(&var)),
                p25_var: q(&var, 0.25),
                p75_var: q(&var, 0.75),
                mean_var_per_dollar: stats::mean_stat(&vpd),
                median_var_per_dollar: stats::median_stat(&vpd),
                std_var_per_dollar: stats::std_stat(&vpd),
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsistencyScore {
    pub manager: String,
    pub seasons_played: usize,
    /// 0-100 across managers; 50 when every manager scores the same.
    pub score_wins: Stat,
    pub score_var: Stat,
}

/// `median / (1 + std)` per manager, min-max scaled to 0-100. A single season
/// scores its median.
pub fn consistency_scores(dists: &[OutcomeDistribution]) -> Vec<ConsistencyScore> {
    let raw_wins: Vec<Option<f64>> = dists
        .iter()
        .map(|d| raw_score(d.seasons_played, d.median_wins, d.std_wins))
        .collect();
    let raw_var: Vec<Option<f64>> = dists
        .iter()
        .map(|d| raw_score(d.seasons_played, d.median_var, d.std_var))
        .collect();
    let wins = min_max_scale(&raw_wins);
    let var = min_max_scale(&raw_var);

    let mut out: Vec<ConsistencyScore> = dists
        .iter()
        .zip(wins.into_iter().zip(var))
        .map(|(d, (score_wins, score_var))| ConsistencyScore {
            manager: d.manager.clone(),
            seasons_played: d.seasons_played,
            score_wins,
            score_var,
        })
        .collect();
    out.sort_by(|a, b| {
        let sa = a.score_wins.value().unwrap_or(f64::NEG_INFINITY);
        let sb = b.score_wins.value().unwrap_or(f64::NEG_INFINITY);
        sb.total_cmp(&sa).then(a.manager.cmp(&b.manager))
    });
    out
}

fn raw_score(seasons: usize, median: Stat, std: Stat) -> Option<f64> {
    let median = median.value()?;
    if seasons == 1 {
        return Some(median);
    }
    let std = std.value().unwrap_or(0.0);
    Some(median / (1.0 + std))
}

fn min_max_scale(raw: &[Option<f64>]) -> Vec<Stat> {
    let present: Vec<f64> = raw.iter().flatten().copied().collect();
    let (Some(lo), Some(hi)) = (stats::min(&present), stats::max(&present)) else {
        return vec![Stat::InsufficientData; raw.len()];
    };
    raw.iter()
        .map(|v| match v {
            None => Stat::InsufficientData,
            Some(_) if hi <= lo => Stat::Value(50.0),
            Some(v) => Stat::from_f64((v - lo) / (hi - lo) * 100.0),
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsistencyArchetype {
    ConsistentContender,
    BoomBust,
    Lottery,
    SteadyButUnlucky,
    LowSample,
    Unclassified,
}

impl ConsistencyArchetype {
    pub fn label(self) -> &'static str {
        match self {
            ConsistencyArchetype::ConsistentContender => "CONSISTENT_CONTENDER",
            ConsistencyArchetype::BoomBust => "BOOM_BUST",
            ConsistencyArchetype::Lottery => "LOTTERY",
            ConsistencyArchetype::SteadyButUnlucky => "STEADY_BUT_UNLUCKY",
            ConsistencyArchetype::LowSample => "LOW_SAMPLE",
            ConsistencyArchetype::Unclassified => "UNCLASSIFIED",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsistencyArchetypeRow {
    pub manager: String,
    pub seasons_played: usize,
    pub archetype: ConsistencyArchetype,
    pub median_wins: Stat,
    pub std_wins: Stat,
    pub championships: u32,
    pub championship_rate: Stat,
}

/// League-relative volatility archetypes. Lottery outranks boom-bust, which
/// outranks contender; the remaining labels only fill unclassified managers.
pub fn consistency_archetypes(dists: &[OutcomeDistribution]) -> Vec<ConsistencyArchetypeRow> {
    let medians: Vec<f64> = dists.iter().filter_map(|d| d.median_wins.value()).collect();
    let stds: Vec<f64> = dists.iter().filter_map(|d| d.std_wins.value()).collect();
    let league_median_wins = stats::median(&medians);
    let league_p60_wins = stats::quantile(&medians, 0.60);
    let league_median_std = stats::median(&stds);
    let league_p75_std = stats::quantile(&stds, 0.75);

    // comparisons against an undefined value never hold
    let ge = |a: Option<f64>, b: Option<f64>| matches!((a, b), (Some(a), Some(b)) if a >= b);
    let le = |a: Option<f64>, b: Option<f64>| matches!((a, b), (Some(a), Some(b)) if a <= b);
    let lt = |a: Option<f64>, b: Option<f64>| matches!((a, b), (Some(a), Some(b)) if a < b);

    let out: Vec<ConsistencyArchetypeRow> = dists
        .iter()
        .map(|d| {
            let median = d.median_wins.value();
            let std = d.std_wins.value();
            let archetype = if d.championships >= 1 && lt(median, league_median_wins) {
                ConsistencyArchetype::Lottery
            } else if ge(std, league_p75_std) {
                ConsistencyArchetype::BoomBust
            } else if ge(median, league_median_wins) && le(std, league_median_std) {
                ConsistencyArchetype::ConsistentContender
            } else if d.championships == 0 && ge(median, league_p60_wins) {
                ConsistencyArchetype::SteadyButUnlucky
            } else if d.seasons_played < MIN_SEASONS_FOR_PROFILE {
                ConsistencyArchetype::LowSample
            } else {
                ConsistencyArchetype::Unclassified
            };
            ConsistencyArchetypeRow {
                manager: d.manager.clone(),
                seasons_played: d.seasons_played,
                archetype,
                median_wins: d.median_wins,
                std_wins: d.std_wins,
                championships: d.championships,
                championship_rate: d.championship_rate,
            }
        })
        .collect();
    info!(managers = out.len(), "classified consistency archetypes");
    out
}
