use std::collections::BTreeMap;

use anyhow::Result;
use serde::Serialize;
use tracing::{debug, info};

use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::error::SchemaError;
use crate::records::{DraftPick, LeagueSettings, Season};

/// How a season's auction dollars compare once keeper money is taken out.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeasonFactor {
    pub season: Season,
    pub total_budget: f64,
    pub keeper_spend: f64,
    pub keepers_drafted: u32,
    pub open_spots: f64,
    pub effective_budget_per_spot: Option<f64>,
    /// baseline ebps / season ebps; multiply raw cost by this.
    pub price_factor: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct NormalizedPrices {
    /// Parallel to the picks slice passed to [`normalize_prices`].
    pub per_pick: Vec<Option<f64>>,
    pub factors: BTreeMap<Season, SeasonFactor>,
}

/// Fill in settings for every season that has drafts; missing seasons get defaults.
pub fn resolve_settings(
    seasons: &[Season],
    settings: &[LeagueSettings],
    diags: &mut Diagnostics,
) -> BTreeMap<Season, LeagueSettings> {
    let mut out: BTreeMap<Season, LeagueSettings> =
        settings.iter().map(|s| (s.season, s.clone())).collect();
    for &season in seasons {
        if out.contains_key(&season) {
            continue;
        }
        diags.push(
            Some(season),
            DiagnosticKind::DefaultSettings,
            "league_settings",
            "no settings for season; using 12-team $200 defaults",
        );
        out.insert(season, LeagueSettings::defaults(season));
    }
    out
}

/// `None` when keepers eat every slot or the budget.
pub fn effective_budget_per_spot(settings: &LeagueSettings, picks: &[DraftPick]) -> Option<f64> {
    season_factor(settings, picks).effective_budget_per_spot
}

fn season_factor(settings: &LeagueSettings, picks: &[DraftPick]) -> SeasonFactor {
    let teams = settings.num_teams as f64;
    let total_budget = teams * settings.auction_budget;
    let mut keeper_spend = 0.0;
    let mut keepers_drafted = 0u32;
    for pick in picks.iter().filter(|p| p.season == settings.season && p.is_keeper) {
        keeper_spend += pick.effective_keeper_cost();
        keepers_drafted += 1;
    }
    let slots = (settings.total_starters() + settings.bench_slots) as f64;
    let open_spots = teams * slots - teams * settings.num_keepers as f64;

    let effective_budget_per_spot = if open_spots <= 0.0 {
        None
    } else {
        let ebps = (total_budget - keeper_spend) / open_spots;
        (ebps.is_finite() && ebps > 0.0).then_some(ebps)
    };

    SeasonFactor {
        season: settings.season,
        total_budget,
        keeper_spend,
        keepers_drafted,
        open_spots,
        effective_budget_per_spot,
        price_factor: None,
    }
}

pub fn normalized_price(cost: f64, season_ebps: Option<f64>, baseline_ebps: Option<f64>) -> Option<f64> {
    let (season_ebps, baseline_ebps) = (season_ebps?, baseline_ebps?);
    if season_ebps <= 0.0 {
        return None;
    }
    Some(cost * baseline_ebps / season_ebps)
}

/// Rescale every pick's cost to the baseline season's dollars.
///
/// `settings` must cover the baseline season; seasons missing from it fall
/// back to defaults (see [`resolve_settings`]).
pub fn normalize_prices(
    picks: &[DraftPick],
    settings: &BTreeMap<Season, LeagueSettings>,
    baseline_season: Season,
    diags: &mut Diagnostics,
) -> Result<NormalizedPrices> {
    if !picks.iter().any(|p| p.season == baseline_season) && !settings.contains_key(&baseline_season) {
        return Err(SchemaError::UnknownBaselineSeason(baseline_season).into());
    }

    let mut seasons: Vec<Season> = picks.iter().map(|p| p.season).collect();
    seasons.push(baseline_season);
    seasons.sort_unstable();
    seasons.dedup();

    let mut factors = BTreeMap::new();
    for season in seasons {
        let season_settings = settings
            .get(&season)
            .cloned()
            .unwrap_or_else(|| LeagueSettings::defaults(season));
        let factor = season_factor(&season_settings, picks);
        if factor.effective_budget_per_spot.is_none() {
            diags.push(
                Some(season),
                DiagnosticKind::DegenerateNormalization,
                "effective_budget_per_spot",
                format!(
                    "budget {:.2} - keepers {:.2} over {} open spots",
                    factor.total_budget, factor.keeper_spend, factor.open_spots
                ),
            );
        }
        factors.insert(season, factor);
    }

    let baseline_ebps = factors
        .get(&baseline_season)
        .and_then(|f| f.effective_budget_per_spot);
    for factor in factors.values_mut() {
        factor.price_factor = match (baseline_ebps, factor.effective_budget_per_spot) {
            (Some(base), Some(own)) => Some(base / own),
            _ => None,
        };
        debug!(
            season = factor.season,
            ebps = ?factor.effective_budget_per_spot,
            factor = ?factor.price_factor,
            "season price factor"
        );
    }

    let per_pick = picks
        .iter()
        .map(|p| {
            let own = factors.get(&p.season).and_then(|f| f.effective_budget_per_spot);
            normalized_price(p.cost, own, baseline_ebps)
        })
        .collect::<Vec<_>>();

    info!(
        picks = picks.len(),
        seasons = factors.len(),
        baseline = baseline_season,
        "normalized auction prices"
    );
    Ok(NormalizedPrices { per_pick, factors })
}
