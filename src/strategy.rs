use std::collections::{BTreeMap, BTreeSet};

use tracing::info;

use crate::records::{
    AcquisitionType, Archetype, LifecycleRecord, ManagerStrategyProfile, Season, TeamManagers,
};
use crate::stats::{self, Stat};

const DRAFT_HEAVY_PCT: f64 = 60.0;
const WAIVER_HEAVY_PCT: f64 = 30.0;
const TRADE_HEAVY_PCT: f64 = 20.0;
const QUIET_PCT: f64 = 10.0;

/// First matching rule wins, so draft-and-hold beats waiver-hawk and trader.
pub fn classify_archetype(pct_draft: f64, pct_waiver: f64, pct_trade: f64) -> Archetype {
    if pct_draft > DRAFT_HEAVY_PCT && pct_waiver < QUIET_PCT {
        Archetype::DraftAndHold
    } else if pct_waiver > WAIVER_HEAVY_PCT {
        Archetype::WaiverHawk
    } else if pct_trade > TRADE_HEAVY_PCT {
        Archetype::Trader
    } else if pct_waiver < QUIET_PCT && pct_trade < QUIET_PCT {
        Archetype::Passive
    } else {
        Archetype::Balanced
    }
}

#[derive(Default)]
struct ChannelTotals<'a> {
    draft: f64,
    keeper: f64,
    waiver: f64,
    trade: f64,
    faab_spent: f64,
    players: BTreeSet<&'a str>,
}

pub fn build_strategy_profiles(
    lifecycle: &[LifecycleRecord],
    managers: &TeamManagers,
) -> Vec<ManagerStrategyProfile> {
    let mut groups: BTreeMap<(Season, String), ChannelTotals> = BTreeMap::new();
    for rec in lifecycle {
        let manager = managers.manager_for(rec.season, &rec.team_id);
        let totals = groups.entry((rec.season, manager)).or_default();
        totals.players.insert(rec.player_id.as_str());
        if matches!(rec.acquisition_type, AcquisitionType::Waiver | AcquisitionType::FreeAgent) {
            totals.faab_spent += rec.acquisition_cost;
        }
        let Some(var) = rec.var_total else { continue };
        match rec.acquisition_type {
            AcquisitionType::Draft => totals.draft += var,
            AcquisitionType::Keeper => totals.keeper += var,
            AcquisitionType::Waiver | AcquisitionType::FreeAgent => totals.waiver += var,
            AcquisitionType::Trade => totals.trade += var,
        }
    }

    let out: Vec<ManagerStrategyProfile> = groups
        .into_iter()
        .map(|((season, manager), t)| {
            let total = t.draft + t.keeper + t.waiver + t.trade;
            let pct = |v: f64| if total != 0.0 { v / total * 100.0 } else { 0.0 };
            let (pd, pk, pw, pt) = (pct(t.draft), pct(t.keeper), pct(t.waiver), pct(t.trade));
            let faab_efficiency = if t.faab_spent > 0.0 {
                stats::ratio_stat(t.waiver, t.faab_spent)
            } else {
                Stat::NotApplicable
            };
            ManagerStrategyProfile {
                season,
                manager,
                draft_var: t.draft,
                keeper_var: t.keeper,
                waiver_var: t.waiver,
                trade_var: t.trade,
                total_var: total,
                pct_var_from_draft: pd,
                pct_var_from_keeper: pk,
                pct_var_from_waiver: pw,
                pct_var_from_trade: pt,
                faab_spent: t.faab_spent,
                faab_efficiency,
                unique_players: t.players.len() as u32,
                archetype: classify_archetype(pd, pw, pt),
            }
        })
        .collect();

    info!(profiles = out.len(), "built manager strategy profiles");
    out
}
