use std::collections::{BTreeMap, BTreeSet, HashSet};

use chrono::{DateTime, NaiveDate};
use serde::Serialize;
use tracing::info;

use crate::records::{
    AcquisitionType, DraftPick, LeagueSettings, LifecycleRecord, Position, Season, TeamManagers,
    Transaction, TransactionKind,
};
use crate::stats::{self, Stat};
use crate::var::VarTable;

pub const LAST_REGULAR_WEEK: u32 = 17;

/// One way a player landed on a roster during a season.
#[derive(Debug, Clone, PartialEq)]
pub struct AcquisitionEvent {
    pub season: Season,
    pub player_id: String,
    pub player_name: String,
    pub position: Option<Position>,
    pub team_id: String,
    pub acquisition_type: AcquisitionType,
    pub week: u32,
    /// Draft events sort before any transaction.
    pub timestamp: i64,
    pub cost: f64,
}

fn season_start(season: Season, settings: Option<&LeagueSettings>) -> Option<NaiveDate> {
    settings
        .and_then(|s| s.season_start)
        .or_else(|| NaiveDate::from_ymd_opt(season, 9, 5))
}

/// Week of the fantasy season a unix timestamp falls in; 0 before kickoff, capped at 17.
pub fn week_of(timestamp: i64, season: Season, settings: Option<&LeagueSettings>) -> u32 {
    let Some(start) = season_start(season, settings) else {
        return 0;
    };
    let Some(at) = DateTime::from_timestamp(timestamp, 0) else {
        return 0;
    };
    let days = (at.date_naive() - start).num_days();
    if days < 0 {
        return 0;
    }
    ((days / 7) as u32 + 1).min(LAST_REGULAR_WEEK)
}

pub fn acquisition_events(
    picks: &[DraftPick],
    transactions: &[Transaction],
    settings: &BTreeMap<Season, LeagueSettings>,
) -> Vec<AcquisitionEvent> {
    let mut events = Vec::with_capacity(picks.len() + transactions.len());

    for pick in picks {
        let (acquisition_type, cost) = if pick.is_keeper {
            (AcquisitionType::Keeper, pick.effective_keeper_cost())
        } else {
            (AcquisitionType::Draft, pick.cost)
        };
        events.push(AcquisitionEvent {
            season: pick.season,
            player_id: pick.player_id.clone(),
            player_name: pick.player_name.clone(),
            position: Some(pick.position),
            team_id: pick.team_id.clone(),
            acquisition_type,
            week: 0,
            timestamp: i64::MIN,
            cost,
        });
    }

    for txn in transactions {
        let Some(team_id) = txn.to_team_id.as_ref().filter(|t| !t.is_empty()) else {
            continue;
        };
        let (acquisition_type, cost) = match txn.kind {
            TransactionKind::Drop => continue,
            TransactionKind::Trade => (AcquisitionType::Trade, 0.0),
            TransactionKind::Add => {
                let bid = txn.faab_bid.unwrap_or(0.0);
                if bid > 0.0 || txn.waiver_priority.is_some() {
                    (AcquisitionType::Waiver, bid)
                } else {
                    (AcquisitionType::FreeAgent, 0.0)
                }
            }
        };
        events.push(AcquisitionEvent {
            season: txn.season,
            player_id: txn.player_id.clone(),
            player_name: txn.player_name.clone(),
            position: None,
            team_id: team_id.clone(),
            acquisition_type,
            week: week_of(txn.timestamp, txn.season, settings.get(&txn.season)),
            timestamp: txn.timestamp,
            cost,
        });
    }
    events
}

/// (season, player_id) for every keeper pick.
pub fn keeper_set(picks: &[DraftPick]) -> HashSet<(Season, String)> {
    picks
        .iter()
        .filter(|p| p.is_keeper)
        .map(|p| (p.season, p.player_id.clone()))
        .collect()
}

/// One record per player-season; the owning acquisition takes the season's VAR.
///
/// A draft or keeper pick owns the season. Otherwise the earliest waiver or
/// free-agent add does, and only then the earliest trade-in. Mid-season
/// movement is not split.
pub fn build_lifecycle(
    events: &[AcquisitionEvent],
    values: &VarTable,
    keepers: &HashSet<(Season, String)>,
) -> Vec<LifecycleRecord> {
    let mut by_player: BTreeMap<(Season, &str), Vec<&AcquisitionEvent>> = BTreeMap::new();
    for ev in events {
        by_player
            .entry((ev.season, ev.player_id.as_str()))
            .or_default()
            .push(ev);
    }

    let mut out = Vec::with_capacity(by_player.len());
    for ((season, player_id), mut group) in by_player {
        // draft or keeper first, then the earliest add, then the earliest trade-in
        group.sort_by(|a, b| {
            a.acquisition_type
                .precedence()
                .cmp(&b.acquisition_type.precedence())
                .then(a.week.cmp(&b.week))
                .then(a.timestamp.cmp(&b.timestamp))
        });
        let Some(first) = group.first() else { continue };
        let teams: BTreeSet<&str> = group.iter().map(|e| e.team_id.as_str()).collect();
        let value = values.get(season, player_id);

        let player_name = if first.player_name.is_empty() {
            value.map(|v| v.player_name.clone()).unwrap_or_default()
        } else {
            first.player_name.clone()
        };
        let position = group
            .iter()
            .find_map(|e| e.position)
            .or_else(|| value.map(|v| v.position));

        out.push(LifecycleRecord {
            season,
            player_id: player_id.to_string(),
            player_name,
            position,
            team_id: first.team_id.clone(),
            acquisition_type: first.acquisition_type,
            acquisition_week: first.week,
            acquisition_cost: first.cost,
            teams_played_for: teams.len() as u32,
            total_points: value.and_then(|v| v.points),
            var_total: value.and_then(|v| v.var),
            became_keeper: keepers.contains(&(season + 1, player_id.to_string())),
        });
    }

    info!(records = out.len(), events = events.len(), "built player lifecycle");
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeOutcome {
    Win,
    Loss,
    Neutral,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeImpactRow {
    pub season: Season,
    pub transaction_id: String,
    pub trade_week: u32,
    pub team_a: String,
    pub team_b: String,
    pub manager_a: String,
    pub manager_b: String,
    pub team_a_players: usize,
    pub team_b_players: usize,
    pub team_a_var_gained: f64,
    pub team_a_var_lost: f64,
    pub team_b_var_gained: f64,
    pub team_b_var_lost: f64,
    pub team_a_net_var: f64,
    pub team_b_net_var: f64,
    pub team_a_result: TradeOutcome,
    pub team_b_result: TradeOutcome,
}

/// Season VAR swing of every two-sided trade. Uses whole-season VAR as the
/// proxy for post-trade value.
pub fn trade_impact(
    transactions: &[Transaction],
    values: &VarTable,
    settings: &BTreeMap<Season, LeagueSettings>,
    managers: &TeamManagers,
) -> Vec<TradeImpactRow> {
    let mut trades: BTreeMap<(Season, &str), Vec<&Transaction>> = BTreeMap::new();
    for txn in transactions.iter().filter(|t| t.kind == TransactionKind::Trade) {
        trades
            .entry((txn.season, txn.transaction_id.as_str()))
            .or_default()
            .push(txn);
    }

    let mut out = Vec::new();
    for ((season, trade_id), legs) in trades {
        // receiving teams in order of appearance
        let mut teams: Vec<&str> = Vec::new();
        for leg in &legs {
            let Some(to) = leg.to_team_id.as_deref().filter(|t| !t.is_empty()) else {
                continue;
            };
            if !teams.contains(&to) {
                teams.push(to);
            }
        }
        if teams.len() < 2 {
            continue;
        }
        let (team_a, team_b) = (teams[0], teams[1]);

        let side = |team: &str| {
            let received: BTreeSet<&str> = legs
                .iter()
                .filter(|l| l.to_team_id.as_deref() == Some(team))
                .map(|l| l.player_id.as_str())
                .collect();
            let sent: BTreeSet<&str> = legs
                .iter()
                .filter(|l| l.from_team_id.as_deref() == Some(team))
                .map(|l| l.player_id.as_str())
                .collect();
            let gained: f64 = received.iter().filter_map(|p| values.var(season, p)).sum();
            let lost: f64 = sent.iter().filter_map(|p| values.var(season, p)).sum();
            (received.len(), gained, lost)
        };
        let (a_count, a_gained, a_lost) = side(team_a);
        let (b_count, b_gained, b_lost) = side(team_b);
        let a_net = a_gained - a_lost;
        let b_net = b_gained - b_lost;

        let week = legs
            .iter()
            .map(|l| week_of(l.timestamp, season, settings.get(&season)))
            .min()
            .unwrap_or(0);

        out.push(TradeImpactRow {
            season,
            transaction_id: trade_id.to_string(),
            trade_week: week,
            team_a: team_a.to_string(),
            team_b: team_b.to_string(),
            manager_a: managers.manager_for(season, team_a),
            manager_b: managers.manager_for(season, team_b),
            team_a_players: a_count,
            team_b_players: b_count,
            team_a_var_gained: a_gained,
            team_a_var_lost: a_lost,
            team_b_var_gained: b_gained,
            team_b_var_lost: b_lost,
            team_a_net_var: a_net,
            team_b_net_var: b_net,
            team_a_result: outcome(a_net, b_net),
            team_b_result: outcome(b_net, a_net),
        });
    }
    out
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WaiverPickupRow {
    pub season: Season,
    pub player_id: String,
    pub player_name: String,
    pub position: Option<Position>,
    pub team_id: String,
    pub manager: String,
    pub acquisition_type: AcquisitionType,
    pub acquisition_week: u32,
    pub acquisition_cost: f64,
    pub var_after_pickup: Option<f64>,
    /// VAR per FAAB dollar; n/a for free pickups.
    pub cost_efficiency: Stat,
    /// Share (0-100) of pickups at the same position with VAR at or below this one.
    pub var_percentile: Stat,
    pub became_keeper: bool,
}

/// Waiver and free-agent acquisitions that own their player-season.
pub fn waiver_pickups(lifecycle: &[LifecycleRecord], managers: &TeamManagers) -> Vec<WaiverPickupRow> {
    let pickups: Vec<&LifecycleRecord> = lifecycle
        .iter()
        .filter(|r| {
            matches!(
                r.acquisition_type,
                AcquisitionType::Waiver | AcquisitionType::FreeAgent
            )
        })
        .collect();

    let mut var_by_position: BTreeMap<Position, Vec<f64>> = BTreeMap::new();
    for r in &pickups {
        if let (Some(position), Some(var)) = (r.position, r.var_total) {
            var_by_position.entry(position).or_default().push(var);
        }
    }

    let out: Vec<WaiverPickupRow> = pickups
        .into_iter()
        .map(|r| {
            let cost_efficiency = match r.var_total {
                Some(var) if r.acquisition_cost > 0.0 => stats::ratio_stat(var, r.acquisition_cost),
                Some(_) => Stat::NotApplicable,
                None => Stat::InsufficientData,
            };
            let var_percentile = match (r.position.and_then(|p| var_by_position.get(&p)), r.var_total) {
                (Some(peers), Some(var)) => {
                    let at_or_below = peers.iter().filter(|v| **v <= var).count();
                    stats::ratio_stat(at_or_below as f64 * 100.0, peers.len() as f64)
                }
                _ => Stat::InsufficientData,
            };
            WaiverPickupRow {
                season: r.season,
                player_id: r.player_id.clone(),
                player_name: r.player_name.clone(),
                position: r.position,
                team_id: r.team_id.clone(),
                manager: managers.manager_for(r.season, &r.team_id),
                acquisition_type: r.acquisition_type,
                acquisition_week: r.acquisition_week,
                acquisition_cost: r.acquisition_cost,
                var_after_pickup: r.var_total,
                cost_efficiency,
                var_percentile,
                became_keeper: r.became_keeper,
            }
        })
        .collect();
    info!(pickups = out.len(), "analysed waiver pickups");
    out
}

fn outcome(own: f64, other: f64) -> TradeOutcome {
    if own > other {
        TradeOutcome::Win
    } else if own < other {
        TradeOutcome::Loss
    } else {
        TradeOutcome::Neutral
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::PlayerSeasonResult;
    use crate::var::replacement_baselines;
    use crate::diagnostics::Diagnostics;

    fn ts(y: i32, m: u32, d: u32) -> i64 {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
            .and_utc()
            .timestamp()
    }

    fn txn(id: &str, kind: TransactionKind, player: &str, from: Option<&str>, to: Option<&str>, at: i64) -> Transaction {
        Transaction {
            season: 2020,
            transaction_id: id.into(),
            timestamp: at,
            kind,
            player_id: player.into(),
            player_name: player.into(),
            from_team_id: from.map(Into::into),
            to_team_id: to.map(Into::into),
            faab_bid: None,
            waiver_priority: None,
        }
    }

    fn draft(season: Season, player: &str, team: &str, cost: f64, keeper: bool) -> DraftPick {
        DraftPick {
            season,
            round: 1,
            pick_number: 1,
            team_id: team.into(),
            player_id: player.into(),
            player_name: player.into(),
            position: Position::WR,
            cost,
            is_keeper: keeper,
            keeper_cost: keeper.then_some(cost + 5.0),
        }
    }

    fn values() -> VarTable {
        let mut settings = LeagueSettings::defaults(2020);
        settings.num_teams = 1;
        settings.starters_by_position.insert(Position::WR, 1);
        let results = vec![
            PlayerSeasonResult {
                season: 2020,
                player_id: "w1".into(),
                player_name: "w1".into(),
                position: Position::WR,
                fantasy_points_total: Some(200.0),
                games_played: None,
            },
            PlayerSeasonResult {
                season: 2020,
                player_id: "w2".into(),
                player_name: "w2".into(),
                position: Position::WR,
                fantasy_points_total: Some(150.0),
                games_played: None,
            },
            PlayerSeasonResult {
                season: 2020,
                player_id: "w3".into(),
                player_name: "w3".into(),
                position: Position::WR,
                fantasy_points_total: Some(180.0),
                games_played: None,
            },
        ];
        let b = replacement_baselines(2020, &results, &settings, &mut Diagnostics::new());
        VarTable::from_results(&results, &BTreeMap::from([(2020, b)]))
    }

    #[test]
    fn weeks_from_timestamps() {
        assert_eq!(week_of(ts(2020, 8, 20), 2020, None), 0);
        assert_eq!(week_of(ts(2020, 9, 5), 2020, None), 1);
        assert_eq!(week_of(ts(2020, 9, 12), 2020, None), 2);
        assert_eq!(week_of(ts(2021, 1, 30), 2020, None), 17);

        let mut s = LeagueSettings::defaults(2020);
        s.season_start = NaiveDate::from_ymd_opt(2020, 9, 10);
        assert_eq!(week_of(ts(2020, 9, 12), 2020, Some(&s)), 1);
    }

    #[test]
    fn add_channel_depends_on_bid_or_priority() {
        let mut paid = txn("1", TransactionKind::Add, "w2", None, Some("t2"), ts(2020, 9, 20));
        paid.faab_bid = Some(7.0);
        let mut claimed = txn("2", TransactionKind::Add, "w3", None, Some("t3"), ts(2020, 9, 20));
        claimed.waiver_priority = Some(4);
        let free = txn("3", TransactionKind::Add, "w4", None, Some("t3"), ts(2020, 9, 21));
        let dropped = txn("4", TransactionKind::Drop, "w5", Some("t3"), None, ts(2020, 9, 21));

        let events = acquisition_events(&[], &[paid, claimed, free, dropped], &BTreeMap::new());
        let kinds: Vec<_> = events.iter().map(|e| (e.acquisition_type, e.cost)).collect();
        assert_eq!(
            kinds,
            vec![
                (AcquisitionType::Waiver, 7.0),
                (AcquisitionType::Waiver, 0.0),
                (AcquisitionType::FreeAgent, 0.0),
            ]
        );
        assert!(events.iter().all(|e| e.week == 3));
    }

    #[test]
    fn first_acquisition_owns_the_season() {
        let picks = vec![draft(2020, "w1", "t1", 30.0, false), draft(2021, "w1", "t1", 30.0, true)];
        let txns = vec![
            txn("9", TransactionKind::Trade, "w1", Some("t1"), Some("t2"), ts(2020, 10, 20)),
            txn("9", TransactionKind::Trade, "w2", Some("t2"), Some("t1"), ts(2020, 10, 20)),
        ];
        let events = acquisition_events(&picks, &txns, &BTreeMap::new());
        let keepers = keeper_set(&picks);
        let records = build_lifecycle(&events, &values(), &keepers);

        let w1 = records.iter().find(|r| r.season == 2020 && r.player_id == "w1").unwrap();
        assert_eq!(w1.acquisition_type, AcquisitionType::Draft);
        assert_eq!(w1.team_id, "t1");
        assert_eq!(w1.teams_played_for, 2);
        assert_eq!(w1.var_total, Some(0.0));
        assert!(w1.became_keeper);

        let w2 = records.iter().find(|r| r.player_id == "w2").unwrap();
        assert_eq!(w2.acquisition_type, AcquisitionType::Trade);
        assert_eq!(w2.acquisition_cost, 0.0);
        assert_eq!(w2.position, Some(Position::WR));
        assert_eq!(w2.var_total, Some(-50.0));

        let kept = records.iter().find(|r| r.season == 2021).unwrap();
        assert_eq!(kept.acquisition_type, AcquisitionType::Keeper);
        assert_eq!(kept.acquisition_cost, 35.0);
    }

    #[test]
    fn waiver_claim_outranks_earlier_trade_in() {
        let mut claim = txn("12", TransactionKind::Add, "w3", None, Some("t3"), ts(2020, 10, 20));
        claim.faab_bid = Some(4.0);
        let txns = vec![
            txn("10", TransactionKind::Trade, "w3", Some("t1"), Some("t2"), ts(2020, 9, 20)),
            txn("11", TransactionKind::Drop, "w3", Some("t2"), None, ts(2020, 10, 13)),
            claim,
        ];
        let events = acquisition_events(&[], &txns, &BTreeMap::new());
        let records = build_lifecycle(&events, &values(), &HashSet::new());
        assert_eq!(records.len(), 1);
        let w3 = &records[0];
        assert_eq!(w3.acquisition_type, AcquisitionType::Waiver);
        assert_eq!(w3.team_id, "t3");
        assert_eq!(w3.acquisition_week, 7);
        assert_eq!(w3.acquisition_cost, 4.0);
        assert_eq!(w3.teams_played_for, 2);
        assert_eq!(w3.var_total, Some(-20.0));
    }

    #[test]
    fn pickups_rank_within_position() {
        let pickup = |id: &str, position: Position, kind: AcquisitionType, cost: f64, var: Option<f64>| LifecycleRecord {
            season: 2020,
            player_id: id.into(),
            player_name: id.into(),
            position: Some(position),
            team_id: "t1".into(),
            acquisition_type: kind,
            acquisition_week: 4,
            acquisition_cost: cost,
            teams_played_for: 1,
            total_points: var.map(|v| v + 100.0),
            var_total: var,
            became_keeper: id == "b",
        };
        let lifecycle = vec![
            pickup("a", Position::WR, AcquisitionType::Waiver, 10.0, Some(30.0)),
            pickup("b", Position::WR, AcquisitionType::FreeAgent, 0.0, Some(-10.0)),
            pickup("c", Position::WR, AcquisitionType::Waiver, 5.0, Some(5.0)),
            pickup("d", Position::WR, AcquisitionType::Waiver, 2.0, None),
            pickup("e", Position::RB, AcquisitionType::Waiver, 4.0, Some(8.0)),
            pickup("f", Position::WR, AcquisitionType::Draft, 40.0, Some(90.0)),
        ];
        let rows = waiver_pickups(&lifecycle, &TeamManagers::default());
        assert_eq!(rows.len(), 5);
        let get = |id: &str| rows.iter().find(|r| r.player_id == id).unwrap();

        assert_eq!(get("a").cost_efficiency, Stat::Value(3.0));
        assert_eq!(get("a").var_percentile, Stat::Value(100.0));
        assert_eq!(get("c").var_percentile, stats::ratio_stat(200.0, 3.0));
        assert_eq!(get("b").cost_efficiency, Stat::NotApplicable);
        assert!(get("b").became_keeper);
        assert_eq!(get("d").var_after_pickup, None);
        assert_eq!(get("d").cost_efficiency, Stat::InsufficientData);
        assert_eq!(get("d").var_percentile, Stat::InsufficientData);
        assert_eq!(get("e").var_percentile, Stat::Value(100.0));
        assert_eq!(get("e").manager, "t1");
    }

    #[test]
    fn trade_outcome_compares_net_var() {
        let txns = vec![
            txn("9", TransactionKind::Trade, "w1", Some("t1"), Some("t2"), ts(2020, 10, 20)),
            txn("9", TransactionKind::Trade, "w2", Some("t2"), Some("t1"), ts(2020, 10, 20)),
            txn("10", TransactionKind::Trade, "w3", Some("t1"), Some("t3"), ts(2020, 10, 22)),
        ];
        let rows = trade_impact(&txns, &values(), &BTreeMap::new(), &TeamManagers::default());
        assert_eq!(rows.len(), 1);
        let t = &rows[0];
        assert_eq!((t.team_a.as_str(), t.team_b.as_str()), ("t2", "t1"));
        // t2 gets w1 (0) for w2 (-50); t1 the reverse
        assert_eq!(t.team_a_net_var, 50.0);
        assert_eq!(t.team_b_net_var, -50.0);
        assert_eq!(t.team_a_result, TradeOutcome::Win);
        assert_eq!(t.team_b_result, TradeOutcome::Loss);
        assert_eq!(t.trade_week, 7);
        assert_eq!(t.manager_a, "t2");
    }
}
