use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::info;

use crate::records::{
    DraftPick, LeagueSettings, LeagueTables, Matchup, PlayerSeasonResult, Position, Season,
    TeamSeason, Transaction, TransactionKind,
};

const MANAGERS: [&str; 12] = [
    "Avery", "Blake", "Casey", "Devon", "Emery", "Finley", "Gray", "Harper", "Indy", "Jordan",
    "Kai", "Logan",
];
const REGULAR_SEASON_WEEKS: u32 = 13;
const KEEPER_RAISE: f64 = 5.0;

/// A plausible keeper league with a fixed seed, for demos and benchmarks.
#[derive(Debug, Clone)]
pub struct SyntheticLeague {
    pub seed: u64,
    pub num_teams: u32,
    pub first_season: Season,
    pub seasons: u32,
    pub auction_budget: f64,
}

impl Default for SyntheticLeague {
    fn default() -> Self {
        Self {
            seed: 7,
            num_teams: 12,
            first_season: 2015,
            seasons: 6,
            auction_budget: 200.0,
        }
    }
}

struct Player {
    id: String,
    name: String,
    position: Position,
    talent: f64,
}

fn pool_size(pos: Position) -> usize {
    match pos {
        Position::QB => 32,
        Position::RB => 80,
        Position::WR => 100,
        Position::TE => 32,
        Position::K => 32,
        Position::DEF => 32,
    }
}

fn talent_range(pos: Position) -> (f64, f64) {
    match pos {
        Position::QB => (160.0, 380.0),
        Position::RB => (40.0, 300.0),
        Position::WR => (40.0, 300.0),
        Position::TE => (30.0, 220.0),
        Position::K => (90.0, 160.0),
        Position::DEF => (60.0, 160.0),
    }
}

fn top_price(pos: Position) -> f64 {
    match pos {
        Position::QB => 35.0,
        Position::RB => 65.0,
        Position::WR => 60.0,
        Position::TE => 30.0,
        Position::K => 2.0,
        Position::DEF => 3.0,
    }
}

/// Roster spots drafted beyond starters, per team.
fn depth(pos: Position) -> u32 {
    match pos {
        Position::QB | Position::TE => 1,
        Position::RB | Position::WR => 2,
        Position::K | Position::DEF => 0,
    }
}

impl SyntheticLeague {
    pub fn generate(&self) -> LeagueTables {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let players = self.player_pool(&mut rng);
        let teams: Vec<String> = (1..=self.num_teams).map(|i| format!("t{i}")).collect();
        let mut tables = LeagueTables::default();
        let mut prev_rosters: HashMap<String, Vec<(usize, f64, f64)>> = HashMap::new();

        for offset in 0..self.seasons {
            let season = self.first_season + offset as Season;
            let mut settings = LeagueSettings::defaults(season);
            settings.num_teams = self.num_teams;
            settings.auction_budget = self.auction_budget;
            settings.season_start = NaiveDate::from_ymd_opt(season, 9, 5);

            let points: Vec<Option<f64>> = players
                .iter()
                .map(|p| {
                    if rng.gen_bool(0.03) {
                        None
                    } else {
                        Some((p.talent * rng.gen_range(0.55..1.3) * 10.0).round() / 10.0)
                    }
                })
                .collect();

            let picks = self.draft(&mut rng, season, &settings, &players, &teams, &prev_rosters);
            let mut rosters: HashMap<String, Vec<usize>> = HashMap::new();
            let index_of: HashMap<&str, usize> =
                players.iter().enumerate().map(|(i, p)| (p.id.as_str(), i)).collect();
            let mut next_prev: HashMap<String, Vec<(usize, f64, f64)>> = HashMap::new();
            for pick in &picks {
                let Some(&idx) = index_of.get(pick.player_id.as_str()) else {
                    continue;
                };
                rosters.entry(pick.team_id.clone()).or_default().push(idx);
                let price = if pick.is_keeper { pick.effective_keeper_cost() } else { pick.cost };
                next_prev
                    .entry(pick.team_id.clone())
                    .or_default()
                    .push((idx, price, points[idx].unwrap_or(0.0)));
            }

            for (idx, p) in players.iter().enumerate() {
                let Some(total) = points[idx] else { continue };
                tables.results.push(PlayerSeasonResult {
                    season,
                    player_id: p.id.clone(),
                    player_name: p.name.clone(),
                    position: p.position,
                    fantasy_points_total: Some(total),
                    games_played: Some(rng.gen_range(10..=17)),
                });
            }

            let drafted: HashSet<usize> = rosters.values().flatten().copied().collect();
            tables.transactions.extend(self.transactions(
                &mut rng, season, &settings, &players, &teams, &rosters, &drafted,
            ));
            let (standings, matchups) = self.play_season(&mut rng, season, &teams, &rosters, &points);
            tables.teams.extend(standings);
            tables.matchups.extend(matchups);
            tables.drafts.extend(picks);
            tables.settings.push(settings);
            prev_rosters = next_prev;
        }

        info!(
            seed = self.seed,
            seasons = self.seasons,
            picks = tables.drafts.len(),
            results = tables.results.len(),
            transactions = tables.transactions.len(),
            "generated synthetic league"
        );
        tables
    }

    fn player_pool(&self, rng: &mut StdRng) -> Vec<Player> {
        let mut out = Vec::new();
        for pos in Position::ALL {
            let (lo, hi) = talent_range(pos);
            for n in 1..=pool_size(pos) {
                out.push(Player {
                    id: format!("{}{n:03}", pos.label().to_ascii_lowercase()),
                    name: format!("{} Player {n}", pos.label()),
                    position: pos,
                    talent: rng.gen_range(lo..hi),
                });
            }
        }
        out
    }

    /// Keepers first (best points per dollar from last season's roster), then an
    /// auction priced on projected rank.
    fn draft(
        &self,
        rng: &mut StdRng,
        season: Season,
        settings: &LeagueSettings,
        players: &[Player],
        teams: &[String],
        prev_rosters: &HashMap<String, Vec<(usize, f64, f64)>>,
    ) -> Vec<DraftPick> {
        let roster_size = (settings.total_starters() + settings.bench_slots) as usize;
        let mut picks = Vec::new();
        let mut taken: HashSet<usize> = HashSet::new();
        let mut filled: BTreeMap<&str, usize> = teams.iter().map(|t| (t.as_str(), 0)).collect();

        for team in teams {
            let Some(prev) = prev_rosters.get(team) else { continue };
            let mut candidates = prev.clone();
            candidates.sort_by(|a, b| (b.2 / b.1.max(1.0)).total_cmp(&(a.2 / a.1.max(1.0))));
            for &(idx, price, _) in candidates.iter().take(settings.num_keepers as usize) {
                let p = &players[idx];
                let keeper_cost = price + KEEPER_RAISE;
                taken.insert(idx);
                *filled.entry(team.as_str()).or_default() += 1;
                picks.push(DraftPick {
                    season,
                    round: 0,
                    pick_number: 0,
                    team_id: team.clone(),
                    player_id: p.id.clone(),
                    player_name: p.name.clone(),
                    position: p.position,
                    cost: keeper_cost,
                    is_keeper: true,
                    keeper_cost: Some(keeper_cost),
                });
            }
        }

        let mut auction: Vec<(usize, f64)> = Vec::new();
        for pos in Position::ALL {
            let mut projected: Vec<(usize, f64)> = players
                .iter()
                .enumerate()
                .filter(|(i, p)| p.position == pos && !taken.contains(i))
                .map(|(i, p)| (i, p.talent * rng.gen_range(0.85..1.15)))
                .collect();
            projected.sort_by(|a, b| b.1.total_cmp(&a.1));
            let wanted = (settings.num_teams * (settings.starters_at(pos) + depth(pos))) as usize;
            let n = wanted.min(projected.len()).max(1) as f64;
            for (rank, &(idx, _)) in projected.iter().take(wanted).enumerate() {
                let share = (n - rank as f64) / n;
                let cost = (1.0 + top_price(pos) * share * share * rng.gen_range(0.8..1.2)).round();
                auction.push((idx, cost));
            }
        }
        auction.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

        let mut order: Vec<&str> = teams.iter().map(String::as_str).collect();
        for (pick_number, (idx, cost)) in auction.into_iter().enumerate() {
            order.shuffle(rng);
            let Some(team) = order
                .iter()
                .copied()
                .filter(|t| filled.get(t).copied().unwrap_or(0) < roster_size)
                .min_by_key(|t| filled.get(t).copied().unwrap_or(0))
            else {
                break;
            };
            *filled.entry(team).or_default() += 1;
            let p = &players[idx];
            picks.push(DraftPick {
                season,
                round: (pick_number / teams.len().max(1)) as u32 + 1,
                pick_number: pick_number as u32 + 1,
                team_id: team.to_string(),
                player_id: p.id.clone(),
                player_name: p.name.clone(),
                position: p.position,
                cost,
                is_keeper: false,
                keeper_cost: None,
            });
        }
        picks
    }

    #[allow(clippy::too_many_arguments)]
    fn transactions(
        &self,
        rng: &mut StdRng,
        season: Season,
        settings: &LeagueSettings,
        players: &[Player],
        teams: &[String],
        rosters: &HashMap<String, Vec<usize>>,
        drafted: &HashSet<usize>,
    ) -> Vec<Transaction> {
        let start = settings
            .season_start
            .and_then(|d| d.and_hms_opt(12, 0, 0))
            .map(|dt| dt.and_utc().timestamp())
            .unwrap_or(0);
        let mut undrafted: Vec<usize> = (0..players.len()).filter(|i| !drafted.contains(i)).collect();
        undrafted.shuffle(rng);
        let mut out = Vec::new();
        let mut txn = 0u32;

        let adds = (teams.len() * 4).min(undrafted.len());
        for &idx in undrafted.iter().take(adds) {
            txn += 1;
            let team = &teams[rng.gen_range(0..teams.len())];
            let week = rng.gen_range(1..=REGULAR_SEASON_WEEKS) as i64;
            let timestamp = start + (week - 1) * 7 * 86_400 + rng.gen_range(0..86_400);
            let waiver = rng.gen_bool(0.7);
            let p = &players[idx];
            out.push(Transaction {
                season,
                transaction_id: format!("{season}-{txn}"),
                timestamp,
                kind: TransactionKind::Add,
                player_id: p.id.clone(),
                player_name: p.name.clone(),
                from_team_id: None,
                to_team_id: Some(team.clone()),
                faab_bid: waiver.then(|| rng.gen_range(1..25) as f64),
                waiver_priority: None,
            });
            if let Some(roster) = rosters.get(team)
                && let Some(&dropped) = roster.choose(rng)
            {
                let d = &players[dropped];
                out.push(Transaction {
                    season,
                    transaction_id: format!("{season}-{txn}"),
                    timestamp,
                    kind: TransactionKind::Drop,
                    player_id: d.id.clone(),
                    player_name: d.name.clone(),
                    from_team_id: Some(team.clone()),
                    to_team_id: None,
                    faab_bid: None,
                    waiver_priority: None,
                });
            }
        }

        for _ in 0..3 {
            if teams.len() < 2 {
                break;
            }
            let picked: Vec<&String> = teams.choose_multiple(rng, 2).collect();
            let (a, b) = (picked[0], picked[1]);
            let (Some(ra), Some(rb)) = (rosters.get(a), rosters.get(b)) else {
                continue;
            };
            let (Some(&pa), Some(&pb)) = (ra.choose(rng), rb.choose(rng)) else {
                continue;
            };
            txn += 1;
            let timestamp = start + rng.gen_range(2..10) * 7 * 86_400;
            for (idx, from, to) in [(pa, a, b), (pb, b, a)] {
                let p = &players[idx];
                out.push(Transaction {
                    season,
                    transaction_id: format!("{season}-{txn}"),
                    timestamp,
                    kind: TransactionKind::Trade,
                    player_id: p.id.clone(),
                    player_name: p.name.clone(),
                    from_team_id: Some(from.clone()),
                    to_team_id: Some(to.clone()),
                    faab_bid: None,
                    waiver_priority: None,
                });
            }
        }
        out
    }

    /// Round-robin schedule; weekly score tracks the roster's season points.
    fn play_season(
        &self,
        rng: &mut StdRng,
        season: Season,
        teams: &[String],
        rosters: &HashMap<String, Vec<usize>>,
        points: &[Option<f64>],
    ) -> (Vec<TeamSeason>, Vec<Matchup>) {
        let strength: HashMap<&str, f64> = teams
            .iter()
            .map(|t| {
                let mut pts: Vec<f64> = rosters
                    .get(t)
                    .map(|r| r.iter().filter_map(|&i| points[i]).collect())
                    .unwrap_or_default();
                pts.sort_by(|a, b| b.total_cmp(a));
                let starters: f64 = pts.iter().take(9).sum();
                (t.as_str(), starters / 17.0)
            })
            .collect();

        let mut ring: Vec<&str> = teams.iter().map(String::as_str).collect();
        let mut matchups = Vec::new();
        let mut record: HashMap<&str, (u32, u32, f64, f64)> = HashMap::new();
        for week in 1..=REGULAR_SEASON_WEEKS {
            let n = ring.len();
            for i in 0..n / 2 {
                let (a, b) = (ring[i], ring[n - 1 - i]);
                let pa = (strength.get(a).copied().unwrap_or(80.0) * rng.gen_range(0.7..1.3) * 10.0).round() / 10.0;
                let pb = (strength.get(b).copied().unwrap_or(80.0) * rng.gen_range(0.7..1.3) * 10.0).round() / 10.0;
                let winner = if pa >= pb { a } else { b };
                let ea = record.entry(a).or_default();
                ea.2 += pa;
                ea.3 += pb;
                if winner == a { ea.0 += 1 } else { ea.1 += 1 }
                let eb = record.entry(b).or_default();
                eb.2 += pb;
                eb.3 += pa;
                if winner == b { eb.0 += 1 } else { eb.1 += 1 }
                matchups.push(Matchup {
                    season,
                    week,
                    team1_id: a.to_string(),
                    team2_id: b.to_string(),
                    team1_points: pa,
                    team2_points: pb,
                    winner_team_id: Some(winner.to_string()),
                });
            }
            // circle method: first slot fixed
            if n > 2 {
                let last = ring.remove(n - 1);
                ring.insert(1, last);
            }
        }

        let mut order: Vec<&str> = teams.iter().map(String::as_str).collect();
        order.sort_by(|a, b| {
            let ra = record.get(a).copied().unwrap_or_default();
            let rb = record.get(b).copied().unwrap_or_default();
            rb.0.cmp(&ra.0).then(rb.2.total_cmp(&ra.2))
        });
        let standings = order
            .iter()
            .enumerate()
            .map(|(rank, team)| {
                let (wins, losses, pf, pa) = record.get(team).copied().unwrap_or_default();
                let idx: usize = team.trim_start_matches('t').parse().unwrap_or(1);
                let manager = MANAGERS
                    .get(idx.saturating_sub(1))
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("Manager {idx}"));
                TeamSeason {
                    season,
                    team_id: team.to_string(),
                    manager,
                    wins,
                    losses,
                    ties: 0,
                    points_for: (pf * 10.0).round() / 10.0,
                    points_against: (pa * 10.0).round() / 10.0,
                    final_rank: Some(rank as u32 + 1),
                }
            })
            .collect();
        (standings, matchups)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_league() {
        let cfg = SyntheticLeague {
            seasons: 2,
            ..Default::default()
        };
        let a = cfg.generate();
        let b = cfg.generate();
        assert_eq!(a.drafts, b.drafts);
        assert_eq!(a.transactions, b.transactions);
    }

    #[test]
    fn rosters_respect_size_and_keepers_carry_over() {
        let league = SyntheticLeague {
            seasons: 2,
            ..Default::default()
        }
        .generate();
        let first = league.drafts.iter().filter(|p| p.season == 2015).count();
        assert_eq!(first, 12 * 14);
        let keepers = league.drafts.iter().filter(|p| p.season == 2016 && p.is_keeper).count();
        assert_eq!(keepers, 12 * 2);
        assert!(league.drafts.iter().all(|p| p.cost >= 1.0));
        assert_eq!(league.teams.iter().filter(|t| t.is_champion()).count(), 2);
        assert_eq!(league.matchups.iter().filter(|m| m.season == 2015).count(), 13 * 6);
    }
}
