use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use tracing::{info, warn};

use crate::records::{Matchup, Season, TeamManagers, TeamSeason};
use crate::stats::{self, Stat};

const DEFAULT_REGULAR_SEASON_WEEKS: u32 = 13;
/// Wins above or below expectation that count as a lucky or unlucky season.
const LUCK_THRESHOLD: f64 = 1.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamWeek {
    pub season: Season,
    pub week: u32,
    pub team_id: String,
    pub manager: String,
    pub opponent_team_id: String,
    pub opponent_manager: String,
    pub points_for: f64,
    pub points_against: f64,
    pub won: bool,
    pub lost: bool,
}

/// Two rows per matchup, one from each side. Unplayed 0-0 weeks are dropped.
pub fn team_weeks(matchups: &[Matchup], managers: &TeamManagers) -> Vec<TeamWeek> {
    let mut out = Vec::with_capacity(matchups.len() * 2);
    for m in matchups {
        if m.team1_points == 0.0 && m.team2_points == 0.0 {
            continue;
        }
        let sides = [
            (&m.team1_id, &m.team2_id, m.team1_points, m.team2_points),
            (&m.team2_id, &m.team1_id, m.team2_points, m.team1_points),
        ];
        for (team, opp, pf, pa) in sides {
            let (won, lost) = match m.winner_team_id.as_deref() {
                Some(winner) => (winner == team.as_str(), winner == opp.as_str()),
                None => (pf > pa, pf < pa),
            };
            out.push(TeamWeek {
                season: m.season,
                week: m.week,
                team_id: team.clone(),
                manager: managers.manager_for(m.season, team),
                opponent_team_id: opp.clone(),
                opponent_manager: managers.manager_for(m.season, opp),
                points_for: pf,
                points_against: pa,
                won,
                lost,
            });
        }
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpectedWinsMethod {
    AllPlay,
    SeasonTotals,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpectedWins {
    pub season: Season,
    pub manager: String,
    pub expected_wins: f64,
    pub method: ExpectedWinsMethod,
}

/// All-play expected wins: each week a team beats everyone it outscored.
/// Falls back to ranking season point totals when no weekly scores exist.
pub fn expected_wins(
    weeks: &[TeamWeek],
    teams: &[TeamSeason],
    matchups: &[Matchup],
) -> Vec<ExpectedWins> {
    if weeks.iter().any(|w| w.points_for > 0.0) {
        return all_play_expected_wins(weeks);
    }
    if teams.is_empty() {
        warn!("cannot compute expected wins without weekly scores or standings");
        return Vec::new();
    }
    info!("weekly points unavailable, using season totals approximation");
    season_total_expected_wins(teams, matchups)
}

fn all_play_expected_wins(weeks: &[TeamWeek]) -> Vec<ExpectedWins> {
    let mut by_week: BTreeMap<(Season, u32), Vec<&TeamWeek>> = BTreeMap::new();
    for w in weeks {
        by_week.entry((w.season, w.week)).or_default().push(w);
    }

    let mut totals: BTreeMap<(Season, String), f64> = BTreeMap::new();
    for ((season, _week), slate) in by_week {
        let n = slate.len();
        if n < 2 {
            continue;
        }
        for w in &slate {
            // "min" ranking: ties share the best rank
            let rank = 1 + slate.iter().filter(|o| o.points_for > w.points_for).count();
            let share = (n - rank) as f64 / (n - 1) as f64;
            *totals.entry((season, w.manager.clone())).or_default() += share;
        }
    }

    totals
        .into_iter()
        .map(|((season, manager), expected_wins)| ExpectedWins {
            season,
            manager,
            expected_wins,
            method: ExpectedWinsMethod::AllPlay,
        })
        .collect()
}

fn season_total_expected_wins(teams: &[TeamSeason], matchups: &[Matchup]) -> Vec<ExpectedWins> {
    let mut weeks_per_season: HashMap<Season, u32> = HashMap::new();
    for m in matchups {
        let w = weeks_per_season.entry(m.season).or_default();
        *w = (*w).max(m.week);
    }

    let mut by_season: BTreeMap<Season, Vec<&TeamSeason>> = BTreeMap::new();
    for t in teams {
        by_season.entry(t.season).or_default().push(t);
    }

    let mut totals: BTreeMap<(Season, String), f64> = BTreeMap::new();
    for (season, mut standings) in by_season {
        let n = standings.len();
        if n < 2 {
            continue;
        }
        standings.sort_by(|a, b| b.points_for.total_cmp(&a.points_for).then(a.team_id.cmp(&b.team_id)));
        let num_weeks = weeks_per_season
            .get(&season)
            .copied()
            .filter(|w| *w > 0)
            .unwrap_or(DEFAULT_REGULAR_SEASON_WEEKS) as f64;
        for (i, team) in standings.iter().enumerate() {
            let rank = i + 1;
            let share = (n - rank) as f64 / (n - 1) as f64 * num_weeks;
            *totals.entry((season, team.manager.clone())).or_default() += share;
        }
    }

    totals
        .into_iter()
        .map(|((season, manager), expected_wins)| ExpectedWins {
            season,
            manager,
            expected_wins,
            method: ExpectedWinsMethod::SeasonTotals,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManagerSchedule {
    pub season: Season,
    pub manager: String,
    pub games_played: u32,
    pub wins: u32,
    pub losses: u32,
    pub ties: u32,
    pub points_for: f64,
    pub points_against: f64,
    pub avg_points_for: Stat,
    pub avg_points_against: Stat,
    pub std_points_against: Stat,
    pub league_avg_points_against: Stat,
    /// Average points against minus the league average; positive is a tougher schedule.
    pub pa_diff: Stat,
    pub expected_wins: Stat,
    pub win_luck: Stat,
}

/// Points-against profile per (season, manager) from weekly games, or from
/// standings totals when no weekly scores exist.
pub fn manager_schedule(weeks: &[TeamWeek], teams: &[TeamSeason]) -> Vec<ManagerSchedule> {
    if weeks.iter().any(|w| w.points_for > 0.0) {
        weekly_schedule(weeks)
    } else {
        standings_schedule(teams)
    }
}

fn weekly_schedule(weeks: &[TeamWeek]) -> Vec<ManagerSchedule> {
    let mut league_pa: BTreeMap<Season, Vec<f64>> = BTreeMap::new();
    let mut by_manager: BTreeMap<(Season, &str), Vec<&TeamWeek>> = BTreeMap::new();
    for w in weeks {
        league_pa.entry(w.season).or_default().push(w.points_against);
        by_manager.entry((w.season, w.manager.as_str())).or_default().push(w);
    }

    by_manager
        .into_iter()
        .map(|((season, manager), games)| {
            let pf: Vec<f64> = games.iter().map(|g| g.points_for).collect();
            let pa: Vec<f64> = games.iter().map(|g| g.points_against).collect();
            let wins = games.iter().filter(|g| g.won).count() as u32;
            let losses = games.iter().filter(|g| g.lost).count() as u32;
            let league_avg = stats::mean_stat(league_pa.get(&season).map(Vec::as_slice).unwrap_or(&[]));
            let avg_pa = stats::mean_stat(&pa);
            ManagerSchedule {
                season,
                manager: manager.to_string(),
                games_played: games.len() as u32,
                wins,
                losses,
                ties: games.len() as u32 - wins - losses,
                points_for: pf.iter().sum(),
                points_against: pa.iter().sum(),
                avg_points_for: stats::mean_stat(&pf),
                avg_points_against: avg_pa,
                std_points_against: stats::std_stat(&pa),
                league_avg_points_against: league_avg,
                pa_diff: stat_diff(avg_pa, league_avg),
                expected_wins: Stat::InsufficientData,
                win_luck: Stat::InsufficientData,
            }
        })
        .collect()
}

fn standings_schedule(teams: &[TeamSeason]) -> Vec<ManagerSchedule> {
    // (points against, games) per season, for a per-game league average
    let mut league: BTreeMap<Season, (f64, u32)> = BTreeMap::new();
    let mut by_manager: BTreeMap<(Season, &str), Vec<&TeamSeason>> = BTreeMap::new();
    for t in teams {
        let entry = league.entry(t.season).or_default();
        entry.0 += t.points_against;
        entry.1 += t.wins + t.losses + t.ties;
        by_manager.entry((t.season, t.manager.as_str())).or_default().push(t);
    }

    by_manager
        .into_iter()
        .map(|((season, manager), rows)| {
            let wins: u32 = rows.iter().map(|t| t.wins).sum();
            let losses: u32 = rows.iter().map(|t| t.losses).sum();
            let ties: u32 = rows.iter().map(|t| t.ties).sum();
            let games = wins + losses + ties;
            let points_for: f64 = rows.iter().map(|t| t.points_for).sum();
            let points_against: f64 = rows.iter().map(|t| t.points_against).sum();
            let (league_pa, league_games) = league.get(&season).copied().unwrap_or_default();
            let league_avg = stats::ratio_stat(league_pa, league_games as f64);
            let avg_pa = stats::ratio_stat(points_against, games as f64);
            ManagerSchedule {
                season,
                manager: manager.to_string(),
                games_played: games,
                wins,
                losses,
                ties,
                points_for,
                points_against,
                avg_points_for: stats::ratio_stat(points_for, games as f64),
                avg_points_against: avg_pa,
                std_points_against: Stat::NotApplicable,
                league_avg_points_against: league_avg,
                pa_diff: stat_diff(avg_pa, league_avg),
                expected_wins: Stat::InsufficientData,
                win_luck: Stat::InsufficientData,
            }
        })
        .collect()
}

fn stat_diff(a: Stat, b: Stat) -> Stat {
    match (a, b) {
        (Stat::Value(a), Stat::Value(b)) => Stat::from_f64(a - b),
        (Stat::NotApplicable, _) | (_, Stat::NotApplicable) => Stat::NotApplicable,
        _ => Stat::InsufficientData,
    }
}

/// Fill `expected_wins` and `win_luck = wins - expected` on each schedule row.
pub fn attach_expected_wins(schedule: &mut [ManagerSchedule], expected: &[ExpectedWins]) {
    let lookup: HashMap<(Season, &str), f64> = expected
        .iter()
        .map(|e| ((e.season, e.manager.as_str()), e.expected_wins))
        .collect();
    for row in schedule.iter_mut() {
        let Some(&exp) = lookup.get(&(row.season, row.manager.as_str())) else {
            continue;
        };
        row.expected_wins = Stat::from_f64(exp);
        row.win_luck = Stat::from_f64(row.wins as f64 - exp);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LuckProfile {
    pub manager: String,
    pub seasons_played: usize,
    pub mean_pa_diff: Stat,
    pub std_pa_diff: Stat,
    pub mean_win_luck: Stat,
    pub std_win_luck: Stat,
    pub lucky_seasons: usize,
    pub unlucky_seasons: usize,
    pub pct_seasons_lucky: Stat,
    pub pct_seasons_unlucky: Stat,
}

/// Long-run luck per manager across seasons.
pub fn luck_profiles(schedule: &[ManagerSchedule]) -> Vec<LuckProfile> {
    let mut by_manager: BTreeMap<&str, Vec<&ManagerSchedule>> = BTreeMap::new();
    for row in schedule {
        by_manager.entry(row.manager.as_str()).or_default().push(row);
    }

    let out: Vec<LuckProfile> = by_manager
        .into_iter()
        .map(|(manager, seasons)| {
            let pa_diff: Vec<f64> = seasons.iter().filter_map(|s| s.pa_diff.value()).collect();
            let luck: Vec<f64> = seasons.iter().filter_map(|s| s.win_luck.value()).collect();
            let lucky = luck.iter().filter(|&&l| l > LUCK_THRESHOLD).count();
            let unlucky = luck.iter().filter(|&&l| l < -LUCK_THRESHOLD).count();
            let n = seasons.len() as f64;
            LuckProfile {
                manager: manager.to_string(),
                seasons_played: seasons.len(),
                mean_pa_diff: stats::mean_stat(&pa_diff),
                std_pa_diff: stats::std_stat(&pa_diff),
                mean_win_luck: stats::mean_stat(&luck),
                std_win_luck: stats::std_stat(&luck),
                lucky_seasons: lucky,
                unlucky_seasons: unlucky,
                pct_seasons_lucky: stats::ratio_stat(lucky as f64 * 100.0, n),
                pct_seasons_unlucky: stats::ratio_stat(unlucky as f64 * 100.0, n),
            }
        })
        .collect();
    info!(managers = out.len(), "built luck profiles");
    out
}
