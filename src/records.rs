use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::stats::Stat;

pub type Season = i32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Position {
    QB,
    RB,
    WR,
    TE,
    K,
    DEF,
}

impl Position {
    pub const ALL: [Position; 6] = [
        Position::QB,
        Position::RB,
        Position::WR,
        Position::TE,
        Position::K,
        Position::DEF,
    ];

    pub fn parse(raw: &str) -> Option<Self> {
        let s = raw.trim().to_ascii_uppercase();
        match s.as_str() {
            "QB" => Some(Position::QB),
            "RB" => Some(Position::RB),
            "WR" => Some(Position::WR),
            "TE" => Some(Position::TE),
            "K" | "PK" => Some(Position::K),
            "DEF" | "DST" | "D/ST" | "D" => Some(Position::DEF),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Position::QB => "QB",
            Position::RB => "RB",
            Position::WR => "WR",
            Position::TE => "TE",
            Position::K => "K",
            Position::DEF => "DEF",
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One row per player per draft event per season.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftPick {
    pub season: Season,
    pub round: u32,
    pub pick_number: u32,
    pub team_id: String,
    pub player_id: String,
    pub player_name: String,
    pub position: Position,
    pub cost: f64,
    pub is_keeper: bool,
    pub keeper_cost: Option<f64>,
}

impl DraftPick {
    /// What was actually paid to keep the player; falls back to the auction cost
    /// when the league did not record a separate keeper price.
    pub fn effective_keeper_cost(&self) -> f64 {
        self.keeper_cost.unwrap_or(self.cost)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSeasonResult {
    pub season: Season,
    pub player_id: String,
    pub player_name: String,
    pub position: Position,
    pub fantasy_points_total: Option<f64>,
    pub games_played: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeagueSettings {
    pub season: Season,
    pub num_teams: u32,
    pub auction_budget: f64,
    pub starters_by_position: BTreeMap<Position, u32>,
    pub bench_slots: u32,
    /// Keepers allowed per team.
    pub num_keepers: u32,
    #[serde(default)]
    pub season_start: Option<NaiveDate>,
}

impl LeagueSettings {
    pub fn defaults(season: Season) -> Self {
        Self {
            season,
            num_teams: 12,
            auction_budget: 200.0,
            starters_by_position: BTreeMap::from([
                (Position::QB, 1),
                (Position::RB, 2),
                (Position::WR, 2),
                (Position::TE, 1),
                (Position::K, 1),
                (Position::DEF, 1),
            ]),
            bench_slots: 6,
            num_keepers: 2,
            season_start: None,
        }
    }

    pub fn starters_at(&self, position: Position) -> u32 {
        self.starters_by_position.get(&position).copied().unwrap_or(0)
    }

    pub fn total_starters(&self) -> u32 {
        self.starters_by_position.values().sum()
    }

    /// Rank threshold defining "startable" at a position; doubles as the tier width.
    pub fn replacement_rank(&self, position: Position) -> usize {
        (self.num_teams as usize) * (self.starters_at(position) as usize)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Add,
    Drop,
    Trade,
}

impl TransactionKind {
    pub fn parse(raw: &str) -> Option<Self> {
        let s = raw.trim().to_ascii_lowercase();
        if s.contains("trade") {
            Some(TransactionKind::Trade)
        } else if s.contains("drop") {
            Some(TransactionKind::Drop)
        } else if s.contains("add") {
            Some(TransactionKind::Add)
        } else {
            None
        }
    }
}

/// One row per player involved in a transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub season: Season,
    pub transaction_id: String,
    pub timestamp: i64,
    pub kind: TransactionKind,
    pub player_id: String,
    pub player_name: String,
    pub from_team_id: Option<String>,
    pub to_team_id: Option<String>,
    pub faab_bid: Option<f64>,
    pub waiver_priority: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamSeason {
    pub season: Season,
    pub team_id: String,
    pub manager: String,
    pub wins: u32,
    pub losses: u32,
    pub ties: u32,
    pub points_for: f64,
    pub points_against: f64,
    pub final_rank: Option<u32>,
}

impl TeamSeason {
    pub fn is_champion(&self) -> bool {
        self.final_rank == Some(1)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Matchup {
    pub season: Season,
    pub week: u32,
    pub team1_id: String,
    pub team2_id: String,
    pub team1_points: f64,
    pub team2_points: f64,
    pub winner_team_id: Option<String>,
}

/// Every input table the analysis consumes. Optional tables are simply empty.
#[derive(Debug, Clone, Default)]
pub struct LeagueTables {
    pub drafts: Vec<DraftPick>,
    pub results: Vec<PlayerSeasonResult>,
    pub settings: Vec<LeagueSettings>,
    pub transactions: Vec<Transaction>,
    pub teams: Vec<TeamSeason>,
    pub matchups: Vec<Matchup>,
}

impl LeagueTables {
    pub fn seasons(&self) -> Vec<Season> {
        let mut out: Vec<Season> = self.drafts.iter().map(|p| p.season).collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    pub fn settings_by_season(&self) -> BTreeMap<Season, LeagueSettings> {
        self.settings
            .iter()
            .map(|s| (s.season, s.clone()))
            .collect()
    }

    /// (season, team_id) -> manager name.
    pub fn team_managers(&self) -> TeamManagers {
        let mut out = TeamManagers::default();
        for team in &self.teams {
            out.insert(team.season, &team.team_id, &team.manager);
        }
        out
    }

    pub fn retain_seasons(&mut self, start: Option<Season>, end: Option<Season>) {
        let keep = |s: Season| start.is_none_or(|lo| s >= lo) && end.is_none_or(|hi| s <= hi);
        self.drafts.retain(|r| keep(r.season));
        self.results.retain(|r| keep(r.season));
        self.transactions.retain(|r| keep(r.season));
        self.teams.retain(|r| keep(r.season));
        self.matchups.retain(|r| keep(r.season));
    }
}

#[derive(Debug, Clone, Default)]
pub struct TeamManagers {
    by_team: BTreeMap<(Season, String), String>,
}

impl TeamManagers {
    pub fn insert(&mut self, season: Season, team_id: &str, manager: &str) {
        self.by_team
            .insert((season, team_id.to_string()), manager.to_string());
    }

    /// Without a teams table the team id stands in for the manager.
    pub fn manager_for(&self, season: Season, team_id: &str) -> String {
        self.by_team
            .get(&(season, team_id.to_string()))
            .cloned()
            .unwrap_or_else(|| team_id.to_string())
    }

    pub fn is_empty(&self) -> bool {
        self.by_team.is_empty()
    }
}

/// Per player-season join of a draft pick with its result and league settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRow {
    pub season: Season,
    pub player_id: String,
    pub player_name: String,
    pub position: Position,
    pub team_id: String,
    pub cost: f64,
    pub is_keeper: bool,
    pub keeper_cost: Option<f64>,
    pub normalized_price: Option<f64>,
    pub fantasy_points_total: Option<f64>,
    pub replacement_baseline_points: Option<f64>,
    pub var: Option<f64>,
    pub var_per_dollar: Option<f64>,
    pub dollar_per_var: Option<f64>,
    pub price_rank_within_position: Option<u32>,
    pub points_rank_within_position: Option<u32>,
    pub expected_tier: Option<u32>,
    pub actual_finish_tier: Option<u32>,
    pub market_price_estimate: Option<f64>,
    pub keeper_surplus: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcquisitionType {
    Draft,
    Keeper,
    Waiver,
    FreeAgent,
    Trade,
}

impl AcquisitionType {
    pub fn label(self) -> &'static str {
        match self {
            AcquisitionType::Draft => "draft",
            AcquisitionType::Keeper => "keeper",
            AcquisitionType::Waiver => "waiver",
            AcquisitionType::FreeAgent => "free_agent",
            AcquisitionType::Trade => "trade",
        }
    }

    /// Channel priority when a player-season has several acquisitions.
    pub fn precedence(self) -> u8 {
        match self {
            AcquisitionType::Draft | AcquisitionType::Keeper => 0,
            AcquisitionType::Waiver | AcquisitionType::FreeAgent => 1,
            AcquisitionType::Trade => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleRecord {
    pub season: Season,
    pub player_id: String,
    pub player_name: String,
    pub position: Option<Position>,
    pub team_id: String,
    pub acquisition_type: AcquisitionType,
    pub acquisition_week: u32,
    pub acquisition_cost: f64,
    pub teams_played_for: u32,
    pub total_points: Option<f64>,
    pub var_total: Option<f64>,
    pub became_keeper: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Archetype {
    DraftAndHold,
    WaiverHawk,
    Trader,
    Passive,
    Balanced,
}

impl Archetype {
    pub fn label(self) -> &'static str {
        match self {
            Archetype::DraftAndHold => "DRAFT_AND_HOLD",
            Archetype::WaiverHawk => "WAIVER_HAWK",
            Archetype::Trader => "TRADER",
            Archetype::Passive => "PASSIVE",
            Archetype::Balanced => "BALANCED",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManagerStrategyProfile {
    pub season: Season,
    pub manager: String,
    pub draft_var: f64,
    pub keeper_var: f64,
    pub waiver_var: f64,
    pub trade_var: f64,
    pub total_var: f64,
    pub pct_var_from_draft: f64,
    pub pct_var_from_keeper: f64,
    pub pct_var_from_waiver: f64,
    pub pct_var_from_trade: f64,
    pub faab_spent: f64,
    pub faab_efficiency: Stat,
    pub unique_players: u32,
    pub archetype: Archetype,
}
