use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use parquet::file::reader::{FileReader, SerializedFileReader};
use parquet::record::{Row, RowAccessor};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use tracing::{debug, info};

use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::error::SchemaError;
use crate::records::{
    DraftPick, LeagueSettings, LeagueTables, Matchup, PlayerSeasonResult, Position, Season,
    TeamSeason, Transaction, TransactionKind,
};

pub const DRAFTS_CSV: &str = "drafts.csv";
pub const RESULTS_CSV: &str = "results.csv";
pub const RESULTS_PARQUET: &str = "results.parquet";
pub const SETTINGS_JSON: &str = "league_settings.json";
pub const TRANSACTIONS_CSV: &str = "transactions.csv";
pub const TEAMS_CSV: &str = "teams.csv";
pub const MATCHUPS_CSV: &str = "matchups.csv";

/// Inclusive season bounds; `None` leaves that side open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeasonFilter {
    pub start: Option<Season>,
    pub end: Option<Season>,
}

impl SeasonFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn contains(&self, season: Season) -> bool {
        self.start.is_none_or(|lo| season >= lo) && self.end.is_none_or(|hi| season <= hi)
    }
}

/// Where the core gets its input tables. Fetching, caching and auth live behind this.
pub trait LeagueSource {
    fn load(&self, seasons: SeasonFilter, diags: &mut Diagnostics) -> Result<LeagueTables>;
}

/// Tables already in memory, e.g. built by a caller with its own fetch layer.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    tables: LeagueTables,
}

impl InMemorySource {
    pub fn new(tables: LeagueTables) -> Self {
        Self { tables }
    }
}

impl LeagueSource for InMemorySource {
    fn load(&self, seasons: SeasonFilter, _diags: &mut Diagnostics) -> Result<LeagueTables> {
        let mut tables = self.tables.clone();
        tables.retain_seasons(seasons.start, seasons.end);
        tables.settings.retain(|s| seasons.contains(s.season));
        Ok(tables)
    }
}

/// A directory of flat files: CSV tables, settings JSON, results as CSV or Parquet.
#[derive(Debug, Clone)]
pub struct FlatFileSource {
    dir: PathBuf,
}

impl FlatFileSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl LeagueSource for FlatFileSource {
    fn load(&self, seasons: SeasonFilter, diags: &mut Diagnostics) -> Result<LeagueTables> {
        let drafts_path = self.dir.join(DRAFTS_CSV);
        if !drafts_path.exists() {
            return Err(SchemaError::MissingTable(drafts_path.display().to_string()).into());
        }
        let drafts = read_drafts(&drafts_path, diags)?;

        let parquet_path = self.dir.join(RESULTS_PARQUET);
        let csv_path = self.dir.join(RESULTS_CSV);
        let results = if parquet_path.exists() {
            read_results_parquet(&parquet_path, diags)?
        } else if csv_path.exists() {
            read_results_csv(&csv_path, diags)?
        } else {
            return Err(SchemaError::MissingTable(csv_path.display().to_string()).into());
        };

        let settings_path = self.dir.join(SETTINGS_JSON);
        let settings = if settings_path.exists() {
            read_settings(&settings_path)?
        } else {
            Vec::new()
        };

        let transactions = optional(&self.dir.join(TRANSACTIONS_CSV), |p| read_transactions(p, diags))?;
        let teams = optional(&self.dir.join(TEAMS_CSV), |p| read_teams(p, diags))?;
        let matchups = optional(&self.dir.join(MATCHUPS_CSV), |p| read_matchups(p, diags))?;

        let mut tables = LeagueTables {
            drafts,
            results,
            settings,
            transactions,
            teams,
            matchups,
        };
        tables.retain_seasons(seasons.start, seasons.end);
        tables.settings.retain(|s| seasons.contains(s.season));
        info!(
            dir = %self.dir.display(),
            drafts = tables.drafts.len(),
            results = tables.results.len(),
            transactions = tables.transactions.len(),
            teams = tables.teams.len(),
            matchups = tables.matchups.len(),
            "loaded league tables"
        );
        Ok(tables)
    }
}

fn optional<T>(path: &Path, read: impl FnOnce(&Path) -> Result<Vec<T>>) -> Result<Vec<T>> {
    if path.exists() {
        read(path)
    } else {
        debug!(path = %path.display(), "optional table not present");
        Ok(Vec::new())
    }
}

/// A required column and the other header names it is known by.
type Column = (&'static str, &'static [&'static str]);

fn check_columns(table: &str, headers: &[String], required: &[Column]) -> Result<()> {
    for (name, aliases) in required {
        let found = headers
            .iter()
            .any(|h| h == name || aliases.iter().any(|a| h == a));
        if !found {
            return Err(SchemaError::missing_column(table, name).into());
        }
    }
    Ok(())
}

/// Deserialize every row of a CSV, skipping (and reporting) rows that don't parse.
fn read_csv_rows<T: DeserializeOwned>(
    path: &Path,
    table: &str,
    required: &[Column],
    diags: &mut Diagnostics,
) -> Result<Vec<T>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("open {}", path.display()))?;
    let headers: Vec<String> = reader
        .headers()
        .with_context(|| format!("read headers of {}", path.display()))?
        .iter()
        .map(|h| h.to_string())
        .collect();
    check_columns(table, &headers, required)?;

    let mut out = Vec::new();
    for (idx, record) in reader.deserialize::<T>().enumerate() {
        match record {
            Ok(row) => out.push(row),
            Err(err) => diags.push(None, DiagnosticKind::SkippedRow, format!("{table}:{}", idx + 2), err.to_string()),
        }
    }
    Ok(out)
}

fn flexible_bool<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    let raw = Option::<String>::deserialize(d)?;
    let Some(raw) = raw else {
        return Ok(false);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "" | "0" | "false" | "no" | "n" | "f" => Ok(false),
        "1" | "true" | "yes" | "y" | "t" => Ok(true),
        other => Err(serde::de::Error::custom(format!("not a boolean: {other}"))),
    }
}

fn position_from_str<'de, D: Deserializer<'de>>(d: D) -> Result<Position, D::Error> {
    let raw = String::deserialize(d)?;
    Position::parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("unknown position: {raw}")))
}

#[derive(Debug, Deserialize)]
struct DraftCsvRow {
    #[serde(alias = "season_year")]
    season: Season,
    #[serde(default)]
    round: Option<u32>,
    #[serde(default, alias = "pick")]
    pick_number: Option<u32>,
    #[serde(alias = "team_key")]
    team_id: String,
    player_id: String,
    #[serde(default)]
    player_name: Option<String>,
    #[serde(deserialize_with = "position_from_str")]
    position: Position,
    cost: f64,
    #[serde(default, deserialize_with = "flexible_bool")]
    is_keeper: bool,
    #[serde(default)]
    keeper_cost: Option<f64>,
}

pub fn read_drafts(path: &Path, diags: &mut Diagnostics) -> Result<Vec<DraftPick>> {
    let required: &[Column] = &[
        ("season", &["season_year"]),
        ("team_id", &["team_key"]),
        ("player_id", &[]),
        ("position", &[]),
        ("cost", &[]),
    ];
    let rows: Vec<DraftCsvRow> = read_csv_rows(path, "drafts", required, diags)?;
    Ok(rows
        .into_iter()
        .map(|r| DraftPick {
            season: r.season,
            round: r.round.unwrap_or(0),
            pick_number: r.pick_number.unwrap_or(0),
            team_id: r.team_id,
            player_name: r.player_name.unwrap_or_else(|| r.player_id.clone()),
            player_id: r.player_id,
            position: r.position,
            cost: r.cost,
            is_keeper: r.is_keeper,
            keeper_cost: r.keeper_cost,
        })
        .collect())
}

#[derive(Debug, Deserialize)]
struct ResultCsvRow {
    #[serde(alias = "season_year")]
    season: Season,
    player_id: String,
    #[serde(default)]
    player_name: Option<String>,
    #[serde(deserialize_with = "position_from_str")]
    position: Position,
    #[serde(default)]
    fantasy_points_total: Option<f64>,
    #[serde(default)]
    games_played: Option<u32>,
}

const RESULT_COLUMNS: &[Column] = &[
    ("season", &["season_year"]),
    ("player_id", &[]),
    ("position", &[]),
    ("fantasy_points_total", &[]),
];

pub fn read_results_csv(path: &Path, diags: &mut Diagnostics) -> Result<Vec<PlayerSeasonResult>> {
    let rows: Vec<ResultCsvRow> = read_csv_rows(path, "results", RESULT_COLUMNS, diags)?;
    Ok(rows
        .into_iter()
        .map(|r| PlayerSeasonResult {
            season: r.season,
            player_name: r.player_name.unwrap_or_else(|| r.player_id.clone()),
            player_id: r.player_id,
            position: r.position,
            fantasy_points_total: r.fantasy_points_total,
            games_played: r.games_played,
        })
        .collect())
}

pub fn read_results_parquet(path: &Path, diags: &mut Diagnostics) -> Result<Vec<PlayerSeasonResult>> {
    let file = fs::File::open(path).with_context(|| format!("open {}", path.display()))?;
    let reader = SerializedFileReader::new(file).context("open parquet reader results")?;
    let names: Vec<String> = reader
        .metadata()
        .file_metadata()
        .schema_descr()
        .columns()
        .iter()
        .map(|c| c.name().to_string())
        .collect();
    check_columns("results", &names, RESULT_COLUMNS)?;
    let col = |name: &str, aliases: &[&str]| {
        names
            .iter()
            .position(|n| n == name || aliases.iter().any(|a| n == a))
    };
    let season_idx = col("season", &["season_year"]).context("season column")?;
    let id_idx = col("player_id", &[]).context("player_id column")?;
    let pos_idx = col("position", &[]).context("position column")?;
    let points_idx = col("fantasy_points_total", &[]).context("points column")?;
    let name_idx = col("player_name", &[]);
    let games_idx = col("games_played", &[]);

    let iter = reader.get_row_iter(None).context("iterate result rows")?;
    let mut out = Vec::new();
    for (idx, row) in iter.enumerate() {
        let Ok(row) = row else {
            diags.push(None, DiagnosticKind::SkippedRow, format!("results:{idx}"), "unreadable parquet row");
            continue;
        };
        let Some(season) = read_int(&row, season_idx) else {
            diags.push(None, DiagnosticKind::SkippedRow, format!("results:{idx}"), "missing season");
            continue;
        };
        let player_id = read_text(&row, id_idx).unwrap_or_default();
        let Some(position) = read_text(&row, pos_idx).as_deref().and_then(Position::parse) else {
            diags.push(None, DiagnosticKind::SkippedRow, format!("results:{idx}"), "unknown position");
            continue;
        };
        if player_id.is_empty() {
            diags.push(None, DiagnosticKind::SkippedRow, format!("results:{idx}"), "missing player_id");
            continue;
        }
        out.push(PlayerSeasonResult {
            season: season as Season,
            player_name: name_idx
                .and_then(|i| read_text(&row, i))
                .unwrap_or_else(|| player_id.clone()),
            player_id,
            position,
            fantasy_points_total: read_num(&row, points_idx),
            games_played: games_idx.and_then(|i| read_int(&row, i)).map(|g| g.max(0) as u32),
        });
    }
    Ok(out)
}

fn read_num(row: &Row, idx: usize) -> Option<f64> {
    if let Ok(v) = row.get_double(idx) {
        return Some(v);
    }
    if let Ok(v) = row.get_float(idx) {
        return Some(v as f64);
    }
    if let Ok(v) = row.get_long(idx) {
        return Some(v as f64);
    }
    if let Ok(v) = row.get_int(idx) {
        return Some(v as f64);
    }
    None
}

fn read_int(row: &Row, idx: usize) -> Option<i64> {
    if let Ok(v) = row.get_long(idx) {
        return Some(v);
    }
    if let Ok(v) = row.get_int(idx) {
        return Some(v as i64);
    }
    read_num(row, idx).map(|v| v as i64)
}

fn read_text(row: &Row, idx: usize) -> Option<String> {
    if let Ok(v) = row.get_string(idx) {
        return Some(v.clone());
    }
    read_int(row, idx).map(|v| v.to_string())
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SettingsFile {
    List(Vec<LeagueSettings>),
    Wrapped { seasons: Vec<LeagueSettings> },
}

pub fn read_settings(path: &Path) -> Result<Vec<LeagueSettings>> {
    let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let parsed: SettingsFile =
        serde_json::from_str(&raw).with_context(|| format!("parse {}", path.display()))?;
    Ok(match parsed {
        SettingsFile::List(v) => v,
        SettingsFile::Wrapped { seasons } => seasons,
    })
}

#[derive(Debug, Deserialize)]
struct TransactionCsvRow {
    #[serde(alias = "season_year")]
    season: Season,
    transaction_id: String,
    #[serde(default)]
    timestamp: Option<i64>,
    #[serde(alias = "type")]
    kind: String,
    player_id: String,
    #[serde(default)]
    player_name: Option<String>,
    #[serde(default, alias = "from_team_key")]
    from_team_id: Option<String>,
    #[serde(default, alias = "to_team_key")]
    to_team_id: Option<String>,
    #[serde(default)]
    faab_bid: Option<f64>,
    #[serde(default)]
    waiver_priority: Option<u32>,
}

pub fn read_transactions(path: &Path, diags: &mut Diagnostics) -> Result<Vec<Transaction>> {
    let required: &[Column] = &[
        ("season", &["season_year"]),
        ("transaction_id", &[]),
        ("kind", &["type"]),
        ("player_id", &[]),
    ];
    let rows: Vec<TransactionCsvRow> = read_csv_rows(path, "transactions", required, diags)?;
    let mut out = Vec::with_capacity(rows.len());
    for r in rows {
        let Some(kind) = TransactionKind::parse(&r.kind) else {
            diags.push(
                Some(r.season),
                DiagnosticKind::SkippedRow,
                format!("transactions:{}", r.transaction_id),
                format!("unknown transaction type {:?}", r.kind),
            );
            continue;
        };
        out.push(Transaction {
            season: r.season,
            transaction_id: r.transaction_id,
            timestamp: r.timestamp.unwrap_or(0),
            kind,
            player_name: r.player_name.unwrap_or_else(|| r.player_id.clone()),
            player_id: r.player_id,
            from_team_id: r.from_team_id.filter(|t| !t.is_empty()),
            to_team_id: r.to_team_id.filter(|t| !t.is_empty()),
            faab_bid: r.faab_bid,
            waiver_priority: r.waiver_priority,
        });
    }
    Ok(out)
}

#[derive(Debug, Deserialize)]
struct TeamCsvRow {
    #[serde(alias = "season_year")]
    season: Season,
    #[serde(alias = "team_key")]
    team_id: String,
    manager: String,
    #[serde(default)]
    wins: Option<u32>,
    #[serde(default)]
    losses: Option<u32>,
    #[serde(default)]
    ties: Option<u32>,
    #[serde(default)]
    points_for: Option<f64>,
    #[serde(default)]
    points_against: Option<f64>,
    #[serde(default)]
    final_rank: Option<u32>,
}

pub fn read_teams(path: &Path, diags: &mut Diagnostics) -> Result<Vec<TeamSeason>> {
    let required: &[Column] = &[("season", &["season_year"]), ("team_id", &["team_key"]), ("manager", &[])];
    let rows: Vec<TeamCsvRow> = read_csv_rows(path, "teams", required, diags)?;
    Ok(rows
        .into_iter()
        .map(|r| TeamSeason {
            season: r.season,
            manager: if r.manager.is_empty() { r.team_id.clone() } else { r.manager },
            team_id: r.team_id,
            wins: r.wins.unwrap_or(0),
            losses: r.losses.unwrap_or(0),
            ties: r.ties.unwrap_or(0),
            points_for: r.points_for.unwrap_or(0.0),
            points_against: r.points_against.unwrap_or(0.0),
            final_rank: r.final_rank,
        })
        .collect())
}

#[derive(Debug, Deserialize)]
struct MatchupCsvRow {
    #[serde(alias = "season_year")]
    season: Season,
    week: u32,
    #[serde(alias = "team1_key")]
    team1_id: String,
    #[serde(alias = "team2_key")]
    team2_id: String,
    #[serde(default)]
    team1_points: Option<f64>,
    #[serde(default)]
    team2_points: Option<f64>,
    #[serde(default, alias = "winner")]
    winner_team_id: Option<String>,
}

pub fn read_matchups(path: &Path, diags: &mut Diagnostics) -> Result<Vec<Matchup>> {
    let required: &[Column] = &[
        ("season", &["season_year"]),
        ("week", &[]),
        ("team1_id", &["team1_key"]),
        ("team2_id", &["team2_key"]),
    ];
    let rows: Vec<MatchupCsvRow> = read_csv_rows(path, "matchups", required, diags)?;
    Ok(rows
        .into_iter()
        .map(|r| Matchup {
            season: r.season,
            week: r.week,
            team1_id: r.team1_id,
            team2_id: r.team2_id,
            team1_points: r.team1_points.unwrap_or(0.0),
            team2_points: r.team2_points.unwrap_or(0.0),
            winner_team_id: r.winner_team_id.filter(|w| !w.is_empty()),
        })
        .collect())
}

/// Write tables in the layout [`FlatFileSource`] reads back.
pub fn write_tables(tables: &LeagueTables, dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    write_table(&dir.join(DRAFTS_CSV), &tables.drafts)?;
    write_table(&dir.join(RESULTS_CSV), &tables.results)?;
    write_table(&dir.join(TRANSACTIONS_CSV), &tables.transactions)?;
    write_table(&dir.join(TEAMS_CSV), &tables.teams)?;
    write_table(&dir.join(MATCHUPS_CSV), &tables.matchups)?;
    let settings_path = dir.join(SETTINGS_JSON);
    let json = serde_json::to_string_pretty(&tables.settings).context("serialize league settings")?;
    fs::write(&settings_path, json).with_context(|| format!("write {}", settings_path.display()))?;
    Ok(())
}

fn write_table<T: serde::Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).with_context(|| format!("create {}", path.display()))?;
    for row in rows {
        writer
            .serialize(row)
            .with_context(|| format!("write row to {}", path.display()))?;
    }
    writer.flush().with_context(|| format!("flush {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn season_filter_bounds_are_inclusive() {
        let f = SeasonFilter {
            start: Some(2015),
            end: Some(2017),
        };
        assert!(f.contains(2015) && f.contains(2017));
        assert!(!f.contains(2014) && !f.contains(2018));
        assert!(SeasonFilter::all().contains(1999));
    }

    #[test]
    fn missing_alias_reports_canonical_name() {
        let headers = vec!["season_year".to_string(), "player_id".to_string()];
        let err = check_columns("drafts", &headers, &[("season", &["season_year"]), ("cost", &[])])
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<SchemaError>(),
            Some(&SchemaError::missing_column("drafts", "cost"))
        );
    }

    #[test]
    fn booleans_accept_common_spellings() {
        #[derive(Deserialize)]
        struct Probe {
            #[serde(default, deserialize_with = "flexible_bool")]
            flag: bool,
        }
        for (raw, want) in [("true", true), ("1", true), ("Yes", true), ("no", false), ("0", false)] {
            let p: Probe = serde_json::from_str(&format!(r#"{{"flag":"{raw}"}}"#)).unwrap();
            assert_eq!(p.flag, want, "{raw}");
        }
        let p: Probe = serde_json::from_str("{}").unwrap();
        assert!(!p.flag);
    }
}
