use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use crate::dataset::SeasonFilter;
use crate::pipeline::PipelineOptions;
use crate::records::Season;

/// Run configuration. Resolved as defaults, then an optional TOML file, then
/// `FFL_*` environment variables, then command-line flags.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub data_dir: PathBuf,
    pub output_dir: PathBuf,
    pub baseline_season: Option<Season>,
    pub start_season: Option<Season>,
    pub end_season: Option<Season>,
    pub threads: Option<usize>,
    pub write_workbook: bool,
    pub write_season_json: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            output_dir: PathBuf::from("output"),
            baseline_season: None,
            start_season: None,
            end_season: None,
            threads: None,
            write_workbook: true,
            write_season_json: true,
        }
    }
}

impl AnalysisConfig {
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("parse config file {}", path.display()))
    }

    /// Full resolution against the real process environment and arguments.
    pub fn resolve(args: &[String]) -> Result<Self> {
        let file = arg_value(args, "--config")
            .or_else(|| env::var("FFL_CONFIG").ok().filter(|v| !v.trim().is_empty()));
        let mut cfg = match file {
            Some(path) => Self::from_toml_file(Path::new(&path))?,
            None => Self::default(),
        };
        cfg.apply_env(|key| env::var(key).ok())?;
        cfg.apply_args(args)?;
        Ok(cfg)
    }

    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        if let Some(v) = get("FFL_DATA_DIR") {
            self.data_dir = PathBuf::from(v);
        }
        if let Some(v) = get("FFL_OUT_DIR") {
            self.output_dir = PathBuf::from(v);
        }
        if let Some(v) = get("FFL_BASELINE_SEASON") {
            self.baseline_season = Some(parse_season(&v)?);
        }
        if let Some(v) = get("FFL_START_SEASON") {
            self.start_season = Some(parse_season(&v)?);
        }
        if let Some(v) = get("FFL_END_SEASON") {
            self.end_season = Some(parse_season(&v)?);
        }
        if let Some(v) = get("FFL_THREADS") {
            self.threads = Some(v.parse().with_context(|| format!("FFL_THREADS={v}"))?);
        }
        if let Some(v) = get("FFL_WRITE_WORKBOOK") {
            self.write_workbook = parse_flag(&v).with_context(|| format!("FFL_WRITE_WORKBOOK={v}"))?;
        }
        Ok(())
    }

    pub fn apply_args(&mut self, args: &[String]) -> Result<()> {
        if let Some(v) = arg_value(args, "--data-dir") {
            self.data_dir = PathBuf::from(v);
        }
        if let Some(v) = arg_value(args, "--out") {
            self.output_dir = PathBuf::from(v);
        }
        if let Some(v) = arg_value(args, "--baseline") {
            self.baseline_season = Some(parse_season(&v)?);
        }
        if let Some(v) = arg_value(args, "--seasons") {
            let (start, end) = parse_season_range(&v)?;
            self.start_season = Some(start);
            self.end_season = Some(end);
        }
        if let Some(v) = arg_value(args, "--threads") {
            self.threads = Some(v.parse().with_context(|| format!("--threads {v}"))?);
        }
        if args.iter().any(|a| a == "--no-workbook") {
            self.write_workbook = false;
        }
        if args.iter().any(|a| a == "--no-season-json") {
            self.write_season_json = false;
        }
        Ok(())
    }

    pub fn season_filter(&self) -> SeasonFilter {
        SeasonFilter {
            start: self.start_season,
            end: self.end_season,
        }
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            baseline_season: self.baseline_season,
            threads: self.threads,
        }
    }
}

/// Value of `--flag=value` or `--flag value`.
pub fn arg_value(args: &[String], flag: &str) -> Option<String> {
    let prefix = format!("{flag}=");
    for (idx, arg) in args.iter().enumerate() {
        if let Some(v) = arg.strip_prefix(&prefix)
            && !v.trim().is_empty()
        {
            return Some(v.trim().to_string());
        }
        if arg == flag
            && let Some(next) = args.get(idx + 1)
            && !next.trim().is_empty()
            && !next.starts_with("--")
        {
            return Some(next.trim().to_string());
        }
    }
    None
}

fn parse_season(raw: &str) -> Result<Season> {
    raw.trim()
        .parse::<Season>()
        .with_context(|| format!("invalid season {raw:?}"))
}

/// `2018` or `2014-2020`.
pub fn parse_season_range(raw: &str) -> Result<(Season, Season)> {
    let (start, end) = match raw.split_once('-') {
        Some((a, b)) => (parse_season(a)?, parse_season(b)?),
        None => {
            let s = parse_season(raw)?;
            (s, s)
        }
    };
    if start > end {
        bail!("season range {raw:?} runs backwards");
    }
    Ok((start, end))
}

fn parse_flag(raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("not a boolean: {other}"),
    }
}
