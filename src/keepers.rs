use std::collections::BTreeMap;

use serde::Serialize;

use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::records::{AnalysisRow, Position};
use crate::stats::{self, Stat};

/// Market estimate and surplus for keeper rows; everyone else stays null.
pub fn apply_keeper_surplus(rows: &mut [AnalysisRow]) {
    for row in rows.iter_mut() {
        if !row.is_keeper {
            row.market_price_estimate = None;
            row.keeper_surplus = None;
            continue;
        }
        let paid = row.keeper_cost.unwrap_or(row.cost);
        row.market_price_estimate = row.normalized_price;
        row.keeper_surplus = row.normalized_price.map(|market| market - paid);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeeperSummaryRow {
    /// `None` is the all-positions row.
    pub position: Option<Position>,
    pub keepers: usize,
    pub mean_surplus: Stat,
    pub median_surplus: Stat,
    pub std_surplus: Stat,
    pub positive_surplus_rate: Stat,
    pub mean_var: Stat,
    pub mean_keeper_cost: Stat,
    pub mean_market_price: Stat,
    pub surplus_var_correlation: Stat,
}

pub fn keeper_summary(rows: &[AnalysisRow], diags: &mut Diagnostics) -> Vec<KeeperSummaryRow> {
    let keepers: Vec<&AnalysisRow> = rows.iter().filter(|r| r.is_keeper).collect();
    let mut by_pos: BTreeMap<Position, Vec<&AnalysisRow>> = BTreeMap::new();
    for row in &keepers {
        by_pos.entry(row.position).or_default().push(row);
    }

    let mut out = Vec::with_capacity(by_pos.len() + 1);
    for (position, group) in by_pos {
        out.push(summarize(Some(position), &group, diags));
    }
    if !keepers.is_empty() {
        out.push(summarize(None, &keepers, diags));
    }
    out
}

fn summarize(
    position: Option<Position>,
    group: &[&AnalysisRow],
    diags: &mut Diagnostics,
) -> KeeperSummaryRow {
    let surplus: Vec<f64> = group.iter().filter_map(|r| r.keeper_surplus).collect();
    let vars: Vec<f64> = group.iter().filter_map(|r| r.var).collect();
    let costs: Vec<f64> = group.iter().map(|r| r.keeper_cost.unwrap_or(r.cost)).collect();
    let market: Vec<f64> = group.iter().filter_map(|r| r.market_price_estimate).collect();

    // correlation only over keepers with both values
    let (xs, ys): (Vec<f64>, Vec<f64>) = group
        .iter()
        .filter_map(|r| Some((r.keeper_surplus?, r.var?)))
        .unzip();
    let correlation = Stat::from_option(stats::pearson(&xs, &ys));
    if !correlation.is_value() {
        diags.push(
            None,
            DiagnosticKind::InsufficientSample,
            format!("keeper_surplus/{}", position.map(|p| p.label()).unwrap_or("ALL")),
            format!("{} paired points for surplus/VAR correlation", xs.len()),
        );
    }

    let positive_surplus_rate = if surplus.is_empty() {
        Stat::InsufficientData
    } else {
        Stat::Value(surplus.iter().filter(|&&s| s > 0.0).count() as f64 / surplus.len() as f64)
    };

    KeeperSummaryRow {
        position,
        keepers: group.len(),
        mean_surplus: stats::mean_stat(&surplus),
        median_surplus: stats::median_stat(&surplus),
        std_surplus: stats::std_stat(&surplus),
        positive_surplus_rate,
        mean_var: stats::mean_stat(&vars),
        mean_keeper_cost: stats::mean_stat(&costs),
        mean_market_price: stats::mean_stat(&market),
        surplus_var_correlation: correlation,
    }
}
