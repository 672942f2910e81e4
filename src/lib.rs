pub mod config;
pub mod consistency;
pub mod dataset;
pub mod diagnostics;
pub mod error;
pub mod export;
pub mod keepers;
pub mod lifecycle;
pub mod logging;
pub mod normalize;
pub mod pipeline;
pub mod records;
pub mod reporting;
pub mod schedule_luck;
pub mod stats;
pub mod strategy;
pub mod synthetic;
pub mod tiers;
pub mod var;
