use serde::Serialize;
use tracing::{debug, warn};

use crate::records::Season;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    MissingResult,
    UndefinedBaseline,
    DegenerateNormalization,
    InsufficientSample,
    DefaultSettings,
    SkippedRow,
}

impl DiagnosticKind {
    pub fn label(self) -> &'static str {
        match self {
            DiagnosticKind::MissingResult => "missing_result",
            DiagnosticKind::UndefinedBaseline => "undefined_baseline",
            DiagnosticKind::DegenerateNormalization => "degenerate_normalization",
            DiagnosticKind::InsufficientSample => "insufficient_sample",
            DiagnosticKind::DefaultSettings => "default_settings",
            DiagnosticKind::SkippedRow => "skipped_row",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub season: Option<Season>,
    pub kind: DiagnosticKind,
    pub subject: String,
    pub detail: String,
}

/// Collects row-local problems so a run always finishes with partial output.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(
        &mut self,
        season: Option<Season>,
        kind: DiagnosticKind,
        subject: impl Into<String>,
        detail: impl Into<String>,
    ) {
        let subject = subject.into();
        let detail = detail.into();
        match kind {
            // one per drafted player without a result; these get their own report
            DiagnosticKind::MissingResult | DiagnosticKind::SkippedRow => {
                debug!(?season, kind = kind.label(), %subject, %detail, "diagnostic");
            }
            _ => warn!(?season, kind = kind.label(), %subject, %detail, "diagnostic"),
        }
        self.items.push(Diagnostic {
            season,
            kind,
            subject,
            detail,
        });
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.items.extend(other.items);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.items.iter().filter(|d| d.kind == kind).count()
    }

    /// Stable ordering for reports: season, then kind, then subject.
    pub fn into_sorted(mut self) -> Vec<Diagnostic> {
        self.items.sort_by(|a, b| {
            a.season
                .cmp(&b.season)
                .then(a.kind.cmp(&b.kind))
                .then(a.subject.cmp(&b.subject))
        });
        self.items
    }
}
