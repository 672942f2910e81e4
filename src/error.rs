use thiserror::Error;

use crate::records::Season;

/// Structural input problems. These are the only failures that abort a run;
/// everything row-level becomes a [`crate::diagnostics::Diagnostic`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("table `{table}` is missing required column `{column}`")]
    MissingColumn { table: String, column: String },

    #[error("required table `{0}` not found")]
    MissingTable(String),

    #[error("table `{0}` has no rows")]
    EmptyTable(String),

    #[error("baseline season {0} has no drafts or settings")]
    UnknownBaselineSeason(Season),
}

impl SchemaError {
    pub fn missing_column(table: &str, column: &str) -> Self {
        SchemaError::MissingColumn {
            table: table.to_string(),
            column: column.to_string(),
        }
    }
}
