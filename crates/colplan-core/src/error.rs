use thiserror::Error;

/// Canonical result for core and every crate layered on it.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("unknown column '{0}'")]
    UnknownColumn(String),

    #[error("unknown table '{0}'")]
    UnknownTable(String),

    #[error("unknown struct field '{field}' (available: {})", .available.join(", "))]
    UnknownStructField { field: String, available: Vec<String> },

    #[error("invalid selector pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("ambiguous column '{0}': name produced more than once")]
    AmbiguousColumn(String),

    #[error("column '{0}' must appear in GROUP BY or be used in an aggregate function")]
    GroupByProjection(String),

    #[error("SQL syntax error: {message}{}", position_suffix(.line, .column))]
    SqlSyntax {
        message: String,
        line: Option<u64>,
        column: Option<u64>,
    },

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Planning error: {0}")]
    Plan(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Internal invariant failed: {0}")]
    Invariant(String),
}

fn position_suffix(line: &Option<u64>, column: &Option<u64>) -> String {
    match (line, column) {
        (Some(l), Some(c)) => format!(" (line {l}, column {c})"),
        (Some(l), None) => format!(" (line {l})"),
        _ => String::new(),
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Invariant(e.to_string())
    }
}
