use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalysisError {
    /// TOML parse / deserialization error.
    #[error("config parse error: {0}")]
    ConfigParse(String),
    /// Config validation error (inverted thresholds, bad view, etc.).
    #[error("config validation error: {0}")]
    ConfigValidation(String),
    /// Missing required column in an input table.
    #[error("table '{table}': missing column '{column}'")]
    MissingColumn { table: String, column: String },
    /// A required cell could not be parsed.
    #[error("table '{table}', row {row}: cannot parse {column} '{value}'")]
    ValueParse {
        table: String,
        row: usize,
        column: String,
        value: String,
    },
    /// Malformed CSV (ragged rows, bad quoting).
    #[error("table '{table}': {message}")]
    Csv { table: String, message: String },
    /// IO error (file read, etc.).
    #[error("IO error: {0}")]
    Io(String),
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
