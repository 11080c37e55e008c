use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid time period format: {0}. Use 'YYYY', 'YYYYT[1-3]', or a range such as '2024T2-2025T1'")]
    InvalidPeriodFormat(String),

    #[error("Invalid date: {0}. Expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("Missing required column: {0}")]
    MissingColumn(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Row on line {line} has {found} cells but the header has {expected}")]
    RaggedRow {
        line: u64,
        found: usize,
        expected: usize,
    },
}

impl Error {
    pub fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Error::Database(e.to_string())
    }
}

impl From<rusqlite_migration::Error> for Error {
    fn from(e: rusqlite_migration::Error) -> Self {
        Error::Migration(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
