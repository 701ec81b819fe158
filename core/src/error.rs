use thiserror::Error;

#[derive(Error, Debug)]
pub enum EvalError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Schema mismatch: table '{table}' has no column '{column}'")]
    SchemaMismatch { table: String, column: String },

    #[error("Duplicate key '{key}' in {table}")]
    DuplicateKey { table: String, key: String },

    #[error("Insufficient data: {reason}")]
    InsufficientData { reason: String },

    #[error("Rule '{name}' is already registered")]
    DuplicateRule { name: String },

    #[error("Invalid timestamp '{value}'")]
    InvalidTimestamp { value: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl EvalError {
    pub fn is_insufficient_data(&self) -> bool {
        matches!(self, Self::InsufficientData { .. })
    }
}

pub type EvalResult<T> = Result<T, EvalError>;
