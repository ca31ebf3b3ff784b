use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQL parsing error: {details}")]
    Parse { details: String },

    #[error("block {cid} not found")]
    NotFound { cid: String },

    #[error("codec error: {details}")]
    Codec { details: String },

    #[error("table '{name}' not found")]
    TableNotFound { name: String },

    #[error("table '{name}' already exists")]
    TableExists { name: String },

    #[error("column '{name}' not found in table '{table}'")]
    ColumnNotFound { name: String, table: String },

    #[error("duplicate column '{name}'")]
    DuplicateColumn { name: String },

    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("constraint violation: {details}")]
    Constraint { details: String },

    #[error("corrupted database: {reason}")]
    Corrupted { reason: String },
}

pub type Result<T> = std::result::Result<T, DatabaseError>;
