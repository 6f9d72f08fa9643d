use crate::ObjectType;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    #[error("failed to set up pool for instance {instance}: {message}")]
    PoolSetup { instance: String, message: String },

    #[error("unknown instance: {0}")]
    UnknownInstance(String),

    #[error("cannot connect to {target}: {message}")]
    Connection { target: String, message: String },

    #[error("extraction failed: {0}")]
    Extraction(String),

    #[error("snapshot error: {0}")]
    Snapshot(String),

    #[error("modified {object_type} {object_name} has no attribute differences")]
    EmptyModification {
        object_type: ObjectType,
        object_name: String,
    },
}
