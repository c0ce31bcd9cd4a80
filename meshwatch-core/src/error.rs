use meshwatch_contracts::TransportError;

/// Errors the aggregation engine can produce. Anything that reaches here
/// from `main` is treated as startup-fatal; failures encountered mid-loop
/// are logged and the iteration continues instead of propagating one of
/// these.
#[derive(Debug, thiserror::Error)]
pub enum AggregatorError {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("schema manifest: {0}")]
    SchemaManifest(String),

    #[error("snapshot serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("cluster transport: {0}")]
    Transport(#[from] TransportError),

    #[error("{0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, AggregatorError>;
