use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Inputs the engine refuses to compute on. Callers fall back to a neutral result.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("simulation worker failed: {0}")]
    Worker(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;

pub(crate) fn invalid(msg: impl Into<String>) -> EngineError {
    EngineError::InvalidConfiguration(msg.into())
}
