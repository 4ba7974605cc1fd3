use thiserror::Error;

pub type Result<T> = std::result::Result<T, OntoscopeError>;

#[derive(Debug, Error)]
pub enum OntoscopeError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("schema load failed: {0}")]
    SchemaLoad(String),

    #[error("{operation} failed: {message}")]
    Collaborator { operation: String, message: String },

    #[error("evaluation cancelled: {0}")]
    Cancelled(String),

    #[error("evaluation lease is held: name={name} owner={owner}")]
    LeaseHeld { name: String, owner: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[cfg(feature = "narrative-http")]
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl OntoscopeError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_FAILED",
            Self::NotFound(_) => "NOT_FOUND",
            Self::SchemaLoad(_) => "SCHEMA_LOAD_FAILED",
            Self::Collaborator { .. } => "COLLABORATOR_FAILED",
            Self::Cancelled(_) => "CANCELLED",
            Self::LeaseHeld { .. } => "LEASE_HELD",
            Self::Io(_) => "IO_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::Toml(_) => "TOML_ERROR",
            Self::Sqlite(_) => "SQLITE_ERROR",
            #[cfg(feature = "narrative-http")]
            Self::Http(_) => "HTTP_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn collaborator(operation: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Collaborator {
            operation: operation.into(),
            message: err.to_string(),
        }
    }

    pub fn mutex_poisoned(label: &str) -> Self {
        Self::Internal(format!("{label} mutex poisoned"))
    }
}
