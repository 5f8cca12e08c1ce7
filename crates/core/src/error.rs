use thiserror::Error;

use crate::container::descriptor::TypeKey;

/// Boxed error returned by user constructors
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result alias used across the crate
pub type DiResult<T> = Result<T, DiError>;

/// One step of the dependency chain that led to an unmet key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingLink {
    /// Constructor that declared the parameter
    pub constructor: String,
    /// The parameter key it asked for
    pub param: TypeKey,
}

/// A constructor taking part in a dependency cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleEntry {
    pub constructor: String,
    pub produces: Vec<TypeKey>,
}

/// Container error type
#[derive(Debug, Error)]
pub enum DiError {
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("Missing dependencies: no provider for {key}{}", render_chain(.chain))]
    MissingDependencies { key: TypeKey, chain: Vec<MissingLink> },

    #[error("Cycle detected: {}", render_cycle(.path))]
    CycleDetected { path: Vec<CycleEntry> },

    #[error("Constructor '{constructor}' failed: {source}")]
    Constructor {
        constructor: String,
        #[source]
        source: BoxError,
    },

    #[error("Type mismatch for {key}: expected {expected}")]
    TypeMismatch { key: TypeKey, expected: &'static str },

    #[error("Lock error on resource: {resource}")]
    LockError { resource: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DiError {
    /// Create a new invalid argument error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a missing dependency error without a causal chain
    pub fn missing(key: TypeKey) -> Self {
        Self::MissingDependencies {
            key,
            chain: Vec::new(),
        }
    }

    pub fn lock_error(resource: impl Into<String>) -> Self {
        Self::LockError {
            resource: resource.into(),
        }
    }

    /// Check if the error is a missing dependency error
    pub fn is_missing_dependency(&self) -> bool {
        matches!(self, Self::MissingDependencies { .. })
    }

    /// Check if the error is a cycle error
    pub fn is_cycle(&self) -> bool {
        matches!(self, Self::CycleDetected { .. })
    }

    /// Check if the error came from a user constructor
    pub fn is_constructor_error(&self) -> bool {
        matches!(self, Self::Constructor { .. })
    }

    /// Check if the error is an invalid argument error
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument { .. })
    }

    /// The unmet key of a missing dependency error
    pub fn missing_key(&self) -> Option<&TypeKey> {
        match self {
            Self::MissingDependencies { key, .. } => Some(key),
            _ => None,
        }
    }
}

fn render_chain(chain: &[MissingLink]) -> String {
    if chain.is_empty() {
        return String::new();
    }

    let steps = chain
        .iter()
        .map(|link| format!("{} needs {}", link.constructor, link.param))
        .collect::<Vec<_>>()
        .join(" -> ");
    format!(" (required by: {})", steps)
}

fn render_cycle(path: &[CycleEntry]) -> String {
    path.iter()
        .map(|entry| {
            let produces = entry
                .produces
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            format!("{} [{}]", entry.constructor, produces)
        })
        .collect::<Vec<_>>()
        .join(" -> ")
}
