use crate::model::AccountId;

/// Failure reported by the remote reporting service
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("authentication failed: {0}")]
    Unauthenticated(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("temporarily unavailable: {0}")]
    Transient(String),

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("unexpected response: {0}")]
    Protocol(String),
}

impl ApiError {
    /// Short, stable name of the failure class used in log lines
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Unauthenticated(_) => "unauthenticated",
            ApiError::PermissionDenied(_) => "permission_denied",
            ApiError::Transient(_) => "transient",
            ApiError::InvalidQuery(_) => "invalid_query",
            ApiError::Protocol(_) => "protocol",
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, ApiError::Transient(_))
    }
}

/// An output sink failed to prepare its destination or to write a report
#[derive(Debug, thiserror::Error)]
#[error("{sink} sink failed for '{target}': {source}")]
pub struct SinkError {
    pub sink: &'static str,
    pub target: String,
    #[source]
    pub source: Box<dyn std::error::Error + Send + Sync>,
}

impl SinkError {
    pub fn new(
        sink: &'static str,
        target: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self {
            sink,
            target: target.into(),
            source: source.into(),
        }
    }
}

/// Failure of a single query task, contained at the task boundary
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error("query failed for account {account}: {source}")]
    Remote {
        account: AccountId,
        #[source]
        source: ApiError,
    },

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error("query task panicked: {0}")]
    Panicked(String),
}

impl ExecutionError {
    /// Account the failure happened for, when it is tied to one
    pub fn account(&self) -> Option<&AccountId> {
        match self {
            ExecutionError::Remote { account, .. } => Some(account),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ExecutionError::Remote { source, .. } => source.kind(),
            ExecutionError::Sink(_) => "sink",
            ExecutionError::Panicked(_) => "panic",
        }
    }
}
