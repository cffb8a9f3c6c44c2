use http::StatusCode;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors shared by the intent clients, the apply engines, and the policy controller.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No entity exists for the given composite key.
    #[error("{0}")]
    NotFound(String),

    /// A create without upsert hit an existing key, or a delete would orphan child documents.
    #[error("{0}")]
    Conflict(String),

    /// Missing required fields, a malformed patch, or an unknown GVK.
    #[error("{0}")]
    Validation(String),

    /// A store, context db, HTTP, or gRPC collaborator failed.
    #[error("{context}: {source}")]
    Downstream {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    /// The stored intents describe an impossible topology.
    #[error("{0}")]
    Invariant(String),
}

// === impl Error ===

impl Error {
    pub fn not_found(msg: impl ToString) -> Self {
        Self::NotFound(msg.to_string())
    }

    pub fn conflict(msg: impl ToString) -> Self {
        Self::Conflict(msg.to_string())
    }

    pub fn validation(msg: impl ToString) -> Self {
        Self::Validation(msg.to_string())
    }

    pub fn invariant(msg: impl ToString) -> Self {
        Self::Invariant(msg.to_string())
    }

    pub fn downstream<E>(context: impl ToString, source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    {
        Self::Downstream {
            context: context.to_string(),
            source: source.into(),
        }
    }

    /// Prefixes the message with `context`, keeping the error's class.
    pub fn context(self, context: impl std::fmt::Display) -> Self {
        match self {
            Self::NotFound(msg) => Self::NotFound(format!("{context}: {msg}")),
            Self::Conflict(msg) => Self::Conflict(format!("{context}: {msg}")),
            Self::Validation(msg) => Self::Validation(format!("{context}: {msg}")),
            Self::Invariant(msg) => Self::Invariant(format!("{context}: {msg}")),
            Self::Downstream {
                context: inner,
                source,
            } => Self::Downstream {
                context: format!("{context}: {inner}"),
                source,
            },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// The HTTP status a REST handler reports for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Validation(_) | Self::Invariant(_) => StatusCode::BAD_REQUEST,
            Self::Downstream { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Self::downstream("failed to decode document", error)
    }
}
