use crate::protocol::ErrorEnvelope;
use thiserror::Error;

/// A list specifying categories of [`RelayError`](crate::RelayError).
///
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum RelayError {
    /// Malformed envelope, unknown discriminator, or invalid tag.
    #[error("Protocol error: {}", _0)]
    Protocol(String),

    /// The engine rejected or failed the operation; code and SQLSTATE are
    /// engine-supplied, `causes` preserves the engine-side cause chain.
    #[error("Engine error: {}", message)]
    Engine {
        message: String,
        code: i32,
        sql_state: String,
        causes: Vec<String>,
    },

    /// Operation against a closed, canceled, or unknown id.
    #[error("State error: {}", _0)]
    State(String),

    /// Id not found because it was evicted, or a cursor offset is out of range.
    #[error("Resource error: {}", _0)]
    Resource(String),

    /// Parameter arity or type mismatch on execute.
    #[error("Invalid parameter: {}", _0)]
    InvalidParameter(String),

    /// The statement's cursor was canceled; observed at the next row boundary.
    #[error("Statement canceled")]
    Canceled,

    /// The server answered with an error envelope (client side).
    #[error("{}", envelope.joined_message())]
    Remote {
        /// The error envelope as received from the server.
        envelope: ErrorEnvelope,
    },

    /// Error occured in communication with the gateway or the engine.
    #[error(transparent)]
    Io {
        /// The causing Error.
        #[from]
        source: std::io::Error,
    },

    /// Textual translation failed.
    #[error("Textual translation failed")]
    Json {
        /// The causing Error.
        #[from]
        source: serde_json::Error,
    },

    /// The HTTP round trip itself failed (client side).
    #[error("HTTP transport failed")]
    Transport {
        /// The causing Error.
        #[from]
        source: reqwest::Error,
    },

    /// Error occured in thread synchronization.
    #[error("Error occured in thread synchronization")]
    Poison,

    /// Error caused by wrong usage.
    #[error("Wrong usage: {}", _0)]
    Usage(&'static str),

    /// Error caused by wrong usage.
    #[error("Wrong usage: {}", _0)]
    UsageDetailed(String),

    /// Implementation error.
    #[error("Implementation error: {}", _0)]
    Impl(&'static str),

    /// Implementation error.
    #[error("Implementation error: {}", _0)]
    ImplDetailed(String),
}

/// Abbreviation of `Result<T, RelayError>`.
pub type RelayResult<T> = std::result::Result<T, RelayError>;

impl RelayError {
    /// Builds an engine error without an explicit code or SQLSTATE.
    pub fn engine<S: Into<String>>(message: S) -> Self {
        Self::Engine {
            message: message.into(),
            code: crate::protocol::UNKNOWN_ERROR_CODE,
            sql_state: crate::protocol::UNKNOWN_SQL_STATE.to_string(),
            causes: Vec::new(),
        }
    }

    /// Returns the error envelope received from the server, if any.
    ///
    /// This method helps in case you need programmatic access to e.g. the
    /// server-side error code or the individual cause strings.
    pub fn server_envelope(&self) -> Option<&ErrorEnvelope> {
        match self {
            Self::Remote { envelope } => Some(envelope),
            _ => None,
        }
    }

    /// Reveal the inner error.
    pub fn inner(&self) -> Option<&dyn std::error::Error> {
        match self {
            Self::Io { source } => Some(source),
            Self::Json { source } => Some(source),
            Self::Transport { source } => Some(source),
            _ => None,
        }
    }

    /// The diagnostic string chain for the wire envelope, outermost first.
    pub(crate) fn diagnostic_chain(&self) -> Vec<String> {
        match self {
            Self::Engine { message, causes, .. } => {
                let mut chain = vec![message.clone()];
                chain.extend(causes.iter().cloned());
                chain
            }
            other => {
                let mut chain = vec![other.to_string()];
                let mut source = other.inner();
                while let Some(cause) = source {
                    chain.push(cause.to_string());
                    source = cause.source();
                }
                chain
            }
        }
    }
}

impl<G> From<std::sync::PoisonError<G>> for RelayError {
    fn from(_error: std::sync::PoisonError<G>) -> Self {
        Self::Poison
    }
}
