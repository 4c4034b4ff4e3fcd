use std::fmt::{Display, Formatter};

use thiserror::Error;

/// Failure reported by a [`ValueResolver`](crate::resolver::ValueResolver).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("no value available for parameter '{parameter}'")]
    MissingValue { parameter: String },
    #[error("context variable '{variable}' is not defined")]
    UndefinedVariable { variable: String },
}

/// Reason a raw object could not be produced or populated.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConstructionErrorKind {
    #[error("instantiation failed: {message}")]
    Instantiation { message: String },
    #[error("required parameter '{parameter}' has no value")]
    MissingParameter { parameter: String },
    #[error("parameter '{parameter}' rejected value: {message}")]
    InvalidParameter { parameter: String, message: String },
    #[error("parameter '{parameter}' is not declared on the target")]
    UnknownParameter { parameter: String },
    #[error("parameter group '{group}' is not accepted by the target")]
    UnknownGroup { group: String },
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
}

/// Raw instantiation or parameter-application failure, attributed to the object type.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("cannot build '{object_type}': {kind}")]
pub struct ConstructionError {
    pub object_type: String,
    #[source]
    pub kind: ConstructionErrorKind,
}

impl ConstructionError {
    pub fn new(object_type: impl Into<String>, kind: ConstructionErrorKind) -> Self {
        Self {
            object_type: object_type.into(),
            kind,
        }
    }
}

/// Error a [`Configurable`](crate::parameter::Configurable) target reports while accepting values.
///
/// The object builder attributes it to the object type before surfacing it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParameterError {
    #[error("unknown parameter '{0}'")]
    Unknown(String),
    #[error("unknown parameter group '{0}'")]
    UnknownGroup(String),
    #[error("invalid value for '{parameter}': {message}")]
    Invalid { parameter: String, message: String },
}

impl ParameterError {
    pub fn invalid(parameter: impl Into<String>, message: impl Display) -> Self {
        Self::Invalid {
            parameter: parameter.into(),
            message: message.to_string(),
        }
    }

    pub(crate) fn into_kind(self) -> ConstructionErrorKind {
        match self {
            Self::Unknown(parameter) => ConstructionErrorKind::UnknownParameter { parameter },
            Self::UnknownGroup(group) => ConstructionErrorKind::UnknownGroup { group },
            Self::Invalid { parameter, message } => {
                ConstructionErrorKind::InvalidParameter { parameter, message }
            }
        }
    }
}

/// Failure of [`ConnectionProviderBuilder::build`](crate::connection::ConnectionProviderBuilder::build).
#[derive(Debug, Error)]
pub enum ProviderBuildError {
    #[error("connection provider '{provider}' could not be constructed")]
    Construction {
        provider: String,
        #[source]
        source: ConstructionError,
    },
    #[error(
        "connection provider '{provider}' has no retry policy template and the connection manager offers no default"
    )]
    RetryPolicyUnavailable { provider: String },
}

impl ProviderBuildError {
    pub fn provider(&self) -> &str {
        match self {
            Self::Construction { provider, .. } | Self::RetryPolicyUnavailable { provider } => {
                provider
            }
        }
    }
}

/// Connection-level error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionErrorKind {
    /// The remote side could not be reached; worth another attempt.
    Unavailable,
    /// The remote side rejected the connection (credentials, configuration).
    Refused,
    /// A connection was obtained but failed validation.
    Invalid,
    /// The pool had no free slot within its exhaustion policy.
    PoolExhausted,
    /// The process is shutting down.
    Shutdown,
    /// The retry policy budget was spent without a successful attempt.
    RetriesExhausted,
}

/// Structured connection error used by providers and their decorators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionError {
    kind: ConnectionErrorKind,
    message: String,
    retryable: bool,
    attempts: u32,
}

impl ConnectionError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::with_kind(ConnectionErrorKind::Unavailable, message, true)
    }

    pub fn refused(message: impl Into<String>) -> Self {
        Self::with_kind(ConnectionErrorKind::Refused, message, false)
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::with_kind(ConnectionErrorKind::Invalid, message, false)
    }

    pub fn pool_exhausted(message: impl Into<String>) -> Self {
        Self::with_kind(ConnectionErrorKind::PoolExhausted, message, false)
    }

    pub fn shutdown(message: impl Into<String>) -> Self {
        Self::with_kind(ConnectionErrorKind::Shutdown, message, false)
    }

    /// Wraps the last failure once the retry budget is spent.
    pub fn retries_exhausted(attempts: u32, last: &ConnectionError) -> Self {
        Self {
            kind: ConnectionErrorKind::RetriesExhausted,
            message: format!("gave up after {attempts} attempt(s): {last}"),
            retryable: false,
            attempts,
        }
    }

    fn with_kind(kind: ConnectionErrorKind, message: impl Into<String>, retryable: bool) -> Self {
        Self {
            kind,
            message: message.into(),
            retryable,
            attempts: 1,
        }
    }

    pub const fn kind(&self) -> ConnectionErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn retryable(&self) -> bool {
        self.retryable
    }

    /// Number of connect attempts made before this error surfaced.
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            ConnectionErrorKind::Unavailable => "connection.unavailable",
            ConnectionErrorKind::Refused => "connection.refused",
            ConnectionErrorKind::Invalid => "connection.invalid",
            ConnectionErrorKind::PoolExhausted => "connection.pool_exhausted",
            ConnectionErrorKind::Shutdown => "connection.shutdown",
            ConnectionErrorKind::RetriesExhausted => "connection.retries_exhausted",
        }
    }
}

impl Display for ConnectionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for ConnectionError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retries_exhausted_keeps_last_failure_in_message() {
        let last = ConnectionError::unavailable("host unreachable");
        let error = ConnectionError::retries_exhausted(3, &last);

        assert_eq!(error.kind(), ConnectionErrorKind::RetriesExhausted);
        assert_eq!(error.attempts(), 3);
        assert!(!error.retryable());
        assert!(error.message().contains("host unreachable"));
        assert_eq!(error.code(), "connection.retries_exhausted");
    }

    #[test]
    fn only_unavailable_is_retryable() {
        assert!(ConnectionError::unavailable("x").retryable());
        assert!(!ConnectionError::refused("x").retryable());
        assert!(!ConnectionError::invalid("x").retryable());
        assert!(!ConnectionError::pool_exhausted("x").retryable());
        assert!(!ConnectionError::shutdown("x").retryable());
    }

    #[test]
    fn provider_build_error_names_the_provider() {
        let error = ProviderBuildError::RetryPolicyUnavailable {
            provider: "ftp-connection".to_owned(),
        };
        assert_eq!(error.provider(), "ftp-connection");
        assert!(error.to_string().contains("ftp-connection"));
    }
}
