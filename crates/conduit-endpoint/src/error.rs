use thiserror::Error;

use crate::uri::redact_unparsed;

/// An endpoint address that cannot be parsed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid endpoint uri '{uri}': {source}")]
pub struct UriError {
    /// The address with any embedded password already redacted.
    pub uri: String,
    #[source]
    pub source: url::ParseError,
}

impl UriError {
    pub fn new(uri: &str, source: url::ParseError) -> Self {
        Self {
            uri: redact_unparsed(uri).into_owned(),
            source,
        }
    }
}

/// Failure reported by a chain factory while building an endpoint's chain.
///
/// Endpoints surface it unchanged and cache nothing, so a later request
/// attempts the build again.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChainConstructionError {
    #[error("processor '{processor}' cannot be added to the chain: {message}")]
    Processor { processor: String, message: String },
    #[error("chain construction failed: {0}")]
    Factory(String),
}

/// Failure raised while a message travels through a chain.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProcessingError {
    #[error("transformer '{transformer}' failed: {message}")]
    Transformation { transformer: String, message: String },
    #[error("security filter rejected the message: {message}")]
    Unauthorized { message: String },
    #[error("processor '{processor}' failed: {message}")]
    Processor { processor: String, message: String },
}

/// Endpoint assembly failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EndpointError {
    #[error(transparent)]
    Uri(#[from] UriError),
    #[error("unknown transaction action '{0}'")]
    UnknownTransactionAction(String),
    #[error("unknown initial state '{0}'")]
    UnknownInitialState(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uri_error_names_the_address() {
        let error = UriError::new("::nope", url::ParseError::RelativeUrlWithoutBase);
        assert!(error.to_string().starts_with("invalid endpoint uri '::nope'"));

        let wrapped = EndpointError::from(error.clone());
        assert_eq!(wrapped.to_string(), error.to_string());
    }
}
