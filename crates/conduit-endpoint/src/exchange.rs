use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EndpointError;

/// Whether an interaction through an endpoint expects a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExchangePattern {
    #[default]
    OneWay,
    RequestResponse,
}

impl ExchangePattern {
    pub const fn has_response(self) -> bool {
        matches!(self, Self::RequestResponse)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OneWay => "one-way",
            Self::RequestResponse => "request-response",
        }
    }
}

impl Display for ExchangePattern {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state an endpoint is brought up in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitialState {
    #[default]
    Started,
    Stopped,
}

impl InitialState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Stopped => "stopped",
        }
    }
}

impl Display for InitialState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InitialState {
    type Err = EndpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "started" => Ok(Self::Started),
            "stopped" => Ok(Self::Stopped),
            _ => Err(EndpointError::UnknownInitialState(s.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        assert_eq!(ExchangePattern::default(), ExchangePattern::OneWay);
        assert!(!ExchangePattern::OneWay.has_response());
        assert!(ExchangePattern::RequestResponse.has_response());
        assert_eq!(InitialState::default(), InitialState::Started);
    }

    #[test]
    fn serde_names() {
        assert_eq!(
            serde_json::to_string(&ExchangePattern::RequestResponse).expect("serializes"),
            "\"request-response\""
        );
        let state: InitialState = serde_json::from_str("\"stopped\"").expect("deserializes");
        assert_eq!(state, InitialState::Stopped);
    }

    #[test]
    fn initial_state_parses_case_insensitively() {
        assert_eq!("Stopped".parse::<InitialState>(), Ok(InitialState::Stopped));
        assert_eq!(
            "paused".parse::<InitialState>(),
            Err(EndpointError::UnknownInitialState("paused".to_owned()))
        );
    }
}
