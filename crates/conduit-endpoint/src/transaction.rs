//! Transaction demarcation settings carried by an endpoint.

use std::fmt::{Debug, Display, Formatter};
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::EndpointError;

/// How an endpoint takes part in a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionAction {
    #[default]
    None,
    AlwaysBegin,
    BeginOrJoin,
    AlwaysJoin,
    JoinIfPossible,
    Never,
    Indifferent,
    NotSupported,
}

impl TransactionAction {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::AlwaysBegin => "ALWAYS_BEGIN",
            Self::BeginOrJoin => "BEGIN_OR_JOIN",
            Self::AlwaysJoin => "ALWAYS_JOIN",
            Self::JoinIfPossible => "JOIN_IF_POSSIBLE",
            Self::Never => "NEVER",
            Self::Indifferent => "INDIFFERENT",
            Self::NotSupported => "NOT_SUPPORTED",
        }
    }

    /// Whether the action may start or join a transaction.
    pub const fn is_transactional(self) -> bool {
        !matches!(self, Self::None | Self::Never)
    }
}

impl Display for TransactionAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepts the configuration spellings `BEGIN_OR_JOIN`, `begin-or-join` and
/// `beginOrJoin` alike.
impl FromStr for TransactionAction {
    type Err = EndpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .map(|c| c.to_ascii_uppercase())
            .collect();
        let action = match normalized.as_str() {
            "NONE" => Self::None,
            "ALWAYSBEGIN" => Self::AlwaysBegin,
            "BEGINORJOIN" => Self::BeginOrJoin,
            "ALWAYSJOIN" => Self::AlwaysJoin,
            "JOINIFPOSSIBLE" => Self::JoinIfPossible,
            "NEVER" => Self::Never,
            "INDIFFERENT" => Self::Indifferent,
            "NOTSUPPORTED" => Self::NotSupported,
            _ => return Err(EndpointError::UnknownTransactionAction(s.to_owned())),
        };
        Ok(action)
    }
}

/// Creates transactions for one kind of resource. Its behaviour lives with the
/// transport; endpoints only need to know one is present.
pub trait TransactionFactory: Send + Sync + Debug {
    fn name(&self) -> &str;

    fn is_transacted(&self) -> bool {
        true
    }
}

/// Transaction settings of an endpoint.
///
/// Two configurations are equal when action and timeout match and they share
/// the same factory instance.
#[derive(Debug, Clone, Default)]
pub struct TransactionConfig {
    action: TransactionAction,
    factory: Option<Arc<dyn TransactionFactory>>,
    timeout: Option<Duration>,
}

impl TransactionConfig {
    pub fn new(action: TransactionAction) -> Self {
        Self {
            action,
            factory: None,
            timeout: None,
        }
    }

    /// No transaction at all.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_factory(mut self, factory: Arc<dyn TransactionFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn action(&self) -> TransactionAction {
        self.action
    }

    pub fn factory(&self) -> Option<&Arc<dyn TransactionFactory>> {
        self.factory.as_ref()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Whether an endpoint carrying this configuration must use request-response:
    /// a factory is present and the action can begin or join a transaction.
    pub fn requires_response(&self) -> bool {
        self.factory.is_some() && self.action.is_transactional()
    }
}

impl PartialEq for TransactionConfig {
    fn eq(&self, other: &Self) -> bool {
        let same_factory = match (&self.factory, &other.factory) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        };
        self.action == other.action && self.timeout == other.timeout && same_factory
    }
}

impl Eq for TransactionConfig {}

impl Hash for TransactionConfig {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.action.hash(state);
        self.timeout.hash(state);
        self.factory
            .as_ref()
            .map(|factory| Arc::as_ptr(factory).cast::<()>() as usize)
            .hash(state);
    }
}

impl Display for TransactionConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let Some(factory) = &self.factory else {
            return f.write_str("none");
        };
        write!(f, "{} via {}", self.action, factory.name())?;
        if let Some(timeout) = self.timeout {
            write!(f, " (timeout {}ms)", timeout.as_millis())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Jdbc;

    impl TransactionFactory for Jdbc {
        fn name(&self) -> &str {
            "jdbc"
        }
    }

    #[test]
    fn parses_configuration_spellings() {
        assert_eq!("BEGIN_OR_JOIN".parse(), Ok(TransactionAction::BeginOrJoin));
        assert_eq!("begin-or-join".parse(), Ok(TransactionAction::BeginOrJoin));
        assert_eq!("alwaysBegin".parse(), Ok(TransactionAction::AlwaysBegin));
        assert_eq!(" never ".parse(), Ok(TransactionAction::Never));
        assert_eq!(
            "sometimes".parse::<TransactionAction>(),
            Err(EndpointError::UnknownTransactionAction("sometimes".to_owned()))
        );
    }

    #[test]
    fn only_factory_backed_transactional_actions_require_a_response() {
        let jdbc: Arc<dyn TransactionFactory> = Arc::new(Jdbc);

        assert!(TransactionConfig::new(TransactionAction::AlwaysBegin)
            .with_factory(Arc::clone(&jdbc))
            .requires_response());
        assert!(!TransactionConfig::new(TransactionAction::AlwaysBegin).requires_response());
        assert!(!TransactionConfig::new(TransactionAction::Never)
            .with_factory(Arc::clone(&jdbc))
            .requires_response());
        assert!(!TransactionConfig::new(TransactionAction::None)
            .with_factory(jdbc)
            .requires_response());
    }

    #[test]
    fn display_renders_none_without_factory() {
        assert_eq!(TransactionConfig::new(TransactionAction::AlwaysBegin).to_string(), "none");

        let config = TransactionConfig::new(TransactionAction::BeginOrJoin)
            .with_factory(Arc::new(Jdbc))
            .with_timeout(Duration::from_secs(30));
        assert_eq!(config.to_string(), "BEGIN_OR_JOIN via jdbc (timeout 30000ms)");
    }

    #[test]
    fn equality_uses_factory_identity() {
        let jdbc: Arc<dyn TransactionFactory> = Arc::new(Jdbc);
        let a = TransactionConfig::new(TransactionAction::AlwaysJoin).with_factory(Arc::clone(&jdbc));
        let b = TransactionConfig::new(TransactionAction::AlwaysJoin).with_factory(jdbc);
        let other = TransactionConfig::new(TransactionAction::AlwaysJoin).with_factory(Arc::new(Jdbc));

        assert_eq!(a, b);
        assert_ne!(a, other);
        assert_ne!(a, a.clone().with_timeout(Duration::from_secs(1)));
    }
}
