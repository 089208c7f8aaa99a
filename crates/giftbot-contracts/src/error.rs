use std::fmt;

use thiserror::Error;

use crate::providers::{ChainExhausted, FailureKind, ProviderFailure};

/// Input rejected before any strategy runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {field}: {reason}")]
pub struct ValidationError {
    pub field: &'static str,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CatalogError {
    #[error("product '{name}' has a non-positive price")]
    InvalidPrice { name: String },
    #[error("product '{name}' has rating {rating} outside 0..=5")]
    InvalidRating { name: String, rating: f32 },
    #[error("product id {id} appears more than once")]
    DuplicateId { id: u32 },
    #[error("product {id} has an empty name")]
    EmptyName { id: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalKind {
    /// Every strategy refused the request shape or had no credential.
    CapabilityUnsupported,
    Generic,
}

impl TerminalKind {
    /// Pick the kind from the collected failures of an exhausted chain.
    pub fn from_failures(failures: &[ProviderFailure]) -> Self {
        let all_unsupported = !failures.is_empty()
            && failures.iter().all(|failure| {
                matches!(
                    failure.kind,
                    FailureKind::Unsupported | FailureKind::MissingCredential
                )
            });
        if all_unsupported {
            TerminalKind::CapabilityUnsupported
        } else {
            TerminalKind::Generic
        }
    }

    pub fn remediation(&self) -> &'static str {
        match self {
            TerminalKind::CapabilityUnsupported => {
                "The configured image providers cannot handle this request; check the API key and model configuration."
            }
            TerminalKind::Generic => "Image generation failed for now; please try again in a moment.",
        }
    }
}

impl fmt::Display for TerminalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminalKind::CapabilityUnsupported => f.write_str("capability unsupported"),
            TerminalKind::Generic => f.write_str("generic failure"),
        }
    }
}

/// A failure with no further fallback, surfaced to the end user.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind}: {message}")]
pub struct TerminalError {
    pub kind: TerminalKind,
    pub message: String,
    pub failures: Vec<ProviderFailure>,
}

impl From<ChainExhausted> for TerminalError {
    fn from(exhausted: ChainExhausted) -> Self {
        let failures = exhausted.failures;
        let kind = TerminalKind::from_failures(&failures);
        Self {
            kind,
            message: kind.remediation().to_string(),
            failures,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BrokerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Terminal(#[from] TerminalError),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(kind: FailureKind) -> ProviderFailure {
        ProviderFailure::new("imagen", kind, "nope")
    }

    #[test]
    fn terminal_kind_is_unsupported_only_when_every_failure_is_capability_related() {
        let unsupported = vec![
            failure(FailureKind::MissingCredential),
            failure(FailureKind::Unsupported),
        ];
        assert_eq!(
            TerminalKind::from_failures(&unsupported),
            TerminalKind::CapabilityUnsupported
        );

        let mixed = vec![failure(FailureKind::Unsupported), failure(FailureKind::Timeout)];
        assert_eq!(TerminalKind::from_failures(&mixed), TerminalKind::Generic);
        assert_eq!(TerminalKind::from_failures(&[]), TerminalKind::Generic);
    }

    #[test]
    fn terminal_error_message_names_the_remediation() {
        let err = TerminalError::from(ChainExhausted {
            failures: vec![failure(FailureKind::Auth)],
        });
        assert_eq!(err.kind, TerminalKind::Generic);
        assert!(err.to_string().starts_with("generic failure: "));
        assert_eq!(err.failures.len(), 1);
    }
}
