use std::fmt;

use serde::Serialize;
use thiserror::Error;

pub trait NamedProvider {
    fn name(&self) -> &str;
}

impl<T: NamedProvider + ?Sized> NamedProvider for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    MissingCredential,
    Transport,
    Timeout,
    Auth,
    Unsupported,
    Malformed,
    Empty,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::MissingCredential => "missing_credential",
            FailureKind::Transport => "transport",
            FailureKind::Timeout => "timeout",
            FailureKind::Auth => "auth",
            FailureKind::Unsupported => "unsupported",
            FailureKind::Malformed => "malformed",
            FailureKind::Empty => "empty",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderFailure {
    pub strategy: String,
    pub kind: FailureKind,
    pub detail: String,
}

impl ProviderFailure {
    pub fn new(strategy: impl Into<String>, kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            strategy: strategy.into(),
            kind,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.strategy, self.kind, self.detail)
    }
}

/// Outcome of a single strategy attempt. Strategies never return `Err`;
/// transport and parse errors are folded into `Failure` at their boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderResult<T> {
    Success(T),
    Failure(ProviderFailure),
}

impl<T> From<Result<T, ProviderFailure>> for ProviderResult<T> {
    fn from(value: Result<T, ProviderFailure>) -> Self {
        match value {
            Ok(payload) => ProviderResult::Success(payload),
            Err(failure) => ProviderResult::Failure(failure),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Won<T> {
    pub strategy: String,
    pub payload: T,
    /// Failures of the strategies tried before the winner.
    pub failures: Vec<ProviderFailure>,
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("all {} strategies failed", failures.len())]
pub struct ChainExhausted {
    pub failures: Vec<ProviderFailure>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChainOutcome<T> {
    pub winner: Option<(String, T)>,
    pub failures: Vec<ProviderFailure>,
}

impl<T> ChainOutcome<T> {
    pub fn into_result(self) -> Result<Won<T>, ChainExhausted> {
        match self.winner {
            Some((strategy, payload)) => Ok(Won {
                strategy,
                payload,
                failures: self.failures,
            }),
            None => Err(ChainExhausted {
                failures: self.failures,
            }),
        }
    }
}

/// Attempt each strategy in order until one succeeds.
///
/// Attempts are strictly sequential: a strategy only runs after every earlier
/// one has returned `Failure`. Each failure is logged as it happens, whether
/// or not a later strategy wins.
pub fn run_chain<'a, S, T, I, F>(strategies: I, mut attempt: F) -> ChainOutcome<T>
where
    S: NamedProvider + ?Sized + 'a,
    I: IntoIterator<Item = &'a S>,
    F: FnMut(&S) -> ProviderResult<T>,
{
    let mut failures = Vec::new();
    for strategy in strategies {
        tracing::debug!(strategy = strategy.name(), "attempting strategy");
        match attempt(strategy) {
            ProviderResult::Success(payload) => {
                return ChainOutcome {
                    winner: Some((strategy.name().to_string(), payload)),
                    failures,
                };
            }
            ProviderResult::Failure(failure) => {
                tracing::warn!(
                    strategy = %failure.strategy,
                    kind = %failure.kind,
                    detail = %failure.detail,
                    "strategy failed"
                );
                failures.push(failure);
            }
        }
    }
    ChainOutcome {
        winner: None,
        failures,
    }
}
