//! Per-provider outcomes of one symbol resolution, for diagnostics and tests.

use std::fmt;

use crate::errors::ProviderErrorKind;
use crate::models::ProviderId;

/// Why a provider was passed over without being called.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// The provider's circuit is open.
    CircuitOpen,
    /// The rate limiter denied the call.
    RateLimited { remaining: u32, limit: u32 },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CircuitOpen => write!(f, "circuit open"),
            Self::RateLimited { limit, .. } => write!(f, "rate limited ({} per window)", limit),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttemptOutcome {
    Succeeded,
    Skipped(SkipReason),
    Failed(ProviderErrorKind),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderAttempt {
    pub provider_id: ProviderId,
    pub outcome: AttemptOutcome,
}

/// Ordered record of what each provider in the chain did for one symbol.
#[derive(Clone, Debug, Default)]
pub struct AttemptTrace {
    attempts: Vec<ProviderAttempt>,
}

impl AttemptTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&mut self, provider_id: ProviderId, outcome: AttemptOutcome) {
        self.attempts.push(ProviderAttempt {
            provider_id,
            outcome,
        });
    }

    pub fn attempts(&self) -> &[ProviderAttempt] {
        &self.attempts
    }

    pub fn has_success(&self) -> bool {
        self.attempts
            .iter()
            .any(|a| a.outcome == AttemptOutcome::Succeeded)
    }

    /// Whether every provider was skipped without being called.
    pub fn all_skipped(&self) -> bool {
        !self.attempts.is_empty()
            && self
                .attempts
                .iter()
                .all(|a| matches!(a.outcome, AttemptOutcome::Skipped(_)))
    }

    /// Ids of providers that were actually called, in order.
    pub fn called(&self) -> Vec<&str> {
        self.attempts
            .iter()
            .filter(|a| !matches!(a.outcome, AttemptOutcome::Skipped(_)))
            .map(|a| a.provider_id.as_ref())
            .collect()
    }

    /// One-line summary such as `YAHOO: FAILED (TIMEOUT) -> POLYGON: OK`.
    pub fn summary(&self) -> String {
        self.attempts
            .iter()
            .map(|a| match &a.outcome {
                AttemptOutcome::Succeeded => format!("{}: OK", a.provider_id),
                AttemptOutcome::Skipped(reason) => {
                    format!("{}: SKIPPED ({})", a.provider_id, reason)
                }
                AttemptOutcome::Failed(kind) => format!("{}: FAILED ({})", a.provider_id, kind),
            })
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}
