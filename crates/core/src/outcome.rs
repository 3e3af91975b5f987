//! Terminal per-resource status for one reconciliation pass.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The terminal state a resource reaches in one pass.
///
/// `Skipped` and `Failed` carry a human-readable reason suitable for
/// operator logs. Skipped resources are retried on the next pass; failed
/// resources short-circuit their dependents for the current pass only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    /// The remote object matches the declared state, or the changes needed
    /// to get there were applied.
    Converged,
    /// Convergence was not attempted or was aborted; retry next pass.
    Skipped { reason: String },
    /// Convergence was attempted and failed.
    Failed { reason: String },
}

impl Outcome {
    /// Create a skipped outcome.
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self::Skipped {
            reason: reason.into(),
        }
    }

    /// Create a failed outcome.
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }

    /// Whether the resource converged.
    pub fn is_converged(&self) -> bool {
        matches!(self, Self::Converged)
    }

    /// Whether the resource failed.
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// The reason attached to a skipped or failed outcome.
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Converged => None,
            Self::Skipped { reason } | Self::Failed { reason } => Some(reason),
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Converged => write!(f, "converged"),
            Self::Skipped { reason } => write!(f, "skipped: {reason}"),
            Self::Failed { reason } => write!(f, "failed: {reason}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Outcome::Converged.to_string(), "converged");
        assert_eq!(
            Outcome::skipped("dependency failed").to_string(),
            "skipped: dependency failed"
        );
    }

    #[test]
    fn test_reason() {
        assert_eq!(Outcome::Converged.reason(), None);
        assert_eq!(Outcome::failed("boom").reason(), Some("boom"));
    }
}
