//! # Issuance Errors
//!
//! Every failure that crosses a component boundary is one of four kinds.
//! Internal failures (source errors, prover errors, timeouts) are converted
//! into these before they leave the component that saw them.
//!
//! | Kind                  | Cause                                   | Retry? |
//! |-----------------------|-----------------------------------------|--------|
//! | `Validation`          | malformed or missing request fields     | no     |
//! | `NotFound`            | customer unknown to the credit bureau   | no     |
//! | `UpstreamUnavailable` | bureau or prover unreachable/timed out  | yes    |
//! | `ProofStructure`      | commitment failed verification          | no     |
//!
//! An expired token is not an error. It is an observable state
//! ([`crate::registry::TokenStatus::Expired`]) that routes the request back
//! into issuance.

use thiserror::Error;

/// Errors surfaced by the issuance path.
#[derive(Debug, Error)]
pub enum IssuanceError {
    /// The request is malformed. Nothing was looked up or written.
    #[error("invalid request: {0}")]
    Validation(String),

    /// The credit bureau has no record of this customer.
    #[error("customer not found: {customer_id}")]
    NotFound {
        /// The identifier that was looked up.
        customer_id: String,
    },

    /// A collaborator (bureau or proof backend) failed or timed out.
    #[error("upstream unavailable ({service}): {reason}")]
    UpstreamUnavailable {
        /// Which collaborator failed: `"bureau"` or `"prover"`.
        service: &'static str,
        /// Human-readable cause.
        reason: String,
    },

    /// A freshly built commitment did not verify.
    #[error("proof commitment rejected: {0}")]
    ProofStructure(String),
}

impl IssuanceError {
    /// Stable machine-readable name of the error kind. Used as the `kind`
    /// field in HTTP error bodies and as a metrics/log label.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::NotFound { .. } => "not_found",
            Self::UpstreamUnavailable { .. } => "upstream_unavailable",
            Self::ProofStructure(_) => "proof_structure",
        }
    }

    /// Whether the caller may reasonably retry the same request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::UpstreamUnavailable { .. })
    }

    pub(crate) fn bureau(reason: impl Into<String>) -> Self {
        Self::UpstreamUnavailable {
            service: "bureau",
            reason: reason.into(),
        }
    }

    pub(crate) fn prover(reason: impl Into<String>) -> Self {
        Self::UpstreamUnavailable {
            service: "prover",
            reason: reason.into(),
        }
    }
}

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, IssuanceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_distinct() {
        let errs = [
            IssuanceError::Validation("x".into()),
            IssuanceError::NotFound {
                customer_id: "C".into(),
            },
            IssuanceError::bureau("down"),
            IssuanceError::ProofStructure("bad".into()),
        ];
        let mut kinds: Vec<_> = errs.iter().map(|e| e.kind()).collect();
        kinds.sort();
        kinds.dedup();
        assert_eq!(kinds.len(), 4);
    }

    #[test]
    fn only_upstream_is_retryable() {
        assert!(IssuanceError::prover("timeout").is_retryable());
        assert!(!IssuanceError::Validation("x".into()).is_retryable());
        assert!(!IssuanceError::NotFound {
            customer_id: "C".into()
        }
        .is_retryable());
        assert!(!IssuanceError::ProofStructure("x".into()).is_retryable());
    }

    #[test]
    fn display_includes_context() {
        let err = IssuanceError::bureau("connection refused");
        let msg = err.to_string();
        assert!(msg.contains("bureau"));
        assert!(msg.contains("connection refused"));

        let err = IssuanceError::NotFound {
            customer_id: "CUST_404".into(),
        };
        assert!(err.to_string().contains("CUST_404"));
    }
}
