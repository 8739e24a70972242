//! # Protocol Configuration & Constants
//!
//! Every magic number in zkgrade lives here: grade bands, loan ceilings,
//! validity window, timeouts and default ports. If you are hardcoding one of
//! these somewhere else, move it here.
//!
//! [`IssuanceConfig`] is the runtime-tunable subset. The node builds one
//! from CLI flags and environment variables; tests build one with
//! `Default` and override what they need.

use std::time::Duration;

// ---------------------------------------------------------------------------
// Protocol Version
// ---------------------------------------------------------------------------

/// Version string reported by the node's status endpoint.
pub const PROTOCOL_VERSION: &str = "0.1.0";

// ---------------------------------------------------------------------------
// Credit Scores & Grades
// ---------------------------------------------------------------------------

/// Lowest score a bureau may report.
pub const MIN_CREDIT_SCORE: u32 = 0;

/// Highest score a bureau may report. Anything above this is malformed
/// upstream data, not an exceptionally good customer.
pub const MAX_CREDIT_SCORE: u32 = 1_000;

/// Lower bound (inclusive) of grade A.
pub const GRADE_A_MIN_SCORE: u32 = 800;

/// Lower bound (inclusive) of grade B.
pub const GRADE_B_MIN_SCORE: u32 = 700;

/// Lower bound (inclusive) of grade C.
pub const GRADE_C_MIN_SCORE: u32 = 600;

/// Lower bound (inclusive) of grade D. Everything below is grade E.
pub const GRADE_D_MIN_SCORE: u32 = 500;

// ---------------------------------------------------------------------------
// Loan Ceilings
// ---------------------------------------------------------------------------
//
// Same currency unit as requested amounts (the reference deployment uses KRW,
// so grade A tops out at 100 million).

/// Maximum loan amount for grade A.
pub const GRADE_A_LOAN_LIMIT: u64 = 100_000_000;

/// Maximum loan amount for grade B.
pub const GRADE_B_LOAN_LIMIT: u64 = 50_000_000;

/// Maximum loan amount for grade C.
pub const GRADE_C_LOAN_LIMIT: u64 = 20_000_000;

/// Maximum loan amount for grade D.
pub const GRADE_D_LOAN_LIMIT: u64 = 5_000_000;

/// Grade E does not qualify for credit.
pub const GRADE_E_LOAN_LIMIT: u64 = 0;

// ---------------------------------------------------------------------------
// Token Lifecycle
// ---------------------------------------------------------------------------

/// How long an issued token stays live, in days.
pub const TOKEN_VALIDITY_DAYS: i64 = 30;

/// Identifier of the agency that signs off on issued tokens.
pub const DEFAULT_ISSUER_ID: &str = "EXTERNAL_AGENCY_001";

// ---------------------------------------------------------------------------
// Collaborator Timeouts
// ---------------------------------------------------------------------------

/// Upper bound on a single credit-bureau lookup.
pub const DEFAULT_BUREAU_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bound on a single proof generation. Groth16 proving for the
/// grade-band circuit takes milliseconds; thirty seconds is for slow
/// external provers plugged in behind the same trait.
pub const DEFAULT_PROVER_TIMEOUT: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// Network Defaults
// ---------------------------------------------------------------------------

/// Default HTTP API port.
pub const DEFAULT_API_PORT: u16 = 5000;

/// Default metrics (Prometheus) port.
pub const DEFAULT_METRICS_PORT: u16 = 5001;

// ---------------------------------------------------------------------------
// IssuanceConfig
// ---------------------------------------------------------------------------

/// Runtime knobs for the issuance path.
#[derive(Debug, Clone)]
pub struct IssuanceConfig {
    /// Lifetime of a freshly issued token.
    pub validity_window: chrono::Duration,

    /// Timeout applied to every credit-bureau call.
    pub bureau_timeout: Duration,

    /// Timeout applied to every proof generation.
    pub prover_timeout: Duration,

    /// Issuer recorded on every token.
    pub issuer_id: String,
}

impl Default for IssuanceConfig {
    fn default() -> Self {
        Self {
            validity_window: chrono::Duration::days(TOKEN_VALIDITY_DAYS),
            bureau_timeout: DEFAULT_BUREAU_TIMEOUT,
            prover_timeout: DEFAULT_PROVER_TIMEOUT,
            issuer_id: DEFAULT_ISSUER_ID.to_string(),
        }
    }
}

impl IssuanceConfig {
    /// Human-readable validity period stored in token attributes,
    /// e.g. `"30 days"`.
    pub fn validity_label(&self) -> String {
        let days = self.validity_window.num_days();
        if days >= 1 && self.validity_window == chrono::Duration::days(days) {
            format!("{} days", days)
        } else {
            format!("{} seconds", self.validity_window.num_seconds())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grade_thresholds_strictly_descending() {
        assert!(GRADE_A_MIN_SCORE > GRADE_B_MIN_SCORE);
        assert!(GRADE_B_MIN_SCORE > GRADE_C_MIN_SCORE);
        assert!(GRADE_C_MIN_SCORE > GRADE_D_MIN_SCORE);
        assert!(GRADE_D_MIN_SCORE > MIN_CREDIT_SCORE);
        assert!(GRADE_A_MIN_SCORE <= MAX_CREDIT_SCORE);
    }

    #[test]
    fn test_loan_limits_descending() {
        assert!(GRADE_A_LOAN_LIMIT > GRADE_B_LOAN_LIMIT);
        assert!(GRADE_B_LOAN_LIMIT > GRADE_C_LOAN_LIMIT);
        assert!(GRADE_C_LOAN_LIMIT > GRADE_D_LOAN_LIMIT);
        assert!(GRADE_D_LOAN_LIMIT > GRADE_E_LOAN_LIMIT);
    }

    #[test]
    fn test_default_config_matches_constants() {
        let cfg = IssuanceConfig::default();
        assert_eq!(cfg.validity_window, chrono::Duration::days(30));
        assert_eq!(cfg.bureau_timeout, DEFAULT_BUREAU_TIMEOUT);
        assert_eq!(cfg.prover_timeout, DEFAULT_PROVER_TIMEOUT);
        assert_eq!(cfg.issuer_id, DEFAULT_ISSUER_ID);
    }

    #[test]
    fn test_validity_label() {
        assert_eq!(IssuanceConfig::default().validity_label(), "30 days");

        let short = IssuanceConfig {
            validity_window: chrono::Duration::seconds(90),
            ..IssuanceConfig::default()
        };
        assert_eq!(short.validity_label(), "90 seconds");
    }

    #[test]
    fn test_ports_are_distinct() {
        assert_ne!(DEFAULT_API_PORT, DEFAULT_METRICS_PORT);
    }
}
