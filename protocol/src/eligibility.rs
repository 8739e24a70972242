//! # Eligibility Evaluator
//!
//! Turns a token and a requested amount into a loan decision.
//!
//! ```text
//! approval        = requested <= limit
//! approved_amount = min(requested, limit)     (even when rejected)
//! ```
//!
//! The approved amount is informational on rejection: it tells the caller
//! the ceiling they could have had.
//!
//! Ownership checks compare the caller's address with the token holder's.
//! Hex addresses (`0x…`) compare case-insensitively; anything else must
//! match exactly, and a hex address never matches a non-hex one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::bureau::Grade;
use crate::registry::{is_hex_address, CreditGradeToken};

/// Result of one loan request. Derived, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanDecision {
    pub request_id: String,
    pub approval: bool,
    pub requested_amount: u64,
    pub approved_amount: u64,
    pub token_id: String,
    pub grade: Grade,
    pub max_loan_amount: u64,
    pub decided_at: DateTime<Utc>,
    /// `true` when an existing live token satisfied the request.
    pub token_reused: bool,
}

/// Ownership plus limit check for a caller presenting a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityReport {
    pub token_id: String,
    pub is_owner: bool,
    pub within_limit: bool,
    pub is_eligible: bool,
    pub grade: Grade,
    pub max_loan_amount: u64,
    pub requested_amount: u64,
}

/// Stateless decision logic.
#[derive(Debug, Default, Clone, Copy)]
pub struct EligibilityEvaluator;

impl EligibilityEvaluator {
    /// Decide a request against explicit terms (grade and limit), e.g. the
    /// ones read from a reused token's attributes.
    pub fn decide_with_terms(
        token_id: &str,
        grade: Grade,
        max_loan_amount: u64,
        requested_amount: u64,
        token_reused: bool,
        decided_at: DateTime<Utc>,
    ) -> LoanDecision {
        LoanDecision {
            request_id: format!("REQ-{}", Uuid::new_v4()),
            approval: requested_amount <= max_loan_amount,
            requested_amount,
            approved_amount: requested_amount.min(max_loan_amount),
            token_id: token_id.to_string(),
            grade,
            max_loan_amount,
            decided_at,
            token_reused,
        }
    }

    /// Decide a request against a token's own grade and limit.
    pub fn decide(
        token: &CreditGradeToken,
        requested_amount: u64,
        decided_at: DateTime<Utc>,
    ) -> LoanDecision {
        Self::decide_with_terms(
            &token.token_id,
            token.grade,
            token.max_loan_amount,
            requested_amount,
            false,
            decided_at,
        )
    }

    /// Is `caller` the holder, and is `requested_amount` within the limit?
    pub fn check(
        token: &CreditGradeToken,
        caller_address: &str,
        requested_amount: u64,
    ) -> EligibilityReport {
        let is_owner = addresses_match(&token.holder_address, caller_address);
        let within_limit = requested_amount <= token.max_loan_amount;
        EligibilityReport {
            token_id: token.token_id.clone(),
            is_owner,
            within_limit,
            is_eligible: is_owner && within_limit,
            grade: token.grade,
            max_loan_amount: token.max_loan_amount,
            requested_amount,
        }
    }
}

/// Holder-address equality. Case-insensitive only when both sides are hex.
pub fn addresses_match(holder: &str, caller: &str) -> bool {
    match (is_hex_address(holder), is_hex_address(caller)) {
        (true, true) => holder.eq_ignore_ascii_case(caller),
        (false, false) => holder == caller,
        _ => false,
    }
}
