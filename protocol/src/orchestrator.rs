//! # Issuance Orchestrator
//!
//! The full request path, from loan request to decision:
//!
//! ```text
//!   validate ─▶ lock key ─▶ lookup ─┬─ live, readable ──────────────▶ reuse ─┐
//!                                   │                                        │
//!                                   └─ none / expired / invalidated          │
//!                                        │                                   ▼
//!                                        ▼                               decide
//!                               bureau.grade_for ─▶ commit ─▶ verify ─▶ put ─┘
//! ```
//!
//! The key lock is held from lookup to `put`, so two concurrent requests for
//! the same `(customer_id, holder_address)` cannot both issue. Requests for
//! different keys run fully in parallel.
//!
//! Nothing is written until the bureau lookup, proof generation and
//! commitment verification have all succeeded. Every failure leaves the
//! registry exactly as it was.

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::bureau::{CreditBureau, CreditProfile};
use crate::config::IssuanceConfig;
use crate::eligibility::{EligibilityEvaluator, LoanDecision};
use crate::error::{IssuanceError, Result};
use crate::registry::{
    is_hex_address, CreditGradeToken, TokenAttribute, TokenKey, TokenRegistry,
    ATTR_CREDIT_GRADE, ATTR_EXPIRY_DATE, ATTR_ISSUER, ATTR_ISSUE_DATE, ATTR_MAX_LOAN_AMOUNT,
    ATTR_VALIDITY_PERIOD,
};
use crate::zkp::{ProofCommitment, ProofCommitter};

// ---------------------------------------------------------------------------
// LoanRequest
// ---------------------------------------------------------------------------

/// An inbound loan request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanRequest {
    pub customer_id: String,
    pub holder_address: String,
    pub requested_amount: u64,
}

impl LoanRequest {
    pub fn new(customer_id: &str, holder_address: &str, requested_amount: u64) -> Self {
        Self {
            customer_id: customer_id.to_string(),
            holder_address: holder_address.to_string(),
            requested_amount,
        }
    }

    /// Reject blank identifiers, malformed `0x` addresses and zero amounts.
    pub fn validate(&self) -> Result<()> {
        if self.customer_id.trim().is_empty() {
            return Err(IssuanceError::Validation("customer_id is required".into()));
        }
        if self.holder_address.trim().is_empty() {
            return Err(IssuanceError::Validation("holder_address is required".into()));
        }
        let looks_hex =
            self.holder_address.starts_with("0x") || self.holder_address.starts_with("0X");
        if looks_hex && !is_hex_address(&self.holder_address) {
            return Err(IssuanceError::Validation(format!(
                "holder_address {:?} is not a valid hex address",
                self.holder_address
            )));
        }
        if self.requested_amount == 0 {
            return Err(IssuanceError::Validation(
                "requested_amount must be positive".into(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// IssuanceOrchestrator
// ---------------------------------------------------------------------------

/// Sequences bureau, committer, registry and evaluator for each request.
#[derive(Debug, Clone)]
pub struct IssuanceOrchestrator {
    bureau: CreditBureau,
    committer: ProofCommitter,
    registry: Arc<TokenRegistry>,
    config: IssuanceConfig,
}

impl IssuanceOrchestrator {
    pub fn new(
        bureau: CreditBureau,
        committer: ProofCommitter,
        registry: Arc<TokenRegistry>,
        config: IssuanceConfig,
    ) -> Self {
        Self {
            bureau,
            committer,
            registry,
            config,
        }
    }

    pub fn registry(&self) -> &Arc<TokenRegistry> {
        &self.registry
    }

    pub fn committer(&self) -> &ProofCommitter {
        &self.committer
    }

    pub fn config(&self) -> &IssuanceConfig {
        &self.config
    }

    /// Decide a loan request, reusing a live token or issuing a new one.
    pub async fn process(
        &self,
        customer_id: &str,
        holder_address: &str,
        requested_amount: u64,
    ) -> Result<LoanDecision> {
        self.process_request(&LoanRequest::new(customer_id, holder_address, requested_amount))
            .await
    }

    /// Same as [`process`](Self::process), for an already-built request.
    pub async fn process_request(&self, request: &LoanRequest) -> Result<LoanDecision> {
        request.validate()?;

        let key = TokenKey::new(&request.customer_id, &request.holder_address);
        let _guard = self.registry.lock_key(&key).await;

        let stored = self
            .registry
            .lookup(&request.customer_id, &request.holder_address);
        if let Some(existing) = stored {
            if !self.registry.is_live(&existing) {
                info!(
                    event = "expire",
                    token_id = %existing.token_id,
                    key = %key,
                    expires_at = %existing.expires_at,
                    valid = existing.valid,
                    "stored token not live, re-issuing"
                );
            } else if let Some((grade, limit)) = existing.reuse_terms() {
                info!(
                    event = "reuse",
                    token_id = %existing.token_id,
                    key = %key,
                    "reusing live token"
                );
                let decision = EligibilityEvaluator::decide_with_terms(
                    &existing.token_id,
                    grade,
                    limit,
                    request.requested_amount,
                    true,
                    self.registry.clock().now(),
                );
                log_decision(&decision);
                return Ok(decision);
            } else {
                warn!(
                    token_id = %existing.token_id,
                    key = %key,
                    "live token has unreadable attributes, re-issuing"
                );
            }
        }

        let token = self.issue(&key, request).await?;
        let now = self.registry.clock().now();
        let decision = EligibilityEvaluator::decide(&token, request.requested_amount, now);
        log_decision(&decision);
        Ok(decision)
    }

    /// Bureau lookup, commitment, verification, then `put`. Caller holds the
    /// key lock.
    async fn issue(&self, key: &TokenKey, request: &LoanRequest) -> Result<CreditGradeToken> {
        let profile = self
            .bureau
            .grade_for(&request.customer_id)
            .await
            .map_err(|e| {
                warn!(event = e.kind(), key = %key, error = %e, "bureau lookup failed");
                e
            })?;
        let limit = CreditBureau::max_loan_amount_for(profile.grade);

        let commitment = self.commit(&profile, limit).await.map_err(|e| {
            warn!(event = e.kind(), key = %key, error = %e, "proof generation failed");
            e
        })?;

        if !self.committer.verify(&commitment)
            || !commitment.opens_to(profile.credit_score, profile.grade, limit)
        {
            warn!(
                event = "proof_rejected",
                key = %key,
                proof_id = %commitment.proof_id,
                "commitment failed verification"
            );
            return Err(IssuanceError::ProofStructure(format!(
                "commitment {} failed verification",
                commitment.proof_id
            )));
        }

        let issued_at = self.registry.clock().now();
        let token = self.build_token(request, &profile, limit, &commitment, issued_at);
        self.registry.put(token.clone());

        info!(
            event = "issue",
            token_id = %token.token_id,
            key = %key,
            grade = %token.grade,
            max_loan_amount = token.max_loan_amount,
            proof_id = %token.proof_id,
            expires_at = %token.expires_at,
            "token issued"
        );
        Ok(token)
    }

    /// Run the (possibly slow) prover off the async runtime, under the
    /// prover timeout.
    async fn commit(&self, profile: &CreditProfile, limit: u64) -> Result<ProofCommitment> {
        let committer = self.committer.clone();
        let profile = profile.clone();
        let task = tokio::task::spawn_blocking(move || committer.commit(&profile, limit));

        match tokio::time::timeout(self.config.prover_timeout, task).await {
            Err(_) => Err(IssuanceError::prover(format!(
                "no proof within {:?}",
                self.config.prover_timeout
            ))),
            Ok(Err(join_err)) => Err(IssuanceError::prover(format!(
                "prover task failed: {}",
                join_err
            ))),
            Ok(Ok(Err(e))) => Err(IssuanceError::prover(format!("{:#}", e))),
            Ok(Ok(Ok(commitment))) => Ok(commitment),
        }
    }

    fn build_token(
        &self,
        request: &LoanRequest,
        profile: &CreditProfile,
        limit: u64,
        commitment: &ProofCommitment,
        issued_at: DateTime<Utc>,
    ) -> CreditGradeToken {
        let expires_at = issued_at + self.config.validity_window;
        let attributes = vec![
            TokenAttribute::new(ATTR_CREDIT_GRADE, profile.grade.as_str()),
            TokenAttribute::new(ATTR_MAX_LOAN_AMOUNT, limit),
            TokenAttribute::new(ATTR_ISSUER, self.config.issuer_id.as_str()),
            TokenAttribute::new(
                ATTR_ISSUE_DATE,
                issued_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            ),
            TokenAttribute::new(
                ATTR_EXPIRY_DATE,
                expires_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            ),
            TokenAttribute::new(ATTR_VALIDITY_PERIOD, self.config.validity_label()),
        ];

        CreditGradeToken {
            token_id: format!("TOK-{}", Uuid::new_v4()),
            customer_id: request.customer_id.clone(),
            holder_address: request.holder_address.clone(),
            name: format!("Credit Grade {} Token", profile.grade),
            issuer: self.config.issuer_id.clone(),
            grade: profile.grade,
            max_loan_amount: limit,
            proof_id: commitment.proof_id.clone(),
            score_digest: commitment.score_digest.clone(),
            grade_digest: commitment.grade_digest.clone(),
            limit_digest: commitment.limit_digest.clone(),
            attributes,
            issued_at,
            expires_at,
            valid: true,
        }
    }
}

fn log_decision(decision: &LoanDecision) {
    let event = if decision.approval { "approve" } else { "reject" };
    info!(
        event,
        request_id = %decision.request_id,
        token_id = %decision.token_id,
        grade = %decision.grade,
        requested_amount = decision.requested_amount,
        approved_amount = decision.approved_amount,
        max_loan_amount = decision.max_loan_amount,
        "loan decided"
    );
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
