// Copyright (c) 2026 zkgrade contributors. MIT License.
// See LICENSE for details.

//! # zkgrade: Credit-Grade Token Protocol
//!
//! A lender wants to know whether a customer may borrow a given amount. The
//! customer does not want their raw credit file passed around every time
//! they ask. zkgrade sits between the two: a credit bureau grades the
//! customer once, the grade and its loan ceiling are bound to hash
//! commitments and a proof artifact, and the result is issued as a
//! credit-grade token tied to the customer's holder address. Later requests
//! reuse the token until it expires.
//!
//! ## Architecture
//!
//! Components, leaves first:
//!
//! - **bureau**: score lookup, grade bands and loan-limit tables.
//! - **zkp**: digest commitments, proof artifacts and the pluggable
//!   proof backends (structural checker, Groth16 over BN254).
//! - **registry**: the token store; one live token per
//!   `(customer_id, holder_address)`, guarded by a per-key lock.
//! - **eligibility**: loan decisions and holder-address ownership checks.
//! - **orchestrator**: the issuance path that ties the above together.
//!
//! Support modules: **config** (constants and `IssuanceConfig`), **error**
//! (the error taxonomy), **clock** (injectable time), **crypto** (digests).
//!
//! ## Ground rules
//!
//! 1. A token is written only after the bureau lookup and the proof step
//!    have both succeeded. No partial tokens, ever.
//! 2. Reuse trusts the token's own attributes. Nothing is re-derived from
//!    a second, possibly stale lookup.
//! 3. Expiry is `issued_at + validity_window`, evaluated on every lookup.

pub mod bureau;
pub mod clock;
pub mod config;
pub mod crypto;
pub mod eligibility;
pub mod error;
pub mod orchestrator;
pub mod registry;
pub mod zkp;

pub use bureau::{CreditBureau, CreditProfile, Grade, InMemoryScoreSource, ScoreSource};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::IssuanceConfig;
pub use eligibility::{EligibilityEvaluator, EligibilityReport, LoanDecision};
pub use error::{IssuanceError, Result};
pub use orchestrator::{IssuanceOrchestrator, LoanRequest};
pub use registry::{CreditGradeToken, KeyGuard, TokenKey, TokenRegistry, TokenStatus};
pub use zkp::{ProofArtifact, ProofBackend, ProofCommitment, ProofCommitter};
