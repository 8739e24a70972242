//! # Proof Committer
//!
//! Builds a [`ProofCommitment`] from a credit profile and its loan limit,
//! and checks commitments handed back to it.
//!
//! ## Commit
//!
//! 1. Digest `score`, `grade` and `limit` (SHA-256 of their canonical
//!    strings). Same inputs, same digests.
//! 2. Ask the active [`ProofBackend`] for an artifact bound to those digests.
//! 3. Stamp a fresh `proof_id`: `PROOF_<unix micros>_<8 random hex>`.
//!
//! ## Verify
//!
//! Returns `false`, never an error, when any of these fail:
//!
//! - all three digests are present and look like SHA-256 hex
//! - the artifact has the `{a: 2, b: 2×2, c: 2}` shape
//! - there are exactly three public inputs
//! - the public inputs are the commitment's own digests, in order
//! - the backend accepts the artifact
//!
//! Verification cannot recompute digests without the plaintext. Callers that
//! hold it (the orchestrator, right after committing) also check
//! [`ProofCommitment::opens_to`].

use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use rand::Rng;
use tracing::debug;

use crate::bureau::CreditProfile;
use crate::crypto::{commitment_digest, is_digest_hex};

use super::artifact::ProofCommitment;
use super::backend::{CommitmentWitness, ProofBackend, StructuralBackend};

/// Digests credit attributes and drives the proof backend.
#[derive(Clone)]
pub struct ProofCommitter {
    backend: Arc<dyn ProofBackend>,
}

impl ProofCommitter {
    pub fn new(backend: Arc<dyn ProofBackend>) -> Self {
        Self { backend }
    }

    /// Committer over the arity-only [`StructuralBackend`].
    pub fn structural() -> Self {
        Self::new(Arc::new(StructuralBackend))
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Commit to `{profile.credit_score, profile.grade, limit}`.
    pub fn commit(&self, profile: &CreditProfile, limit: u64) -> Result<ProofCommitment> {
        let score_digest = commitment_digest(&profile.credit_score);
        let grade_digest = commitment_digest(profile.grade.as_str());
        let limit_digest = commitment_digest(&limit);

        let witness = CommitmentWitness {
            score: profile.credit_score,
            grade: profile.grade,
            limit,
        };
        let public_inputs = [
            score_digest.clone(),
            grade_digest.clone(),
            limit_digest.clone(),
        ];
        let proof_artifact = self.backend.prove(&witness, &public_inputs)?;

        let timestamp = Utc::now();
        let proof_id = generate_proof_id(timestamp.timestamp_micros());
        debug!(%proof_id, backend = self.backend.name(), "commitment built");

        Ok(ProofCommitment {
            proof_id,
            score_digest,
            grade_digest,
            limit_digest,
            proof_artifact,
            timestamp,
        })
    }

    /// Structural and backend verification. See the module docs.
    pub fn verify(&self, commitment: &ProofCommitment) -> bool {
        let digests = commitment.digests();
        if !digests.iter().all(|d| is_digest_hex(d)) {
            return false;
        }

        let artifact = &commitment.proof_artifact;
        if !artifact.has_expected_shape() || !artifact.has_expected_inputs() {
            return false;
        }

        if artifact
            .public_inputs
            .iter()
            .zip(digests.iter())
            .any(|(input, digest)| input.as_str() != *digest)
        {
            return false;
        }

        self.backend.verify(artifact)
    }
}

impl fmt::Debug for ProofCommitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProofCommitter")
            .field("backend", &self.backend.name())
            .finish()
    }
}

fn generate_proof_id(micros: i64) -> String {
    let suffix: u32 = rand::thread_rng().gen();
    format!("PROOF_{}_{:08x}", micros, suffix)
}
