//! Proof artifacts and commitments.
//!
//! Both types are serde-friendly because they cross the HTTP boundary: the
//! node's `/proofs/verify` endpoint accepts a serialized [`ProofCommitment`]
//! from whoever holds one. Every digest and artifact field therefore
//! defaults to empty on deserialization, and "empty" is how an absent
//! component shows up to the verifier.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::bureau::Grade;
use crate::crypto::commitment_digest;

use super::PUBLIC_INPUT_COUNT;

// ---------------------------------------------------------------------------
// ProofArtifact
// ---------------------------------------------------------------------------

/// Backend-produced proof with the fixed `{a, b, c, public_inputs}` shape.
///
/// Elements are opaque strings. The structural backend fills them with
/// hex filler; the Groth16 backend fills them with `0x`-prefixed curve
/// coordinates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofArtifact {
    #[serde(default)]
    pub a: Vec<String>,
    #[serde(default)]
    pub b: Vec<Vec<String>>,
    #[serde(default)]
    pub c: Vec<String>,
    #[serde(default)]
    pub public_inputs: Vec<String>,
}

impl ProofArtifact {
    /// `a` has 2 elements, `b` is 2×2, `c` has 2 elements.
    pub fn has_expected_shape(&self) -> bool {
        self.a.len() == 2
            && self.b.len() == 2
            && self.b.iter().all(|row| row.len() == 2)
            && self.c.len() == 2
    }

    /// Exactly three public inputs.
    pub fn has_expected_inputs(&self) -> bool {
        self.public_inputs.len() == PUBLIC_INPUT_COUNT
    }
}

// ---------------------------------------------------------------------------
// ProofCommitment
// ---------------------------------------------------------------------------

/// Digests of `{score, grade, limit}` plus the artifact that binds them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofCommitment {
    pub proof_id: String,
    #[serde(default)]
    pub score_digest: String,
    #[serde(default)]
    pub grade_digest: String,
    #[serde(default)]
    pub limit_digest: String,
    #[serde(default)]
    pub proof_artifact: ProofArtifact,
    pub timestamp: DateTime<Utc>,
}

impl ProofCommitment {
    /// The three digests in public-input order.
    pub fn digests(&self) -> [&str; PUBLIC_INPUT_COUNT] {
        [&self.score_digest, &self.grade_digest, &self.limit_digest]
    }

    /// Recompute all three digests from plaintext and compare.
    pub fn opens_to(&self, score: u32, grade: Grade, limit: u64) -> bool {
        self.score_digest == commitment_digest(&score)
            && self.grade_digest == commitment_digest(grade.as_str())
            && self.limit_digest == commitment_digest(&limit)
    }
}
