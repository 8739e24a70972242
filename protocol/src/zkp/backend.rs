//! # Proof Backends
//!
//! The committer does not care how a proof is made, only that the artifact
//! has the right shape and that the backend will vouch for it later.
//!
//! - [`StructuralBackend`]: default. Emits deterministic filler of the
//!   correct arity derived from the public inputs, and verifies structure
//!   only. No cryptographic soundness; suitable for tests and for
//!   deployments where proofs are checked elsewhere.
//! - [`super::Groth16Backend`]: a real Groth16 proof over BN254 that the
//!   score lies in the band of the committed grade and that the grade and
//!   limit digests belong to that grade.

use crate::bureau::Grade;
use crate::crypto::sha256_hex;

use super::artifact::ProofArtifact;
use super::PUBLIC_INPUT_COUNT;

/// The private values a proof is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitmentWitness {
    pub score: u32,
    pub grade: Grade,
    pub limit: u64,
}

/// A pluggable proof system.
pub trait ProofBackend: Send + Sync {
    /// Short identifier, e.g. `"structural"` or `"groth16"`.
    fn name(&self) -> &'static str;

    /// Prove a statement about `witness` bound to the given public inputs
    /// (score, grade and limit digests, hex).
    ///
    /// Implementations may be slow; callers run this off the async runtime.
    fn prove(
        &self,
        witness: &CommitmentWitness,
        public_inputs: &[String; PUBLIC_INPUT_COUNT],
    ) -> anyhow::Result<ProofArtifact>;

    /// Check an artifact. Never errors: anything that cannot be checked is
    /// simply not valid.
    fn verify(&self, artifact: &ProofArtifact) -> bool;
}

// ---------------------------------------------------------------------------
// StructuralBackend
// ---------------------------------------------------------------------------

/// Arity-only proof backend.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuralBackend;

impl StructuralBackend {
    fn filler(label: &str, inputs: &[String]) -> String {
        let mut preimage = String::from(label);
        for input in inputs {
            preimage.push('|');
            preimage.push_str(input);
        }
        format!("0x{}", sha256_hex(preimage.as_bytes()))
    }
}

impl ProofBackend for StructuralBackend {
    fn name(&self) -> &'static str {
        "structural"
    }

    fn prove(
        &self,
        _witness: &CommitmentWitness,
        public_inputs: &[String; PUBLIC_INPUT_COUNT],
    ) -> anyhow::Result<ProofArtifact> {
        let f = |label: &str| Self::filler(label, public_inputs);
        Ok(ProofArtifact {
            a: vec![f("a0"), f("a1")],
            b: vec![vec![f("b00"), f("b01")], vec![f("b10"), f("b11")]],
            c: vec![f("c0"), f("c1")],
            public_inputs: public_inputs.to_vec(),
        })
    }

    fn verify(&self, artifact: &ProofArtifact) -> bool {
        artifact.has_expected_shape() && artifact.has_expected_inputs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs() -> [String; 3] {
        [
            sha256_hex(b"750"),
            sha256_hex(b"B"),
            sha256_hex(b"50000000"),
        ]
    }

    fn witness() -> CommitmentWitness {
        CommitmentWitness {
            score: 750,
            grade: Grade::B,
            limit: 50_000_000,
        }
    }

    #[test]
    fn structural_artifact_has_expected_shape() {
        let art = StructuralBackend.prove(&witness(), &inputs()).unwrap();
        assert!(art.has_expected_shape());
        assert_eq!(art.public_inputs, inputs().to_vec());
        assert!(StructuralBackend.verify(&art));
    }

    #[test]
    fn structural_artifact_is_deterministic() {
        let a1 = StructuralBackend.prove(&witness(), &inputs()).unwrap();
        let a2 = StructuralBackend.prove(&witness(), &inputs()).unwrap();
        assert_eq!(a1, a2);
    }

    #[test]
    fn structural_verify_rejects_bad_arity() {
        let mut art = StructuralBackend.prove(&witness(), &inputs()).unwrap();
        art.public_inputs.push("extra".into());
        assert!(!StructuralBackend.verify(&art));

        let mut art = StructuralBackend.prove(&witness(), &inputs()).unwrap();
        art.b[0].push("extra".into());
        assert!(!StructuralBackend.verify(&art));
    }
}
