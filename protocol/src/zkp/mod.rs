//! # Zero-Knowledge Commitment Module
//!
//! Binds a customer's hidden credit attributes `{score, grade, limit}` to
//! three public SHA-256 digests and a proof artifact, and checks such
//! bindings later.
//!
//! ## Architecture
//!
//! ```text
//! artifact.rs    ProofArtifact {a, b, c, public_inputs} and ProofCommitment
//! backend.rs     ProofBackend trait, StructuralBackend (default)
//! circuit.rs     R1CS grade-band circuit (GradeBandCircuit)
//! groth16.rs     Groth16Backend over BN254
//! committer.rs   ProofCommitter: digests + backend + structural checks
//! ```
//!
//! ## Artifact shape
//!
//! Whatever backend is active, an artifact always has the same arity:
//!
//! | field           | shape   |
//! |-----------------|---------|
//! | `a`             | 2       |
//! | `b`             | 2 × 2   |
//! | `c`             | 2       |
//! | `public_inputs` | 3       |
//!
//! `public_inputs` are the score, grade and limit digests, in that order.
//! The protocol never assumes which backend produced an artifact.

pub mod artifact;
pub mod backend;
pub mod circuit;
pub mod committer;
pub mod groth16;

pub use artifact::{ProofArtifact, ProofCommitment};
pub use backend::{CommitmentWitness, ProofBackend, StructuralBackend};
pub use circuit::GradeBandCircuit;
pub use committer::ProofCommitter;
pub use groth16::Groth16Backend;

/// Bits used for the score range checks. Scores top out at 1000, so every
/// band offset fits comfortably in 16 bits.
pub const RANGE_BITS: usize = 16;

/// Number of public inputs every artifact carries.
pub const PUBLIC_INPUT_COUNT: usize = 3;
