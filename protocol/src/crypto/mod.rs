//! # Cryptographic Primitives for zkgrade
//!
//! Just hashing. Commitments are SHA-256 digests of canonical strings, and
//! the Groth16 backend needs those digests as BN254 scalars. The proof
//! system itself lives in [`crate::zkp`].

pub mod hash;

pub use hash::{commitment_digest, digest_to_field, is_digest_hex, sha256, sha256_hex};
