//! # Commitment Digests
//!
//! Every commitment in zkgrade is a SHA-256 digest of the canonical string
//! form of a value: the decimal rendering for integers (`"750"`,
//! `"50000000"`) and the letter for grades (`"B"`). Digests travel as
//! 64-character lowercase hex.
//!
//! SHA-256 is fixed. Tokens issued today must verify against the same
//! digests tomorrow, so there is no algorithm agility here.
//!
//! ## digest_to_field
//!
//! The Groth16 backend needs the digests as BN254 scalars. A digest is
//! 256 bits and the scalar field is ~254 bits, so the big-endian integer is
//! reduced modulo `r`. The mapping is deterministic, which is all the
//! circuit needs: prover and verifier derive the same public inputs from
//! the same hex strings.

use std::fmt::Display;

use ark_bn254::Fr;
use ark_ff::PrimeField;
use sha2::{Digest, Sha256};

/// Length of a hex-encoded SHA-256 digest.
pub const DIGEST_HEX_LEN: usize = 64;

/// Compute the SHA-256 hash of the input data.
///
/// # Example
///
/// ```
/// use zkgrade_protocol::crypto::sha256;
///
/// let hash = sha256(b"750");
/// assert_eq!(hash.len(), 32);
/// ```
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let mut output = [0u8; 32];
    output.copy_from_slice(&hasher.finalize());
    output
}

/// SHA-256 as lowercase hex.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

/// Digest the canonical string form of a committed value.
///
/// ```
/// use zkgrade_protocol::crypto::commitment_digest;
///
/// assert_eq!(commitment_digest(&750u32), commitment_digest(&"750"));
/// ```
pub fn commitment_digest<T: Display + ?Sized>(value: &T) -> String {
    sha256_hex(value.to_string().as_bytes())
}

/// True if `s` looks like a hex SHA-256 digest (64 hex chars).
pub fn is_digest_hex(s: &str) -> bool {
    s.len() == DIGEST_HEX_LEN && s.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Map a hex digest into the BN254 scalar field.
///
/// Returns `None` if the input is not a 64-char hex digest.
pub fn digest_to_field(digest_hex: &str) -> Option<Fr> {
    if !is_digest_hex(digest_hex) {
        return None;
    }
    let bytes = hex::decode(digest_hex).ok()?;
    Some(Fr::from_be_bytes_mod_order(&bytes))
}
