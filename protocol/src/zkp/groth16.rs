//! # Groth16 Backend
//!
//! Real proofs for the [`GradeBandCircuit`] over BN254, wrapped to fit the
//! fixed `{a, b, c, public_inputs}` artifact shape:
//!
//! ```text
//! a = [A.x, A.y]                          G1, two Fq coordinates
//! b = [[B.x.c0, B.x.c1], [B.y.c0, B.y.c1]] G2, two Fq2 coordinates
//! c = [C.x, C.y]                          G1, two Fq coordinates
//! public_inputs = [score_digest, grade_digest, limit_digest]   (hex)
//! ```
//!
//! Coordinates are `0x`-prefixed big-endian hex of the canonical field
//! representation. Decoding rejects non-canonical encodings and any point
//! that is not on the curve or not in the prime-order subgroup.
//!
//! The trusted setup is per-process: [`Groth16Backend::setup`] runs a local
//! ceremony. Artifacts from one process do not verify under another
//! process's keys unless the verifying key is shared via
//! [`Groth16Backend::verifying_key_bytes`].

use anyhow::{anyhow, bail, Context, Result};
use ark_bn254::{Bn254, Fq, Fq2, Fr, G1Affine, G2Affine};
use ark_ff::{BigInteger, PrimeField};
use ark_groth16::{Groth16, PreparedVerifyingKey, Proof, ProvingKey, VerifyingKey};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_snark::SNARK;
use ark_std::rand::{CryptoRng, RngCore};

use crate::bureau::Grade;
use crate::crypto::{commitment_digest, digest_to_field};

use super::artifact::ProofArtifact;
use super::backend::{CommitmentWitness, ProofBackend};
use super::circuit::{self, GradeBandCircuit};
use super::PUBLIC_INPUT_COUNT;

// ---------------------------------------------------------------------------
// Groth16Backend
// ---------------------------------------------------------------------------

/// Groth16 proving and verifying keys for the grade-band circuit.
pub struct Groth16Backend {
    pk: ProvingKey<Bn254>,
    vk: VerifyingKey<Bn254>,
    pvk: PreparedVerifyingKey<Bn254>,
}

impl Groth16Backend {
    /// Run the Groth16 trusted setup for the grade-band circuit.
    pub fn setup<R: RngCore + CryptoRng>(rng: &mut R) -> Result<Self> {
        let (pk, vk) = Groth16::<Bn254>::circuit_specific_setup(GradeBandCircuit::blank(), rng)
            .map_err(|e| anyhow!("Groth16 setup failed: {}", e))?;
        let pvk = Groth16::<Bn254>::process_vk(&vk)
            .map_err(|e| anyhow!("verifying key preparation failed: {}", e))?;
        Ok(Self { pk, vk, pvk })
    }

    /// Compressed verifying key, for distribution to third-party verifiers.
    pub fn verifying_key_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.vk
            .serialize_compressed(&mut buf)
            .context("verifying key serialization failed")?;
        Ok(buf)
    }

    /// Check an artifact against a verifying key received as bytes.
    pub fn verify_with_key_bytes(vk_bytes: &[u8], artifact: &ProofArtifact) -> Result<bool> {
        let vk = VerifyingKey::<Bn254>::deserialize_compressed(vk_bytes)
            .context("failed to deserialize verifying key")?;
        let pvk = Groth16::<Bn254>::process_vk(&vk)
            .map_err(|e| anyhow!("verifying key preparation failed: {}", e))?;
        Ok(verify_prepared(&pvk, artifact))
    }
}

impl ProofBackend for Groth16Backend {
    fn name(&self) -> &'static str {
        "groth16"
    }

    fn prove(
        &self,
        witness: &CommitmentWitness,
        public_inputs: &[String; PUBLIC_INPUT_COUNT],
    ) -> Result<ProofArtifact> {
        // ark-groth16 panics on an unsatisfiable witness in debug builds, so
        // refuse anything the circuit would reject before it reaches the prover.
        if Grade::from_score(witness.score) != witness.grade {
            bail!(
                "score {} is outside the band of grade {}",
                witness.score,
                witness.grade
            );
        }
        if public_inputs[1] != commitment_digest(witness.grade.as_str()) {
            bail!("grade digest does not commit to grade {}", witness.grade);
        }
        if public_inputs[2] != commitment_digest(&witness.grade.max_loan_amount()) {
            bail!("limit digest does not commit to the limit of grade {}", witness.grade);
        }

        let digests = digests_to_fields(public_inputs)?;
        let circuit = GradeBandCircuit::new(witness.score, witness.grade, digests);

        let mut rng = ark_std::rand::thread_rng();
        let proof = Groth16::<Bn254>::prove(&self.pk, circuit, &mut rng)
            .map_err(|e| anyhow!("Groth16 proof generation failed: {}", e))?;

        Ok(ProofArtifact {
            a: encode_g1(&proof.a).to_vec(),
            b: encode_g2(&proof.b),
            c: encode_g1(&proof.c).to_vec(),
            public_inputs: public_inputs.to_vec(),
        })
    }

    fn verify(&self, artifact: &ProofArtifact) -> bool {
        verify_prepared(&self.pvk, artifact)
    }
}

fn verify_prepared(pvk: &PreparedVerifyingKey<Bn254>, artifact: &ProofArtifact) -> bool {
    if !artifact.has_expected_shape() || !artifact.has_expected_inputs() {
        return false;
    }
    let Some(proof) = decode_proof(artifact) else {
        return false;
    };
    let Ok(digests) = digests_to_fields(&artifact.public_inputs) else {
        return false;
    };
    let inputs = circuit::public_inputs(digests);
    Groth16::<Bn254>::verify_with_processed_vk(pvk, &inputs, &proof).unwrap_or(false)
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

fn digests_to_fields(digests: &[String]) -> Result<[Fr; PUBLIC_INPUT_COUNT]> {
    if digests.len() != PUBLIC_INPUT_COUNT {
        bail!("expected {} public inputs, got {}", PUBLIC_INPUT_COUNT, digests.len());
    }
    let mut out = [Fr::from(0u64); PUBLIC_INPUT_COUNT];
    for (slot, d) in out.iter_mut().zip(digests) {
        *slot = digest_to_field(d).ok_or_else(|| anyhow!("public input is not a digest: {}", d))?;
    }
    Ok(out)
}

fn encode_fq(x: &Fq) -> String {
    format!("0x{}", hex::encode(x.into_bigint().to_bytes_be()))
}

fn decode_fq(s: &str) -> Option<Fq> {
    let bytes = hex::decode(s.strip_prefix("0x")?).ok()?;
    let x = Fq::from_be_bytes_mod_order(&bytes);
    // Reject anything that is not the canonical encoding.
    (x.into_bigint().to_bytes_be() == bytes).then_some(x)
}

fn encode_g1(p: &G1Affine) -> [String; 2] {
    [encode_fq(&p.x), encode_fq(&p.y)]
}

fn encode_g2(p: &G2Affine) -> Vec<Vec<String>> {
    vec![
        vec![encode_fq(&p.x.c0), encode_fq(&p.x.c1)],
        vec![encode_fq(&p.y.c0), encode_fq(&p.y.c1)],
    ]
}

fn decode_g1(coords: &[String]) -> Option<G1Affine> {
    let p = G1Affine::new_unchecked(decode_fq(&coords[0])?, decode_fq(&coords[1])?);
    (p.is_on_curve() && p.is_in_correct_subgroup_assuming_on_curve()).then_some(p)
}

fn decode_g2(rows: &[Vec<String>]) -> Option<G2Affine> {
    let x = Fq2::new(decode_fq(&rows[0][0])?, decode_fq(&rows[0][1])?);
    let y = Fq2::new(decode_fq(&rows[1][0])?, decode_fq(&rows[1][1])?);
    let p = G2Affine::new_unchecked(x, y);
    (p.is_on_curve() && p.is_in_correct_subgroup_assuming_on_curve()).then_some(p)
}

/// Caller has already checked the artifact shape.
fn decode_proof(artifact: &ProofArtifact) -> Option<Proof<Bn254>> {
    Some(Proof {
        a: decode_g1(&artifact.a)?,
        b: decode_g2(&artifact.b)?,
        c: decode_g1(&artifact.c)?,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
