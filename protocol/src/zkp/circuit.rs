//! # Grade-Band R1CS Circuit
//!
//! The arithmetic circuit behind the Groth16 backend. The statement is:
//!
//! ```text
//! "For the public digests (d_score, d_grade, d_limit), I know a score s
//!  and a grade g such that d_grade = H(g), d_limit = H(limit(g)) and
//!  lo(g) <= s < hi(g)."
//! ```
//!
//! ## Constraint breakdown
//!
//! ### Grade selection
//!
//! The five grades are fixed, so their digests, limit digests and band
//! bounds are circuit constants. The prover picks a one-hot selector over
//! the grade table:
//!
//! 1. each selector is boolean and they sum to 1
//! 2. `Σ sel_i · H(grade_i)` equals the public grade digest
//! 3. `Σ sel_i · H(limit_i)` equals the public limit digest
//! 4. `lo = Σ sel_i · lo_i` and `hi = Σ sel_i · hi_i`
//!
//! The band is therefore the one named by the public grade digest, not a
//! value the prover chooses.
//!
//! ### Band membership
//!
//! Two range checks, each a bit decomposition into [`RANGE_BITS`] bits:
//!
//! 1. `s - lo` reconstructs from 16 boolean witnesses  ⇒  `s >= lo`
//! 2. `hi - 1 - s` reconstructs from 16 boolean witnesses  ⇒  `s < hi`
//!
//! A negative difference wraps to a ~254-bit field element, which has no
//! 16-bit decomposition, so the system is unsatisfiable.
//!
//! ### Score digest
//!
//! SHA-256 is not recomputed in-circuit, so the score digest is bound only
//! as a public input: a proof does not verify against any other score
//! digest, but it does not show that `d_score = H(s)`. The committer checks
//! that opening natively when the plaintext is at hand.
//!
//! ## Public inputs (in order)
//!
//! | index | value |
//! |-------|-------|
//! | 0     | score digest, reduced into Fr |
//! | 1     | grade digest, reduced into Fr |
//! | 2     | limit digest, reduced into Fr |

use ark_bn254::Fr;
use ark_ff::PrimeField;
use ark_r1cs_std::{
    alloc::AllocVar,
    boolean::Boolean,
    eq::EqGadget,
    fields::{fp::FpVar, FieldVar},
};
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystemRef, SynthesisError};

use crate::bureau::Grade;
use crate::crypto::{commitment_digest, digest_to_field};

use super::RANGE_BITS;

// ---------------------------------------------------------------------------
// Circuit definition
// ---------------------------------------------------------------------------

/// Groth16 circuit proving a hidden score lies in the band of the grade
/// named by the public grade digest.
///
/// All fields are `Option<_>` so the struct can be built empty for key
/// generation, where only the constraint topology matters.
#[derive(Clone, Default)]
pub struct GradeBandCircuit {
    // -- Private witness ----------------------------------------------------
    pub score: Option<Fr>,
    /// Selects the row of the grade table.
    pub grade: Option<Grade>,

    // -- Public inputs ------------------------------------------------------
    pub score_digest: Option<Fr>,
    pub grade_digest: Option<Fr>,
    pub limit_digest: Option<Fr>,
}

impl GradeBandCircuit {
    /// Fully-populated circuit for proving.
    pub fn new(score: u32, grade: Grade, digests: [Fr; 3]) -> Self {
        Self {
            score: Some(Fr::from(score)),
            grade: Some(grade),
            score_digest: Some(digests[0]),
            grade_digest: Some(digests[1]),
            limit_digest: Some(digests[2]),
        }
    }

    /// Witness-free circuit for CRS generation.
    pub fn blank() -> Self {
        Self::default()
    }
}

/// `[floor, ceiling)` for a grade, as integers.
pub fn band_bounds(grade: Grade) -> (u64, u64) {
    let (min, max) = grade.score_range();
    (u64::from(min), u64::from(max) + 1)
}

/// One grade's constants as they appear in the circuit.
struct BandRow {
    grade: Grade,
    grade_digest: Fr,
    limit_digest: Fr,
    floor: Fr,
    ceiling: Fr,
}

fn band_table() -> Result<Vec<BandRow>, SynthesisError> {
    Grade::ALL
        .iter()
        .map(|&grade| -> Result<BandRow, SynthesisError> {
            let (floor, ceiling) = band_bounds(grade);
            Ok(BandRow {
                grade,
                grade_digest: digest_to_field(&commitment_digest(grade.as_str()))
                    .ok_or(SynthesisError::Unsatisfiable)?,
                limit_digest: digest_to_field(&commitment_digest(&grade.max_loan_amount()))
                    .ok_or(SynthesisError::Unsatisfiable)?,
                floor: Fr::from(floor),
                ceiling: Fr::from(ceiling),
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Constraint synthesizer
// ---------------------------------------------------------------------------

impl ConstraintSynthesizer<Fr> for GradeBandCircuit {
    fn generate_constraints(self, cs: ConstraintSystemRef<Fr>) -> Result<(), SynthesisError> {
        // 1. Public inputs. Allocation order is the public-input order.
        let _score_digest_var =
            FpVar::<Fr>::new_input(ark_relations::ns!(cs, "score_digest"), || {
                self.score_digest.ok_or(SynthesisError::AssignmentMissing)
            })?;
        let grade_digest_var =
            FpVar::<Fr>::new_input(ark_relations::ns!(cs, "grade_digest"), || {
                self.grade_digest.ok_or(SynthesisError::AssignmentMissing)
            })?;
        let limit_digest_var =
            FpVar::<Fr>::new_input(ark_relations::ns!(cs, "limit_digest"), || {
                self.limit_digest.ok_or(SynthesisError::AssignmentMissing)
            })?;

        // 2. Private witnesses.
        let score_var = FpVar::<Fr>::new_witness(ark_relations::ns!(cs, "score"), || {
            self.score.ok_or(SynthesisError::AssignmentMissing)
        })?;

        // 3. One-hot grade selector and the values it picks out.
        let table = band_table()?;
        let mut selected_count = FpVar::<Fr>::zero();
        let mut selected_grade_digest = FpVar::<Fr>::zero();
        let mut selected_limit_digest = FpVar::<Fr>::zero();
        let mut floor_var = FpVar::<Fr>::zero();
        let mut ceiling_var = FpVar::<Fr>::zero();

        for row in &table {
            let selector =
                Boolean::<Fr>::new_witness(ark_relations::ns!(cs, "grade_selector"), || {
                    self.grade
                        .map(|g| g == row.grade)
                        .ok_or(SynthesisError::AssignmentMissing)
                })?;
            let selector = FpVar::<Fr>::from(selector);

            selected_count += &selector;
            selected_grade_digest += &selector * FpVar::<Fr>::constant(row.grade_digest);
            selected_limit_digest += &selector * FpVar::<Fr>::constant(row.limit_digest);
            floor_var += &selector * FpVar::<Fr>::constant(row.floor);
            ceiling_var += &selector * FpVar::<Fr>::constant(row.ceiling);
        }

        selected_count.enforce_equal(&FpVar::<Fr>::one())?;
        selected_grade_digest.enforce_equal(&grade_digest_var)?;
        selected_limit_digest.enforce_equal(&limit_digest_var)?;

        // Native band values for the range-check witnesses.
        let band = self.grade.map(|g| {
            let (lo, hi) = band_bounds(g);
            (Fr::from(lo), Fr::from(hi))
        });

        // 4. score >= floor
        let above_floor = &score_var - &floor_var;
        let above_value = match (self.score, band) {
            (Some(s), Some((lo, _))) => Some(s - lo),
            _ => None,
        };
        enforce_range(&cs, &above_floor, above_value)?;

        // 5. score < ceiling, i.e. ceiling - 1 - score >= 0
        let below_ceiling = &ceiling_var - FpVar::<Fr>::one() - &score_var;
        let below_value = match (band, self.score) {
            (Some((_, hi)), Some(s)) => Some(hi - Fr::from(1u64) - s),
            _ => None,
        };
        enforce_range(&cs, &below_ceiling, below_value)?;

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Enforce `0 <= var < 2^RANGE_BITS` by bit decomposition.
fn enforce_range(
    cs: &ConstraintSystemRef<Fr>,
    var: &FpVar<Fr>,
    value: Option<Fr>,
) -> Result<(), SynthesisError> {
    let bits = value.map(low_bits);

    let mut reconstructed = FpVar::<Fr>::zero();
    let mut power_of_two = FpVar::<Fr>::one();
    let two = FpVar::<Fr>::constant(Fr::from(2u64));

    for i in 0..RANGE_BITS {
        let bit = Boolean::<Fr>::new_witness(ark_relations::ns!(cs, "range_bit"), || {
            bits.as_ref()
                .map(|b| b[i])
                .ok_or(SynthesisError::AssignmentMissing)
        })?;
        reconstructed += FpVar::<Fr>::from(bit) * &power_of_two;
        power_of_two *= &two;
    }

    reconstructed.enforce_equal(var)
}

/// Little-endian low [`RANGE_BITS`] bits of a field element.
fn low_bits(value: Fr) -> Vec<bool> {
    value
        .into_bigint()
        .0
        .iter()
        .flat_map(|limb| (0..64).map(move |i| (limb >> i) & 1 == 1))
        .take(RANGE_BITS)
        .collect()
}

/// Public inputs in the order the verifier expects.
pub fn public_inputs(digests: [Fr; 3]) -> Vec<Fr> {
    digests.to_vec()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
