//! # Credit Bureau
//!
//! Maps a customer identifier to a credit score, and a score to a grade and
//! a loan ceiling. The score itself comes from an external credit-data
//! service behind the [`ScoreSource`] trait; everything after that is a
//! fixed table lookup.
//!
//! ```text
//!   score    0 ── 500 ── 600 ── 700 ── 800 ── 1000
//!   grade      E      D      C      B      A
//!   limit      0     5M    20M    50M   100M
//! ```
//!
//! Band boundaries are inclusive on the lower bound: 800 is an A, 799 is a B.
//!
//! ## Failure mapping
//!
//! | Source outcome                 | Bureau result          |
//! |--------------------------------|------------------------|
//! | `Ok(Some(score))`, in range    | `Ok(CreditProfile)`    |
//! | `Ok(None)`                     | `NotFound`             |
//! | `Ok(Some(score))`, > 1000      | `UpstreamUnavailable`  |
//! | `Err(SourceError)`             | `UpstreamUnavailable`  |
//! | no answer within the timeout   | `UpstreamUnavailable`  |

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{
    GRADE_A_LOAN_LIMIT, GRADE_A_MIN_SCORE, GRADE_B_LOAN_LIMIT, GRADE_B_MIN_SCORE,
    GRADE_C_LOAN_LIMIT, GRADE_C_MIN_SCORE, GRADE_D_LOAN_LIMIT, GRADE_D_MIN_SCORE,
    GRADE_E_LOAN_LIMIT, MAX_CREDIT_SCORE, MIN_CREDIT_SCORE,
};
use crate::error::{IssuanceError, Result};

// ---------------------------------------------------------------------------
// Grade
// ---------------------------------------------------------------------------

/// Ordinal credit-risk category. `A` is the best, `E` the worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    E,
}

impl Grade {
    /// All grades, best first.
    pub const ALL: [Grade; 5] = [Grade::A, Grade::B, Grade::C, Grade::D, Grade::E];

    /// Derive the grade for a score using the fixed band table.
    pub fn from_score(score: u32) -> Self {
        if score >= GRADE_A_MIN_SCORE {
            Grade::A
        } else if score >= GRADE_B_MIN_SCORE {
            Grade::B
        } else if score >= GRADE_C_MIN_SCORE {
            Grade::C
        } else if score >= GRADE_D_MIN_SCORE {
            Grade::D
        } else {
            Grade::E
        }
    }

    /// Loan ceiling for this grade.
    pub fn max_loan_amount(self) -> u64 {
        match self {
            Grade::A => GRADE_A_LOAN_LIMIT,
            Grade::B => GRADE_B_LOAN_LIMIT,
            Grade::C => GRADE_C_LOAN_LIMIT,
            Grade::D => GRADE_D_LOAN_LIMIT,
            Grade::E => GRADE_E_LOAN_LIMIT,
        }
    }

    /// Inclusive score range `[min, max]` covered by this grade.
    pub fn score_range(self) -> (u32, u32) {
        match self {
            Grade::A => (GRADE_A_MIN_SCORE, MAX_CREDIT_SCORE),
            Grade::B => (GRADE_B_MIN_SCORE, GRADE_A_MIN_SCORE - 1),
            Grade::C => (GRADE_C_MIN_SCORE, GRADE_B_MIN_SCORE - 1),
            Grade::D => (GRADE_D_MIN_SCORE, GRADE_C_MIN_SCORE - 1),
            Grade::E => (MIN_CREDIT_SCORE, GRADE_D_MIN_SCORE - 1),
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Grade::A => "prime",
            Grade::B => "good",
            Grade::C => "fair",
            Grade::D => "watch",
            Grade::E => "high risk",
        }
    }

    /// Canonical single-letter form. This is the string that gets digested.
    pub fn as_str(self) -> &'static str {
        match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::E => "E",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string is not one of `A`..`E`.
#[derive(Debug, Error)]
#[error("unknown credit grade: {0:?}")]
pub struct ParseGradeError(pub String);

impl FromStr for Grade {
    type Err = ParseGradeError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "A" => Ok(Grade::A),
            "B" => Ok(Grade::B),
            "C" => Ok(Grade::C),
            "D" => Ok(Grade::D),
            "E" => Ok(Grade::E),
            other => Err(ParseGradeError(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// CreditProfile & criteria
// ---------------------------------------------------------------------------

/// A customer's score and the grade derived from it. Transient: produced by
/// a bureau lookup, consumed by the committer, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditProfile {
    pub customer_id: String,
    pub credit_score: u32,
    pub grade: Grade,
}

impl CreditProfile {
    pub fn new(customer_id: impl Into<String>, credit_score: u32) -> Self {
        Self {
            customer_id: customer_id.into(),
            credit_score,
            grade: Grade::from_score(credit_score),
        }
    }
}

/// One row of the published grading table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeCriterion {
    pub grade: Grade,
    pub min_score: u32,
    pub max_score: u32,
    pub description: String,
    pub max_loan_amount: u64,
}

// ---------------------------------------------------------------------------
// ScoreSource
// ---------------------------------------------------------------------------

/// Failures reported by a score source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The source could not be reached or refused to answer.
    #[error("score source unavailable: {0}")]
    Unavailable(String),

    /// The source answered with data that could not be parsed.
    #[error("malformed credit data: {0}")]
    Malformed(String),
}

/// The external credit-data collaborator.
///
/// `Ok(None)` means "this customer does not exist". Errors mean "I could not
/// find out".
#[async_trait]
pub trait ScoreSource: Send + Sync {
    async fn fetch_score(&self, customer_id: &str) -> std::result::Result<Option<u32>, SourceError>;
}

/// On-disk credit data, `{ "customers": { "<id>": { "credit_score": N, ... } } }`.
/// Fields other than `credit_score` are ignored.
#[derive(Debug, Deserialize)]
struct CreditDataFile {
    customers: HashMap<String, CustomerRecord>,
}

#[derive(Debug, Deserialize)]
struct CustomerRecord {
    credit_score: u32,
}

/// Score table held in memory. Used by the node (seeded from a JSON file or
/// the built-in demo customers) and by tests.
#[derive(Debug, Default)]
pub struct InMemoryScoreSource {
    scores: RwLock<HashMap<String, u32>>,
}

impl InMemoryScoreSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// The three demo customers.
    pub fn demo() -> Self {
        let source = Self::new();
        source.insert("CUST_001", 750);
        source.insert("CUST_002", 820);
        source.insert("CUST_003", 650);
        source
    }

    /// Parse credit data from a JSON string.
    pub fn from_json(json: &str) -> std::result::Result<Self, SourceError> {
        let file: CreditDataFile =
            serde_json::from_str(json).map_err(|e| SourceError::Malformed(e.to_string()))?;
        let source = Self::new();
        for (id, record) in file.customers {
            source.insert(id, record.credit_score);
        }
        Ok(source)
    }

    /// Load credit data from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> std::result::Result<Self, SourceError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| SourceError::Unavailable(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&raw)
    }

    pub fn insert(&self, customer_id: impl Into<String>, score: u32) {
        self.scores.write().insert(customer_id.into(), score);
    }

    pub fn len(&self) -> usize {
        self.scores.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.read().is_empty()
    }
}

#[async_trait]
impl ScoreSource for InMemoryScoreSource {
    async fn fetch_score(
        &self,
        customer_id: &str,
    ) -> std::result::Result<Option<u32>, SourceError> {
        Ok(self.scores.read().get(customer_id).copied())
    }
}

// ---------------------------------------------------------------------------
// CreditBureau
// ---------------------------------------------------------------------------

/// Grades customers using an external score source.
#[derive(Clone)]
pub struct CreditBureau {
    source: Arc<dyn ScoreSource>,
    timeout: Duration,
}

impl CreditBureau {
    pub fn new(source: Arc<dyn ScoreSource>, timeout: Duration) -> Self {
        Self { source, timeout }
    }

    /// Look up a customer's score and grade it.
    ///
    /// # Errors
    ///
    /// - [`IssuanceError::NotFound`] if the source does not know the customer.
    /// - [`IssuanceError::UpstreamUnavailable`] if the source fails, times
    ///   out, or returns a score outside `0..=1000`.
    pub async fn grade_for(&self, customer_id: &str) -> Result<CreditProfile> {
        let lookup =
            tokio::time::timeout(self.timeout, self.source.fetch_score(customer_id)).await;

        let score = match lookup {
            Err(_) => {
                warn!(
                    customer_id,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "bureau lookup timed out"
                );
                return Err(IssuanceError::bureau(format!(
                    "no answer within {:?}",
                    self.timeout
                )));
            }
            Ok(Err(e)) => {
                warn!(customer_id, error = %e, "bureau lookup failed");
                return Err(IssuanceError::bureau(e.to_string()));
            }
            Ok(Ok(None)) => {
                return Err(IssuanceError::NotFound {
                    customer_id: customer_id.to_string(),
                });
            }
            Ok(Ok(Some(score))) => score,
        };

        if score > MAX_CREDIT_SCORE {
            warn!(customer_id, score, "bureau returned out-of-range score");
            return Err(IssuanceError::bureau(format!(
                "score {} outside {}..={}",
                score, MIN_CREDIT_SCORE, MAX_CREDIT_SCORE
            )));
        }

        let profile = CreditProfile::new(customer_id, score);
        debug!(customer_id, grade = %profile.grade, "customer graded");
        Ok(profile)
    }

    /// Loan ceiling for a grade.
    pub fn max_loan_amount_for(grade: Grade) -> u64 {
        grade.max_loan_amount()
    }

    /// The full grading table, best grade first.
    pub fn criteria() -> Vec<GradeCriterion> {
        Grade::ALL
            .iter()
            .map(|&grade| {
                let (min_score, max_score) = grade.score_range();
                GradeCriterion {
                    grade,
                    min_score,
                    max_score,
                    description: grade.description().to_string(),
                    max_loan_amount: grade.max_loan_amount(),
                }
            })
            .collect()
    }
}

impl fmt::Debug for CreditBureau {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreditBureau")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    struct DownSource;

    #[async_trait]
    impl ScoreSource for DownSource {
        async fn fetch_score(&self, _: &str) -> std::result::Result<Option<u32>, SourceError> {
            Err(SourceError::Unavailable("connection refused".into()))
        }
    }

    struct SlowSource;

    #[async_trait]
    impl ScoreSource for SlowSource {
        async fn fetch_score(&self, _: &str) -> std::result::Result<Option<u32>, SourceError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(Some(750))
        }
    }

    fn demo_bureau() -> CreditBureau {
        CreditBureau::new(Arc::new(InMemoryScoreSource::demo()), Duration::from_secs(5))
    }

    #[test]
    fn grade_boundaries_are_inclusive_on_lower_bound() {
        assert_eq!(Grade::from_score(1000), Grade::A);
        assert_eq!(Grade::from_score(800), Grade::A);
        assert_eq!(Grade::from_score(799), Grade::B);
        assert_eq!(Grade::from_score(700), Grade::B);
        assert_eq!(Grade::from_score(699), Grade::C);
        assert_eq!(Grade::from_score(600), Grade::C);
        assert_eq!(Grade::from_score(599), Grade::D);
        assert_eq!(Grade::from_score(500), Grade::D);
        assert_eq!(Grade::from_score(499), Grade::E);
        assert_eq!(Grade::from_score(0), Grade::E);
    }

    #[test]
    fn grade_is_monotone_in_score() {
        // A lower score never yields a better grade.
        let mut prev = Grade::from_score(MAX_CREDIT_SCORE);
        for score in (MIN_CREDIT_SCORE..MAX_CREDIT_SCORE).rev() {
            let g = Grade::from_score(score);
            assert!(g >= prev, "score {} graded {} after {}", score, g, prev);
            prev = g;
        }
    }

    #[test]
    fn loan_limit_table() {
        assert_eq!(CreditBureau::max_loan_amount_for(Grade::A), 100_000_000);
        assert_eq!(CreditBureau::max_loan_amount_for(Grade::B), 50_000_000);
        assert_eq!(CreditBureau::max_loan_amount_for(Grade::C), 20_000_000);
        assert_eq!(CreditBureau::max_loan_amount_for(Grade::D), 5_000_000);
        assert_eq!(CreditBureau::max_loan_amount_for(Grade::E), 0);
    }

    #[test]
    fn grade_parse_and_display() {
        for g in Grade::ALL {
            assert_eq!(g.to_string().parse::<Grade>().unwrap(), g);
        }
        assert!("F".parse::<Grade>().is_err());
        assert!("b".parse::<Grade>().is_err());
    }

    #[test]
    fn criteria_cover_score_domain_without_gaps() {
        let criteria = CreditBureau::criteria();
        assert_eq!(criteria.len(), 5);
        assert_eq!(criteria[0].grade, Grade::A);
        assert_eq!(criteria[0].max_score, MAX_CREDIT_SCORE);
        assert_eq!(criteria[4].min_score, MIN_CREDIT_SCORE);
        for pair in criteria.windows(2) {
            assert_eq!(pair[1].max_score + 1, pair[0].min_score);
        }
        for c in &criteria {
            assert_eq!(Grade::from_score(c.min_score), c.grade);
            assert_eq!(Grade::from_score(c.max_score), c.grade);
        }
    }

    #[tokio::test]
    async fn grade_for_known_customer() {
        let profile = demo_bureau().grade_for("CUST_001").await.unwrap();
        assert_eq!(profile.credit_score, 750);
        assert_eq!(profile.grade, Grade::B);

        let profile = demo_bureau().grade_for("CUST_002").await.unwrap();
        assert_eq!(profile.grade, Grade::A);
    }

    #[tokio::test]
    async fn grade_for_unknown_customer_is_not_found() {
        let err = demo_bureau().grade_for("CUST_999").await.unwrap_err();
        assert!(matches!(
            err,
            IssuanceError::NotFound { ref customer_id } if customer_id == "CUST_999"
        ));
    }

    #[tokio::test]
    async fn source_failure_is_upstream_unavailable() {
        let bureau = CreditBureau::new(Arc::new(DownSource), Duration::from_secs(5));
        let err = bureau.grade_for("CUST_001").await.unwrap_err();
        assert_eq!(err.kind(), "upstream_unavailable");
    }

    #[tokio::test(start_paused = true)]
    async fn slow_source_times_out() {
        let bureau = CreditBureau::new(Arc::new(SlowSource), Duration::from_secs(5));
        let err = bureau.grade_for("CUST_001").await.unwrap_err();
        assert!(err.is_retryable());
        assert!(err.to_string().contains("no answer"));
    }

    #[tokio::test]
    async fn out_of_range_score_is_rejected() {
        let source = InMemoryScoreSource::new();
        source.insert("CUST_BAD", 1001);
        let bureau = CreditBureau::new(Arc::new(source), Duration::from_secs(5));
        let err = bureau.grade_for("CUST_BAD").await.unwrap_err();
        assert_eq!(err.kind(), "upstream_unavailable");
    }

    #[test]
    fn load_credit_data_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"customers": {{
                "CUST_010": {{"name": "Kim", "credit_score": 910, "income": 1}},
                "CUST_011": {{"credit_score": 420}}
            }}}}"#
        )
        .unwrap();

        let source = InMemoryScoreSource::from_json_file(file.path()).unwrap();
        assert_eq!(source.len(), 2);
    }

    #[test]
    fn malformed_credit_data_is_rejected() {
        let err = InMemoryScoreSource::from_json(r#"{"customers": {"X": {}}}"#).unwrap_err();
        assert!(matches!(err, SourceError::Malformed(_)));

        let err = InMemoryScoreSource::from_json_file("/nonexistent/zkgrade.json").unwrap_err();
        assert!(matches!(err, SourceError::Unavailable(_)));
    }
}
