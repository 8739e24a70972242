//! End-to-end integration tests for the zkgrade issuance path.
//!
//! These drive the orchestrator the way the node does: a real bureau over an
//! in-memory score table, a real committer, a real registry, and a manual
//! clock so expiry can be stepped across without waiting thirty days.
//!
//! Collaborators are wrapped in counters so tests can prove that reuse
//! skips the bureau and the prover entirely.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use zkgrade_protocol::bureau::{CreditBureau, Grade, InMemoryScoreSource, ScoreSource, SourceError};
use zkgrade_protocol::clock::ManualClock;
use zkgrade_protocol::config::IssuanceConfig;
use zkgrade_protocol::crypto::commitment_digest;
use zkgrade_protocol::error::IssuanceError;
use zkgrade_protocol::orchestrator::IssuanceOrchestrator;
use zkgrade_protocol::registry::{TokenRegistry, TokenStatus};
use zkgrade_protocol::zkp::{
    CommitmentWitness, ProofArtifact, ProofBackend, ProofCommitter, StructuralBackend,
};

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

/// Score source that counts lookups and can be switched off.
struct CountingSource {
    inner: InMemoryScoreSource,
    calls: AtomicUsize,
    down: std::sync::atomic::AtomicBool,
    delay: Duration,
}

impl CountingSource {
    fn demo() -> Self {
        Self {
            inner: InMemoryScoreSource::demo(),
            calls: AtomicUsize::new(0),
            down: Default::default(),
            delay: Duration::ZERO,
        }
    }

    fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::demo()
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScoreSource for CountingSource {
    async fn fetch_score(&self, customer_id: &str) -> Result<Option<u32>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.down.load(Ordering::SeqCst) {
            return Err(SourceError::Unavailable("maintenance window".into()));
        }
        self.inner.fetch_score(customer_id).await
    }
}

/// Structural backend that counts proofs.
#[derive(Default)]
struct CountingBackend {
    proofs: AtomicUsize,
}

impl ProofBackend for CountingBackend {
    fn name(&self) -> &'static str {
        "counting"
    }

    fn prove(
        &self,
        witness: &CommitmentWitness,
        public_inputs: &[String; 3],
    ) -> anyhow::Result<ProofArtifact> {
        self.proofs.fetch_add(1, Ordering::SeqCst);
        StructuralBackend.prove(witness, public_inputs)
    }

    fn verify(&self, artifact: &ProofArtifact) -> bool {
        StructuralBackend.verify(artifact)
    }
}

struct Harness {
    orchestrator: IssuanceOrchestrator,
    source: Arc<CountingSource>,
    backend: Arc<CountingBackend>,
    clock: Arc<ManualClock>,
}

impl Harness {
    fn bureau_calls(&self) -> usize {
        self.source.calls()
    }

    fn proofs(&self) -> usize {
        self.backend.proofs.load(Ordering::SeqCst)
    }

    fn registry(&self) -> &TokenRegistry {
        self.orchestrator.registry()
    }
}

fn setup_with(source: CountingSource) -> Harness {
    let config = IssuanceConfig::default();
    let source = Arc::new(source);
    let backend = Arc::new(CountingBackend::default());
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 5, 1, 10, 0, 0).unwrap(),
    ));

    let bureau = CreditBureau::new(source.clone(), config.bureau_timeout);
    let committer = ProofCommitter::new(backend.clone());
    let registry = Arc::new(TokenRegistry::new(clock.clone()));
    let orchestrator = IssuanceOrchestrator::new(bureau, committer, registry, config);

    Harness {
        orchestrator,
        source,
        backend,
        clock,
    }
}

fn setup() -> Harness {
    setup_with(CountingSource::demo())
}

const HOLDER: &str = "0x9aE3b1F2c4D5e6F708192a3B4c5D6e7F80910203";

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn grade_b_first_request_is_approved() {
    let h = setup();
    let d = h.orchestrator.process("CUST_001", HOLDER, 15_000_000).await.unwrap();

    assert_eq!(d.grade, Grade::B);
    assert_eq!(d.max_loan_amount, 50_000_000);
    assert!(d.approval);
    assert_eq!(d.approved_amount, 15_000_000);
    assert!(!d.token_reused);
    assert_eq!(h.bureau_calls(), 1);
    assert_eq!(h.proofs(), 1);
}

#[tokio::test]
async fn second_request_reuses_token_without_bureau_or_prover() {
    let h = setup();
    let first = h.orchestrator.process("CUST_001", HOLDER, 15_000_000).await.unwrap();

    h.clock.advance(chrono::Duration::days(3));
    let second = h.orchestrator.process("CUST_001", HOLDER, 20_000_000).await.unwrap();

    assert_eq!(second.token_id, first.token_id);
    assert!(second.token_reused);
    assert!(second.approval);
    assert_eq!(second.approved_amount, 20_000_000);
    assert_eq!(h.bureau_calls(), 1, "reuse must not call the bureau");
    assert_eq!(h.proofs(), 1, "reuse must not call the prover");
}

#[tokio::test]
async fn over_limit_request_is_rejected_with_ceiling() {
    let h = setup();
    let first = h.orchestrator.process("CUST_001", HOLDER, 15_000_000).await.unwrap();
    let d = h.orchestrator.process("CUST_001", HOLDER, 60_000_000).await.unwrap();

    assert!(!d.approval);
    assert_eq!(d.approved_amount, 50_000_000);
    assert_eq!(d.token_id, first.token_id);
}

#[tokio::test]
async fn unknown_customer_is_not_found_and_leaves_no_token() {
    let h = setup();
    let err = h.orchestrator.process("CUST_404", HOLDER, 1_000).await.unwrap_err();

    assert!(matches!(err, IssuanceError::NotFound { .. }));
    assert!(h.registry().lookup("CUST_404", HOLDER).is_none());
    assert_eq!(h.registry().status("CUST_404", HOLDER), TokenStatus::NotFound);
    assert_eq!(h.proofs(), 0);
}

// ---------------------------------------------------------------------------
// Expiry
// ---------------------------------------------------------------------------

#[tokio::test]
async fn expiry_boundary_reuses_before_and_reissues_after() {
    let h = setup();
    let first = h.orchestrator.process("CUST_002", HOLDER, 1_000).await.unwrap();
    let token = h.registry().lookup("CUST_002", HOLDER).unwrap();
    assert_eq!(
        token.expires_at - token.issued_at,
        chrono::Duration::days(30)
    );

    h.clock.set(token.expires_at - chrono::Duration::milliseconds(1));
    let before = h.orchestrator.process("CUST_002", HOLDER, 1_000).await.unwrap();
    assert_eq!(before.token_id, first.token_id);

    h.clock.set(token.expires_at + chrono::Duration::milliseconds(1));
    assert_eq!(h.registry().status("CUST_002", HOLDER).label(), "expired");

    let after = h.orchestrator.process("CUST_002", HOLDER, 1_000).await.unwrap();
    assert_ne!(after.token_id, first.token_id);
    assert!(!after.token_reused);
    assert_eq!(h.bureau_calls(), 2);

    // The new token replaced the old one in the same slot.
    assert_eq!(h.registry().len(), 1);
    assert_eq!(h.registry().status("CUST_002", HOLDER).label(), "valid");
}

// ---------------------------------------------------------------------------
// Upstream failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn bureau_outage_is_upstream_unavailable_and_keeps_old_token() {
    let h = setup();
    let first = h.orchestrator.process("CUST_003", HOLDER, 1_000).await.unwrap();

    h.clock.advance(chrono::Duration::days(31));
    h.source.down.store(true, Ordering::SeqCst);

    let err = h.orchestrator.process("CUST_003", HOLDER, 1_000).await.unwrap_err();
    assert!(err.is_retryable());

    // The expired token is untouched; nothing new was written.
    let stored = h.registry().lookup("CUST_003", HOLDER).unwrap();
    assert_eq!(stored.token_id, first.token_id);
    assert_eq!(h.proofs(), 1);
}

#[tokio::test(start_paused = true)]
async fn bureau_timeout_is_upstream_unavailable() {
    let h = setup_with(CountingSource::slow(Duration::from_secs(30)));
    let err = h.orchestrator.process("CUST_001", HOLDER, 1_000).await.unwrap_err();

    assert_eq!(err.kind(), "upstream_unavailable");
    assert!(h.registry().is_empty());
}

// ---------------------------------------------------------------------------
// Ownership & addresses
// ---------------------------------------------------------------------------

#[tokio::test]
async fn checksum_and_lowercase_address_share_a_token() {
    let h = setup();
    let first = h.orchestrator.process("CUST_001", HOLDER, 1_000).await.unwrap();
    let second = h
        .orchestrator
        .process("CUST_001", &HOLDER.to_lowercase(), 1_000)
        .await
        .unwrap();

    assert_eq!(first.token_id, second.token_id);
    assert!(second.token_reused);
}

#[tokio::test]
async fn distinct_holders_get_distinct_tokens() {
    let h = setup();
    let a = h.orchestrator.process("CUST_001", "0xaaaa", 1_000).await.unwrap();
    let b = h.orchestrator.process("CUST_001", "0xbbbb", 1_000).await.unwrap();

    assert_ne!(a.token_id, b.token_id);
    assert_eq!(h.registry().len(), 2);
}

// ---------------------------------------------------------------------------
// Commitments on stored tokens
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stored_digests_open_only_to_issued_values() {
    let h = setup();
    h.orchestrator.process("CUST_002", HOLDER, 1_000).await.unwrap();
    let token = h.registry().lookup("CUST_002", HOLDER).unwrap();

    assert_eq!(token.score_digest, commitment_digest(&820u32));
    assert_eq!(token.grade_digest, commitment_digest("A"));
    assert_eq!(token.limit_digest, commitment_digest(&100_000_000u64));

    // A tampered limit does not match the stored commitment.
    assert_ne!(token.limit_digest, commitment_digest(&200_000_000u64));
}

// ---------------------------------------------------------------------------
// Concurrency
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_for_same_key_issue_one_token() {
    let h = Arc::new(setup_with(CountingSource::slow(Duration::from_millis(20))));

    let tasks: Vec<_> = (0..16)
        .map(|i| {
            let h = h.clone();
            tokio::spawn(async move {
                h.orchestrator
                    .process("CUST_001", HOLDER, 1_000 + i)
                    .await
                    .unwrap()
            })
        })
        .collect();

    let decisions: Vec<_> = futures::future::join_all(tasks)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    let token_ids: HashSet<_> = decisions.iter().map(|d| d.token_id.clone()).collect();
    assert_eq!(token_ids.len(), 1, "exactly one token must be issued");
    assert_eq!(h.bureau_calls(), 1);
    assert_eq!(h.proofs(), 1);
    assert_eq!(decisions.iter().filter(|d| !d.token_reused).count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_for_distinct_keys_all_issue() {
    let h = Arc::new(setup());

    let tasks: Vec<_> = (0..12)
        .map(|i| {
            let h = h.clone();
            let customer = ["CUST_001", "CUST_002", "CUST_003"][i % 3];
            let holder = format!("0x{:04x}", i);
            tokio::spawn(async move {
                h.orchestrator
                    .process(customer, &holder, 1_000)
                    .await
                    .unwrap()
            })
        })
        .collect();

    for r in futures::future::join_all(tasks).await {
        assert!(!r.unwrap().token_reused);
    }
    assert_eq!(h.registry().len(), 12);
    assert_eq!(h.proofs(), 12);
}
