//! # Token Registry
//!
//! Owns every issued [`CreditGradeToken`], one slot per
//! `(customer_id, holder_address)`.
//!
//! ## Lifecycle
//!
//! ```text
//!   Nonexistent ──issue──▶ Live ──time passes──▶ Expired
//!                           │                      │
//!                           └──invalidate──▶ Invalidated
//!
//!   Expired / Invalidated ──issue──▶ Live (new token_id, same slot)
//! ```
//!
//! Expiry is never stored. It is recomputed from `expires_at` and the
//! registry's [`Clock`] on every check. The registry never deletes: an
//! expired token stays in its slot and is still returned by
//! [`TokenRegistry::lookup`] until a re-issue overwrites it.
//!
//! ## Check-then-act
//!
//! "Look up, find nothing live, write a new token" is only safe if no one
//! else does the same for the same key in between. [`TokenRegistry::lock_key`]
//! hands out a per-key async mutex guard; the orchestrator holds it across
//! lookup, bureau call, proof generation and `put`. Different keys never
//! contend. Dropping the last guard for a key removes its mutex, so the lock
//! table only holds keys with a request in flight.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::info;

use crate::bureau::Grade;
use crate::clock::Clock;

/// Attribute names read back on reuse.
pub const ATTR_CREDIT_GRADE: &str = "Credit Grade";
pub const ATTR_MAX_LOAN_AMOUNT: &str = "Max Loan Amount";
pub const ATTR_ISSUER: &str = "Issuer";
pub const ATTR_ISSUE_DATE: &str = "Issue Date";
pub const ATTR_EXPIRY_DATE: &str = "Expiry Date";
pub const ATTR_VALIDITY_PERIOD: &str = "Validity Period";

// ---------------------------------------------------------------------------
// TokenKey
// ---------------------------------------------------------------------------

/// Registry key. `0x` hex addresses are lowercased so that checksum-cased
/// and lowercase forms of the same address share a slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TokenKey {
    customer_id: String,
    holder_address: String,
}

impl TokenKey {
    pub fn new(customer_id: &str, holder_address: &str) -> Self {
        Self {
            customer_id: customer_id.to_string(),
            holder_address: normalize_address(holder_address),
        }
    }

    pub fn customer_id(&self) -> &str {
        &self.customer_id
    }

    pub fn holder_address(&self) -> &str {
        &self.holder_address
    }
}

impl fmt::Display for TokenKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.customer_id, self.holder_address)
    }
}

/// True for `0x` followed by one or more hex digits.
pub fn is_hex_address(address: &str) -> bool {
    match address
        .strip_prefix("0x")
        .or_else(|| address.strip_prefix("0X"))
    {
        Some(rest) => !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_hexdigit()),
        None => false,
    }
}

/// Lowercase hex addresses; leave anything else untouched.
pub fn normalize_address(address: &str) -> String {
    if is_hex_address(address) {
        address.to_ascii_lowercase()
    } else {
        address.to_string()
    }
}

// ---------------------------------------------------------------------------
// CreditGradeToken
// ---------------------------------------------------------------------------

/// One named attribute on a token. Values are JSON so that downstream
/// consumers see numbers as numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenAttribute {
    pub trait_type: String,
    pub value: serde_json::Value,
}

impl TokenAttribute {
    pub fn new(trait_type: &str, value: impl Into<serde_json::Value>) -> Self {
        Self {
            trait_type: trait_type.to_string(),
            value: value.into(),
        }
    }
}

/// The reusable credential: a holder address bound to a grade and loan
/// ceiling, backed by a proof commitment, with an expiry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditGradeToken {
    pub token_id: String,
    pub customer_id: String,
    pub holder_address: String,
    pub name: String,
    pub issuer: String,
    pub grade: Grade,
    pub max_loan_amount: u64,
    pub proof_id: String,
    pub score_digest: String,
    pub grade_digest: String,
    pub limit_digest: String,
    /// Ordered; see the `ATTR_*` constants.
    pub attributes: Vec<TokenAttribute>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Cleared by external invalidation. Never set back.
    pub valid: bool,
}

impl CreditGradeToken {
    pub fn key(&self) -> TokenKey {
        TokenKey::new(&self.customer_id, &self.holder_address)
    }

    /// First attribute with the given name.
    pub fn attribute(&self, trait_type: &str) -> Option<&serde_json::Value> {
        self.attributes
            .iter()
            .find(|a| a.trait_type == trait_type)
            .map(|a| &a.value)
    }

    /// Grade and loan ceiling as recorded in the attributes. `None` if either
    /// is missing or unreadable.
    pub fn reuse_terms(&self) -> Option<(Grade, u64)> {
        let grade = self.attribute(ATTR_CREDIT_GRADE)?.as_str()?.parse().ok()?;
        let limit = self.attribute(ATTR_MAX_LOAN_AMOUNT)?.as_u64()?;
        Some((grade, limit))
    }

    /// Valid and strictly before expiry.
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        self.valid && now < self.expires_at
    }
}

// ---------------------------------------------------------------------------
// TokenStatus
// ---------------------------------------------------------------------------

/// What a key currently resolves to.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenStatus {
    NotFound,
    Live(CreditGradeToken),
    Expired(CreditGradeToken),
    Invalidated(CreditGradeToken),
}

impl TokenStatus {
    pub fn label(&self) -> &'static str {
        match self {
            TokenStatus::NotFound => "not_found",
            TokenStatus::Live(_) => "valid",
            TokenStatus::Expired(_) => "expired",
            TokenStatus::Invalidated(_) => "invalidated",
        }
    }

    pub fn token(&self) -> Option<&CreditGradeToken> {
        match self {
            TokenStatus::NotFound => None,
            TokenStatus::Live(t) | TokenStatus::Expired(t) | TokenStatus::Invalidated(t) => Some(t),
        }
    }
}

// ---------------------------------------------------------------------------
// TokenRegistry
// ---------------------------------------------------------------------------

/// In-memory token store with per-key locking.
pub struct TokenRegistry {
    tokens: DashMap<TokenKey, CreditGradeToken>,
    key_locks: DashMap<TokenKey, Arc<Mutex<()>>>,
    clock: Arc<dyn Clock>,
}

impl TokenRegistry {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            tokens: DashMap::new(),
            key_locks: DashMap::new(),
            clock,
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// The stored token for the key, live or not.
    pub fn lookup(&self, customer_id: &str, holder_address: &str) -> Option<CreditGradeToken> {
        self.tokens
            .get(&TokenKey::new(customer_id, holder_address))
            .map(|entry| entry.value().clone())
    }

    /// Live right now, per the registry clock.
    pub fn is_live(&self, token: &CreditGradeToken) -> bool {
        token.is_live_at(self.clock.now())
    }

    /// Insert or overwrite the token in its key's slot.
    ///
    /// Callers must hold [`lock_key`](Self::lock_key) for the key and have
    /// confirmed that no live token exists.
    pub fn put(&self, token: CreditGradeToken) {
        self.tokens.insert(token.key(), token);
    }

    pub fn status(&self, customer_id: &str, holder_address: &str) -> TokenStatus {
        match self.lookup(customer_id, holder_address) {
            None => TokenStatus::NotFound,
            Some(t) if !t.valid => TokenStatus::Invalidated(t),
            Some(t) if self.is_live(&t) => TokenStatus::Live(t),
            Some(t) => TokenStatus::Expired(t),
        }
    }

    /// Clear the `valid` flag of the stored token. Returns `false` if the key
    /// has no token. Takes the key lock so it cannot interleave with an
    /// in-flight issuance for the same key.
    pub async fn invalidate(&self, customer_id: &str, holder_address: &str) -> bool {
        let key = TokenKey::new(customer_id, holder_address);
        let _guard = self.lock_key(&key).await;

        match self.tokens.get_mut(&key) {
            Some(mut entry) => {
                entry.valid = false;
                info!(
                    event = "invalidate",
                    token_id = %entry.token_id,
                    key = %key,
                    "token invalidated"
                );
                true
            }
            None => false,
        }
    }

    /// Exclusive access to one key for a lookup-then-put sequence.
    pub async fn lock_key(&self, key: &TokenKey) -> KeyGuard<'_> {
        let lock = self
            .key_locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();
        KeyGuard {
            registry: self,
            key: key.clone(),
            guard: Some(lock.lock_owned().await),
        }
    }

    /// Keys with a lock currently held or awaited.
    pub fn lock_count(&self) -> usize {
        self.key_locks.len()
    }

    /// Number of stored tokens, live or not.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Number of tokens live right now.
    pub fn live_count(&self) -> usize {
        let now = self.clock.now();
        self.tokens.iter().filter(|e| e.value().is_live_at(now)).count()
    }
}

/// Held key lock from [`TokenRegistry::lock_key`].
pub struct KeyGuard<'a> {
    registry: &'a TokenRegistry,
    key: TokenKey,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Waiters hold a clone of the Arc, so a count of one means the map
        // entry is the only reference left. `entry()` and `remove_if` take
        // the same shard lock, so no new locker can slip in between.
        self.registry
            .key_locks
            .remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}

impl fmt::Debug for TokenRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenRegistry")
            .field("tokens", &self.tokens.len())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
