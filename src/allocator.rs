use chrono::Utc;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::claims::{Claim, ClaimRegistry};
use crate::codes::{CodeStatus, CodeStore};
use crate::store::{SharedStore, StoreError};

#[derive(Debug, Error)]
pub enum ClaimError {
    #[error("{0}")]
    InvalidInput(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Outcome of a redemption attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimResult {
    Success { code: String, remaining: u64, total: u64 },
    AlreadyClaimed { code: String, name: String },
    /// `configured` is false when no code list was ever loaded
    Exhausted { configured: bool },
}

#[derive(Debug, Default)]
struct AllocationState {
    /// Counter value whose write failed after its claim was stored
    pending_count: Option<u64>,
}

/// Hands out one code per email, exactly once
///
/// The store has no compare-and-swap, so every allocation and every code load
/// runs under one async mutex. That makes this allocator the only writer of
/// `codes`, `claimed_count` and `claim:*` within the process; run one service
/// instance per store.
///
/// A claim is written before the counter. If the counter write fails, the
/// intended value is kept in memory and written before the next allocation.
/// That value does not survive a restart: code uniqueness across a restart
/// depends on the counter write having succeeded.
pub struct ClaimAllocator {
    codes: CodeStore,
    claims: ClaimRegistry,
    allocation: Mutex<AllocationState>,
}

/// Trimmed name and trimmed, lowercased email
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requester {
    pub name: String,
    pub email: String,
}

impl Requester {
    pub fn parse(name: &str, email: &str) -> Result<Self, ClaimError> {
        let name = name.trim();
        let email = email.trim().to_lowercase();

        if name.is_empty() || !email.contains('@') || !email.contains('.') {
            return Err(ClaimError::InvalidInput(
                "valid name and email required".to_string(),
            ));
        }

        Ok(Self {
            name: name.to_string(),
            email,
        })
    }
}

impl ClaimAllocator {
    pub fn new(store: SharedStore) -> Self {
        Self {
            codes: CodeStore::new(store.clone()),
            claims: ClaimRegistry::new(store),
            allocation: Mutex::new(AllocationState::default()),
        }
    }

    pub async fn redeem(&self, name: &str, email: &str) -> Result<ClaimResult, ClaimError> {
        let requester = Requester::parse(name, email)?;

        if let Some(claim) = self.claims.get(&requester.email).await? {
            tracing::info!("Replaying existing claim for {}", requester.email);
            return Ok(already_claimed(claim));
        }

        let mut state = self.allocation.lock().await;

        // A request for the same email may have allocated while we waited
        if let Some(claim) = self.claims.get(&requester.email).await? {
            tracing::info!("Replaying existing claim for {}", requester.email);
            return Ok(already_claimed(claim));
        }

        if let Some(pending) = state.pending_count {
            self.flush_pending(pending).await?;
            state.pending_count = None;
        }

        let Some(codes) = self.codes.codes().await? else {
            tracing::warn!("Redeem attempted before any codes were loaded");
            return Ok(ClaimResult::Exhausted { configured: false });
        };

        let total = codes.len() as u64;
        let index = self.codes.claimed_count().await?;
        let Some(code) = usize::try_from(index).ok().and_then(|i| codes.get(i)) else {
            tracing::info!("Codes exhausted ({} of {} claimed)", index, total);
            return Ok(ClaimResult::Exhausted { configured: true });
        };

        let claim = Claim {
            code: code.clone(),
            name: requester.name,
            email: requester.email,
            claimed_at: Utc::now(),
            index,
        };
        self.claims.insert(&claim).await?;

        let claimed = index + 1;
        if let Err(e) = self.codes.set_claimed_count(claimed).await {
            tracing::error!(
                "Claim for {} stored at index {} but counter update failed: {}",
                claim.email,
                index,
                e
            );
            state.pending_count = Some(claimed);
            return Err(e.into());
        }

        tracing::info!("Allocated code index {} to {}", index, claim.email);
        Ok(ClaimResult::Success {
            code: claim.code,
            remaining: total - claimed,
            total,
        })
    }

    /// Replace the code list; `reset_claims` restarts allocation at index 0
    pub async fn load_codes(
        &self,
        codes: &[String],
        reset_claims: bool,
    ) -> Result<CodeStatus, ClaimError> {
        if codes.is_empty() {
            return Err(ClaimError::InvalidInput("Provide a 'codes' array".to_string()));
        }

        let mut state = self.allocation.lock().await;
        let status = self.codes.load_codes(codes, reset_claims).await?;
        if reset_claims {
            state.pending_count = None;
        }

        tracing::info!(
            "Loaded {} codes (reset: {}, claimed so far: {})",
            status.total,
            reset_claims,
            status.claimed
        );
        Ok(status)
    }

    pub async fn status(&self) -> Result<CodeStatus, ClaimError> {
        Ok(self.codes.status().await?)
    }

    pub async fn list_claims(&self) -> Result<Vec<Claim>, ClaimError> {
        Ok(self.claims.list().await?)
    }

    async fn flush_pending(&self, pending: u64) -> Result<(), ClaimError> {
        let stored = self.codes.claimed_count().await?;
        if pending > stored {
            tracing::warn!("Repairing claimed counter ({} -> {})", stored, pending);
            self.codes.set_claimed_count(pending).await?;
        }
        Ok(())
    }
}

fn already_claimed(claim: Claim) -> ClaimResult {
    ClaimResult::AlreadyClaimed {
        code: claim.code,
        name: claim.name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{KvStore, MemoryStore, StoreResult};
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    fn codes(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    async fn allocator_with(values: &[&str]) -> ClaimAllocator {
        let allocator = ClaimAllocator::new(Arc::new(MemoryStore::new()));
        allocator.load_codes(&codes(values), true).await.unwrap();
        allocator
    }

    #[tokio::test]
    async fn test_end_to_end() {
        let allocator = allocator_with(&["X1", "X2"]).await;

        assert_eq!(
            allocator.redeem("Al", "al@x.com").await.unwrap(),
            ClaimResult::Success { code: "X1".to_string(), remaining: 1, total: 2 }
        );
        assert_eq!(
            allocator.redeem("Bo", "bo@x.com").await.unwrap(),
            ClaimResult::Success { code: "X2".to_string(), remaining: 0, total: 2 }
        );
        assert_eq!(
            allocator.redeem("Cy", "cy@x.com").await.unwrap(),
            ClaimResult::Exhausted { configured: true }
        );
    }

    #[tokio::test]
    async fn test_replay_is_idempotent() {
        let allocator = allocator_with(&["A", "B", "C"]).await;

        allocator.redeem("Al", "al@x.com").await.unwrap();
        let replay = allocator.redeem("Someone Else", "  AL@X.com ").await.unwrap();

        assert_eq!(
            replay,
            ClaimResult::AlreadyClaimed { code: "A".to_string(), name: "Al".to_string() }
        );
        assert_eq!(allocator.status().await.unwrap().claimed, 1);
    }

    #[tokio::test]
    async fn test_replay_after_exhaustion() {
        let allocator = allocator_with(&["ONLY"]).await;

        allocator.redeem("Al", "al@x.com").await.unwrap();
        assert_eq!(
            allocator.redeem("Al", "al@x.com").await.unwrap(),
            ClaimResult::AlreadyClaimed { code: "ONLY".to_string(), name: "Al".to_string() }
        );
    }

    #[tokio::test]
    async fn test_exhaustion_does_not_advance_counter() {
        let allocator = allocator_with(&["A"]).await;

        allocator.redeem("Al", "al@x.com").await.unwrap();
        for i in 0..3 {
            let result = allocator.redeem("Late", &format!("late{}@x.com", i)).await.unwrap();
            assert_eq!(result, ClaimResult::Exhausted { configured: true });
        }

        assert_eq!(allocator.status().await.unwrap(), CodeStatus::new(1, 1));
        assert_eq!(allocator.list_claims().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_no_codes_loaded() {
        let allocator = ClaimAllocator::new(Arc::new(MemoryStore::new()));

        assert_eq!(
            allocator.redeem("Al", "al@x.com").await.unwrap(),
            ClaimResult::Exhausted { configured: false }
        );
        assert_eq!(allocator.status().await.unwrap(), CodeStatus::new(0, 0));
    }

    #[tokio::test]
    async fn test_invalid_input_leaves_store_untouched() {
        let backend = Arc::new(MemoryStore::new());
        let allocator = ClaimAllocator::new(backend.clone());

        let invalid = [
            ("", "a@b.com"),
            ("   ", "a@b.com"),
            ("Bob", "not-an-email"),
            ("Bob", "bob@localhost"),
        ];
        for (name, email) in invalid {
            let error = allocator.redeem(name, email).await.unwrap_err();
            assert!(matches!(error, ClaimError::InvalidInput(_)), "{name:?} {email:?}");
            assert_eq!(error.to_string(), "valid name and email required");
        }

        assert!(backend.list("").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_load_empty_codes_rejected() {
        let allocator = ClaimAllocator::new(Arc::new(MemoryStore::new()));
        let error = allocator.load_codes(&[], true).await.unwrap_err();
        assert!(matches!(error, ClaimError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_reload_without_reset_continues_sequence() {
        let allocator = allocator_with(&["A", "B"]).await;
        allocator.redeem("Al", "al@x.com").await.unwrap();

        let status = allocator.load_codes(&codes(&["A", "B", "C"]), false).await.unwrap();
        assert_eq!(status, CodeStatus { total: 3, claimed: 1, remaining: 2 });

        assert_eq!(
            allocator.redeem("Bo", "bo@x.com").await.unwrap(),
            ClaimResult::Success { code: "B".to_string(), remaining: 1, total: 3 }
        );
    }

    #[tokio::test]
    async fn test_claims_carry_index_and_code() {
        let allocator = allocator_with(&["A", "B", "C"]).await;
        allocator.redeem("Al", "al@x.com").await.unwrap();
        allocator.redeem("Bo", "BO@x.com").await.unwrap();

        let claims = allocator.list_claims().await.unwrap();
        assert_eq!(claims.len(), 2);
        let summary: Vec<(u64, &str, &str)> = claims
            .iter()
            .map(|c| (c.index, c.code.as_str(), c.email.as_str()))
            .collect();
        assert_eq!(summary, vec![(0, "A", "al@x.com"), (1, "B", "bo@x.com")]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_redeems_get_distinct_codes() {
        let pool: Vec<String> = (0..20).map(|i| format!("CODE{}", i)).collect();
        let backend = Arc::new(MemoryStore::new());
        let allocator = Arc::new(ClaimAllocator::new(backend));
        allocator.load_codes(&pool, true).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..30 {
            let allocator = allocator.clone();
            handles.push(tokio::spawn(async move {
                allocator.redeem("User", &format!("user{}@x.com", i)).await.unwrap()
            }));
        }

        let mut granted = HashSet::new();
        let mut exhausted = 0;
        for handle in handles {
            match handle.await.unwrap() {
                ClaimResult::Success { code, .. } => assert!(granted.insert(code)),
                ClaimResult::Exhausted { configured: true } => exhausted += 1,
                other => panic!("unexpected result: {:?}", other),
            }
        }
        assert_eq!(granted.len(), 20);
        assert_eq!(exhausted, 10);

        let mut indices: Vec<u64> = allocator
            .list_claims()
            .await
            .unwrap()
            .iter()
            .map(|claim| claim.index)
            .collect();
        indices.sort_unstable();
        assert_eq!(indices, (0..20).collect::<Vec<u64>>());
        assert_eq!(allocator.status().await.unwrap(), CodeStatus::new(20, 20));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_same_email_allocates_once() {
        let allocator = allocator_with(&["A", "B", "C", "D"]).await;
        let allocator = Arc::new(allocator);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let allocator = allocator.clone();
            handles.push(tokio::spawn(async move {
                allocator.redeem("Al", "al@x.com").await.unwrap()
            }));
        }

        let mut successes = 0;
        for handle in handles {
            match handle.await.unwrap() {
                ClaimResult::Success { code, .. } => {
                    assert_eq!(code, "A");
                    successes += 1;
                }
                ClaimResult::AlreadyClaimed { code, .. } => assert_eq!(code, "A"),
                other => panic!("unexpected result: {:?}", other),
            }
        }
        assert_eq!(successes, 1);
        assert_eq!(allocator.status().await.unwrap().claimed, 1);
    }

    /// Fails the first write of `claimed_count` after being armed
    struct FlakyCounterStore {
        inner: MemoryStore,
        armed: AtomicBool,
    }

    #[async_trait]
    impl KvStore for FlakyCounterStore {
        async fn get(&self, key: &str) -> StoreResult<Option<String>> {
            self.inner.get(key).await
        }

        async fn put(&self, key: &str, value: String) -> StoreResult<()> {
            if key == "claimed_count" && self.armed.swap(false, Ordering::SeqCst) {
                return Err(StoreError::Backend(anyhow::anyhow!("write timed out")));
            }
            self.inner.put(key, value).await
        }

        async fn list(&self, prefix: &str) -> StoreResult<Vec<String>> {
            self.inner.list(prefix).await
        }
    }

    #[tokio::test]
    async fn test_failed_counter_write_is_retried() {
        let backend = Arc::new(FlakyCounterStore {
            inner: MemoryStore::new(),
            armed: AtomicBool::new(false),
        });
        let allocator = ClaimAllocator::new(backend.clone());
        allocator.load_codes(&codes(&["A", "B", "C"]), true).await.unwrap();

        backend.armed.store(true, Ordering::SeqCst);
        let error = allocator.redeem("Al", "al@x.com").await.unwrap_err();
        assert!(matches!(error, ClaimError::Store(_)));

        // The claim landed even though the counter did not move
        assert_eq!(allocator.status().await.unwrap().claimed, 0);
        assert_eq!(
            allocator.redeem("Al", "al@x.com").await.unwrap(),
            ClaimResult::AlreadyClaimed { code: "A".to_string(), name: "Al".to_string() }
        );

        assert_eq!(
            allocator.redeem("Bo", "bo@x.com").await.unwrap(),
            ClaimResult::Success { code: "B".to_string(), remaining: 1, total: 3 }
        );
        assert_eq!(allocator.status().await.unwrap(), CodeStatus::new(3, 2));
    }

    #[tokio::test]
    async fn test_reset_discards_pending_counter() {
        let backend = Arc::new(FlakyCounterStore {
            inner: MemoryStore::new(),
            armed: AtomicBool::new(false),
        });
        let allocator = ClaimAllocator::new(backend.clone());
        allocator.load_codes(&codes(&["A", "B"]), true).await.unwrap();

        backend.armed.store(true, Ordering::SeqCst);
        assert!(allocator.redeem("Al", "al@x.com").await.is_err());

        allocator.load_codes(&codes(&["N1", "N2"]), true).await.unwrap();
        assert_eq!(
            allocator.redeem("Bo", "bo@x.com").await.unwrap(),
            ClaimResult::Success { code: "N1".to_string(), remaining: 1, total: 2 }
        );
    }
}
