use serde::{Deserialize, Serialize};

use crate::store::{SharedStore, StoreError, StoreResult};

const CODES_KEY: &str = "codes";
const CLAIMED_COUNT_KEY: &str = "claimed_count";

/// Snapshot of how many codes exist and how many were handed out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct CodeStatus {
    pub total: u64,
    pub claimed: u64,
    pub remaining: u64,
}

impl CodeStatus {
    pub fn new(total: u64, claimed: u64) -> Self {
        Self {
            total,
            claimed,
            remaining: total.saturating_sub(claimed),
        }
    }
}

/// Persisted code list and claimed counter
///
/// Mutators are crate-private; only the allocator may move the counter.
pub struct CodeStore {
    store: SharedStore,
}

impl CodeStore {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Overwrite the code list, optionally resetting the counter to zero
    ///
    /// The caller validates that `codes` is non-empty.
    pub(crate) async fn load_codes(
        &self,
        codes: &[String],
        reset_claims: bool,
    ) -> StoreResult<CodeStatus> {
        let encoded = serde_json::to_string(codes).map_err(|source| StoreError::Malformed {
            key: CODES_KEY.to_string(),
            source,
        })?;
        self.store.put(CODES_KEY, encoded).await?;

        if reset_claims {
            self.set_claimed_count(0).await?;
        }

        let claimed = self.claimed_count().await?;
        Ok(CodeStatus::new(codes.len() as u64, claimed))
    }

    pub async fn status(&self) -> StoreResult<CodeStatus> {
        let total = self.codes().await?.map_or(0, |codes| codes.len() as u64);
        let claimed = self.claimed_count().await?;
        Ok(CodeStatus::new(total, claimed))
    }

    /// `None` until an admin has loaded codes
    pub(crate) async fn codes(&self) -> StoreResult<Option<Vec<String>>> {
        let Some(raw) = self.store.get(CODES_KEY).await? else {
            return Ok(None);
        };
        let codes = serde_json::from_str(&raw).map_err(|source| StoreError::Malformed {
            key: CODES_KEY.to_string(),
            source,
        })?;
        Ok(Some(codes))
    }

    pub(crate) async fn claimed_count(&self) -> StoreResult<u64> {
        let Some(raw) = self.store.get(CLAIMED_COUNT_KEY).await? else {
            return Ok(0);
        };
        serde_json::from_str(raw.trim()).map_err(|source| StoreError::Malformed {
            key: CLAIMED_COUNT_KEY.to_string(),
            source,
        })
    }

    pub(crate) async fn set_claimed_count(&self, count: u64) -> StoreResult<()> {
        self.store.put(CLAIMED_COUNT_KEY, count.to_string()).await
    }
}
