use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::{SharedStore, StoreError, StoreResult};

const CLAIM_PREFIX: &str = "claim:";

/// A code handed to one email address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Claim {
    pub code: String,
    pub name: String,
    pub email: String,
    pub claimed_at: DateTime<Utc>,
    /// Position of `code` in the code list
    pub index: u64,
}

/// Claim records keyed by normalized email
pub struct ClaimRegistry {
    store: SharedStore,
}

fn claim_key(email: &str) -> String {
    format!("{}{}", CLAIM_PREFIX, email)
}

fn decode(key: &str, raw: &str) -> StoreResult<Claim> {
    serde_json::from_str(raw).map_err(|source| StoreError::Malformed {
        key: key.to_string(),
        source,
    })
}

impl ClaimRegistry {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub async fn get(&self, email: &str) -> StoreResult<Option<Claim>> {
        let key = claim_key(email);
        match self.store.get(&key).await? {
            Some(raw) => decode(&key, &raw).map(Some),
            None => Ok(None),
        }
    }

    pub(crate) async fn insert(&self, claim: &Claim) -> StoreResult<()> {
        let key = claim_key(&claim.email);
        let encoded = serde_json::to_string(claim).map_err(|source| StoreError::Malformed {
            key: key.clone(),
            source,
        })?;
        self.store.put(&key, encoded).await
    }

    /// Every claim, oldest first
    pub async fn list(&self) -> StoreResult<Vec<Claim>> {
        let keys = self.store.list(CLAIM_PREFIX).await?;

        let mut claims = Vec::with_capacity(keys.len());
        for key in keys {
            // Listed keys may vanish before they are read
            if let Some(raw) = self.store.get(&key).await? {
                claims.push(decode(&key, &raw)?);
            }
        }

        claims.sort_by(|a, b| a.claimed_at.cmp(&b.claimed_at).then(a.index.cmp(&b.index)));
        Ok(claims)
    }
}
