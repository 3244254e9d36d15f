use std::collections::HashSet;

use async_trait::async_trait;
use ethers::types::H256;
use tokio::sync::Mutex;

/// Guard against processing the same resolution request twice. Insert and
/// check happen under one lock acquisition, so the push and poll paths can
/// never both claim a request.
#[async_trait]
pub trait ProcessedStore: Send + Sync {
    /// Marks the request as claimed. Returns false if it was already present.
    async fn insert(&self, request_id: H256) -> bool;
    /// Releases a claim so the request can be retried.
    async fn remove(&self, request_id: H256);
    async fn contains(&self, request_id: H256) -> bool;
    async fn len(&self) -> usize;
}

/// Process-lifetime store; cleared on restart by construction.
#[derive(Default)]
pub struct InMemoryStore {
    seen: Mutex<HashSet<H256>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProcessedStore for InMemoryStore {
    async fn insert(&self, request_id: H256) -> bool {
        self.seen.lock().await.insert(request_id)
    }

    async fn remove(&self, request_id: H256) {
        self.seen.lock().await.remove(&request_id);
    }

    async fn contains(&self, request_id: H256) -> bool {
        self.seen.lock().await.contains(&request_id)
    }

    async fn len(&self) -> usize {
        self.seen.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn insert_claims_once() {
        let store = InMemoryStore::new();
        let id = H256::repeat_byte(1);

        assert!(store.insert(id).await);
        assert!(!store.insert(id).await);
        assert!(store.contains(id).await);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn remove_releases_claim() {
        let store = InMemoryStore::new();
        let id = H256::repeat_byte(2);

        assert!(store.insert(id).await);
        store.remove(id).await;
        assert!(!store.contains(id).await);
        assert!(store.insert(id).await);
    }

    #[tokio::test]
    async fn concurrent_inserts_yield_one_claim() {
        use std::sync::Arc;

        let store = Arc::new(InMemoryStore::new());
        let id = H256::repeat_byte(3);

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move { store.insert(id).await }));
        }

        let mut claimed = 0;
        for handle in handles {
            if handle.await.unwrap() {
                claimed += 1;
            }
        }
        assert_eq!(claimed, 1);
    }
}
