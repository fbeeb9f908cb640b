pub mod memory_store;
pub mod sqlite_store;

use crate::types::SignerIdentity;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Persisted string preferences, grouped by namespace
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<String>, StoreError>;
    async fn set(&self, namespace: &str, key: &str, value: &str) -> Result<(), StoreError>;
}

/// Remembers which external signer the user picked
#[derive(Clone)]
pub struct SignerDirectory {
    store: Arc<dyn KeyValueStore>,
    namespace: String,
    key: String,
}

impl SignerDirectory {
    pub fn new(store: Arc<dyn KeyValueStore>, namespace: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            store,
            namespace: namespace.into(),
            key: key.into(),
        }
    }

    /// Read failures count as "no signer recorded"
    pub async fn get(&self) -> Option<SignerIdentity> {
        match self.store.get(&self.namespace, &self.key).await {
            Ok(value) => value.and_then(SignerIdentity::new),
            Err(e) => {
                tracing::warn!(target: "nip55_core::directory", "Failed to read signer identity: {}", e);
                None
            }
        }
    }

    pub async fn set(&self, identity: &SignerIdentity) -> Result<(), StoreError> {
        tracing::info!(target: "nip55_core::directory", "Recording signer {}", identity);
        self.store
            .set(&self.namespace, &self.key, identity.as_str())
            .await
    }
}

impl std::fmt::Debug for SignerDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignerDirectory")
            .field("namespace", &self.namespace)
            .field("key", &self.key)
            .finish()
    }
}
