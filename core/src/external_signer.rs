// ABOUTME: nostr::NostrSigner backed by an external signer app through the negotiation engine
// ABOUTME: Lets nostr event builders and clients sign and encrypt without ever holding the key

use crate::negotiation::NegotiationEngine;
use crate::platform::Activity;
use crate::types::{Operation, OperationKind, SignerResponse};
use async_trait::async_trait;
use nostr::secp256k1::schnorr::Signature;
use nostr::signer::SignerBackend;
use nostr::{Event, JsonUtil, NostrSigner, PublicKey, SignerError, UnsignedEvent};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

pub const BACKEND_NAME: &str = "NIP-55 external signer";

/// Signs as the user the external signer app logged in with
pub struct ExternalSigner {
    engine: Arc<NegotiationEngine>,
    activity: Option<Arc<dyn Activity>>,
    public_key: PublicKey,
}

impl fmt::Debug for ExternalSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExternalSigner")
            .field("public_key", &self.public_key)
            .field("has_activity", &self.activity.is_some())
            .finish()
    }
}

impl ExternalSigner {
    pub fn new(engine: Arc<NegotiationEngine>, activity: Option<Arc<dyn Activity>>, public_key: PublicKey) -> Self {
        Self {
            engine,
            activity,
            public_key,
        }
    }

    /// Asks the signer app for the user's key, recording the app on first use
    pub async fn login(engine: Arc<NegotiationEngine>, activity: Option<Arc<dyn Activity>>) -> Result<Self, SignerError> {
        let response = engine
            .execute(activity.as_deref(), Operation::get_public_key(None))
            .await
            .map_err(SignerError::backend)?;
        let public_key = response.public_key().map_err(SignerError::backend)?;
        tracing::info!(target: "nip55_core::external_signer", "Logged in as {}", public_key.to_hex());
        Ok(Self::new(engine, activity, public_key))
    }

    async fn run(&self, operation: Operation) -> Result<SignerResponse, SignerError> {
        self.engine
            .execute(self.activity.as_deref(), operation)
            .await
            .map_err(SignerError::backend)
    }

    async fn crypto(&self, kind: OperationKind, public_key: &PublicKey, content: &str) -> Result<String, SignerError> {
        let operation = Operation::crypto(
            kind,
            content,
            public_key.to_hex(),
            Some(self.public_key.to_hex()),
            Uuid::new_v4().to_string(),
        )
        .map_err(SignerError::backend)?;
        Ok(self.run(operation).await?.result)
    }
}

#[async_trait]
impl NostrSigner for ExternalSigner {
    fn backend(&self) -> SignerBackend {
        SignerBackend::Custom(Cow::Borrowed(BACKEND_NAME))
    }

    async fn get_public_key(&self) -> Result<PublicKey, SignerError> {
        Ok(self.public_key)
    }

    /// Uses the signed event the app echoes, or attaches the bare signature to `unsigned`
    async fn sign_event(&self, unsigned: UnsignedEvent) -> Result<Event, SignerError> {
        let operation = Operation::sign_event(
            unsigned.as_json(),
            Uuid::new_v4().to_string(),
            Some(self.public_key.to_hex()),
        )
        .map_err(SignerError::backend)?;
        let response = self.run(operation).await?;

        if let Some(event) = response.signed_event().map_err(SignerError::backend)? {
            return Ok(event);
        }
        let sig = Signature::from_str(&response.result).map_err(SignerError::backend)?;
        unsigned.add_signature(sig).map_err(SignerError::backend)
    }

    async fn nip04_encrypt(&self, public_key: &PublicKey, content: &str) -> Result<String, SignerError> {
        self.crypto(OperationKind::Nip04Encrypt, public_key, content).await
    }

    async fn nip04_decrypt(&self, public_key: &PublicKey, encrypted_content: &str) -> Result<String, SignerError> {
        self.crypto(OperationKind::Nip04Decrypt, public_key, encrypted_content).await
    }

    async fn nip44_encrypt(&self, public_key: &PublicKey, content: &str) -> Result<String, SignerError> {
        self.crypto(OperationKind::Nip44Encrypt, public_key, content).await
    }

    async fn nip44_decrypt(&self, public_key: &PublicKey, payload: &str) -> Result<String, SignerError> {
        self.crypto(OperationKind::Nip44Decrypt, public_key, payload).await
    }
}
