// ABOUTME: Host-visible result of a resolved operation and its per-kind JSON shape
// ABOUTME: Also parses public keys and signed events returned by the signer with nostr types

use crate::types::operation::OperationKind;
use nostr::{Event, JsonUtil, PublicKey};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResponseError {
    #[error("Response is not a {0} result")]
    WrongKind(&'static str),
    #[error("Invalid public key: {0}")]
    PublicKey(String),
    #[error("Invalid signed event: {0}")]
    Event(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerResponse {
    pub kind: OperationKind,
    pub result: String,
    /// Signer package, reported for public key requests
    pub package: Option<String>,
    /// Signed event echoed by the signer
    pub event: Option<String>,
    pub id: Option<String>,
}

impl SignerResponse {
    /// Shape expected by the host: public key requests carry `package`,
    /// signing carries `event`, encrypt/decrypt only `result` and `id`
    pub fn to_value(&self) -> JsonValue {
        match self.kind {
            OperationKind::GetPublicKey => json!({
                "result": self.result,
                "package": self.package,
                "event": self.event,
                "id": self.id,
            }),
            OperationKind::SignEvent => json!({
                "result": self.result,
                "event": self.event,
                "id": self.id,
            }),
            _ => json!({
                "result": self.result,
                "id": self.id,
            }),
        }
    }

    /// Signers return the key as hex or npub
    pub fn public_key(&self) -> Result<PublicKey, ResponseError> {
        if self.kind != OperationKind::GetPublicKey {
            return Err(ResponseError::WrongKind("get_public_key"));
        }
        PublicKey::parse(&self.result).map_err(|e| ResponseError::PublicKey(e.to_string()))
    }

    /// Parses and verifies the echoed event, `None` when the signer only returned a signature
    pub fn signed_event(&self) -> Result<Option<Event>, ResponseError> {
        if self.kind != OperationKind::SignEvent {
            return Err(ResponseError::WrongKind("sign_event"));
        }
        let Some(event_json) = self.event.as_deref() else {
            return Ok(None);
        };
        let event = Event::from_json(event_json).map_err(|e| ResponseError::Event(e.to_string()))?;
        event
            .verify()
            .map_err(|e| ResponseError::Event(e.to_string()))?;
        Ok(Some(event))
    }
}
