// ABOUTME: Operation kinds and the single table mapping each kind to its wire tokens
// ABOUTME: Operations are built through validating constructors and never change afterwards

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum OperationError {
    #[error("{0} is required")]
    MissingField(&'static str),
}

/// The six operations an external signer understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    GetPublicKey,
    SignEvent,
    Nip04Encrypt,
    Nip04Decrypt,
    Nip44Encrypt,
    Nip44Decrypt,
}

/// Wire names for one operation kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindTokens {
    /// Suffix of the content provider authority used by the silent channel
    pub silent_subpath: &'static str,
    /// Value of the `type` extra on interactive invocations
    pub interactive_token: &'static str,
    /// Name of the host method that issues this operation
    pub method: &'static str,
}

impl OperationKind {
    pub const ALL: [OperationKind; 6] = [
        OperationKind::GetPublicKey,
        OperationKind::SignEvent,
        OperationKind::Nip04Encrypt,
        OperationKind::Nip04Decrypt,
        OperationKind::Nip44Encrypt,
        OperationKind::Nip44Decrypt,
    ];

    pub const fn tokens(self) -> KindTokens {
        let (silent_subpath, interactive_token, method) = match self {
            OperationKind::GetPublicKey => ("GET_PUBLIC_KEY", "get_public_key", "getPublicKey"),
            OperationKind::SignEvent => ("SIGN_EVENT", "sign_event", "signEvent"),
            OperationKind::Nip04Encrypt => ("NIP04_ENCRYPT", "nip04_encrypt", "nip04Encrypt"),
            OperationKind::Nip04Decrypt => ("NIP04_DECRYPT", "nip04_decrypt", "nip04Decrypt"),
            OperationKind::Nip44Encrypt => ("NIP44_ENCRYPT", "nip44_encrypt", "nip44Encrypt"),
            OperationKind::Nip44Decrypt => ("NIP44_DECRYPT", "nip44_decrypt", "nip44Decrypt"),
        };
        KindTokens {
            silent_subpath,
            interactive_token,
            method,
        }
    }

    pub fn silent_subpath(self) -> &'static str {
        self.tokens().silent_subpath
    }

    pub fn interactive_token(self) -> &'static str {
        self.tokens().interactive_token
    }

    pub fn method(self) -> &'static str {
        self.tokens().method
    }

    pub fn from_method(method: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.method() == method)
    }

    pub fn from_interactive_token(token: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.interactive_token() == token)
    }

    /// Encrypt and decrypt kinds address a counterparty key
    pub fn needs_counterparty(self) -> bool {
        matches!(
            self,
            OperationKind::Nip04Encrypt
                | OperationKind::Nip04Decrypt
                | OperationKind::Nip44Encrypt
                | OperationKind::Nip44Decrypt
        )
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.interactive_token())
    }
}

/// One logical request issued by the host application
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    kind: OperationKind,
    /// Event JSON, plaintext or ciphertext. `login` for public key requests
    payload: String,
    counterparty_key: Option<String>,
    acting_user: Option<String>,
    /// Caller supplied, may be empty
    correlation_id: String,
    permissions: Option<String>,
}

impl Operation {
    pub const LOGIN_PAYLOAD: &'static str = "login";

    pub fn get_public_key(permissions: Option<String>) -> Self {
        Self {
            kind: OperationKind::GetPublicKey,
            payload: Self::LOGIN_PAYLOAD.to_string(),
            counterparty_key: None,
            acting_user: None,
            correlation_id: String::new(),
            permissions: non_empty(permissions),
        }
    }

    pub fn sign_event(
        event_json: impl Into<String>,
        correlation_id: impl Into<String>,
        acting_user: Option<String>,
    ) -> Result<Self, OperationError> {
        let payload = event_json.into();
        if payload.is_empty() {
            return Err(OperationError::MissingField("eventJson"));
        }
        Ok(Self {
            kind: OperationKind::SignEvent,
            payload,
            counterparty_key: None,
            acting_user: non_empty(acting_user),
            correlation_id: correlation_id.into(),
            permissions: None,
        })
    }

    /// Builds one of the four encrypt/decrypt operations
    pub fn crypto(
        kind: OperationKind,
        content: impl Into<String>,
        counterparty_key: impl Into<String>,
        acting_user: Option<String>,
        correlation_id: impl Into<String>,
    ) -> Result<Self, OperationError> {
        if !kind.needs_counterparty() {
            return Err(OperationError::MissingField("encrypt or decrypt kind"));
        }
        let counterparty_key = counterparty_key.into();
        if counterparty_key.is_empty() {
            return Err(OperationError::MissingField("pubkey"));
        }
        Ok(Self {
            kind,
            payload: content.into(),
            counterparty_key: Some(counterparty_key),
            acting_user: non_empty(acting_user),
            correlation_id: correlation_id.into(),
            permissions: None,
        })
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    pub fn counterparty_key(&self) -> Option<&str> {
        self.counterparty_key.as_deref()
    }

    pub fn acting_user(&self) -> Option<&str> {
        self.acting_user.as_deref()
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    pub fn permissions(&self) -> Option<&str> {
        self.permissions.as_deref()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
