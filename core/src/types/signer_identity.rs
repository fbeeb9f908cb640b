// ABOUTME: Identity of the external signer app the bridge addresses
// ABOUTME: An Android package name in practice, treated as an opaque non-empty string

use serde::{Deserialize, Serialize};

/// The recorded external signer, e.g. `com.greenart7c3.nostrsigner`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignerIdentity(String);

impl SignerIdentity {
    /// Returns `None` for empty or whitespace-only names
    pub fn new(name: impl Into<String>) -> Option<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            None
        } else {
            Some(Self(name))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Display for SignerIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SignerIdentity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
