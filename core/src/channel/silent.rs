// ABOUTME: Silent channel: background content queries answered without showing the signer UI
// ABOUTME: Works only after the user told the signer to remember consent, every fault degrades to fallback

use crate::platform::{ContentResolver, Cursor};
use crate::types::{ChannelOutcome, Operation, OperationKind, SignerIdentity};
use std::sync::Arc;
use std::time::Duration;

pub const REJECTED_COLUMN: &str = "rejected";
pub const RESULT_COLUMN: &str = "result";
pub const EVENT_COLUMN: &str = "event";

#[derive(Clone)]
pub struct SilentChannel {
    resolver: Arc<dyn ContentResolver>,
    timeout: Duration,
}

impl SilentChannel {
    pub fn new(resolver: Arc<dyn ContentResolver>, timeout: Duration) -> Self {
        Self { resolver, timeout }
    }

    /// `content://<signer>.<SUBPATH>`
    pub fn content_uri(kind: OperationKind, signer: &SignerIdentity) -> String {
        format!("content://{}.{}", signer, kind.silent_subpath())
    }

    /// Positional arguments: content, counterparty key, acting user
    pub fn projection(operation: &Operation) -> Vec<String> {
        vec![
            operation.payload().to_string(),
            operation.counterparty_key().unwrap_or_default().to_string(),
            operation.acting_user().unwrap_or_default().to_string(),
        ]
    }

    pub async fn try_silent(&self, operation: &Operation, signer: &SignerIdentity) -> ChannelOutcome {
        let uri = Self::content_uri(operation.kind(), signer);
        let projection = Self::projection(operation);

        let outcome = match tokio::time::timeout(self.timeout, self.resolver.query(&uri, &projection)).await {
            Err(_) => {
                tracing::debug!(target: "nip55_core::silent", "Query {} timed out after {:?}", uri, self.timeout);
                ChannelOutcome::Unavailable
            }
            Ok(Err(e)) => {
                tracing::debug!(target: "nip55_core::silent", "Content resolver failed for {}, falling back: {}", uri, e);
                ChannelOutcome::TransportError(e.to_string())
            }
            Ok(Ok(None)) => ChannelOutcome::Unavailable,
            Ok(Ok(Some(cursor))) => classify(operation.kind(), signer, &cursor),
        };

        tracing::debug!(
            target: "nip55_core::silent",
            "Silent {} via {} -> {}",
            operation.kind(),
            signer,
            outcome.label()
        );
        outcome
    }
}

/// Maps a reply cursor to an outcome. The `rejected` column wins over any row content.
pub fn classify(kind: OperationKind, signer: &SignerIdentity, cursor: &Cursor) -> ChannelOutcome {
    if cursor.column_index(REJECTED_COLUMN).is_some() {
        return ChannelOutcome::Rejected;
    }
    match cursor.first_value(RESULT_COLUMN) {
        Some(result) => ChannelOutcome::Success {
            result: result.to_string(),
            event: cursor.first_value(EVENT_COLUMN).map(str::to_string),
            signer: (kind == OperationKind::GetPublicKey).then(|| signer.clone()),
        },
        None => ChannelOutcome::Unavailable,
    }
}
