// ABOUTME: Negotiation engine deciding per operation between the silent and interactive channels
// ABOUTME: Owns the single pending interactive slot and correlates asynchronous completions to it

use crate::channel::interactive::reply_correlation_id;
use crate::channel::{InteractiveChannel, SilentChannel};
use crate::config::BridgeConfig;
use crate::directory::SignerDirectory;
use crate::error::BridgeError;
use crate::platform::{Activity, ActivityResult, ContentResolver};
use crate::types::{ChannelOutcome, Operation, OperationKind, SignerIdentity, SignerResponse};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::oneshot;
use uuid::Uuid;

pub type Resolution = Result<SignerResponse, BridgeError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    SilentAttemptInFlight,
    InteractiveDispatched,
}

/// The one operation currently waiting for the user
#[derive(Debug)]
pub struct PendingInteractiveRequest {
    pub dispatch_id: Uuid,
    pub kind: OperationKind,
    /// Captured at dispatch time, may be empty
    pub correlation_id: String,
    pub dispatched_at: DateTime<Utc>,
    responder: oneshot::Sender<Resolution>,
}

/// Handle on an operation dispatched to the interactive channel
#[derive(Debug)]
pub struct PendingReply {
    dispatch_id: Uuid,
    kind: OperationKind,
    receiver: oneshot::Receiver<Resolution>,
}

impl PendingReply {
    pub fn dispatch_id(&self) -> Uuid {
        self.dispatch_id
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    /// Resolves with `Abandoned` if the engine was torn down first
    pub async fn wait(self) -> Resolution {
        self.receiver
            .await
            .unwrap_or_else(|_| Err(BridgeError::Abandoned))
    }
}

#[derive(Debug)]
pub enum Submission {
    Resolved(Resolution),
    Pending(PendingReply),
}

impl Submission {
    pub async fn into_resolution(self) -> Resolution {
        match self {
            Submission::Resolved(resolution) => resolution,
            Submission::Pending(reply) => reply.wait().await,
        }
    }
}

pub struct NegotiationEngine {
    directory: SignerDirectory,
    silent: SilentChannel,
    interactive: InteractiveChannel,
    unaddressed_fallback: bool,
    silent_in_flight: AtomicUsize,
    pending: Mutex<Option<PendingInteractiveRequest>>,
    detached: AtomicBool,
}

struct SilentAttempt<'a>(&'a AtomicUsize);

impl<'a> SilentAttempt<'a> {
    fn start(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for SilentAttempt<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl NegotiationEngine {
    pub fn new(config: &BridgeConfig, directory: SignerDirectory, resolver: Arc<dyn ContentResolver>) -> Self {
        Self {
            directory,
            silent: SilentChannel::new(resolver, config.silent_timeout()),
            interactive: InteractiveChannel::new(config.scheme.clone(), config.request_code),
            unaddressed_fallback: config.unaddressed_fallback,
            silent_in_flight: AtomicUsize::new(0),
            pending: Mutex::new(None),
            detached: AtomicBool::new(false),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<PendingInteractiveRequest>> {
        self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn state(&self) -> EngineState {
        if self.slot().is_some() {
            EngineState::InteractiveDispatched
        } else if self.silent_in_flight.load(Ordering::SeqCst) > 0 {
            EngineState::SilentAttemptInFlight
        } else {
            EngineState::Idle
        }
    }

    pub fn pending_correlation_id(&self) -> Option<String> {
        self.slot().as_ref().map(|p| p.correlation_id.clone())
    }

    pub async fn signer_identity(&self) -> Option<SignerIdentity> {
        self.directory.get().await
    }

    pub async fn set_signer_identity(&self, name: &str) -> Result<(), BridgeError> {
        let identity = SignerIdentity::new(name)
            .ok_or_else(|| BridgeError::InvalidArgument("packageName is required".into()))?;
        self.directory
            .set(&identity)
            .await
            .map_err(|e| BridgeError::Storage(e.to_string()))
    }

    /// Submits and waits for the resolution
    pub async fn execute(&self, activity: Option<&dyn Activity>, operation: Operation) -> Resolution {
        self.submit(activity, operation).await.into_resolution().await
    }

    /// Silent first when a signer is recorded, interactive on Unavailable,
    /// Rejected resolves immediately
    pub async fn submit(&self, activity: Option<&dyn Activity>, operation: Operation) -> Submission {
        if self.is_detached() {
            tracing::warn!(target: "nip55_core::negotiation", "Refusing {} after teardown", operation.kind());
            return Submission::Resolved(Err(BridgeError::Detached));
        }

        let signer = self.directory.get().await;

        if let Some(signer) = &signer {
            let outcome = {
                let _attempt = SilentAttempt::start(&self.silent_in_flight);
                self.silent.try_silent(&operation, signer).await
            };
            match outcome {
                ChannelOutcome::Success { result, event, signer } => {
                    tracing::debug!(
                        target: "nip55_core::negotiation",
                        "{} resolved silently for request {:?}",
                        operation.kind(),
                        operation.correlation_id()
                    );
                    return Submission::Resolved(Ok(SignerResponse {
                        kind: operation.kind(),
                        result,
                        package: signer.map(SignerIdentity::into_inner),
                        event,
                        id: Some(operation.correlation_id().to_string()),
                    }));
                }
                ChannelOutcome::Rejected => {
                    tracing::info!(
                        target: "nip55_core::negotiation",
                        "{} rejected by signer {}, not falling back",
                        operation.kind(),
                        signer
                    );
                    return Submission::Resolved(Err(BridgeError::UserRejected));
                }
                ChannelOutcome::Unavailable | ChannelOutcome::TransportError(_) => {}
            }
        } else if operation.kind() != OperationKind::GetPublicKey && !self.unaddressed_fallback {
            return Submission::Resolved(Err(BridgeError::signer_not_set()));
        }

        self.dispatch(activity, operation, signer.as_ref())
    }

    fn dispatch(
        &self,
        activity: Option<&dyn Activity>,
        operation: Operation,
        signer: Option<&SignerIdentity>,
    ) -> Submission {
        let Some(activity) = activity else {
            tracing::warn!(target: "nip55_core::negotiation", "No activity to present {}", operation.kind());
            return Submission::Resolved(Err(BridgeError::NoActivity));
        };

        let intent = self.interactive.build_invocation(&operation, signer);
        let (responder, receiver) = oneshot::channel();
        let dispatch_id = Uuid::new_v4();

        {
            let mut slot = self.slot();
            if self.is_detached() {
                return Submission::Resolved(Err(BridgeError::Detached));
            }
            if let Some(existing) = slot.as_ref() {
                tracing::warn!(
                    target: "nip55_core::negotiation",
                    "Refusing {} while {} ({}) waits for the user",
                    operation.kind(),
                    existing.kind,
                    existing.dispatch_id
                );
                return Submission::Resolved(Err(BridgeError::RequestInFlight));
            }
            *slot = Some(PendingInteractiveRequest {
                dispatch_id,
                kind: operation.kind(),
                correlation_id: operation.correlation_id().to_string(),
                dispatched_at: Utc::now(),
                responder,
            });
        }

        // The lock is released before launching: a platform may deliver the completion synchronously
        if let Err(e) = self.interactive.launch(activity, intent) {
            let mut slot = self.slot();
            if slot.as_ref().map(|p| p.dispatch_id) == Some(dispatch_id) {
                *slot = None;
            }
            tracing::error!(target: "nip55_core::negotiation", "Failed to launch signer for {}: {}", operation.kind(), e);
            return Submission::Resolved(Err(e));
        }

        tracing::info!(
            target: "nip55_core::negotiation",
            "Dispatched {} interactively ({}) to {}",
            operation.kind(),
            dispatch_id,
            signer.map(SignerIdentity::as_str).unwrap_or("chooser")
        );

        Submission::Pending(PendingReply {
            dispatch_id,
            kind: operation.kind(),
            receiver,
        })
    }

    /// Returns false when the completion belongs to another request code.
    /// Late and orphaned completions are consumed and dropped. A completion
    /// naming another request fails the pending one with `CorrelationMismatch`.
    pub async fn on_activity_result(&self, completion: ActivityResult) -> bool {
        if !self.interactive.owns(&completion) {
            return false;
        }

        let Some(pending) = self.slot().take() else {
            tracing::debug!(target: "nip55_core::negotiation", "Discarding completion with no pending request");
            return true;
        };

        let mismatch = reply_correlation_id(&completion)
            .filter(|reply_id| !pending.correlation_id.is_empty() && pending.correlation_id != *reply_id);

        let resolution = if let Some(reply_id) = mismatch {
            tracing::warn!(
                target: "nip55_core::negotiation",
                "Completion for request {:?} arrived while {:?} was waiting",
                reply_id,
                pending.correlation_id
            );
            Err(BridgeError::CorrelationMismatch {
                pending: pending.correlation_id.clone(),
                reply: reply_id.to_string(),
            })
        } else {
            self.complete(&pending, &completion).await
        };

        let elapsed = Utc::now() - pending.dispatched_at;
        match &resolution {
            Ok(_) => tracing::info!(
                target: "nip55_core::negotiation",
                "{} ({}) completed after {}ms",
                pending.kind,
                pending.dispatch_id,
                elapsed.num_milliseconds()
            ),
            Err(e) => tracing::info!(
                target: "nip55_core::negotiation",
                "{} ({}) failed after {}ms: {}",
                pending.kind,
                pending.dispatch_id,
                elapsed.num_milliseconds(),
                e.code()
            ),
        }

        if pending.responder.send(resolution).is_err() {
            tracing::debug!(target: "nip55_core::negotiation", "Caller stopped waiting for {}", pending.dispatch_id);
        }
        true
    }

    async fn complete(&self, pending: &PendingInteractiveRequest, completion: &ActivityResult) -> Resolution {
        let reply = self.interactive.parse_completion(completion)?;
        if let Some(identity) = reply.package.as_deref().and_then(SignerIdentity::new) {
            if let Err(e) = self.directory.set(&identity).await {
                tracing::warn!(target: "nip55_core::negotiation", "Failed to record signer {}: {}", identity, e);
            }
        }
        Ok(SignerResponse {
            kind: pending.kind,
            result: reply.result,
            package: reply.package,
            event: reply.event,
            id: reply.id.or_else(|| Some(pending.correlation_id.clone())),
        })
    }

    /// Abandons the pending request without detaching, its waiter sees `Abandoned`.
    /// A completion the signer still delivers for it is matched against the next dispatch.
    pub fn abandon_pending(&self) {
        if let Some(pending) = self.slot().take() {
            tracing::info!(
                target: "nip55_core::negotiation",
                "Abandoning pending {} ({})",
                pending.kind,
                pending.dispatch_id
            );
        }
    }

    /// Abandons the pending request and detaches for good: later
    /// submissions fail with `Detached`, late completions are dropped
    pub fn teardown(&self) {
        self.detached.store(true, Ordering::SeqCst);
        self.abandon_pending();
    }

    pub fn is_detached(&self) -> bool {
        self.detached.load(Ordering::SeqCst)
    }
}
