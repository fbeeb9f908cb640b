// ABOUTME: Host-facing method channel: validates arguments, drives the engine and shapes results
// ABOUTME: Also owns the presentation-context lifecycle the host attaches and detaches

use nip55_core::directory::{KeyValueStore, SignerDirectory};
use nip55_core::discovery::DiscoveryProbe;
use nip55_core::negotiation::Resolution;
use nip55_core::platform::{Activity, ActivityResult, ContentResolver, PackageQuery};
use nip55_core::types::{Operation, OperationKind};
use nip55_core::{BridgeConfig, BridgeError, NegotiationEngine, PendingReply, Submission};
use nostr::PublicKey;
use serde_json::{Map, Value};
use std::sync::{Arc, RwLock};

/// One call from the host, arguments keyed by name
#[derive(Debug, Clone, Default)]
pub struct MethodCall {
    pub method: String,
    pub arguments: Map<String, Value>,
}

impl MethodCall {
    /// Non-object arguments are treated as empty
    pub fn new(method: impl Into<String>, arguments: Value) -> Self {
        let arguments = match arguments {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            method: method.into(),
            arguments,
        }
    }

    fn required(&self, name: &str) -> Result<&str, BridgeError> {
        self.arguments
            .get(name)
            .and_then(Value::as_str)
            .ok_or_else(|| BridgeError::InvalidArgument(format!("{} is required", name)))
    }

    fn optional(&self, name: &str) -> Option<String> {
        self.arguments
            .get(name)
            .and_then(Value::as_str)
            .map(str::to_string)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MethodResult {
    Success(Value),
    Error { code: String, message: String },
    NotImplemented,
}

impl From<BridgeError> for MethodResult {
    fn from(e: BridgeError) -> Self {
        MethodResult::Error {
            code: e.code().to_string(),
            message: e.to_string(),
        }
    }
}

impl From<Resolution> for MethodResult {
    fn from(resolution: Resolution) -> Self {
        match resolution {
            Ok(response) => MethodResult::Success(response.to_value()),
            Err(e) => e.into(),
        }
    }
}

/// A result now, or one that arrives once the user answers the signer UI
#[derive(Debug)]
pub enum MethodReply {
    Ready(MethodResult),
    Deferred(PendingReply),
}

impl MethodReply {
    pub fn is_deferred(&self) -> bool {
        matches!(self, MethodReply::Deferred(_))
    }

    pub async fn resolve(self) -> MethodResult {
        match self {
            MethodReply::Ready(result) => result,
            MethodReply::Deferred(reply) => reply.wait().await.into(),
        }
    }
}

impl From<Submission> for MethodReply {
    fn from(submission: Submission) -> Self {
        match submission {
            Submission::Resolved(resolution) => MethodReply::Ready(resolution.into()),
            Submission::Pending(reply) => MethodReply::Deferred(reply),
        }
    }
}

pub struct SignerPlugin {
    channel_name: String,
    engine: Arc<NegotiationEngine>,
    discovery: DiscoveryProbe,
    activity: RwLock<Option<Arc<dyn Activity>>>,
}

impl SignerPlugin {
    pub fn new(config: &BridgeConfig, engine: Arc<NegotiationEngine>, discovery: DiscoveryProbe) -> Self {
        Self {
            channel_name: config.channel_name.clone(),
            engine,
            discovery,
            activity: RwLock::new(None),
        }
    }

    /// Wires the engine, directory and discovery probe from platform pieces
    pub fn build(
        config: &BridgeConfig,
        store: Arc<dyn KeyValueStore>,
        resolver: Arc<dyn ContentResolver>,
        packages: Arc<dyn PackageQuery>,
    ) -> Self {
        let directory = SignerDirectory::new(store, &config.prefs_namespace, &config.package_key);
        let engine = Arc::new(NegotiationEngine::new(config, directory, resolver));
        let discovery = DiscoveryProbe::new(packages, &config.scheme);
        Self::new(config, engine, discovery)
    }

    pub fn channel_name(&self) -> &str {
        &self.channel_name
    }

    pub fn engine(&self) -> &Arc<NegotiationEngine> {
        &self.engine
    }

    pub fn attach_activity(&self, activity: Arc<dyn Activity>) {
        tracing::debug!(target: "nip55_bridge::plugin", "Activity attached to {}", self.channel_name);
        *self.activity.write().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(activity);
    }

    /// Later interactive calls fail with NO_ACTIVITY until another one is attached
    pub fn detach_activity(&self) {
        tracing::debug!(target: "nip55_bridge::plugin", "Activity detached from {}", self.channel_name);
        *self.activity.write().unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
    }

    pub fn detach_from_engine(&self) {
        self.detach_activity();
        self.engine.teardown();
    }

    pub async fn on_activity_result(&self, completion: ActivityResult) -> bool {
        self.engine.on_activity_result(completion).await
    }

    fn current_activity(&self) -> Option<Arc<dyn Activity>> {
        self.activity
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub async fn on_method_call(&self, call: MethodCall) -> MethodReply {
        tracing::debug!(target: "nip55_bridge::plugin", "Method call {}", call.method);

        match call.method.as_str() {
            "isExternalSignerInstalled" => {
                MethodReply::Ready(MethodResult::Success(Value::Bool(self.discovery.is_signer_available())))
            }
            "getSignerPackageName" => {
                let identity = self.engine.signer_identity().await;
                MethodReply::Ready(MethodResult::Success(
                    identity.map_or(Value::Null, |s| Value::String(s.into_inner())),
                ))
            }
            "setSignerPackageName" => MethodReply::Ready(self.set_signer_package_name(&call).await),
            method => match OperationKind::from_method(method) {
                Some(kind) => match operation(kind, &call) {
                    Ok(op) => {
                        let activity = self.current_activity();
                        self.engine.submit(activity.as_deref(), op).await.into()
                    }
                    Err(e) => {
                        tracing::warn!(target: "nip55_bridge::plugin", "Rejected {} arguments: {}", method, e);
                        MethodReply::Ready(e.into())
                    }
                },
                None => {
                    tracing::debug!(target: "nip55_bridge::plugin", "Method {} not implemented", method);
                    MethodReply::Ready(MethodResult::NotImplemented)
                }
            },
        }
    }

    async fn set_signer_package_name(&self, call: &MethodCall) -> MethodResult {
        let package = match call.required("packageName") {
            Ok(package) => package,
            Err(e) => return e.into(),
        };
        match self.engine.set_signer_identity(package).await {
            Ok(()) => MethodResult::Success(Value::Null),
            Err(e) => e.into(),
        }
    }
}

/// Builds the operation for one of the six signer methods, validating arguments first
fn operation(kind: OperationKind, call: &MethodCall) -> Result<Operation, BridgeError> {
    let id = call.optional("id").unwrap_or_default();
    let current_user = call.optional("currentUser");

    match kind {
        OperationKind::GetPublicKey => Ok(Operation::get_public_key(call.optional("permissions"))),
        OperationKind::SignEvent => {
            let event_json = call.required("eventJson")?;
            match serde_json::from_str::<Value>(event_json) {
                Ok(Value::Object(_)) => {}
                _ => {
                    return Err(BridgeError::InvalidArgument(
                        "eventJson must be a JSON object".into(),
                    ))
                }
            }
            Ok(Operation::sign_event(event_json, id, current_user)?)
        }
        OperationKind::Nip04Encrypt
        | OperationKind::Nip04Decrypt
        | OperationKind::Nip44Encrypt
        | OperationKind::Nip44Decrypt => {
            let content_arg = match kind {
                OperationKind::Nip04Encrypt | OperationKind::Nip44Encrypt => "plaintext",
                _ => "encryptedText",
            };
            let content = call.required(content_arg)?;
            let pubkey = counterparty_hex(call.required("pubkey")?)?;
            Ok(Operation::crypto(kind, content, pubkey, current_user, id)?)
        }
    }
}

/// Accepts hex or npub, the signer is always handed hex
fn counterparty_hex(pubkey: &str) -> Result<String, BridgeError> {
    PublicKey::parse(pubkey)
        .map(|key| key.to_hex())
        .map_err(|e| BridgeError::InvalidArgument(format!("pubkey is invalid: {}", e)))
}
