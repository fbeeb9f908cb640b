// ABOUTME: Simulated device pieces: scripted platform fakes and a working in-process signer app
// ABOUTME: SimulatedSigner signs and encrypts with nostr keys so the bridge can run without a phone

use crate::channel::interactive::{
    EXTRA_EVENT, EXTRA_ID, EXTRA_PACKAGE, EXTRA_PUBKEY, EXTRA_RESULT, EXTRA_TYPE,
};
use crate::channel::silent::{EVENT_COLUMN, REJECTED_COLUMN, RESULT_COLUMN};
use crate::platform::{
    Activity, ActivityResult, ContentResolver, Cursor, Intent, PackageQuery, PlatformError, ResultCode,
};
use crate::types::OperationKind;
use async_trait::async_trait;
use nostr::nips::{nip04, nip44};
use nostr::{EventBuilder, JsonUtil, Keys, PublicKey, UnsignedEvent};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// What the scripted resolver answers
#[derive(Debug, Clone)]
pub enum SilentScript {
    Reply(Option<Cursor>),
    Fail(PlatformError),
    /// Never answers, for timeout tests
    Hang,
}

/// Content resolver returning a scripted answer and recording every query
#[derive(Debug)]
pub struct ScriptedResolver {
    script: Mutex<SilentScript>,
    queries: Mutex<Vec<(String, Vec<String>)>>,
}

impl ScriptedResolver {
    pub fn new(script: SilentScript) -> Self {
        Self {
            script: Mutex::new(script),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn set(&self, script: SilentScript) {
        *locked(&self.script) = script;
    }

    pub fn queries(&self) -> Vec<(String, Vec<String>)> {
        locked(&self.queries).clone()
    }

    pub fn rejected() -> SilentScript {
        SilentScript::Reply(Some(Cursor::new(vec![REJECTED_COLUMN.to_string()])))
    }

    pub fn success(result: &str, event: Option<&str>) -> SilentScript {
        SilentScript::Reply(Some(Cursor::single_row([
            (RESULT_COLUMN, Some(result.to_string())),
            (EVENT_COLUMN, event.map(str::to_string)),
        ])))
    }
}

#[async_trait]
impl ContentResolver for ScriptedResolver {
    async fn query(&self, uri: &str, projection: &[String]) -> Result<Option<Cursor>, PlatformError> {
        locked(&self.queries).push((uri.to_string(), projection.to_vec()));
        let script = locked(&self.script).clone();
        match script {
            SilentScript::Reply(cursor) => Ok(cursor),
            SilentScript::Fail(e) => Err(e),
            SilentScript::Hang => std::future::pending().await,
        }
    }
}

/// Presentation context that records launches instead of showing anything
#[derive(Debug, Default)]
pub struct RecordingActivity {
    launches: Mutex<Vec<(Intent, i32)>>,
    failure: Mutex<Option<PlatformError>>,
}

impl RecordingActivity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(error: PlatformError) -> Self {
        Self {
            launches: Mutex::new(Vec::new()),
            failure: Mutex::new(Some(error)),
        }
    }

    pub fn launches(&self) -> Vec<(Intent, i32)> {
        locked(&self.launches).clone()
    }

    pub fn launch_count(&self) -> usize {
        locked(&self.launches).len()
    }
}

impl Activity for RecordingActivity {
    fn start_activity_for_result(&self, intent: Intent, request_code: i32) -> Result<(), PlatformError> {
        if let Some(error) = locked(&self.failure).clone() {
            return Err(error);
        }
        locked(&self.launches).push((intent, request_code));
        Ok(())
    }
}

/// Package query with a fixed answer
#[derive(Debug, Clone)]
pub struct StaticPackages(pub Result<Vec<String>, PlatformError>);

impl PackageQuery for StaticPackages {
    fn query_intent_activities(&self, _intent: &Intent) -> Result<Vec<String>, PlatformError> {
        self.0.clone()
    }
}

/// Builds the reply intent a signer app sends back
pub fn reply(request_code: i32, extras: &[(&str, &str)]) -> ActivityResult {
    ActivityResult {
        request_code,
        result_code: ResultCode::Ok,
        data: Some(Intent::with_extras(extras.iter().copied())),
    }
}

pub fn cancelled(request_code: i32) -> ActivityResult {
    ActivityResult {
        request_code,
        result_code: ResultCode::Canceled,
        data: None,
    }
}

/// A signer app living in the same process. Silent queries are answered only
/// while `remember` is on, interactive invocations queue until answered.
pub struct SimulatedSigner {
    keys: Keys,
    package: String,
    scheme: String,
    remember: AtomicBool,
    reject_silent: AtomicBool,
    invocations: Mutex<VecDeque<(Intent, i32)>>,
}

impl SimulatedSigner {
    pub fn new(keys: Keys, package: impl Into<String>, scheme: impl Into<String>) -> Self {
        Self {
            keys,
            package: package.into(),
            scheme: scheme.into(),
            remember: AtomicBool::new(false),
            reject_silent: AtomicBool::new(false),
            invocations: Mutex::new(VecDeque::new()),
        }
    }

    pub fn generate(package: impl Into<String>, scheme: impl Into<String>) -> Self {
        Self::new(Keys::generate(), package, scheme)
    }

    pub fn public_key(&self) -> PublicKey {
        self.keys.public_key()
    }

    pub fn package(&self) -> &str {
        &self.package
    }

    /// The user ticked "remember my choice"
    pub fn set_remember(&self, remember: bool) {
        self.remember.store(remember, Ordering::SeqCst);
    }

    /// Answer silent queries with the `rejected` column
    pub fn set_reject_silent(&self, reject: bool) {
        self.reject_silent.store(reject, Ordering::SeqCst);
    }

    pub fn queued(&self) -> usize {
        locked(&self.invocations).len()
    }

    /// Lets the simulated user answer the oldest invocation
    pub async fn answer_next(&self, approve: bool) -> Option<ActivityResult> {
        let (intent, request_code) = locked(&self.invocations).pop_front()?;
        if !approve {
            return Some(cancelled(request_code));
        }

        let Some(kind) = intent.extra(EXTRA_TYPE).and_then(OperationKind::from_interactive_token) else {
            return Some(cancelled(request_code));
        };
        let prefix = format!("{}:", self.scheme);
        let content = intent
            .data
            .as_deref()
            .and_then(|data| data.strip_prefix(&prefix))
            .unwrap_or_default();

        let mut data = Intent::default();
        match self.perform(kind, content, intent.extra(EXTRA_PUBKEY)).await {
            Ok((result, event)) => {
                data.put_extra(EXTRA_RESULT, result);
                if let Some(event) = event {
                    data.put_extra(EXTRA_EVENT, event);
                }
            }
            Err(e) => {
                tracing::debug!(target: "nip55_core::sim", "Simulated signer failed {}: {}", kind, e);
            }
        }
        if kind == OperationKind::GetPublicKey {
            data.put_extra(EXTRA_PACKAGE, self.package.clone());
        }
        if let Some(id) = intent.extra(EXTRA_ID) {
            data.put_extra(EXTRA_ID, id);
        }

        Some(ActivityResult {
            request_code,
            result_code: ResultCode::Ok,
            data: Some(data),
        })
    }

    /// Returns `(result, signed event json)`
    async fn perform(
        &self,
        kind: OperationKind,
        content: &str,
        counterparty: Option<&str>,
    ) -> Result<(String, Option<String>), String> {
        let peer = || -> Result<PublicKey, String> {
            let key = counterparty.ok_or("pubkey is required")?;
            PublicKey::parse(key).map_err(|e| e.to_string())
        };
        let secret_key = self.keys.secret_key();

        match kind {
            OperationKind::GetPublicKey => Ok((self.keys.public_key().to_hex(), None)),
            OperationKind::SignEvent => {
                let unsigned = UnsignedEvent::from_json(content).map_err(|e| e.to_string())?;
                let signed = EventBuilder::new(unsigned.kind, unsigned.content.clone())
                    .tags(unsigned.tags.clone())
                    .sign(&self.keys)
                    .await
                    .map_err(|e| e.to_string())?;
                Ok((signed.sig.to_string(), Some(signed.as_json())))
            }
            OperationKind::Nip04Encrypt => nip04::encrypt(secret_key, &peer()?, content)
                .map(|r| (r, None))
                .map_err(|e| e.to_string()),
            OperationKind::Nip04Decrypt => nip04::decrypt(secret_key, &peer()?, content)
                .map(|r| (r, None))
                .map_err(|e| e.to_string()),
            OperationKind::Nip44Encrypt => {
                nip44::encrypt(secret_key, &peer()?, content, nip44::Version::V2)
                    .map(|r| (r, None))
                    .map_err(|e| e.to_string())
            }
            OperationKind::Nip44Decrypt => nip44::decrypt(secret_key, &peer()?, content)
                .map(|r| (r, None))
                .map_err(|e| e.to_string()),
        }
    }

    fn silent_kind(&self, uri: &str) -> Option<OperationKind> {
        let authority = uri.strip_prefix("content://")?;
        let subpath = authority.strip_prefix(&self.package)?.strip_prefix('.')?;
        OperationKind::ALL
            .into_iter()
            .find(|kind| kind.silent_subpath() == subpath)
    }
}

#[async_trait]
impl ContentResolver for SimulatedSigner {
    async fn query(&self, uri: &str, projection: &[String]) -> Result<Option<Cursor>, PlatformError> {
        let kind = self
            .silent_kind(uri)
            .ok_or_else(|| PlatformError::Unavailable(format!("unknown authority {}", uri)))?;
        if self.reject_silent.load(Ordering::SeqCst) {
            return Ok(Some(Cursor::new(vec![REJECTED_COLUMN.to_string()])));
        }
        if !self.remember.load(Ordering::SeqCst) {
            return Ok(None);
        }

        let content = projection.first().map(String::as_str).unwrap_or_default();
        let counterparty = projection.get(1).map(String::as_str).filter(|s| !s.is_empty());
        let (result, event) = self
            .perform(kind, content, counterparty)
            .await
            .map_err(PlatformError::Failed)?;
        Ok(Some(Cursor::single_row([
            (RESULT_COLUMN, Some(result)),
            (EVENT_COLUMN, event),
        ])))
    }
}

impl Activity for SimulatedSigner {
    fn start_activity_for_result(&self, intent: Intent, request_code: i32) -> Result<(), PlatformError> {
        if let Some(package) = intent.package.as_deref() {
            if package != self.package {
                return Err(PlatformError::NoHandler(package.to_string()));
            }
        }
        locked(&self.invocations).push_back((intent, request_code));
        Ok(())
    }
}

impl PackageQuery for SimulatedSigner {
    fn query_intent_activities(&self, intent: &Intent) -> Result<Vec<String>, PlatformError> {
        let scheme = format!("{}:", self.scheme);
        if intent.data.as_deref().is_some_and(|d| d.starts_with(&scheme)) {
            Ok(vec![self.package.clone()])
        } else {
            Ok(Vec::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> SimulatedSigner {
        SimulatedSigner::generate("com.example.signer", "nostrsigner")
    }

    #[tokio::test]
    async fn test_silent_requires_remember() {
        let sim = signer();
        let uri = "content://com.example.signer.GET_PUBLIC_KEY";
        let projection = vec!["login".to_string(), String::new(), String::new()];
        assert_eq!(sim.query(uri, &projection).await.unwrap(), None);

        sim.set_remember(true);
        let cursor = sim.query(uri, &projection).await.unwrap().unwrap();
        assert_eq!(cursor.first_value(RESULT_COLUMN), Some(sim.public_key().to_hex().as_str()));
    }

    #[tokio::test]
    async fn test_unknown_authority_fails() {
        let sim = signer();
        assert!(sim.query("content://com.other.SIGN_EVENT", &[]).await.is_err());
    }

    #[tokio::test]
    async fn test_nip44_round_trip_through_simulated_app() {
        let sim = signer();
        sim.set_remember(true);
        let peer = Keys::generate();
        let encrypt_uri = "content://com.example.signer.NIP44_ENCRYPT";
        let projection = vec!["hello".to_string(), peer.public_key().to_hex(), String::new()];
        let cursor = sim.query(encrypt_uri, &projection).await.unwrap().unwrap();
        let ciphertext = cursor.first_value(RESULT_COLUMN).unwrap().to_string();

        let plaintext = nip44::decrypt(peer.secret_key(), &sim.public_key(), &ciphertext).unwrap();
        assert_eq!(plaintext, "hello");
    }

    #[tokio::test]
    async fn test_interactive_answer_carries_package_and_id() {
        let sim = signer();
        let mut intent = Intent::view("nostrsigner:");
        intent.put_extra(EXTRA_TYPE, "get_public_key");
        intent.put_extra(EXTRA_ID, "abc");
        sim.start_activity_for_result(intent, 1001).unwrap();

        let result = sim.answer_next(true).await.unwrap();
        let data = result.data.unwrap();
        assert_eq!(data.extra(EXTRA_PACKAGE), Some("com.example.signer"));
        assert_eq!(data.extra(EXTRA_ID), Some("abc"));
        assert_eq!(data.extra(EXTRA_RESULT), Some(sim.public_key().to_hex().as_str()));
        assert!(sim.answer_next(true).await.is_none());
    }

    #[test]
    fn test_wrong_package_has_no_handler() {
        let sim = signer();
        let mut intent = Intent::view("nostrsigner:{}");
        intent.package = Some("com.other".into());
        assert!(matches!(
            sim.start_activity_for_result(intent, 1001),
            Err(PlatformError::NoHandler(_))
        ));
    }
}
