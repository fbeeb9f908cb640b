// ABOUTME: NostrSigner adapter tests against the simulated signer app
// ABOUTME: Signs and encrypts through nostr's own signer trait, silently and through the signer UI

use nip55_core::directory::memory_store::MemoryStore;
use nip55_core::directory::SignerDirectory;
use nip55_core::platform::Activity;
use nip55_core::sim::SimulatedSigner;
use nip55_core::{BridgeConfig, EngineState, ExternalSigner, NegotiationEngine};
use nostr::nips::{nip04, nip44};
use nostr::signer::SignerBackend;
use nostr::{EventBuilder, Keys, NostrSigner};
use std::sync::Arc;

const PACKAGE: &str = "com.example.signer";

struct Device {
    engine: Arc<NegotiationEngine>,
    signer: Arc<SimulatedSigner>,
}

impl Device {
    fn new() -> Self {
        let config = BridgeConfig::default();
        let signer = Arc::new(SimulatedSigner::generate(PACKAGE, &config.scheme));
        let directory = SignerDirectory::new(Arc::new(MemoryStore::new()), &config.prefs_namespace, &config.package_key);
        let engine = Arc::new(NegotiationEngine::new(&config, directory, signer.clone()));
        Self { engine, signer }
    }

    fn activity(&self) -> Option<Arc<dyn Activity>> {
        Some(self.signer.clone())
    }

    /// Adapter for a user who already picked this signer
    async fn logged_in(&self) -> ExternalSigner {
        self.engine.set_signer_identity(PACKAGE).await.unwrap();
        ExternalSigner::new(self.engine.clone(), self.activity(), self.signer.public_key())
    }

    /// Waits for the engine to show the signer UI, then lets the user answer
    async fn answer(&self, approve: bool) {
        while self.engine.state() != EngineState::InteractiveDispatched {
            tokio::task::yield_now().await;
        }
        let completion = self.signer.answer_next(approve).await.unwrap();
        assert!(self.engine.on_activity_result(completion).await);
    }
}

#[tokio::test]
async fn test_login_asks_the_signer_for_its_key() {
    let device = Device::new();
    let engine = device.engine.clone();
    let activity = device.activity();

    let login = tokio::spawn(async move { ExternalSigner::login(engine, activity).await });
    device.answer(true).await;
    let external = login.await.unwrap().unwrap();

    assert_eq!(external.get_public_key().await.unwrap(), device.signer.public_key());
    assert_eq!(device.engine.signer_identity().await.unwrap().as_str(), PACKAGE);
    assert!(matches!(external.backend(), SignerBackend::Custom(_)));
}

#[tokio::test]
async fn test_remembered_signer_signs_silently() {
    let device = Device::new();
    device.signer.set_remember(true);
    let external = device.logged_in().await;

    let unsigned = EventBuilder::text_note("gm").build(device.signer.public_key());
    let event = unsigned.sign(&external).await.unwrap();

    event.verify().unwrap();
    assert_eq!(event.pubkey, device.signer.public_key());
    assert_eq!(event.content, "gm");
    assert_eq!(device.signer.queued(), 0);
}

#[tokio::test]
async fn test_interactive_signing_through_the_trait() {
    let device = Device::new();
    let external = Arc::new(device.logged_in().await);
    let unsigned = EventBuilder::text_note("shown to the user").build(device.signer.public_key());

    let signing = {
        let external = external.clone();
        tokio::spawn(async move { external.sign_event(unsigned).await })
    };
    device.answer(true).await;

    let event = signing.await.unwrap().unwrap();
    event.verify().unwrap();
    assert_eq!(event.content, "shown to the user");
    assert_eq!(device.engine.state(), EngineState::Idle);
}

#[tokio::test]
async fn test_declined_signing_is_a_signer_error() {
    let device = Device::new();
    let external = Arc::new(device.logged_in().await);
    let unsigned = EventBuilder::text_note("no").build(device.signer.public_key());

    let signing = {
        let external = external.clone();
        tokio::spawn(async move { external.sign_event(unsigned).await })
    };
    device.answer(false).await;

    let err = signing.await.unwrap().unwrap_err();
    assert!(err.to_string().contains("User rejected"), "{}", err);
}

#[tokio::test]
async fn test_encryption_round_trips_with_a_peer() {
    let device = Device::new();
    device.signer.set_remember(true);
    let external = device.logged_in().await;
    let peer = Keys::generate();
    let me = device.signer.public_key();

    let cipher = external.nip44_encrypt(&peer.public_key(), "over nip44").await.unwrap();
    assert_eq!(nip44::decrypt(peer.secret_key(), &me, &cipher).unwrap(), "over nip44");

    let incoming = nip04::encrypt(peer.secret_key(), &me, "over nip04").unwrap();
    assert_eq!(external.nip04_decrypt(&peer.public_key(), &incoming).await.unwrap(), "over nip04");

    let incoming = nip44::encrypt(peer.secret_key(), &me, "back", nip44::Version::V2).unwrap();
    assert_eq!(external.nip44_decrypt(&peer.public_key(), &incoming).await.unwrap(), "back");
}

#[tokio::test]
async fn test_detached_engine_fails_the_adapter() {
    let device = Device::new();
    device.signer.set_remember(true);
    let external = device.logged_in().await;
    device.engine.teardown();

    let err = external
        .nip04_encrypt(&Keys::generate().public_key(), "late")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("detached"), "{}", err);
}
