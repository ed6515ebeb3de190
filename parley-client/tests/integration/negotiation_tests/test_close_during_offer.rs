use parley_client::SdpKind;
use parley_core::SignalKind;

use crate::integration::init_tracing;
use crate::utils::{MockCall, ScriptedPeer, WAIT_TIMEOUT_MS, settle, test_config, wait_until};

#[tokio::test]
async fn test_end_call_while_offer_outstanding_never_sends_offer() {
    init_tracing();

    let peer = ScriptedPeer::start(test_config("A"));
    let gate = peer.factory.gate_offers();
    peer.join("A").await.unwrap();

    peer.peer_joined("B").await.unwrap();
    assert!(
        wait_until(WAIT_TIMEOUT_MS, || {
            peer.factory.count("B", &MockCall::CreateOffer) == 1
        })
        .await
    );

    assert!(peer.handle.end_call("B").await.unwrap());
    gate.notify_one();
    settle().await;

    assert_eq!(peer.sink.count(SignalKind::Offer), 0);
    assert!(peer.session("B").is_none());
    assert!(
        wait_until(WAIT_TIMEOUT_MS, || peer
            .factory
            .calls("B")
            .contains(&MockCall::Close))
        .await
    );
    assert!(
        !peer
            .factory
            .calls("B")
            .iter()
            .any(|c| matches!(c, MockCall::SetLocal(SdpKind::Offer, _)))
    );

    peer.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_end_call_is_idempotent() {
    init_tracing();

    let peer = ScriptedPeer::start(test_config("A"));
    peer.join("A").await.unwrap();
    peer.peer_joined("B").await.unwrap();
    assert!(peer.wait_for_sent(SignalKind::Offer, 1).await);

    assert!(peer.handle.end_call("B").await.unwrap());
    assert!(!peer.handle.end_call("B").await.unwrap());
    assert!(!peer.handle.end_call("nobody").await.unwrap());

    peer.shutdown().await.unwrap();
}
