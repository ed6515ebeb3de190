use parley_client::{GlarePolicy, Role};
use parley_core::{SignalKind, SignalMessage};

use crate::integration::init_tracing;
use crate::utils::{ScriptedPeer, settle, test_config};

#[tokio::test]
async fn test_report_policy_drops_conflicting_offer() {
    init_tracing();

    let peer = ScriptedPeer::start(test_config("A"));
    peer.join("A").await.unwrap();
    peer.handle.call("B").await.unwrap();
    assert!(peer.wait_for_sent(SignalKind::Offer, 1).await);

    peer.offer_from("B", "A", "v=0 crossing offer").await.unwrap();
    settle().await;

    assert_eq!(peer.sink.count(SignalKind::Answer), 0);
    assert_eq!(peer.session("B").unwrap().role, Role::Caller);

    peer.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_tie_break_smaller_id_keeps_caller_role() {
    init_tracing();

    let mut config = test_config("A");
    config.glare_policy = GlarePolicy::PeerIdTieBreak;
    let peer = ScriptedPeer::start(config);
    peer.join("A").await.unwrap();
    peer.handle.call("B").await.unwrap();
    assert!(peer.wait_for_sent(SignalKind::Offer, 1).await);
    let generation = peer.session("B").unwrap().generation;

    peer.offer_from("B", "A", "v=0 crossing offer").await.unwrap();
    settle().await;

    let session = peer.session("B").unwrap();
    assert_eq!(session.role, Role::Caller);
    assert_eq!(session.generation, generation);
    assert_eq!(peer.sink.count(SignalKind::Answer), 0);

    peer.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_tie_break_larger_id_yields_and_answers() {
    init_tracing();

    let mut config = test_config("M");
    config.glare_policy = GlarePolicy::PeerIdTieBreak;
    let peer = ScriptedPeer::start(config);
    peer.join("M").await.unwrap();
    peer.handle.call("A").await.unwrap();
    assert!(peer.wait_for_sent(SignalKind::Offer, 1).await);
    let generation = peer.session("A").unwrap().generation;

    peer.offer_from("A", "M", "v=0 crossing offer").await.unwrap();
    assert!(peer.wait_for_sent(SignalKind::Answer, 1).await);

    let session = peer.session("A").unwrap();
    assert_eq!(session.role, Role::Callee);
    assert!(session.generation > generation);
    match peer.sink.of_kind(SignalKind::Answer).remove(0) {
        SignalMessage::Answer { to, .. } => assert_eq!(to.as_str(), "A"),
        other => panic!("unexpected message {other:?}"),
    }

    peer.shutdown().await.unwrap();
}
