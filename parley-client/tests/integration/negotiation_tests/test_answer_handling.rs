use parley_client::{LocalDescriptionState, RemoteDescriptionState, Role, SdpKind};
use parley_core::SignalKind;

use crate::integration::init_tracing;
use crate::utils::{MockCall, ScriptedPeer, settle, test_config};

#[tokio::test]
async fn test_duplicate_answer_changes_nothing() {
    init_tracing();

    let peer = ScriptedPeer::start(test_config("A"));
    peer.join("A").await.unwrap();
    peer.peer_joined("B").await.unwrap();
    assert!(peer.wait_for_sent(SignalKind::Offer, 1).await);

    peer.answer_from("B", "A", "v=0 answer").await.unwrap();
    assert!(
        peer.wait_for_session("B", |s| s.remote_description == RemoteDescriptionState::Set)
            .await
    );
    let before = peer.session("B").unwrap();

    peer.answer_from("B", "A", "v=0 answer").await.unwrap();
    settle().await;

    assert_eq!(peer.session("B").unwrap(), before);
    assert_eq!(
        peer.factory.count(
            "B",
            &MockCall::SetRemote(SdpKind::Answer, "v=0 answer".into())
        ),
        1
    );

    // The router keeps working afterwards.
    peer.peer_joined("C").await.unwrap();
    assert!(peer.wait_for_sent(SignalKind::Offer, 2).await);

    peer.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_answer_to_callee_session_is_rejected() {
    init_tracing();

    let peer = ScriptedPeer::start(test_config("A"));
    peer.join("A").await.unwrap();
    peer.offer_from("B", "A", "v=0 offer").await.unwrap();
    assert!(peer.wait_for_sent(SignalKind::Answer, 1).await);
    assert!(
        peer.wait_for_session("B", |s| s.local_description == LocalDescriptionState::AnswerSent)
            .await
    );
    let before = peer.session("B").unwrap();

    peer.answer_from("B", "A", "v=0 stray answer").await.unwrap();
    settle().await;

    let after = peer.session("B").unwrap();
    assert_eq!(after, before);
    assert_eq!(after.role, Role::Callee);

    peer.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_answer_without_session_is_dropped() {
    init_tracing();

    let peer = ScriptedPeer::start(test_config("A"));
    peer.join("A").await.unwrap();

    peer.answer_from("Z", "A", "v=0 answer").await.unwrap();
    settle().await;

    assert!(peer.handle.sessions().is_empty());
    assert_eq!(peer.factory.created_count(), 0);

    peer.shutdown().await.unwrap();
}
