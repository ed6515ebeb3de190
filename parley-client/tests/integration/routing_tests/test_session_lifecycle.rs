use parley_client::{ConnectionState, NegotiationError, Role, RoomState};
use parley_core::{PeerId, SignalKind, SignalMessage};

use crate::integration::init_tracing;
use crate::utils::{MockCall, ScriptedPeer, WAIT_TIMEOUT_MS, settle, test_config, wait_until};

#[tokio::test]
async fn test_at_most_one_session_per_peer() {
    init_tracing();

    let peer = ScriptedPeer::start(test_config("A"));
    peer.join("A").await.unwrap();

    peer.peer_joined("B").await.unwrap();
    peer.peer_joined("B").await.unwrap();
    peer.handle.call("B").await.unwrap();
    assert!(peer.wait_for_sent(SignalKind::Offer, 1).await);
    settle().await;

    assert_eq!(peer.handle.sessions().len(), 1);
    assert_eq!(peer.factory.created_count(), 1);
    assert_eq!(peer.factory.count("B", &MockCall::CreateOffer), 1);
    assert_eq!(peer.sink.count(SignalKind::Offer), 1);

    peer.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_own_peer_joined_is_ignored() {
    init_tracing();

    let peer = ScriptedPeer::start(test_config("A"));
    peer.join("A").await.unwrap();

    peer.peer_joined("A").await.unwrap();
    settle().await;

    assert!(peer.handle.sessions().is_empty());
    peer.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_peer_left_closes_session() {
    init_tracing();

    let peer = ScriptedPeer::start(test_config("A"));
    peer.join("A").await.unwrap();
    peer.peer_joined("B").await.unwrap();
    assert!(peer.wait_for_sent(SignalKind::Offer, 1).await);

    peer.deliver(SignalMessage::PeerLeft {
        peer_id: "B".into(),
    })
    .await
    .unwrap();

    assert!(peer.wait_for_no_session("B").await);
    assert!(
        wait_until(WAIT_TIMEOUT_MS, || peer
            .factory
            .calls("B")
            .contains(&MockCall::Close))
        .await
    );

    // A later peer-joined starts over with a fresh generation.
    peer.peer_joined("B").await.unwrap();
    assert!(peer.wait_for_sent(SignalKind::Offer, 2).await);
    assert!(peer.session("B").unwrap().generation > 1);

    peer.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_end_all_closes_every_session() {
    init_tracing();

    let peer = ScriptedPeer::start(test_config("A"));
    peer.join("A").await.unwrap();
    peer.peer_joined("B").await.unwrap();
    peer.offer_from("C", "A", "v=0 offer").await.unwrap();
    assert!(wait_until(WAIT_TIMEOUT_MS, || peer.handle.sessions().len() == 2).await);

    assert_eq!(peer.handle.end_all().await.unwrap(), 2);
    assert!(peer.handle.sessions().is_empty());
    assert_eq!(peer.handle.end_all().await.unwrap(), 0);

    peer.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_call_before_join_is_deferred() {
    init_tracing();

    let peer = ScriptedPeer::start(test_config("A"));
    peer.open().await.unwrap();

    peer.handle.call("B").await.expect("deferred call is accepted");
    settle().await;
    assert!(peer.handle.sessions().is_empty());
    assert_eq!(peer.handle.room_status().state, RoomState::Joining);

    peer.join("A").await.unwrap();
    assert!(peer.wait_for_sent(SignalKind::Offer, 1).await);
    assert_eq!(peer.session("B").unwrap().role, Role::Caller);

    peer.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_call_to_callee_session_reports_role_conflict() {
    init_tracing();

    let peer = ScriptedPeer::start(test_config("A"));
    peer.join("A").await.unwrap();
    peer.offer_from("B", "A", "v=0 offer").await.unwrap();
    assert!(peer.wait_for_sent(SignalKind::Answer, 1).await);

    let err = peer.handle.call("B").await.unwrap_err();
    assert!(matches!(
        err,
        NegotiationError::RoleConflict {
            existing: Role::Callee,
            requested: Role::Caller,
            ..
        }
    ));
    assert_eq!(peer.session("B").unwrap().role, Role::Callee);

    peer.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_server_assigned_peer_id_is_adopted() {
    init_tracing();

    let peer = ScriptedPeer::start(test_config("A"));
    peer.join("A-7").await.unwrap();
    assert_eq!(
        peer.handle.room_status().local_peer_id,
        Some(PeerId::from("A-7"))
    );

    // Traffic for the requested id is now foreign.
    peer.offer_from("B", "A", "v=0 offer").await.unwrap();
    settle().await;
    assert!(peer.handle.sessions().is_empty());

    peer.offer_from("B", "A-7", "v=0 offer").await.unwrap();
    assert!(peer.wait_for_sent(SignalKind::Answer, 1).await);
    match peer.sink.of_kind(SignalKind::Answer).remove(0) {
        SignalMessage::Answer { from, .. } => assert_eq!(from.as_str(), "A-7"),
        other => panic!("unexpected message {other:?}"),
    }

    peer.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_failed_connection_is_removed_after_grace() {
    init_tracing();

    let peer = ScriptedPeer::start(test_config("A"));
    peer.factory.fail_creates();
    peer.join("A").await.unwrap();

    peer.peer_joined("B").await.unwrap();
    assert!(
        peer.wait_for_session("B", |s| s.connection == ConnectionState::Failed)
            .await
    );
    assert!(peer.wait_for_no_session("B").await);
    assert_eq!(peer.sink.count(SignalKind::Offer), 0);

    peer.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_commands_after_shutdown_report_router_closed() {
    init_tracing();

    let peer = ScriptedPeer::start(test_config("A"));
    peer.join("A").await.unwrap();
    let handle = peer.handle.clone();

    peer.shutdown().await.unwrap();

    assert!(matches!(
        handle.call("B").await,
        Err(NegotiationError::RouterClosed)
    ));
    assert!(matches!(
        handle.end_all().await,
        Err(NegotiationError::RouterClosed)
    ));
}
