use parley_client::{
    ConnectionEvent, ConnectionState, LocalDescriptionState, RemoteDescriptionState, Role, SdpKind,
};
use parley_core::{CandidateDescriptor, SignalKind, SignalMessage};

use crate::integration::init_tracing;
use crate::utils::{MockCall, RelayHub, RelayedPeer, ScriptedPeer, test_config};

#[tokio::test]
async fn test_peer_joined_drives_full_offer_answer_exchange() {
    init_tracing();

    let hub = RelayHub::new();
    let a = RelayedPeer::start(&hub, test_config("A"));
    a.wait_ready().await.expect("A ready");
    let b = RelayedPeer::start(&hub, test_config("B"));
    b.wait_ready().await.expect("B ready");

    assert!(
        a.wait_for_session("B", |s| s.role == Role::Caller
            && s.local_description == LocalDescriptionState::OfferSent
            && s.remote_description == RemoteDescriptionState::Set)
            .await,
        "caller should end with the remote answer applied"
    );
    assert!(
        b.wait_for_session("A", |s| s.role == Role::Callee
            && s.local_description == LocalDescriptionState::AnswerSent
            && s.remote_description == RemoteDescriptionState::Set)
            .await,
        "callee should have answered"
    );

    let caller_calls = a.factory.calls("B");
    assert_eq!(caller_calls[0], MockCall::DataChannel("channel".into()));
    assert!(caller_calls.contains(&MockCall::SetRemote(
        SdpKind::Answer,
        "v=0 answer to A".into()
    )));
    assert!(
        b.factory
            .calls("A")
            .contains(&MockCall::SetRemote(SdpKind::Offer, "v=0 offer to B".into()))
    );

    // Trickled candidates cross the relay and apply on the other side.
    a.factory
        .emit(
            "B",
            ConnectionEvent::LocalCandidate(Some(CandidateDescriptor::new("candidate:a1"))),
        )
        .await
        .unwrap();
    assert!(
        crate::utils::wait_until(crate::utils::WAIT_TIMEOUT_MS, || {
            b.factory.applied_candidates("A") == vec!["candidate:a1".to_string()]
        })
        .await
    );

    a.factory
        .emit("B", ConnectionEvent::StateChanged(ConnectionState::Connected))
        .await
        .unwrap();
    assert!(
        a.wait_for_session("B", |s| s.connection == ConnectionState::Connected)
            .await
    );

    a.shutdown().await.unwrap();
    b.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_explicit_call_sends_addressed_offer() {
    init_tracing();

    let peer = ScriptedPeer::start(test_config("A"));
    peer.join("A").await.unwrap();

    peer.handle.call("B").await.expect("call accepted");
    assert!(peer.wait_for_sent(SignalKind::Offer, 1).await);

    let offer = peer.sink.of_kind(SignalKind::Offer).remove(0);
    assert_eq!(
        offer,
        SignalMessage::Offer {
            room_id: "lobby".into(),
            from: "A".into(),
            to: "B".into(),
            sdp: "v=0 offer to B".into(),
        }
    );
    // SDP travels base64-encoded unless configured otherwise.
    assert!(!peer.sink.raw().iter().any(|t| t.contains("v=0 offer to B")));

    let session = peer.session("B").unwrap();
    assert_eq!(session.role, Role::Caller);
    assert_eq!(session.connection, ConnectionState::Connecting);

    peer.shutdown().await.unwrap();
}
