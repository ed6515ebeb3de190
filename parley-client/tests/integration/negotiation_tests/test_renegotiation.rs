use parley_client::{ConnectionState, LocalDescriptionState, SdpKind};
use parley_core::SignalKind;

use crate::integration::init_tracing;
use crate::utils::{MockCall, ScriptedPeer, settle, test_config};

#[tokio::test]
async fn test_repeated_offer_is_ignored_but_new_offer_renegotiates() {
    init_tracing();

    let peer = ScriptedPeer::start(test_config("A"));
    peer.join("A").await.unwrap();

    peer.offer_from("B", "A", "v=0 first").await.unwrap();
    assert!(peer.wait_for_sent(SignalKind::Answer, 1).await);
    let generation = peer.session("B").unwrap().generation;

    peer.offer_from("B", "A", "v=0 first").await.unwrap();
    settle().await;
    assert_eq!(peer.sink.count(SignalKind::Answer), 1);

    peer.offer_from("B", "A", "v=0 second").await.unwrap();
    assert!(peer.wait_for_sent(SignalKind::Answer, 2).await);

    let session = peer.session("B").unwrap();
    assert_eq!(session.generation, generation);
    assert_eq!(session.local_description, LocalDescriptionState::AnswerSent);
    assert_eq!(session.connection, ConnectionState::Connecting);
    assert_eq!(peer.factory.created_count(), 1);
    assert!(
        peer.factory
            .calls("B")
            .contains(&MockCall::SetRemote(SdpKind::Offer, "v=0 second".into()))
    );

    peer.shutdown().await.unwrap();
}
