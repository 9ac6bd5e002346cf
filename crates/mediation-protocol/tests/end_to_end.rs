//! A recipient and a mediator exchanging every message of a mediation
//! through their own dispatchers and stores.

use mediation_coordinate::{MediationRecordStore, MediationRole, MediationState};
use mediation_core::messages::KeylistQuery;
use mediation_core::{ConnectionId, InboundMessage, MediationConfig, MediationMessage, OutboundMessage};
use mediation_protocol::MediationProtocol;
use mediation_testkit::{ready_connection, test_effects, TestEffects};

struct Party {
    effects: TestEffects,
    protocol: MediationProtocol<TestEffects>,
    connection: ConnectionId,
}

impl Party {
    async fn new(connection: &str, config: MediationConfig) -> Self {
        let effects = test_effects();
        let connection = ready_connection(&effects, connection).await;
        Self {
            effects,
            protocol: MediationProtocol::new(config),
            connection,
        }
    }

    /// Deliver `message` as if it arrived from the other party
    async fn receive(&self, message: MediationMessage) -> Option<MediationMessage> {
        self.protocol
            .dispatch(InboundMessage::new(self.connection.clone(), message), &self.effects)
            .await
            .unwrap()
            .map(|reply: OutboundMessage| reply.message)
    }
}

#[tokio::test]
async fn request_grant_and_keylist_update_round_trip() {
    let mediator = Party::new("to-recipient", MediationConfig::default()).await;
    let recipient = Party::new(
        "to-mediator",
        MediationConfig {
            auto_respond_mediation_grant: true,
            set_to_default_on_granted: true,
            ..MediationConfig::default()
        },
    )
    .await;

    let (_, request) = recipient
        .protocol
        .manager()
        .prepare_request(&recipient.effects, &recipient.connection, vec![], vec![])
        .await
        .unwrap();

    let grant = mediator
        .receive(MediationMessage::MediationRequest(request))
        .await
        .expect("mediator grants");
    let update = recipient.receive(grant).await.expect("recipient registers a key");
    let MediationMessage::KeylistUpdate(ref rules) = update else {
        panic!("expected a keylist update, got {update:?}");
    };
    let key = rules.updates[0].recipient_key.clone();

    let response = mediator.receive(update).await.expect("mediator responds");
    assert_eq!(recipient.receive(response).await, None);

    // Mediator: route and mirror
    let route = mediator
        .protocol
        .manager()
        .routing()
        .get_recipient(&mediator.effects, &key)
        .await
        .unwrap();
    assert_eq!(route.connection_id, mediator.connection);
    let server_record = MediationRecordStore::retrieve_by_connection_id(
        &mediator.effects,
        &mediator.connection,
        Some(MediationRole::Server),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(server_record.recipient_keys, vec![key.clone()]);

    // Recipient: granted default mediator, mirrored key and client route
    let manager = recipient.protocol.manager();
    let client_record = manager
        .get_default_mediator(&recipient.effects)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(client_record.state, MediationState::Granted);
    assert_eq!(client_record.recipient_keys, vec![key.clone()]);
    assert_eq!(client_record.routing_keys, server_record.routing_keys);

    let my_keys: Vec<String> = manager
        .get_my_keylist(&recipient.effects, Some(&recipient.connection))
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.recipient_key)
        .collect();
    assert_eq!(my_keys, vec![key.clone()]);

    let info = manager.routing_info(Some(&client_record));
    assert_eq!(info.endpoint, server_record.endpoint);

    // Recipient asks for its keylist
    let keylist = mediator
        .receive(MediationMessage::KeylistQuery(KeylistQuery::default()))
        .await
        .expect("mediator lists keys");
    let MediationMessage::Keylist(ref listed) = keylist else {
        panic!("expected a keylist, got {keylist:?}");
    };
    assert_eq!(listed.recipient_keys().collect::<Vec<_>>(), vec![key.as_str()]);
    assert_eq!(recipient.receive(keylist).await, None);

    // Every mediator record save was published
    let reasons = mediator.effects.notifier.reasons();
    assert_eq!(
        reasons,
        vec![
            "Mediation request received",
            "Mediation request granted",
            "Keylist updated"
        ]
    );
}
