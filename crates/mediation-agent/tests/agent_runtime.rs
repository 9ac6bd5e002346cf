//! Agent runtime tests: startup settings, operator actions and
//! per-connection ordering of inbound work.

use assert_matches::assert_matches;
use futures::future::join_all;
use mediation_agent::{AgentConfig, AgentError, InMemoryAgent, MediationAgent};
use mediation_coordinate::{
    MediationError, MediationRecord, MediationRecordStore, MediationRole, MediationState,
};
use mediation_core::messages::{KeylistAction, KeylistUpdate, KeylistUpdateRule, MediationRequest};
use mediation_core::{ConfigError, ConnectionId, InboundMessage, MediationConfig, MediationMessage};
use mediation_protocol::REQUEST_EXISTS;
use mediation_testkit::{pending_connection, ready_connection, test_effects, TestEffects};

fn request() -> MediationMessage {
    MediationMessage::MediationRequest(MediationRequest::default())
}

fn closed_mediation() -> AgentConfig {
    AgentConfig {
        mediation: MediationConfig {
            open_mediation: false,
            ..MediationConfig::default()
        },
        ..AgentConfig::default()
    }
}

async fn agent(config: &AgentConfig) -> MediationAgent<TestEffects> {
    MediationAgent::new(config, test_effects()).await.unwrap()
}

async fn stored_client_record(effects: &TestEffects, connection: &str) -> MediationRecord {
    let record = MediationRecord::new(
        MediationRole::Client,
        ConnectionId::new(connection),
        vec![],
        vec![],
    );
    MediationRecordStore::save(effects, &record).await.unwrap();
    record
}

// ============================================================================
// Startup
// ============================================================================

#[tokio::test]
async fn startup_sets_configured_default_mediator() {
    let effects = test_effects();
    let record = stored_client_record(&effects, "to-mediator").await;
    let config = AgentConfig {
        default_mediator_id: Some(record.mediation_id.clone()),
        ..AgentConfig::default()
    };

    let agent = MediationAgent::new(&config, effects).await.unwrap();
    let default = agent
        .manager()
        .get_default_mediator_id(agent.effects())
        .await
        .unwrap();
    assert_eq!(default, Some(record.mediation_id));
}

#[tokio::test]
async fn startup_clears_default_mediator() {
    let effects = test_effects();
    let record = stored_client_record(&effects, "to-mediator").await;
    let manager = mediation_coordinate::MediationManager::default();
    manager.set_default_mediator(&effects, &record).await.unwrap();

    let config = AgentConfig {
        clear_default_mediator: true,
        ..AgentConfig::default()
    };
    let agent = MediationAgent::new(&config, effects).await.unwrap();
    assert_eq!(
        agent.manager().get_default_mediator_id(agent.effects()).await.unwrap(),
        None
    );
}

#[tokio::test]
async fn startup_with_unknown_default_mediator_fails() {
    let config = AgentConfig {
        default_mediator_id: Some("missing".into()),
        ..AgentConfig::default()
    };
    let result = MediationAgent::new(&config, test_effects()).await;
    assert_matches!(
        result,
        Err(AgentError::Mediation(MediationError::NotFound { mediation_id })) if mediation_id.as_str() == "missing"
    );
}

#[tokio::test]
async fn startup_rejects_invalid_config() {
    let mut config = AgentConfig::default();
    config.mediation.default_endpoint = String::new();
    let result = MediationAgent::new(&config, test_effects()).await;
    assert_matches!(result, Err(AgentError::Config(ConfigError::Invalid { .. })));
}

// ============================================================================
// Mediator operations
// ============================================================================

#[tokio::test]
async fn closed_mediation_waits_for_operator_grant() {
    let agent = agent(&closed_mediation()).await;
    let connection = ready_connection(agent.effects(), "to-recipient").await;

    let reply = agent
        .handle_inbound(InboundMessage::new(connection.clone(), request()))
        .await
        .unwrap();
    assert_eq!(reply, None);

    let pending = agent.pending_requests().await.unwrap();
    assert_eq!(pending.len(), 1);
    let mediation_id = pending[0].mediation_id.clone();

    let granted = agent.grant_request(&mediation_id).await.unwrap();
    assert_eq!(granted.state, MediationState::Granted);
    assert!(agent.pending_requests().await.unwrap().is_empty());

    let sent = agent.effects().transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].connection_id, connection);
    assert_matches!(
        &sent[0].message,
        MediationMessage::MediationGrant(grant) if grant.routing_keys == granted.routing_keys
    );
}

#[tokio::test]
async fn operator_denial_carries_counter_terms() {
    let agent = agent(&closed_mediation()).await;
    let connection = ready_connection(agent.effects(), "to-recipient").await;
    agent
        .handle_inbound(InboundMessage::new(connection, request()))
        .await
        .unwrap();
    let mediation_id = agent.pending_requests().await.unwrap()[0].mediation_id.clone();

    let denied = agent
        .deny_request(&mediation_id, Some(vec!["pay-first".into()]), None)
        .await
        .unwrap();
    assert_eq!(denied.state, MediationState::Denied);
    assert_eq!(denied.mediator_terms, vec!["pay-first".to_string()]);

    assert_matches!(
        agent.effects().transport.sent_messages().as_slice(),
        [MediationMessage::MediationDeny(deny)] if deny.mediator_terms == vec!["pay-first".to_string()]
            && deny.recipient_terms.is_empty()
    );
}

#[tokio::test]
async fn operator_grant_of_denied_request_is_rejected() {
    let agent = agent(&closed_mediation()).await;
    let connection = ready_connection(agent.effects(), "to-recipient").await;
    agent
        .handle_inbound(InboundMessage::new(connection, request()))
        .await
        .unwrap();
    let mediation_id = agent.pending_requests().await.unwrap()[0].mediation_id.clone();
    agent.deny_request(&mediation_id, None, None).await.unwrap();

    assert_matches!(
        agent.grant_request(&mediation_id).await,
        Err(AgentError::Mediation(MediationError::InvalidTransition { .. }))
    );
    assert_eq!(agent.effects().transport.sent().len(), 1);
}

#[tokio::test]
async fn operator_grant_requires_server_record() {
    let agent = agent(&AgentConfig::default()).await;
    let record = stored_client_record(agent.effects(), "to-mediator").await;

    assert_matches!(
        agent.grant_request(&record.mediation_id).await,
        Err(AgentError::WrongRole { expected: MediationRole::Server, .. })
    );
    assert_matches!(
        agent.grant_request(&"unknown".into()).await,
        Err(AgentError::Mediation(MediationError::NotFound { .. }))
    );
}

// ============================================================================
// Recipient operations
// ============================================================================

#[tokio::test]
async fn keylist_messages_require_granted_mediation() {
    let agent = agent(&AgentConfig::default()).await;
    let connection = ready_connection(agent.effects(), "to-mediator").await;

    let record = agent
        .request_mediation(&connection, vec![], vec!["no-spam".into()])
        .await
        .unwrap();
    assert_eq!(record.state, MediationState::Requested);
    assert_matches!(
        agent.effects().transport.sent_messages().as_slice(),
        [MediationMessage::MediationRequest(req)] if req.recipient_terms == vec!["no-spam".to_string()]
    );

    let update = KeylistUpdate::new(vec![KeylistUpdateRule::new("key-1", KeylistAction::Add)]);
    assert_matches!(
        agent.send_keylist_update(&record.mediation_id, update.clone()).await,
        Err(AgentError::Mediation(MediationError::NotGranted { .. }))
    );

    let grant = MediationMessage::MediationGrant(mediation_core::messages::MediationGrant {
        endpoint: "https://mediator.example".into(),
        routing_keys: vec!["routing-key".into()],
    });
    agent
        .handle_inbound(InboundMessage::new(connection.clone(), grant))
        .await
        .unwrap();

    agent
        .send_keylist_update(&record.mediation_id, update.clone())
        .await
        .unwrap();
    agent
        .send_keylist_query(&record.mediation_id, Some(10), None)
        .await
        .unwrap();

    let sent = agent.effects().transport.sent();
    assert_eq!(sent.len(), 3);
    assert!(sent.iter().all(|m| m.connection_id == connection));
    assert_eq!(sent[1].message, MediationMessage::KeylistUpdate(update));
    assert_matches!(
        &sent[2].message,
        MediationMessage::KeylistQuery(query) if query.paginate.as_ref().map(|p| p.limit) == Some(10)
    );
}

// ============================================================================
// Ordering
// ============================================================================

#[tokio::test]
async fn concurrent_requests_on_one_connection_create_one_record() {
    let agent = agent(&AgentConfig::default()).await;
    let connection = ready_connection(agent.effects(), "to-recipient").await;

    let replies = join_all(
        (0..5).map(|_| agent.handle_inbound(InboundMessage::new(connection.clone(), request()))),
    )
    .await;

    let mut grants = 0;
    let mut reports = 0;
    for reply in replies {
        match reply.unwrap().map(|r| r.message) {
            Some(MediationMessage::MediationGrant(_)) => grants += 1,
            Some(MediationMessage::ProblemReport(report)) => {
                assert_eq!(report.explain_ltxt, REQUEST_EXISTS);
                reports += 1;
            }
            other => panic!("unexpected reply {other:?}"),
        }
    }
    assert_eq!((grants, reports), (1, 4));

    let stored = MediationRecordStore::retrieve_by_connection_id(
        agent.effects(),
        &connection,
        Some(MediationRole::Server),
    )
    .await
    .unwrap();
    assert!(stored.is_some());
}

#[tokio::test]
async fn concurrent_connections_share_one_routing_key() {
    let agent = agent(&AgentConfig::default()).await;
    let mut connections = Vec::new();
    for i in 0..4 {
        connections.push(ready_connection(agent.effects(), &format!("recipient-{i}")).await);
    }

    let replies = join_all(
        connections
            .iter()
            .map(|c| agent.handle_inbound(InboundMessage::new(c.clone(), request()))),
    )
    .await;

    let routing_keys: Vec<Vec<String>> = replies
        .into_iter()
        .map(|reply| match reply.unwrap().map(|r| r.message) {
            Some(MediationMessage::MediationGrant(grant)) => grant.routing_keys,
            other => panic!("expected a grant, got {other:?}"),
        })
        .collect();
    assert!(routing_keys.windows(2).all(|pair| pair[0] == pair[1]));
}

#[tokio::test]
async fn finished_connections_release_their_ordering_state() {
    let agent = agent(&closed_mediation()).await;
    let pending = pending_connection(agent.effects(), "half-open").await;
    assert!(agent
        .handle_inbound(InboundMessage::new(pending, request()))
        .await
        .is_err());
    assert_eq!(agent.tracked_connections(), 0);

    let mut connections = Vec::new();
    for i in 0..3 {
        connections.push(ready_connection(agent.effects(), &format!("recipient-{i}")).await);
    }
    for connection in &connections {
        agent
            .handle_inbound(InboundMessage::new(connection.clone(), request()))
            .await
            .unwrap();
    }
    assert_eq!(agent.tracked_connections(), 0);

    let shared = &agent;
    let replies = join_all(connections.iter().flat_map(|c| {
        (0..3).map(move |_| shared.handle_inbound(InboundMessage::new(c.clone(), request())))
    }))
    .await;
    assert!(replies.iter().all(Result::is_ok));
    assert_eq!(agent.tracked_connections(), 0);

    let pending = agent.pending_requests().await.unwrap();
    assert_eq!(pending.len(), 3);
    agent.grant_request(&pending[0].mediation_id).await.unwrap();
    assert_eq!(agent.tracked_connections(), 0);
}

#[tokio::test]
async fn unready_connection_is_rejected_without_reply() {
    let agent = agent(&AgentConfig::default()).await;
    let connection = pending_connection(agent.effects(), "half-open").await;

    let result = agent
        .handle_inbound(InboundMessage::new(connection, request()))
        .await;
    assert_matches!(result, Err(err) if err.is_protocol_violation());
    assert!(agent.effects().transport.sent().is_empty());
}

// ============================================================================
// In-memory agent
// ============================================================================

#[tokio::test]
async fn in_memory_agent_delivers_replies_to_channel() {
    let (agent, mut outbound) = InMemoryAgent::in_memory(&AgentConfig::default())
        .await
        .unwrap();
    agent.effects().connections.activate("to-recipient").await;

    let inbound = InboundMessage::new("to-recipient", request()).with_message_id("msg-1");
    agent.handle_inbound(inbound).await.unwrap();

    let delivered = outbound.recv().await.unwrap();
    assert_eq!(delivered.thread_id.as_deref(), Some("msg-1"));
    assert_matches!(delivered.message, MediationMessage::MediationGrant(_));
}

#[tokio::test]
async fn config_file_starts_agent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("agent.toml");
    std::fs::write(
        &path,
        "log_level = \"warn\"\n[mediation]\ndefault_endpoint = \"https://relay.example\"\n",
    )
    .unwrap();

    let (agent, _outbound) = InMemoryAgent::from_config_file(&path).await.unwrap();
    assert_eq!(agent.manager().config().default_endpoint, "https://relay.example");

    let missing = InMemoryAgent::from_config_file(dir.path().join("absent.toml")).await;
    assert!(missing.is_err());
}
