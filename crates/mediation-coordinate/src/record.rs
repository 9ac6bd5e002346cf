//! Mediation records and the mediation state machine
//!
//! A mediation record tracks one mediation relationship from either side:
//! the mediator (`Server`) or the recipient (`Client`). States only move
//! forward: `Requested` may become `Granted` or `Denied`, and both of those
//! are terminal.

use crate::error::{MediationError, MediationResult};
use mediation_core::effects::{
    tag_filter, NotificationEffects, RecordEvent, RecordStorageEffects, StorageError,
    StorageRecord, TagFilter,
};
use mediation_core::messages::{KeylistAction, KeylistUpdated};
use mediation_core::{ConnectionId, MediationId};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// Storage record type for mediation records
pub const MEDIATION_RECORD_TYPE: &str = "mediation_requests";

/// Topic used for mediation change notifications
pub const MEDIATION_EVENT_TOPIC: &str = "mediation";

const TAG_STATE: &str = "state";
const TAG_ROLE: &str = "role";
const TAG_CONNECTION_ID: &str = "connection_id";

/// Which side of the relationship this agent plays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediationRole {
    /// Recipient asking to be mediated
    Client,
    /// Mediator
    Server,
}

impl MediationRole {
    /// Tag value used for queries
    pub fn as_str(self) -> &'static str {
        match self {
            MediationRole::Client => "client",
            MediationRole::Server => "server",
        }
    }
}

impl fmt::Display for MediationRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mediation lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediationState {
    /// Request sent or received, awaiting a decision
    Requested,
    /// Mediator accepted
    Granted,
    /// Mediator refused
    Denied,
}

impl MediationState {
    /// Tag value used for queries
    pub fn as_str(self) -> &'static str {
        match self {
            MediationState::Requested => "requested",
            MediationState::Granted => "granted",
            MediationState::Denied => "denied",
        }
    }

    /// Whether no further transition is possible
    pub fn is_terminal(self) -> bool {
        !matches!(self, MediationState::Requested)
    }

    /// Whether moving to `next` is permitted. Re-entering the current state
    /// is always permitted.
    pub fn can_transition_to(self, next: MediationState) -> bool {
        self == next
            || matches!(
                (self, next),
                (MediationState::Requested, MediationState::Granted)
                    | (MediationState::Requested, MediationState::Denied)
            )
    }
}

impl fmt::Display for MediationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One mediation relationship
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediationRecord {
    /// Record identifier
    pub mediation_id: MediationId,
    /// Side this agent plays
    pub role: MediationRole,
    /// Lifecycle state
    pub state: MediationState,
    /// Connection to the counterpart
    pub connection_id: ConnectionId,
    /// Terms asked of the mediator
    #[serde(default)]
    pub mediator_terms: Vec<String>,
    /// Terms asked of the recipient
    #[serde(default)]
    pub recipient_terms: Vec<String>,
    /// Keys currently registered through this mediation
    #[serde(default)]
    pub recipient_keys: Vec<String>,
    /// Keys senders must wrap forwarded messages with
    #[serde(default)]
    pub routing_keys: Vec<String>,
    /// Mediator endpoint, set once granted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

impl MediationRecord {
    /// Create a new, unsaved record in the `Requested` state
    pub fn new(
        role: MediationRole,
        connection_id: ConnectionId,
        mediator_terms: Vec<String>,
        recipient_terms: Vec<String>,
    ) -> Self {
        Self {
            mediation_id: MediationId::new_random(),
            role,
            state: MediationState::Requested,
            connection_id,
            mediator_terms,
            recipient_terms,
            recipient_keys: Vec::new(),
            routing_keys: Vec::new(),
            endpoint: None,
        }
    }

    /// Whether the mediation has been granted
    pub fn is_granted(&self) -> bool {
        self.state == MediationState::Granted
    }

    /// Fail unless the mediation has been granted
    pub fn ensure_granted(&self) -> MediationResult<()> {
        if self.is_granted() {
            Ok(())
        } else {
            Err(MediationError::NotGranted {
                mediation_id: self.mediation_id.clone(),
                state: self.state,
            })
        }
    }

    /// Move to `next`, rejecting illegal transitions
    pub fn transition_to(&mut self, next: MediationState) -> MediationResult<()> {
        if !self.state.can_transition_to(next) {
            return Err(MediationError::InvalidTransition {
                mediation_id: self.mediation_id.clone(),
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }

    /// Record `key` as registered. Returns false if it already was.
    pub fn add_recipient_key(&mut self, key: &str) -> bool {
        if self.recipient_keys.iter().any(|k| k == key) {
            return false;
        }
        self.recipient_keys.push(key.to_string());
        true
    }

    /// Forget `key`. Returns false if it was not registered.
    pub fn remove_recipient_key(&mut self, key: &str) -> bool {
        let before = self.recipient_keys.len();
        self.recipient_keys.retain(|k| k != key);
        self.recipient_keys.len() != before
    }

    /// Mirror the successful entries of a keylist update outcome into the
    /// registered key set. Returns whether the set changed.
    pub fn apply_keylist_results(&mut self, updated: &[KeylistUpdated]) -> bool {
        let mut changed = false;
        for result in updated.iter().filter(|u| u.result.is_success()) {
            changed |= match result.action {
                KeylistAction::Add => self.add_recipient_key(&result.recipient_key),
                KeylistAction::Remove => self.remove_recipient_key(&result.recipient_key),
            };
        }
        changed
    }

    /// Encode as a storage record
    pub fn to_storage(&self) -> Result<StorageRecord, StorageError> {
        let value = serde_json::to_string(self)?;
        Ok(
            StorageRecord::new(MEDIATION_RECORD_TYPE, self.mediation_id.as_str(), value)
                .with_tag(TAG_STATE, self.state.as_str())
                .with_tag(TAG_ROLE, self.role.as_str())
                .with_tag(TAG_CONNECTION_ID, self.connection_id.as_str()),
        )
    }

    /// Decode from a storage record
    pub fn from_storage(record: &StorageRecord) -> Result<Self, StorageError> {
        Ok(serde_json::from_str(&record.value)?)
    }
}

/// Tag-based mediation lookup. Unset fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediationQuery {
    /// Restrict to one role
    pub role: Option<MediationRole>,
    /// Restrict to one state
    pub state: Option<MediationState>,
    /// Restrict to one connection
    pub connection_id: Option<ConnectionId>,
}

impl MediationQuery {
    /// Query matching every record
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to `role`
    pub fn role(mut self, role: MediationRole) -> Self {
        self.role = Some(role);
        self
    }

    /// Restrict to `state`
    pub fn state(mut self, state: MediationState) -> Self {
        self.state = Some(state);
        self
    }

    /// Restrict to `connection_id`
    pub fn connection(mut self, connection_id: &ConnectionId) -> Self {
        self.connection_id = Some(connection_id.clone());
        self
    }

    fn to_filter(&self) -> TagFilter {
        let mut filter = TagFilter::new();
        if let Some(role) = self.role {
            filter.insert(TAG_ROLE.to_string(), role.as_str().to_string());
        }
        if let Some(state) = self.state {
            filter.insert(TAG_STATE.to_string(), state.as_str().to_string());
        }
        if let Some(connection_id) = &self.connection_id {
            filter.insert(TAG_CONNECTION_ID.to_string(), connection_id.to_string());
        }
        filter
    }
}

/// Mediation record persistence over a [`RecordStorageEffects`] handler
#[derive(Debug, Clone, Copy, Default)]
pub struct MediationRecordStore;

impl MediationRecordStore {
    /// Insert or replace a record
    pub async fn save<E>(effects: &E, record: &MediationRecord) -> Result<(), StorageError>
    where
        E: RecordStorageEffects + ?Sized,
    {
        let stored = record.to_storage()?;
        match effects.update_record(stored.clone()).await {
            Err(err) if err.is_not_found() => effects.add_record(stored).await,
            other => other,
        }
    }

    /// Save a record and publish a change notification.
    ///
    /// Notification delivery is best effort: a failed delivery is logged and
    /// the saved record stands.
    pub async fn save_with_notification<E>(
        effects: &E,
        record: &MediationRecord,
        reason: &str,
    ) -> Result<(), StorageError>
    where
        E: RecordStorageEffects + NotificationEffects + ?Sized,
    {
        Self::save(effects, record).await?;
        let event = RecordEvent {
            topic: MEDIATION_EVENT_TOPIC.to_string(),
            record_id: record.mediation_id.to_string(),
            payload: serde_json::to_value(record)?,
            reason: reason.to_string(),
        };
        if let Err(err) = effects.notify(event).await {
            warn!(
                mediation_id = %record.mediation_id,
                error = %err,
                "Mediation change notification failed"
            );
        }
        Ok(())
    }

    /// Fetch a record by id
    pub async fn retrieve_by_id<E>(
        effects: &E,
        mediation_id: &MediationId,
    ) -> Result<MediationRecord, StorageError>
    where
        E: RecordStorageEffects + ?Sized,
    {
        let record = effects
            .get_record(MEDIATION_RECORD_TYPE, mediation_id.as_str())
            .await?;
        MediationRecord::from_storage(&record)
    }

    /// Fetch the single record for `connection_id`, optionally within one
    /// role. Returns `None` when there is no such record.
    pub async fn retrieve_by_connection_id<E>(
        effects: &E,
        connection_id: &ConnectionId,
        role: Option<MediationRole>,
    ) -> Result<Option<MediationRecord>, StorageError>
    where
        E: RecordStorageEffects + ?Sized,
    {
        let mut filter = tag_filter([(TAG_CONNECTION_ID, connection_id.as_str())]);
        if let Some(role) = role {
            filter.insert(TAG_ROLE.to_string(), role.as_str().to_string());
        }
        match effects
            .find_unique_record(MEDIATION_RECORD_TYPE, &filter)
            .await
        {
            Ok(record) => Ok(Some(MediationRecord::from_storage(&record)?)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Whether any record exists for `connection_id`. Several records count
    /// as existing.
    pub async fn exists_for_connection_id<E>(
        effects: &E,
        connection_id: &ConnectionId,
    ) -> Result<bool, StorageError>
    where
        E: RecordStorageEffects + ?Sized,
    {
        let filter = tag_filter([(TAG_CONNECTION_ID, connection_id.as_str())]);
        let found = effects
            .find_records(MEDIATION_RECORD_TYPE, &filter)
            .await?;
        Ok(!found.is_empty())
    }

    /// The most recently created `role` record on `connection_id`, preferring
    /// records in `preferred` state.
    ///
    /// A recipient may have several requests outstanding with one mediator,
    /// so client-side lookups by connection are not unique.
    pub async fn latest_for_connection_id<E>(
        effects: &E,
        connection_id: &ConnectionId,
        role: MediationRole,
        preferred: MediationState,
    ) -> Result<Option<MediationRecord>, StorageError>
    where
        E: RecordStorageEffects + ?Sized,
    {
        let mut records =
            Self::query(effects, &MediationQuery::new().role(role).connection(connection_id))
                .await?;
        let index = records
            .iter()
            .rposition(|record| record.state == preferred)
            .or_else(|| records.len().checked_sub(1));
        Ok(index.map(|index| records.swap_remove(index)))
    }

    /// Every record matching `query`, in storage order
    pub async fn query<E>(
        effects: &E,
        query: &MediationQuery,
    ) -> Result<Vec<MediationRecord>, StorageError>
    where
        E: RecordStorageEffects + ?Sized,
    {
        effects
            .find_records(MEDIATION_RECORD_TYPE, &query.to_filter())
            .await?
            .iter()
            .map(MediationRecord::from_storage)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use mediation_effects::MemoryRecordStore;

    fn server_record(connection: &str) -> MediationRecord {
        MediationRecord::new(
            MediationRole::Server,
            ConnectionId::new(connection),
            vec![],
            vec![],
        )
    }

    #[test]
    fn states_only_move_forward() {
        use MediationState::*;
        assert!(Requested.can_transition_to(Granted));
        assert!(Requested.can_transition_to(Denied));
        assert!(Granted.can_transition_to(Granted));
        assert!(!Granted.can_transition_to(Requested));
        assert!(!Granted.can_transition_to(Denied));
        assert!(!Denied.can_transition_to(Granted));
        assert!(!Denied.can_transition_to(Requested));
        assert!(Granted.is_terminal() && Denied.is_terminal());
        assert!(!Requested.is_terminal());
    }

    #[test]
    fn illegal_transition_leaves_state_untouched() {
        let mut record = server_record("conn-1");
        record.transition_to(MediationState::Denied).unwrap();
        assert_matches!(
            record.transition_to(MediationState::Granted),
            Err(MediationError::InvalidTransition {
                from: MediationState::Denied,
                to: MediationState::Granted,
                ..
            })
        );
        assert_eq!(record.state, MediationState::Denied);
    }

    #[test]
    fn recipient_keys_have_set_semantics() {
        let mut record = server_record("conn-1");
        assert!(record.add_recipient_key("k1"));
        assert!(!record.add_recipient_key("k1"));
        assert!(record.add_recipient_key("k2"));
        assert!(record.remove_recipient_key("k1"));
        assert!(!record.remove_recipient_key("k1"));
        assert_eq!(record.recipient_keys, vec!["k2".to_string()]);
    }

    #[test]
    fn only_successful_results_are_mirrored() {
        use mediation_core::messages::UpdateResult;

        let mut record = server_record("conn-1");
        let changed = record.apply_keylist_results(&[
            KeylistUpdated::new("k1", KeylistAction::Add, UpdateResult::Success),
            KeylistUpdated::new("k2", KeylistAction::Add, UpdateResult::ClientError),
            KeylistUpdated::new("k3", KeylistAction::Remove, UpdateResult::Success),
        ]);
        assert!(changed);
        assert_eq!(record.recipient_keys, vec!["k1".to_string()]);
        assert!(!record.apply_keylist_results(&[KeylistUpdated::new(
            "k1",
            KeylistAction::Add,
            UpdateResult::NoChange
        )]));
    }

    #[tokio::test]
    async fn save_keeps_tags_in_sync_with_state() {
        let store = MemoryRecordStore::new();
        let mut record = server_record("conn-1");
        MediationRecordStore::save(&store, &record).await.unwrap();

        record.transition_to(MediationState::Granted).unwrap();
        MediationRecordStore::save(&store, &record).await.unwrap();

        let granted = MediationRecordStore::query(
            &store,
            &MediationQuery::new().state(MediationState::Granted),
        )
        .await
        .unwrap();
        assert_eq!(granted, vec![record.clone()]);

        let requested = MediationRecordStore::query(
            &store,
            &MediationQuery::new().state(MediationState::Requested),
        )
        .await
        .unwrap();
        assert!(requested.is_empty());
    }

    #[tokio::test]
    async fn connection_lookup_by_role() {
        let store = MemoryRecordStore::new();
        let connection = ConnectionId::new("conn-1");
        assert!(!MediationRecordStore::exists_for_connection_id(&store, &connection)
            .await
            .unwrap());

        let record = server_record("conn-1");
        MediationRecordStore::save(&store, &record).await.unwrap();

        assert!(MediationRecordStore::exists_for_connection_id(&store, &connection)
            .await
            .unwrap());
        let found = MediationRecordStore::retrieve_by_connection_id(
            &store,
            &connection,
            Some(MediationRole::Server),
        )
        .await
        .unwrap();
        assert_eq!(found, Some(record));
        let missing = MediationRecordStore::retrieve_by_connection_id(
            &store,
            &connection,
            Some(MediationRole::Client),
        )
        .await
        .unwrap();
        assert_eq!(missing, None);
    }

    #[tokio::test]
    async fn ambiguous_connection_lookup_is_an_error() {
        let store = MemoryRecordStore::new();
        MediationRecordStore::save(&store, &server_record("conn-1"))
            .await
            .unwrap();
        MediationRecordStore::save(&store, &server_record("conn-1"))
            .await
            .unwrap();

        assert_matches!(
            MediationRecordStore::retrieve_by_connection_id(
                &store,
                &ConnectionId::new("conn-1"),
                None
            )
            .await,
            Err(StorageError::Duplicate { count: 2, .. })
        );
    }

    #[tokio::test]
    async fn latest_lookup_prefers_state_then_recency() {
        let store = MemoryRecordStore::new();
        let connection = ConnectionId::new("to-mediator");
        let client = |state| {
            let mut record =
                MediationRecord::new(MediationRole::Client, connection.clone(), vec![], vec![]);
            record.state = state;
            record
        };
        async fn lookup(
            store: &MemoryRecordStore,
            connection: &ConnectionId,
            preferred: MediationState,
        ) -> Option<MediationRecord> {
            MediationRecordStore::latest_for_connection_id(
                store,
                connection,
                MediationRole::Client,
                preferred,
            )
            .await
            .unwrap()
        }

        assert_eq!(lookup(&store, &connection, MediationState::Requested).await, None);

        let older = client(MediationState::Requested);
        let granted = client(MediationState::Granted);
        let newer = client(MediationState::Requested);
        for record in [&older, &granted, &newer] {
            MediationRecordStore::save(&store, record).await.unwrap();
        }
        MediationRecordStore::save(&store, &server_record("to-mediator"))
            .await
            .unwrap();

        assert_eq!(
            lookup(&store, &connection, MediationState::Requested).await,
            Some(newer.clone())
        );
        assert_eq!(
            lookup(&store, &connection, MediationState::Granted).await,
            Some(granted)
        );
        assert_eq!(
            lookup(&store, &connection, MediationState::Denied).await,
            Some(newer)
        );
    }
}
