//! Coordinate-mediation message bodies

use serde::{Deserialize, Serialize};

/// Request from a recipient asking the counterpart to act as its mediator
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediationRequest {
    /// Terms the mediator is asked to accept
    #[serde(default)]
    pub mediator_terms: Vec<String>,
    /// Terms the recipient agrees to
    #[serde(default)]
    pub recipient_terms: Vec<String>,
}

impl MediationRequest {
    /// Create a request carrying the given terms
    pub fn new(mediator_terms: Vec<String>, recipient_terms: Vec<String>) -> Self {
        Self {
            mediator_terms,
            recipient_terms,
        }
    }
}

/// Mediator's acceptance of a mediation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediationGrant {
    /// Service endpoint senders should deliver forwarded messages to
    pub endpoint: String,
    /// Keys senders must use when wrapping messages for the mediator
    #[serde(default)]
    pub routing_keys: Vec<String>,
}

/// Mediator's refusal of a mediation request, optionally with counter-terms
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediationDeny {
    /// Counter-terms proposed by the mediator
    #[serde(default)]
    pub mediator_terms: Vec<String>,
    /// Counter-terms expected of the recipient
    #[serde(default)]
    pub recipient_terms: Vec<String>,
}

/// Action requested for a single keylist entry.
///
/// Discriminants are stable and index the action translation tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeylistAction {
    /// Start forwarding for the key
    Add = 0,
    /// Stop forwarding for the key
    Remove = 1,
}

impl KeylistAction {
    /// Every action, in discriminant order
    pub const ALL: [KeylistAction; 2] = [KeylistAction::Add, KeylistAction::Remove];

    /// Position of this action in translation tables
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Outcome of applying one keylist update rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateResult {
    /// The update was applied
    Success,
    /// The update had nothing to do
    NoChange,
    /// The update was rejected because of the request
    ClientError,
    /// The update failed on the mediator
    ServerError,
}

impl UpdateResult {
    /// Whether the rule took effect
    pub fn is_success(self) -> bool {
        matches!(self, UpdateResult::Success)
    }
}

/// A single keylist update rule submitted by a recipient
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeylistUpdateRule {
    /// Key the rule applies to
    pub recipient_key: String,
    /// Requested action
    pub action: KeylistAction,
}

impl KeylistUpdateRule {
    /// Create a rule
    pub fn new(recipient_key: impl Into<String>, action: KeylistAction) -> Self {
        Self {
            recipient_key: recipient_key.into(),
            action,
        }
    }
}

/// Outcome of a single keylist update rule, as reported by the mediator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeylistUpdated {
    /// Key the rule applied to
    pub recipient_key: String,
    /// Action that was requested
    pub action: KeylistAction,
    /// What happened
    pub result: UpdateResult,
}

impl KeylistUpdated {
    /// Create an outcome entry
    pub fn new(recipient_key: impl Into<String>, action: KeylistAction, result: UpdateResult) -> Self {
        Self {
            recipient_key: recipient_key.into(),
            action,
            result,
        }
    }
}

/// Batch of keylist update rules
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeylistUpdate {
    /// Rules in submission order
    #[serde(default)]
    pub updates: Vec<KeylistUpdateRule>,
}

impl KeylistUpdate {
    /// Create a batch from rules
    pub fn new(updates: Vec<KeylistUpdateRule>) -> Self {
        Self { updates }
    }
}

/// Mediator's per-rule results for a keylist update batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeylistUpdateResponse {
    /// One entry per submitted rule, in submission order
    #[serde(default)]
    pub updated: Vec<KeylistUpdated>,
}

/// Pagination request for keylist queries.
///
/// A negative `limit` requests every key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeylistQueryPaginate {
    /// Maximum number of keys to return
    pub limit: i64,
    /// Number of keys to skip
    pub offset: u64,
}

impl Default for KeylistQueryPaginate {
    fn default() -> Self {
        Self {
            limit: -1,
            offset: 0,
        }
    }
}

/// Query for the keys a mediator currently forwards for the sender
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeylistQuery {
    /// Optional attribute filter, passed through as-is
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<serde_json::Map<String, serde_json::Value>>,
    /// Optional pagination
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paginate: Option<KeylistQueryPaginate>,
}

/// A single keylist entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeylistKey {
    /// Forwarded key
    pub recipient_key: String,
}

/// Pagination metadata on a keylist response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeylistQueryPagination {
    /// Keys in this page
    pub count: u64,
    /// Offset of this page
    pub offset: u64,
    /// Keys after this page
    pub remaining: u64,
}

/// Response to a keylist query
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keylist {
    /// Forwarded keys
    #[serde(default)]
    pub keys: Vec<KeylistKey>,
    /// Pagination metadata; unset for full-list responses
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<KeylistQueryPagination>,
}

impl Keylist {
    /// Recipient keys in response order
    pub fn recipient_keys(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(|k| k.recipient_key.as_str())
    }
}
