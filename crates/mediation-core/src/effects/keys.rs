//! Local DID and verification key issuance
//!
//! # Effect Classification
//!
//! - **Category**: Infrastructure Effect
//! - **Implementation**: `mediation-effects` (`LocalKeyIssuer`)
//! - **Usage**: routing DID creation on the mediator, fresh recipient keys on
//!   the client when auto-responding to a grant

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A locally controlled DID and its verification key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DidInfo {
    /// Decentralized identifier
    pub did: String,
    /// Public verification key, encoded for use as a recipient or routing key
    pub verkey: String,
    /// Free-form metadata recorded at creation time
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// Key issuance errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyIssuerError {
    /// Key material could not be generated
    #[error("Key generation failed: {0}")]
    GenerationFailed(String),

    /// The issuer refused to create a key
    #[error("Key issuance denied: {0}")]
    Denied(String),
}

/// Issuer of local DIDs
#[async_trait]
pub trait KeyIssuerEffects: Send + Sync {
    /// Create a new local DID with a fresh key pair
    async fn create_local_did(
        &self,
        metadata: BTreeMap<String, String>,
    ) -> Result<DidInfo, KeyIssuerError>;
}
