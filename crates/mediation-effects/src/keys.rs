//! Local key issuance backed by ed25519 key pairs
//!
//! Verification keys are rendered as lowercase hex. The DID is derived from
//! the first 16 bytes of the verification key. Signing keys stay in memory
//! for the lifetime of the issuer; durable key custody belongs to the wallet.

use async_trait::async_trait;
use ed25519_dalek::{SigningKey, VerifyingKey};
use mediation_core::effects::{DidInfo, KeyIssuerEffects, KeyIssuerError};
use rand::rngs::OsRng;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::Mutex;

/// DID method used for locally issued DIDs
pub const LOCAL_DID_METHOD: &str = "did:aura";

/// Issues local DIDs with freshly generated ed25519 keys
#[derive(Clone, Default)]
pub struct LocalKeyIssuer {
    keys: Arc<Mutex<HashMap<String, SigningKey>>>,
}

impl LocalKeyIssuer {
    /// Create an issuer with no keys
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys issued so far
    pub async fn issued_count(&self) -> usize {
        self.keys.lock().await.len()
    }

    /// Verification key for a previously issued verkey, if this issuer holds it
    pub async fn verifying_key(&self, verkey: &str) -> Option<VerifyingKey> {
        self.keys
            .lock()
            .await
            .get(verkey)
            .map(SigningKey::verifying_key)
    }

    fn did_for(verifying_key: &VerifyingKey) -> String {
        format!(
            "{LOCAL_DID_METHOD}:{}",
            hex::encode(&verifying_key.as_bytes()[..16])
        )
    }
}

impl std::fmt::Debug for LocalKeyIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalKeyIssuer").finish_non_exhaustive()
    }
}

#[async_trait]
impl KeyIssuerEffects for LocalKeyIssuer {
    async fn create_local_did(
        &self,
        metadata: BTreeMap<String, String>,
    ) -> Result<DidInfo, KeyIssuerError> {
        let signing_key = SigningKey::generate(&mut OsRng);
        let verifying_key = signing_key.verifying_key();
        let verkey = hex::encode(verifying_key.as_bytes());
        let did = Self::did_for(&verifying_key);

        let mut keys = self.keys.lock().await;
        if keys.contains_key(&verkey) {
            return Err(KeyIssuerError::GenerationFailed(
                "generated verification key collides with an existing key".to_string(),
            ));
        }
        keys.insert(verkey.clone(), signing_key);
        tracing::debug!(did = %did, "Issued local DID");

        Ok(DidInfo {
            did,
            verkey,
            metadata,
        })
    }
}
