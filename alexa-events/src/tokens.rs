//! Lookup of a user's linked Alexa account.
//!
//! Token issuance and refresh happen elsewhere; the ingress only needs the
//! current region and access token for a username.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::TokenStoreError;

/// Region and bearer token for a linked Alexa account.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlexaCredentials {
    pub region: String,
    pub access_token: String,
}

impl AlexaCredentials {
    pub fn new(region: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            access_token: access_token.into(),
        }
    }
}

impl fmt::Debug for AlexaCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlexaCredentials")
            .field("region", &self.region)
            .field("access_token", &"<redacted>")
            .finish()
    }
}

#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Current region and access token for `username`, or `None` if the user has
    /// not linked an Alexa account.
    async fn region_and_access_token(
        &self,
        username: &str,
    ) -> Result<Option<AlexaCredentials>, TokenStoreError>;
}

/// Token store kept in memory, keyed by username.
#[derive(Debug, Default)]
pub struct InMemoryTokenStore {
    tokens: RwLock<HashMap<String, AlexaCredentials>>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a JSON object of `username -> {region, accessToken}`.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, TokenStoreError> {
        let contents = std::fs::read_to_string(path)?;
        let tokens: HashMap<String, AlexaCredentials> = serde_json::from_str(&contents)?;
        Ok(Self {
            tokens: RwLock::new(tokens),
        })
    }

    pub fn insert(&self, username: impl Into<String>, credentials: AlexaCredentials) {
        self.tokens.write().insert(username.into(), credentials);
    }

    pub fn remove(&self, username: &str) -> Option<AlexaCredentials> {
        self.tokens.write().remove(username)
    }

    pub fn len(&self) -> usize {
        self.tokens.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.read().is_empty()
    }
}

#[async_trait]
impl TokenStore for InMemoryTokenStore {
    async fn region_and_access_token(
        &self,
        username: &str,
    ) -> Result<Option<AlexaCredentials>, TokenStoreError> {
        Ok(self.tokens.read().get(username).cloned())
    }
}
