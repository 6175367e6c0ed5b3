//! In-process credential holder.

use std::sync::RwLock;

use async_trait::async_trait;

use pixshelf_core::{CredentialStore, Error, Result};

/// `CredentialStore` holding the credential in memory.
#[derive(Debug, Default)]
pub struct StaticCredential {
    value: RwLock<Option<String>>,
}

impl StaticCredential {
    pub fn new(credential: impl Into<String>) -> Self {
        let credential = credential.into();
        Self {
            value: RwLock::new(Some(credential).filter(|c| !c.trim().is_empty())),
        }
    }

    /// No credential; requests go out without a Cookie header.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Read `UPSTREAM_CREDENTIAL`, empty when unset.
    pub fn from_env() -> Self {
        Self::new(std::env::var("UPSTREAM_CREDENTIAL").unwrap_or_default())
    }
}

#[async_trait]
impl CredentialStore for StaticCredential {
    async fn get_credential(&self) -> Result<Option<String>> {
        self.value
            .read()
            .map(|v| v.clone())
            .map_err(|_| Error::Internal("credential lock poisoned".to_string()))
    }

    async fn set_credential(&self, credential: &str) -> Result<()> {
        let mut value = self
            .value
            .write()
            .map_err(|_| Error::Internal("credential lock poisoned".to_string()))?;
        *value = Some(credential.to_string()).filter(|c| !c.trim().is_empty());
        Ok(())
    }
}
