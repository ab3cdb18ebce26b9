use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{ConnectorConfig, CredentialLocationType, LegacyConfig, PersistedConfig};
use crate::credentials::{CredentialsFile, SERVICE_ACCOUNT_KEY};
use crate::error::Error;
use crate::key::{KeyFormat, ServiceAccountKey};
use crate::misc::Required;
use crate::resolver::{CredentialResolver, LegacyLoader};
use crate::scope::ScopeRegistry;
use crate::token::AccessToken;
use crate::token_source::ambient_token_source::{AmbientTokenSource, LiveCredential};
use crate::token_source::service_account_token_source::ServiceAccountTokenSource;
use crate::token_source::stored_user_token_source::StoredUserTokenSource;
use crate::token_source::TokenSource;

/// Builds the candidate sources for a current-format config, highest priority first:
/// the host's live credential, then the service account, then the stored user credential.
///
/// Only settings are validated here. No file or network I/O happens until a token is requested.
pub fn candidates(
    config: &ConnectorConfig,
    ambient: Option<Arc<dyn LiveCredential>>,
) -> Result<Vec<Arc<dyn TokenSource>>, Error> {
    let mut sources: Vec<Arc<dyn TokenSource>> = vec![];

    if let Some(credential) = ambient {
        sources.push(Arc::new(AmbientTokenSource::new(credential)));
    }

    if config.has_service_account() {
        let path = config.key_file_path.required("keyFilePath")?;
        let format = config.key_file_format.unwrap_or_else(|| KeyFormat::infer(&path));
        let mut ts = ServiceAccountTokenSource::from_key_file(config.account_email.clone(), path, format, &config.scopes)?;
        if let Some(uri) = &config.token_uri {
            ts = ts.with_token_url(uri);
        }
        if let Some(sub) = &config.subject {
            ts = ts.with_sub(sub);
        }
        sources.push(Arc::new(ts));
    }

    if let Some(stored) = &config.stored_credential {
        let ts = StoredUserTokenSource::new(
            stored.client_id.clone(),
            stored.client_secret.clone(),
            stored.refresh_token.clone(),
            stored.token_uri.clone().or_else(|| config.token_uri.clone()),
        )?;
        sources.push(Arc::new(ts));
    }

    Ok(sources)
}

/// Reads settings saved by older versions: a service account key, or a stored user credential
/// held inline, in a file, or in the application default location.
#[derive(Debug)]
pub struct LegacyConfigLoader {
    config: LegacyConfig,
    registry: ScopeRegistry,
    token_uri: Option<String>,
}

impl LegacyConfigLoader {
    pub fn new(config: LegacyConfig) -> Self {
        Self {
            config,
            registry: ScopeRegistry::default(),
            token_uri: None,
        }
    }

    pub fn with_registry(mut self, registry: ScopeRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_token_uri(mut self, uri: impl Into<String>) -> Self {
        self.token_uri = Some(uri.into());
        self
    }

    fn scopes(&self) -> Result<Vec<String>, Error> {
        let mut scopes = self.config.scopes.clone();
        for scope in self.registry.resolve(&self.config.knime_scopes)? {
            if !scopes.contains(&scope) {
                scopes.push(scope);
            }
        }
        Ok(scopes)
    }

    fn service_account(&self, ts: ServiceAccountTokenSource) -> Arc<dyn TokenSource> {
        match &self.token_uri {
            Some(uri) => Arc::new(ts.with_token_url(uri)),
            None => Arc::new(ts),
        }
    }

    fn from_credentials(&self, cred: &CredentialsFile, scopes: &[String]) -> Result<Arc<dyn TokenSource>, Error> {
        // an endpoint stored in the credentials document wins over the loader's
        let mut cred = cred.clone();
        if cred.token_uri.is_none() {
            cred.token_uri = self.token_uri.clone();
        }
        if cred.tp == SERVICE_ACCOUNT_KEY {
            let key = ServiceAccountKey::from_credentials(&cred)?;
            return Ok(Arc::new(ServiceAccountTokenSource::from_key(key, scopes)?));
        }
        Ok(Arc::new(StoredUserTokenSource::from_credentials(&cred)?))
    }
}

#[async_trait]
impl LegacyLoader for LegacyConfigLoader {
    async fn load(&self) -> Result<Arc<dyn TokenSource>, Error> {
        let scopes = self.scopes()?;
        let config = &self.config;

        if config.service_account_email.is_some() || config.key_file_location.is_some() {
            let path = config.key_file_location.required("key_file_location")?;
            let email = Some(config.service_account_email.required("service_account_email")?);
            let format = KeyFormat::infer(&path);
            let ts = ServiceAccountTokenSource::from_key_file(email, path, format, &scopes)?;
            return Ok(self.service_account(ts));
        }

        let cred = match config.credential_location_type {
            Some(CredentialLocationType::Memory) => {
                CredentialsFile::new_from_str(&config.stored_credential.required("storedCredential")?)?
            }
            Some(CredentialLocationType::Filesystem) => {
                CredentialsFile::new_from_file(config.credential_location.required("credentialLocation")?).await?
            }
            Some(CredentialLocationType::Default) => CredentialsFile::new().await?,
            None => return Err(Error::missing("credentialLocationType")),
        };
        self.from_credentials(&cred, &scopes)
    }
}

/// Creates the resolver for a persisted config. A legacy config has no current-format
/// candidates, so everything goes through the legacy loader.
pub fn create_resolver(
    config: &PersistedConfig,
    ambient: Option<Arc<dyn LiveCredential>>,
) -> Result<CredentialResolver, Error> {
    match config {
        PersistedConfig::Current(config) => Ok(CredentialResolver::new(candidates(config, ambient)?)),
        PersistedConfig::Legacy(config) => {
            let loader = LegacyConfigLoader::new(config.clone());
            let sources = match ambient {
                Some(credential) => vec![Arc::new(AmbientTokenSource::new(credential)) as Arc<dyn TokenSource>],
                None => vec![],
            };
            Ok(CredentialResolver::new(sources).with_legacy(loader))
        }
    }
}

/// Resolves a token for the config once, without keeping the resolver around.
pub async fn resolve_token(config: &PersistedConfig) -> Result<AccessToken, Error> {
    create_resolver(config, None)?.resolve().await
}
