//! Persisted connector settings.
//!
//! Two formats exist: the current one, and the one older connector versions saved. A document
//! either carries an explicit `"format"` tag or is recognised by its field names. Each format
//! has its own (de)serializer in [`current`] and [`legacy`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Error;
use crate::key::KeyFormat;

const FORMAT_KEY: &str = "format";
const CURRENT: &str = "current";
const LEGACY: &str = "legacy";

const LEGACY_KEYS: [&str; 5] = [
    "service_account_email",
    "key_file_location",
    "credentialLocationType",
    "credentialLocation",
    "knimeScopes",
];

/// Settings written by the current connector version.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectorConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_file_path: Option<String>,
    /// Inferred from the key file extension when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_file_format: Option<KeyFormat>,
    #[serde(default)]
    pub scopes: Vec<String>,
    /// Domain-wide delegation subject for service accounts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stored_credential: Option<StoredCredential>,
}

impl ConnectorConfig {
    pub fn has_service_account(&self) -> bool {
        self.account_email.is_some() || self.key_file_path.is_some()
    }

    pub fn with_service_account(mut self, email: impl Into<String>, key_file_path: impl Into<String>) -> Self {
        self.account_email = Some(email.into());
        self.key_file_path = Some(key_file_path.into());
        self
    }

    pub fn with_scopes(mut self, scopes: &[&str]) -> Self {
        self.scopes = scopes.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_token_uri(mut self, uri: impl Into<String>) -> Self {
        self.token_uri = Some(uri.into());
        self
    }

    pub fn with_stored_credential(mut self, credential: StoredCredential) -> Self {
        self.stored_credential = Some(credential);
        self
    }
}

/// A refresh token obtained by an interactive OAuth2 login.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredCredential {
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_uri: Option<String>,
}

// Possible sensitive info in debug messages
impl std::fmt::Debug for StoredCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredCredential")
            .field("client_id", &self.client_id)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CredentialLocationType {
    /// Application default credentials.
    Default,
    /// An authorized user JSON file at `credentialLocation`.
    Filesystem,
    /// An authorized user JSON document inlined as `storedCredential`.
    Memory,
}

/// Settings written by older connector versions.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LegacyConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_file_location: Option<String>,
    #[serde(
        rename = "credentialLocationType",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub credential_location_type: Option<CredentialLocationType>,
    #[serde(rename = "storedCredential", default, skip_serializing_if = "Option::is_none")]
    pub stored_credential: Option<String>,
    #[serde(rename = "credentialLocation", default, skip_serializing_if = "Option::is_none")]
    pub credential_location: Option<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
    /// Scope names, see [`ScopeRegistry`](crate::scope::ScopeRegistry).
    #[serde(rename = "knimeScopes", default, skip_serializing_if = "Vec::is_empty")]
    pub knime_scopes: Vec<String>,
}

impl std::fmt::Debug for LegacyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LegacyConfig")
            .field("service_account_email", &self.service_account_email)
            .field("key_file_location", &self.key_file_location)
            .field("credential_location_type", &self.credential_location_type)
            .field("credential_location", &self.credential_location)
            .field("scopes", &self.scopes)
            .field("knime_scopes", &self.knime_scopes)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum PersistedConfig {
    Current(ConnectorConfig),
    Legacy(LegacyConfig),
}

impl PersistedConfig {
    pub fn from_json(json: &str) -> Result<Self, Error> {
        Self::from_value(serde_json::from_str(json).map_err(malformed)?)
    }

    pub async fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, Error> {
        let bytes = tokio::fs::read(path).await?;
        Self::from_value(serde_json::from_slice(&bytes).map_err(malformed)?)
    }

    pub fn from_value(value: Value) -> Result<Self, Error> {
        let mut object = match value {
            Value::Object(object) => object,
            other => return Err(Error::UnsupportedFormat(format!("expected an object, got {}", other))),
        };
        let format = match object.remove(FORMAT_KEY) {
            Some(Value::String(tag)) => tag,
            Some(other) => return Err(Error::UnsupportedFormat(other.to_string())),
            None => detect(&object).to_string(),
        };
        match format.as_str() {
            CURRENT => Ok(PersistedConfig::Current(current::from_object(object)?)),
            LEGACY => Ok(PersistedConfig::Legacy(legacy::from_object(object)?)),
            other => Err(Error::UnsupportedFormat(other.to_string())),
        }
    }

    /// Serializes with an explicit format tag.
    pub fn to_json(&self) -> Result<String, Error> {
        let value = match self {
            PersistedConfig::Current(config) => current::to_value(config)?,
            PersistedConfig::Legacy(config) => legacy::to_value(config)?,
        };
        Ok(serde_json::to_string_pretty(&value)?)
    }
}

fn detect(object: &Map<String, Value>) -> &'static str {
    if LEGACY_KEYS.iter().any(|key| object.contains_key(*key)) {
        LEGACY
    } else {
        CURRENT
    }
}

fn malformed(e: serde_json::Error) -> Error {
    Error::UnsupportedFormat(format!("malformed configuration: {}", e))
}

fn tagged(value: Value, tag: &str) -> Value {
    match value {
        Value::Object(mut object) => {
            object.insert(FORMAT_KEY.to_string(), Value::String(tag.to_string()));
            Value::Object(object)
        }
        other => other,
    }
}

pub mod current {
    use super::*;

    pub fn from_object(object: Map<String, Value>) -> Result<ConnectorConfig, Error> {
        serde_json::from_value(Value::Object(object)).map_err(malformed)
    }

    pub fn to_value(config: &ConnectorConfig) -> Result<Value, Error> {
        Ok(tagged(serde_json::to_value(config)?, CURRENT))
    }
}

pub mod legacy {
    use super::*;

    pub fn from_object(object: Map<String, Value>) -> Result<LegacyConfig, Error> {
        serde_json::from_value(Value::Object(object)).map_err(malformed)
    }

    pub fn to_value(config: &LegacyConfig) -> Result<Value, Error> {
        Ok(tagged(serde_json::to_value(config)?, LEGACY))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_current() {
        let config = PersistedConfig::from_json(
            r#"{
                "accountEmail": "sa@project.iam.gserviceaccount.com",
                "keyFilePath": "/keys/sa.p12",
                "scopes": ["https://www.googleapis.com/auth/bigquery"]
            }"#,
        )
        .unwrap();
        match config {
            PersistedConfig::Current(c) => {
                assert_eq!(Some("/keys/sa.p12".to_string()), c.key_file_path);
                assert!(c.key_file_format.is_none());
                assert!(c.has_service_account());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_detect_legacy_service_account() {
        let config = PersistedConfig::from_json(
            r#"{
                "service_account_email": "sa@project.iam.gserviceaccount.com",
                "key_file_location": "/keys/sa.p12",
                "scopes": ["https://www.googleapis.com/auth/drive"]
            }"#,
        )
        .unwrap();
        match config {
            PersistedConfig::Legacy(c) => {
                assert_eq!(Some("sa@project.iam.gserviceaccount.com".to_string()), c.service_account_email);
                assert!(c.credential_location_type.is_none());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_detect_legacy_user() {
        let config = PersistedConfig::from_json(
            r#"{
                "credentialLocationType": "MEMORY",
                "storedCredential": "{\"type\":\"authorized_user\"}",
                "knimeScopes": ["Sheets"]
            }"#,
        )
        .unwrap();
        match config {
            PersistedConfig::Legacy(c) => {
                assert_eq!(Some(CredentialLocationType::Memory), c.credential_location_type);
                assert_eq!(vec!["Sheets".to_string()], c.knime_scopes);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_explicit_tag_wins() {
        let config = PersistedConfig::from_json(r#"{"format": "legacy", "scopes": []}"#).unwrap();
        assert!(matches!(config, PersistedConfig::Legacy(_)));

        let err = PersistedConfig::from_json(r#"{"format": "v0"}"#).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(_)));
        assert!(err.is_configuration());

        assert!(PersistedConfig::from_json("[]").is_err());
    }

    #[test]
    fn test_malformed_document_is_configuration_error() {
        for json in ["{", r#"{"scopes": "bigquery"}"#, r#"{"credentialLocationType": "CLOUD"}"#] {
            let err = PersistedConfig::from_json(json).unwrap_err();
            assert!(matches!(err, Error::UnsupportedFormat(_)), "{}: {:?}", json, err);
            assert!(err.is_configuration(), "{}", json);
        }
    }

    #[test]
    fn test_to_json_keeps_format() {
        let current = PersistedConfig::Current(
            ConnectorConfig::default()
                .with_service_account("sa@project.iam.gserviceaccount.com", "/keys/sa.json")
                .with_scopes(&["https://www.googleapis.com/auth/bigquery"])
                .with_stored_credential(StoredCredential {
                    client_id: Some("id".to_string()),
                    client_secret: Some("secret".to_string()),
                    refresh_token: Some("refresh".to_string()),
                    token_uri: None,
                }),
        );
        let json = current.to_json().unwrap();
        assert!(json.contains(r#""format": "current""#));
        assert!(json.contains(r#""keyFilePath": "/keys/sa.json""#));
        assert_eq!(current, PersistedConfig::from_json(&json).unwrap());

        let legacy = PersistedConfig::Legacy(LegacyConfig {
            credential_location_type: Some(CredentialLocationType::Filesystem),
            credential_location: Some("/home/user/.credentials/user.json".to_string()),
            knime_scopes: vec!["Drive".to_string()],
            ..Default::default()
        });
        let json = legacy.to_json().unwrap();
        assert!(json.contains(r#""credentialLocationType": "FILESYSTEM""#));
        assert_eq!(legacy, PersistedConfig::from_json(&json).unwrap());
    }

    #[test]
    fn test_stored_credential_debug_hides_secrets() {
        let credential = StoredCredential {
            client_id: Some("id".to_string()),
            client_secret: Some("very-secret".to_string()),
            refresh_token: Some("refresh-secret".to_string()),
            token_uri: None,
        };
        let printed = format!("{:?}", credential);
        assert!(!printed.contains("very-secret"));
        assert!(!printed.contains("refresh-secret"));
    }
}
