use base64::prelude::*;
use serde::Deserialize;
use tokio::fs;

use crate::error::Error;

const CREDENTIALS_FILE: &str = "application_default_credentials.json";

pub(crate) const SERVICE_ACCOUNT_KEY: &str = "service_account";
pub(crate) const USER_CREDENTIALS_KEY: &str = "authorized_user";

/// A Google credentials JSON document: either a service account key or an authorized user
/// (the format `gcloud auth application-default login` writes).
#[derive(Deserialize, Clone, PartialEq)]
#[cfg_attr(test, derive(Debug))]
pub struct CredentialsFile {
    #[serde(rename(deserialize = "type"))]
    pub tp: String,

    // Service Account fields
    pub client_email: Option<String>,
    pub private_key_id: Option<String>,
    pub private_key: Option<String>,
    pub token_uri: Option<String>,
    pub project_id: Option<String>,

    // User Credential fields
    pub client_secret: Option<String>,
    pub client_id: Option<String>,
    pub refresh_token: Option<String>,

    pub quota_project_id: Option<String>,
}

impl CredentialsFile {
    /// Application default credentials: `GOOGLE_APPLICATION_CREDENTIALS_JSON` (plain or base64),
    /// then the file named by `GOOGLE_APPLICATION_CREDENTIALS`, then the gcloud well-known file.
    pub async fn new() -> Result<Self, Error> {
        let credentials_json = {
            if let Some(credentials) = Self::json_from_env() {
                credentials
            } else {
                Self::json_from_file().await?
            }
        };

        Ok(serde_json::from_slice(credentials_json.as_slice())?)
    }

    pub async fn new_from_file(filepath: impl AsRef<std::path::Path>) -> Result<Self, Error> {
        let credentials_json = fs::read(filepath).await.map_err(Error::CredentialsIOError)?;
        Ok(serde_json::from_slice(credentials_json.as_slice())?)
    }

    pub fn new_from_str(str: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(str)?)
    }

    fn json_from_env() -> Option<Vec<u8>> {
        let credentials = std::env::var("GOOGLE_APPLICATION_CREDENTIALS_JSON")
            .ok()
            .map(Vec::<u8>::from)?;

        match BASE64_STANDARD.decode(&credentials) {
            Ok(decoded) => Some(decoded),
            Err(_) => Some(credentials),
        }
    }

    async fn json_from_file() -> Result<Vec<u8>, Error> {
        let path = match std::env::var("GOOGLE_APPLICATION_CREDENTIALS") {
            Ok(s) => std::path::Path::new(s.as_str()).to_path_buf(),
            Err(_e) => {
                // get well known file name
                if cfg!(target_os = "windows") {
                    let app_data = std::env::var("APPDATA").map_err(|_| Error::NoHomeDirectoryFound)?;
                    std::path::Path::new(app_data.as_str())
                        .join("gcloud")
                        .join(CREDENTIALS_FILE)
                } else {
                    match home::home_dir() {
                        Some(s) => s.join(".config").join("gcloud").join(CREDENTIALS_FILE),
                        None => return Err(Error::NoHomeDirectoryFound),
                    }
                }
            }
        };

        fs::read(path).await.map_err(Error::CredentialsIOError)
    }
}
