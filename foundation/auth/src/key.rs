use std::fmt::{Debug, Formatter};
use std::path::Path;

use jsonwebtoken::EncodingKey;

use crate::credentials::{CredentialsFile, SERVICE_ACCOUNT_KEY};
use crate::error::Error;

/// Alias Google tooling gives the key inside exported `.p12` service account keys.
pub const P12_KEY_ALIAS: &str = "privatekey";
/// Store and key password of exported `.p12` service account keys. Not a secret.
pub const P12_PASSWORD: &str = "notasecret";

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyFormat {
    P12,
    Json,
}

impl KeyFormat {
    /// `.p12` files are PKCS#12 containers, everything else is read as a JSON key.
    pub fn infer(path: &str) -> KeyFormat {
        let is_p12 = Path::new(path)
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("p12"))
            .unwrap_or(false);
        if is_p12 {
            KeyFormat::P12
        } else {
            KeyFormat::Json
        }
    }
}

/// Signing material of a service account, whichever file format it came from.
#[derive(Clone)]
pub struct ServiceAccountKey {
    pub email: Option<String>,
    pub key_id: Option<String>,
    pub token_uri: Option<String>,
    pub(crate) pk: EncodingKey,
}

impl Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        // EncodingKey does not implement Debug
        f.debug_struct("ServiceAccountKey")
            .field("email", &self.email)
            .field("key_id", &self.key_id)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

impl ServiceAccountKey {
    pub async fn from_file(path: &str, format: KeyFormat) -> Result<Self, Error> {
        let bytes = tokio::fs::read(path).await.map_err(|source| Error::KeyFileIOError {
            path: path.to_string(),
            source,
        })?;
        match format {
            KeyFormat::P12 => Self::from_p12(&bytes),
            KeyFormat::Json => Self::from_credentials(&serde_json::from_slice(&bytes)?),
        }
    }

    pub fn from_credentials(cred: &CredentialsFile) -> Result<Self, Error> {
        if cred.tp != SERVICE_ACCOUNT_KEY {
            return Err(Error::UnsupportedAccountType(cred.tp.clone()));
        }
        let pk = match cred.private_key.as_ref() {
            Some(key) => EncodingKey::from_rsa_pem(key.as_bytes())?,
            None => return Err(Error::NoPrivateKeyFound),
        };
        Ok(Self {
            email: cred.client_email.clone(),
            key_id: cred.private_key_id.clone(),
            token_uri: cred.token_uri.clone(),
            pk,
        })
    }

    /// Opens a PKCS#12 container with the fixed alias and password Google uses for exported keys.
    pub fn from_p12(der: &[u8]) -> Result<Self, Error> {
        let pfx = p12::PFX::parse(der).map_err(|e| Error::InvalidPkcs12(format!("{:?}", e)))?;
        if !pfx.verify_mac(P12_PASSWORD) {
            return Err(Error::InvalidPkcs12("integrity check failed, wrong password".to_string()));
        }
        let bags = pfx
            .bags(P12_PASSWORD)
            .map_err(|e| Error::InvalidPkcs12(format!("{:?}", e)))?;
        let bag = bags
            .iter()
            .find(|bag| bag.friendly_name().as_deref() == Some(P12_KEY_ALIAS))
            .ok_or_else(|| Error::KeyAliasNotFound(P12_KEY_ALIAS.to_string()))?;
        let pkcs8_der = bag.bag.get_key(&bmp_password(P12_PASSWORD)).ok_or(Error::NoPrivateKeyFound)?;
        let info = pkcs8::PrivateKeyInfo::try_from(pkcs8_der.as_slice())
            .map_err(|e| Error::InvalidPkcs12(e.to_string()))?;

        Ok(Self {
            email: None,
            key_id: None,
            token_uri: None,
            pk: EncodingKey::from_rsa_der(info.private_key),
        })
    }
}

/// PKCS#12 key bags are encrypted with the password as a NUL-terminated big-endian UTF-16 string.
fn bmp_password(password: &str) -> Vec<u8> {
    let mut bytes: Vec<u8> = password.encode_utf16().flat_map(u16::to_be_bytes).collect();
    bytes.extend_from_slice(&[0, 0]);
    bytes
}
