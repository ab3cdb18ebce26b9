use std::io::Write;

use serde_json::json;
use time::OffsetDateTime;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use gconnector_auth::config::{ConnectorConfig, CredentialLocationType, LegacyConfig, PersistedConfig, StoredCredential};
use gconnector_auth::error::Error;
use gconnector_auth::provider::LegacyConfigLoader;
use gconnector_auth::resolver::{CredentialResolver, LegacyLoader};
use gconnector_auth::resolve_token;

const PEM: &str = include_str!("../testdata/service_account_key.pem");
const SCOPE: &str = "https://www.googleapis.com/auth/bigquery";
const EMAIL: &str = "connector@fake-project.iam.gserviceaccount.com";

#[ctor::ctor]
fn init() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn p12_path() -> String {
    format!("{}/testdata/service_account.p12", env!("CARGO_MANIFEST_DIR"))
}

fn json_key(token_uri: &str) -> String {
    json!({
        "type": "service_account",
        "project_id": "fake-project",
        "private_key_id": "fake_private_key_id",
        "private_key": PEM,
        "client_email": EMAIL,
        "token_uri": token_uri,
    })
    .to_string()
}

fn write_temp(dir: &tempfile::TempDir, name: &str, content: &str) -> String {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).expect("Cannot create temporary file");
    file.write_all(content.as_bytes()).expect("Cannot write content to file");
    path.to_string_lossy().to_string()
}

async fn token_endpoint(grant: &str, expect: u64) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains(grant))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "ya29.fake-access-token",
            "token_type": "Bearer",
            "expires_in": 3599
        })))
        .expect(expect)
        .mount(&server)
        .await;
    server
}

fn assert_usable(token: &gconnector_auth::token::AccessToken) {
    assert!(!token.access_token.is_empty());
    assert_eq!("Bearer", token.token_type);
    assert!(token.expiry.expect("expiry") > OffsetDateTime::now_utc());
}

#[tokio::test]
async fn test_service_account_json_key() {
    let server = token_endpoint("grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Ajwt-bearer", 1).await;
    let dir = tempfile::tempdir().unwrap();
    let key = write_temp(&dir, "key.json", &json_key(&format!("{}/token", server.uri())));

    let config = PersistedConfig::Current(ConnectorConfig {
        key_file_path: Some(key),
        scopes: vec![SCOPE.to_string()],
        ..Default::default()
    });
    let token = resolve_token(&config).await.unwrap();
    assert_usable(&token);
    assert_eq!("ya29.fake-access-token", token.access_token);
}

#[tokio::test]
async fn test_service_account_p12_key() {
    let server = token_endpoint("assertion=", 1).await;
    let config = PersistedConfig::Current(
        ConnectorConfig::default()
            .with_service_account(EMAIL, p12_path())
            .with_scopes(&[SCOPE])
            .with_token_uri(format!("{}/token", server.uri())),
    );
    assert_usable(&resolve_token(&config).await.unwrap());
}

#[tokio::test]
async fn test_stored_user_credential() {
    let server = token_endpoint("grant_type=refresh_token", 1).await;
    let config = PersistedConfig::Current(
        ConnectorConfig::default()
            .with_token_uri(format!("{}/token", server.uri()))
            .with_stored_credential(StoredCredential {
                client_id: Some("client.apps.googleusercontent.com".to_string()),
                client_secret: Some("client-secret".to_string()),
                refresh_token: Some("1//refresh".to_string()),
                token_uri: None,
            }),
    );
    let resolver = gconnector_auth::create_resolver(&config, None).unwrap();
    assert_usable(&resolver.resolve().await.unwrap());
    // the access token is cached by the source, the endpoint is hit once
    assert_usable(&resolver.resolve().await.unwrap());
}

#[tokio::test]
async fn test_missing_field_never_touches_network() {
    let server = token_endpoint("grant_type", 0).await;
    let config = PersistedConfig::from_json(
        &json!({
            "accountEmail": EMAIL,
            "scopes": [SCOPE],
            "tokenUri": format!("{}/token", server.uri()),
        })
        .to_string(),
    )
    .unwrap();

    match resolve_token(&config).await {
        Err(Error::Configuration { field, .. }) => assert_eq!("keyFilePath", field),
        other => panic!("unexpected {:?}", other),
    }
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_rejected_credentials_are_not_configuration_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Invalid JWT Signature."
        })))
        .expect(1)
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();
    let key = write_temp(&dir, "key.json", &json_key(&format!("{}/token", server.uri())));

    let config = PersistedConfig::Current(ConnectorConfig {
        key_file_path: Some(key),
        scopes: vec![SCOPE.to_string()],
        ..Default::default()
    });
    let err = resolve_token(&config).await.unwrap_err();
    assert!(!err.is_configuration());
    match err {
        Error::Resolution(e) => match &e.attempts[0].error {
            Error::TokenErrorResponse { status, error, .. } => {
                assert_eq!(400, *status);
                assert_eq!("invalid_grant", error.as_str());
            }
            other => panic!("unexpected {:?}", other),
        },
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn test_legacy_stored_credential_in_memory() {
    let server = token_endpoint("grant_type=refresh_token", 1).await;
    let stored = json!({
        "type": "authorized_user",
        "client_id": "client.apps.googleusercontent.com",
        "client_secret": "client-secret",
        "refresh_token": "1//refresh",
        "token_uri": format!("{}/token", server.uri()),
    })
    .to_string();
    let config = PersistedConfig::from_json(
        &json!({
            "credentialLocationType": "MEMORY",
            "storedCredential": stored,
            "knimeScopes": ["Sheets", "Drive"],
        })
        .to_string(),
    )
    .unwrap();
    assert!(matches!(config, PersistedConfig::Legacy(_)));
    assert_usable(&resolve_token(&config).await.unwrap());
}

#[tokio::test]
async fn test_legacy_service_account_json_key() {
    let server = token_endpoint("assertion=", 1).await;
    let dir = tempfile::tempdir().unwrap();
    let key = write_temp(&dir, "legacy.json", &json_key(&format!("{}/token", server.uri())));
    let config = PersistedConfig::from_json(
        &json!({
            "service_account_email": EMAIL,
            "key_file_location": key,
            "scopes": [SCOPE],
        })
        .to_string(),
    )
    .unwrap();
    assert_usable(&resolve_token(&config).await.unwrap());
}

#[tokio::test]
async fn test_legacy_loader_p12_with_token_uri() {
    let server = token_endpoint("assertion=", 1).await;
    let loader = LegacyConfigLoader::new(LegacyConfig {
        service_account_email: Some(EMAIL.to_string()),
        key_file_location: Some(p12_path()),
        knime_scopes: vec!["BigQuery".to_string()],
        ..Default::default()
    })
    .with_token_uri(format!("{}/token", server.uri()));
    assert!(loader.load().await.is_ok());

    let resolver = CredentialResolver::new(vec![]).with_legacy(loader);
    assert_usable(&resolver.resolve().await.unwrap());
}

#[tokio::test]
async fn test_legacy_credential_file() {
    let server = token_endpoint("grant_type=refresh_token", 1).await;
    let dir = tempfile::tempdir().unwrap();
    let stored = write_temp(
        &dir,
        "user.json",
        &json!({
            "type": "authorized_user",
            "client_id": "client.apps.googleusercontent.com",
            "client_secret": "client-secret",
            "refresh_token": "1//refresh",
            "token_uri": format!("{}/token", server.uri()),
        })
        .to_string(),
    );
    let config = PersistedConfig::Legacy(LegacyConfig {
        credential_location_type: Some(CredentialLocationType::Filesystem),
        credential_location: Some(stored),
        knime_scopes: vec!["Drive".to_string()],
        ..Default::default()
    });
    assert_usable(&resolve_token(&config).await.unwrap());
}
