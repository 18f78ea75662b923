//! Integration tests for the blob gateway and API client against a mock
//! HTTP server.

use eauth_cloud::{BackupApiClient, BackupConfig, BlobGateway, BlobKey, CloudError};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config(server: &MockServer) -> BackupConfig {
    BackupConfig {
        api_base_url: server.uri(),
        blob_base_url: server.uri(),
        blob_prefix: "eauth".to_string(),
        sync_interval: Duration::from_secs(30),
        request_timeout: Duration::from_secs(5),
    }
}

fn gateway(server: &MockServer) -> (BlobGateway, Arc<BackupApiClient>) {
    let config = test_config(server);
    let api = Arc::new(BackupApiClient::new(config.clone()));
    (BlobGateway::new(config, api.clone()), api)
}

// --- Uploads ---

#[tokio::test]
async fn put_blob_posts_through_the_api() {
    let server = MockServer::start().await;
    let (gateway, _) = gateway(&server);

    Mock::given(method("POST"))
        .and(path("/api/user-backup"))
        .and(body_json(json!({ "userId": "u1", "data": "{\"authCodes\":[]}" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "url": "https://blob.example/eauth/u1.json",
            "success": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let key = BlobKey::for_user("u1");
    let url = gateway
        .put_blob(&key, "{\"authCodes\":[]}")
        .await
        .unwrap();
    assert_eq!(url, "https://blob.example/eauth/u1.json");
}

#[tokio::test]
async fn put_blob_replaces_an_existing_blob() {
    let server = MockServer::start().await;
    let (gateway, _) = gateway(&server);

    Mock::given(method("POST"))
        .and(path("/api/user-backup"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "url": "https://blob.example/eauth/u1.json",
            "success": true
        })))
        .expect(2)
        .mount(&server)
        .await;

    let key = BlobKey::for_user("u1");
    let first = gateway.put_blob(&key, "{\"authCodes\":[]}").await.unwrap();
    let second = gateway.put_blob(&key, "{\"authCodes\":[]}").await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn put_blob_sends_the_auth_token_when_signed_in() {
    let server = MockServer::start().await;
    let (gateway, api) = gateway(&server);
    api.set_session("u1".to_string(), "token-1".to_string()).await;

    Mock::given(method("POST"))
        .and(path("/api/user-backup"))
        .and(header("x-auth-token", "token-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "url": "https://blob.example/eauth/u1.json",
            "success": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let key = BlobKey::for_user("u1");
    gateway.put_blob(&key, "{}").await.unwrap();
}

#[tokio::test]
async fn put_blob_rejected_upload_is_an_error() {
    let server = MockServer::start().await;
    let (gateway, _) = gateway(&server);

    Mock::given(method("POST"))
        .and(path("/api/user-backup"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "url": "", "success": false })),
        )
        .mount(&server)
        .await;

    let key = BlobKey::for_user("u1");
    let err = gateway.put_blob(&key, "{}").await.unwrap_err();
    assert!(matches!(err, CloudError::Api(_)));
}

#[tokio::test]
async fn put_blob_server_error_is_an_error() {
    let server = MockServer::start().await;
    let (gateway, _) = gateway(&server);

    Mock::given(method("POST"))
        .and(path("/api/user-backup"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let key = BlobKey::for_user("u1");
    let err = gateway.put_blob(&key, "{}").await.unwrap_err();
    assert!(matches!(err, CloudError::Api(_)));
}

// --- Existence probes ---

#[tokio::test]
async fn blob_exists_prefers_the_direct_probe() {
    let server = MockServer::start().await;
    let (gateway, _) = gateway(&server);

    Mock::given(method("HEAD"))
        .and(path("/eauth/u1.json"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/user-check"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "exists": false })))
        .expect(0)
        .mount(&server)
        .await;

    let key = BlobKey::for_user("u1");
    let probe = gateway.blob_exists(&key).await.unwrap();
    assert!(probe.exists);
    assert_eq!(probe.url, Some(format!("{}/eauth/u1.json", server.uri())));
}

#[tokio::test]
async fn blob_exists_falls_back_to_the_api() {
    let server = MockServer::start().await;
    let (gateway, _) = gateway(&server);

    Mock::given(method("HEAD"))
        .and(path("/eauth/u1.json"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/user-check"))
        .and(query_param("userId", "u1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "exists": true,
            "url": "https://blob.example/eauth/u1.json"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let key = BlobKey::for_user("u1");
    let probe = gateway.blob_exists(&key).await.unwrap();
    assert!(probe.exists);
    assert_eq!(probe.url.as_deref(), Some("https://blob.example/eauth/u1.json"));
}

// --- Downloads ---

#[tokio::test]
async fn get_blob_prefers_the_direct_fetch() {
    let server = MockServer::start().await;
    let (gateway, _) = gateway(&server);

    Mock::given(method("GET"))
        .and(path("/eauth/u1.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("snapshot-body"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/user-import"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let key = BlobKey::for_user("u1");
    let body = gateway.get_blob(&key).await.unwrap();
    assert_eq!(body, "snapshot-body");
}

#[tokio::test]
async fn get_blob_falls_back_to_the_api_import() {
    let server = MockServer::start().await;
    let (gateway, _) = gateway(&server);

    Mock::given(method("GET"))
        .and(path("/eauth/u1.json"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/user-import"))
        .and(query_param("userId", "u1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": "from-api",
            "success": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let key = BlobKey::for_user("u1");
    let body = gateway.get_blob(&key).await.unwrap();
    assert_eq!(body, "from-api");
}

#[tokio::test]
async fn get_blob_missing_everywhere_is_not_found() {
    let server = MockServer::start().await;
    let (gateway, _) = gateway(&server);

    Mock::given(method("GET"))
        .and(path("/eauth/u1.json"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/user-import"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let key = BlobKey::for_user("u1");
    match gateway.get_blob(&key).await {
        Err(CloudError::NotFound(id)) => assert_eq!(id, "u1"),
        other => panic!("expected NotFound, got {other:?}"),
    }
}

#[tokio::test]
async fn get_blob_rejected_import_is_an_error() {
    let server = MockServer::start().await;
    let (gateway, _) = gateway(&server);

    Mock::given(method("GET"))
        .and(path("/eauth/u1.json"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/user-import"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "data": "", "success": false })),
        )
        .mount(&server)
        .await;

    let key = BlobKey::for_user("u1");
    let err = gateway.get_blob(&key).await.unwrap_err();
    assert!(matches!(err, CloudError::Api(_)));
}

#[tokio::test]
async fn direct_requests_carry_a_cache_buster() {
    let server = MockServer::start().await;
    let (gateway, _) = gateway(&server);

    Mock::given(method("GET"))
        .and(path("/eauth/u1.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("body"))
        .mount(&server)
        .await;

    let key = BlobKey::for_user("u1");
    gateway.get_blob(&key).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert!(requests
        .iter()
        .any(|r| r.url.query_pairs().any(|(k, _)| k == "t")));
}

// --- Check, backup, check ---

#[tokio::test]
async fn backup_becomes_visible_to_a_later_check() {
    let server = MockServer::start().await;
    let (gateway, _) = gateway(&server);

    Mock::given(method("HEAD"))
        .and(path("/eauth/u1.json"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/user-check"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "exists": false })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/user-backup"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "url": "https://blob.example/eauth/u1.json",
            "success": true
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/user-check"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "exists": true,
            "url": "https://blob.example/eauth/u1.json"
        })))
        .mount(&server)
        .await;

    let key = BlobKey::for_user("u1");

    let before = gateway.blob_exists(&key).await.unwrap();
    assert!(!before.exists);

    let url = gateway.put_blob(&key, "{\"authCodes\":[]}").await.unwrap();
    assert!(!url.is_empty());

    let after = gateway.blob_exists(&key).await.unwrap();
    assert!(after.exists);
    assert_eq!(after.url.as_deref(), Some("https://blob.example/eauth/u1.json"));
}
