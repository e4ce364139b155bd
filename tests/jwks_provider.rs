//! Remote key-set provider against a mock identity provider.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use url::Url;
use wiremock::matchers::{headers, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use edge_gate::auth::jwks::{KeySetError, KeySetProvider, RemoteKeySetProvider};
use edge_gate::auth::{TokenVerifier, VerificationTarget, VerifyError};
use edge_gate::config::JwksConfig;

mod common;
use common::*;

fn jwks_config(min_refresh_interval_secs: u64) -> JwksConfig {
    JwksConfig {
        cache_ttl_secs: 300,
        max_cached_issuers: 16,
        fetch_timeout_secs: 5,
        min_refresh_interval_secs,
    }
}

fn keys_url(server: &MockServer) -> Url {
    Url::parse(&format!("{}/keys", server.uri())).unwrap()
}

fn key_set_body(keys: Vec<jsonwebtoken::jwk::Jwk>) -> serde_json::Value {
    serde_json::to_value(jwk_set(keys)).unwrap()
}

fn verifier_for(server: &MockServer, provider: RemoteKeySetProvider) -> TokenVerifier {
    TokenVerifier::new(
        Arc::new(provider),
        VerificationTarget {
            jwks_url: keys_url(server),
            issuer: ISSUER.to_string(),
            audience: AUDIENCE.to_string(),
        },
        vec![jsonwebtoken::Algorithm::RS256],
        Duration::from_secs(5),
    )
}

#[tokio::test]
async fn test_concurrent_misses_share_one_fetch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/keys"))
        .and(headers("accept", vec!["application/json", "application/jwk-set+json"]))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(key_set_body(vec![signing_jwk()]))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let provider = Arc::new(RemoteKeySetProvider::new(&jwks_config(30)).unwrap());
    let url = keys_url(&server);

    let tasks: Vec<_> = (0..10)
        .map(|_| {
            let provider = Arc::clone(&provider);
            let url = url.clone();
            tokio::spawn(async move { provider.key_set(&url).await })
        })
        .collect();

    for task in tasks {
        let key_set = task.await.unwrap().unwrap();
        assert!(key_set.find(SIGNING_KID).is_some());
    }

    // Served from cache afterwards.
    provider.key_set(&url).await.unwrap();
}

#[tokio::test]
async fn test_error_responses_are_not_cached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/keys"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/keys"))
        .respond_with(ResponseTemplate::new(200).set_body_json(key_set_body(vec![signing_jwk()])))
        .expect(1)
        .mount(&server)
        .await;

    let provider = RemoteKeySetProvider::new(&jwks_config(30)).unwrap();
    let url = keys_url(&server);

    let err = provider.key_set(&url).await.unwrap_err();
    assert!(matches!(*err, KeySetError::Status { .. }));

    let key_set = provider.key_set(&url).await.unwrap();
    assert_eq!(key_set.keys.len(), 1);
}

#[tokio::test]
async fn test_invalid_body_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/keys"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "not": "a key set" })))
        .mount(&server)
        .await;

    let provider = RemoteKeySetProvider::new(&jwks_config(30)).unwrap();
    let err = provider.key_set(&keys_url(&server)).await.unwrap_err();
    assert!(matches!(*err, KeySetError::Decode { .. }));
}

#[tokio::test]
async fn test_entries_expire_after_ttl() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/keys"))
        .respond_with(ResponseTemplate::new(200).set_body_json(key_set_body(vec![signing_jwk()])))
        .expect(2)
        .mount(&server)
        .await;

    let mut config = jwks_config(30);
    config.cache_ttl_secs = 1;
    let provider = RemoteKeySetProvider::new(&config).unwrap();
    let url = keys_url(&server);

    provider.key_set(&url).await.unwrap();
    provider.key_set(&url).await.unwrap();
    tokio::time::sleep(Duration::from_millis(1500)).await;
    provider.key_set(&url).await.unwrap();
}

#[tokio::test]
async fn test_unknown_kid_triggers_refetch() {
    let server = MockServer::start().await;
    // Before rotation only the old key is published.
    Mock::given(method("GET"))
        .and(path("/keys"))
        .respond_with(ResponseTemplate::new(200).set_body_json(key_set_body(vec![rogue_jwk()])))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/keys"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(key_set_body(vec![rogue_jwk(), signing_jwk()])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let provider = RemoteKeySetProvider::new(&jwks_config(0)).unwrap();
    let verifier = verifier_for(&server, provider);

    let token = mint(&claims("user|1", &["read:api"]));
    let claims = verifier.verify(&token).await.unwrap();
    assert_eq!(claims.sub.as_deref(), Some("user|1"));

    // The refreshed set is cached.
    verifier.verify(&token).await.unwrap();
}

#[tokio::test]
async fn test_forced_refetch_is_rate_limited() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/keys"))
        .respond_with(ResponseTemplate::new(200).set_body_json(key_set_body(vec![rogue_jwk()])))
        .expect(2)
        .mount(&server)
        .await;

    let provider = RemoteKeySetProvider::new(&jwks_config(3600)).unwrap();
    let verifier = verifier_for(&server, provider);
    let token = mint(&claims("user|1", &["read:api"]));

    for _ in 0..3 {
        assert!(matches!(
            verifier.verify(&token).await,
            Err(VerifyError::UnknownKid { .. })
        ));
    }
}

#[tokio::test]
async fn test_unreachable_provider_denies() {
    // A port nothing listens on.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let url = Url::parse(&format!("http://{}/keys", listener.local_addr().unwrap())).unwrap();
    drop(listener);

    let provider = RemoteKeySetProvider::new(&jwks_config(30)).unwrap();
    let err = provider.key_set(&url).await.unwrap_err();
    assert!(matches!(*err, KeySetError::Request { .. }));
}
