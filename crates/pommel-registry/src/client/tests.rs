//! Unit tests for the repository client

use super::*;

use pommel_core::utils::path_to_file_url;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_client() -> RepositoryClient {
    RepositoryClient::with_config(ClientConfig {
        timeout: Duration::from_secs(5),
        retry: RetryConfig {
            max_retries: 2,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            multiplier: 2.0,
        },
        ..ClientConfig::default()
    })
    .unwrap()
}

#[tokio::test]
async fn test_client_creation() {
    let client = RepositoryClient::new().unwrap();
    assert_eq!(client.retry_config().max_retries, 3);
}

#[test]
fn test_retry_config_default() {
    let config = RetryConfig::default();
    assert_eq!(config.max_retries, 3);
    assert_eq!(config.initial_delay, Duration::from_millis(100));
    assert_eq!(config.max_delay, Duration::from_secs(10));
    assert_eq!(config.multiplier, 2.0);
}

#[test]
fn test_credential_headers() {
    let basic = Credentials::Basic {
        username: "user".to_string(),
        password: "pass".to_string(),
    };
    assert_eq!(basic.header_value().unwrap().to_str().unwrap(), "Basic dXNlcjpwYXNz");

    let bearer = Credentials::Bearer {
        token: "abc".to_string(),
    };
    assert_eq!(bearer.header_value().unwrap().to_str().unwrap(), "Bearer abc");

    let source = StaticCredentials::new().with("corp", bearer.clone());
    assert_eq!(source.credentials("corp"), Some(bearer));
    assert_eq!(source.credentials("central"), None);
}

#[tokio::test]
async fn test_get_found() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repo/com/example/lib/1.0/lib-1.0.pom"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<project/>"))
        .mount(&mock_server)
        .await;

    let repository = RepositoryDescriptor::new("mock", format!("{}/repo", mock_server.uri()));
    let response = fast_client()
        .get(&repository, "com/example/lib/1.0/lib-1.0.pom")
        .await
        .unwrap();
    assert_eq!(response, FetchResponse::Found(b"<project/>".to_vec()));
}

#[tokio::test]
async fn test_get_not_found_is_not_retried() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    let repository = RepositoryDescriptor::new("mock", mock_server.uri());
    let response = fast_client().get(&repository, "missing.pom").await.unwrap();
    assert_eq!(response, FetchResponse::NotFound { status: Some(404) });
}

#[tokio::test]
async fn test_get_rejected() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&mock_server)
        .await;

    let repository = RepositoryDescriptor::new("mock", mock_server.uri());
    let response = fast_client().get(&repository, "secret.pom").await.unwrap();
    assert_eq!(response, FetchResponse::Rejected { status: 401 });
}

#[tokio::test]
async fn test_server_errors_are_retried() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&mock_server)
        .await;

    let repository = RepositoryDescriptor::new("mock", mock_server.uri());
    let result = fast_client().get(&repository, "flaky.pom").await;
    assert!(matches!(result, Err(PommelError::Network { .. })));
}

#[tokio::test]
async fn test_authorization_header_sent() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("Authorization", "Bearer s3cret"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&mock_server)
        .await;

    let credentials = StaticCredentials::new().with(
        "corp",
        Credentials::Bearer {
            token: "s3cret".to_string(),
        },
    );
    let client = fast_client().with_credentials(Arc::new(credentials));

    let corp = RepositoryDescriptor::new("corp", mock_server.uri());
    assert_eq!(
        client.get(&corp, "a.pom").await.unwrap(),
        FetchResponse::Found(b"ok".to_vec())
    );

    // Other repositories get no credentials and hit no matching mock
    let other = RepositoryDescriptor::new("other", mock_server.uri());
    assert_eq!(
        client.get(&other, "a.pom").await.unwrap(),
        FetchResponse::NotFound { status: Some(404) }
    );
}

#[tokio::test]
async fn test_unreachable_repository_errors() {
    let client = RepositoryClient::with_config(ClientConfig {
        timeout: Duration::from_secs(2),
        retry: RetryConfig {
            max_retries: 0,
            ..RetryConfig::default()
        },
        ..ClientConfig::default()
    })
    .unwrap();
    let repository = RepositoryDescriptor::new("dead", "http://127.0.0.1:1/repo");
    assert!(client.get(&repository, "a.pom").await.is_err());
}

#[tokio::test]
async fn test_file_repository() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("com/example/lib/1.0/lib-1.0.pom");
    std::fs::create_dir_all(file.parent().unwrap()).unwrap();
    std::fs::write(&file, "<project/>").unwrap();

    let repository = RepositoryDescriptor::new("local-dir", path_to_file_url(dir.path()).unwrap());
    let client = fast_client();
    assert_eq!(
        client.get(&repository, "com/example/lib/1.0/lib-1.0.pom").await.unwrap(),
        FetchResponse::Found(b"<project/>".to_vec())
    );
    assert_eq!(
        client.get(&repository, "com/example/lib/2.0/lib-2.0.pom").await.unwrap(),
        FetchResponse::NotFound { status: None }
    );
}
