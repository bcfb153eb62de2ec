//! Unit tests for the multi-repository fetcher

use super::*;

use camino::Utf8PathBuf;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::client::{ClientConfig, RetryConfig};

const POM: &str = "<project><groupId>com.example</groupId><artifactId>lib</artifactId><version>1.0</version></project>";

fn client() -> RepositoryClient {
    RepositoryClient::with_config(ClientConfig {
        timeout: Duration::from_secs(2),
        retry: RetryConfig {
            max_retries: 0,
            ..RetryConfig::default()
        },
        ..ClientConfig::default()
    })
    .unwrap()
}

fn fetcher() -> RepositoryFetcher {
    RepositoryFetcher::new(client(), FetcherOptions::default())
}

fn lib() -> Coordinate {
    Coordinate::new("com.example", "lib", "1.0")
}

fn temp_local() -> (tempfile::TempDir, Arc<LocalRepository>) {
    let dir = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
    let local = Arc::new(LocalRepository::open(root).unwrap());
    (dir, local)
}

async fn serve(server: &MockServer, at: &str, status: u16, body: &str) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_absent_then_found_records_one_miss() {
    let a = MockServer::start().await;
    let b = MockServer::start().await;
    serve(&b, "/com/example/lib/1.0/lib-1.0.pom", 200, POM).await;

    let repositories = vec![
        RepositoryDescriptor::new("a", a.uri()),
        RepositoryDescriptor::new("b", b.uri()),
    ];
    let fetcher = fetcher();
    let fetched = fetcher
        .fetch_descriptor(&lib(), &repositories)
        .await
        .unwrap()
        .found()
        .unwrap();

    assert_eq!(fetched.repository_id.as_deref(), Some("b"));
    assert_eq!(&*fetched.bytes, POM.as_bytes());
    assert_eq!(fetched.attempts.len(), 2);

    let failures = fetcher.failures().snapshot();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].kind, FailureKind::RepositoryMiss);
    assert_eq!(failures[0].attempts.len(), 1);
    assert_eq!(failures[0].attempts[0].repository_id, "a");
    assert_eq!(failures[0].attempts[0].outcome, AttemptOutcome::Absent { status: Some(404) });
}

#[tokio::test]
async fn test_attempt_memo_avoids_requery() {
    let a = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/com/example/lib/1.0/lib-1.0.pom"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&a)
        .await;
    let b = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/com/example/lib/1.0/lib-1.0.pom"))
        .respond_with(ResponseTemplate::new(200).set_body_string(POM))
        .expect(1)
        .mount(&b)
        .await;

    let repositories = vec![
        RepositoryDescriptor::new("a", a.uri()),
        RepositoryDescriptor::new("b", b.uri()),
    ];
    let fetcher = fetcher();
    for _ in 0..3 {
        let outcome = fetcher.fetch_descriptor(&lib(), &repositories).await.unwrap();
        assert!(outcome.is_found());
    }
    // The miss is reported once per coordinate
    assert_eq!(fetcher.failures().len(), 1);
}

#[tokio::test]
async fn test_unreachable_repositories_are_errored_not_absent() {
    let repositories = vec![
        RepositoryDescriptor::new("dead1", "http://127.0.0.1:1/maven"),
        RepositoryDescriptor::new("dead2", "http://127.0.0.1:1/other"),
    ];
    let fetcher = fetcher();
    let outcome = fetcher.fetch_descriptor(&lib(), &repositories).await.unwrap();

    assert!(outcome.is_errored());
    match outcome {
        FetchOutcome::Missing { attempts } => {
            assert_eq!(attempts.len(), 2);
            assert!(attempts
                .iter()
                .all(|a| matches!(a.outcome, AttemptOutcome::Errored { .. })));
        }
        FetchOutcome::Found(_) => panic!("nothing should be found"),
    }
    // Reporting the unresolved coordinate is the caller's job
    assert!(fetcher.failures().is_empty());
}

#[tokio::test]
async fn test_policy_skips_repository() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(POM))
        .expect(0)
        .mount(&server)
        .await;

    let repositories = vec![RepositoryDescriptor::new("releases-only", server.uri()).with_snapshots(false)];
    let snapshot = Coordinate::new("com.example", "lib", "2.0-SNAPSHOT");
    let outcome = fetcher().fetch_descriptor(&snapshot, &repositories).await.unwrap();
    match outcome {
        FetchOutcome::Missing { attempts } => {
            assert_eq!(
                attempts[0].outcome,
                AttemptOutcome::Skipped {
                    reason: "snapshots disabled".to_string()
                }
            );
        }
        FetchOutcome::Found(_) => panic!("snapshot must not be fetched"),
    }
}

#[tokio::test]
async fn test_local_repository_written_and_used_offline() {
    let server = MockServer::start().await;
    serve(&server, "/com/example/lib/1.0/lib-1.0.pom", 200, POM).await;
    let repositories = vec![RepositoryDescriptor::new("remote", server.uri())];
    let (_guard, local) = temp_local();

    let online = fetcher().with_local_repository(Arc::clone(&local));
    assert!(online.fetch_descriptor(&lib(), &repositories).await.unwrap().is_found());
    assert!(local.contains(&CacheKey::Descriptor(lib())));

    let offline = RepositoryFetcher::new(
        client(),
        FetcherOptions {
            offline: true,
            ..FetcherOptions::default()
        },
    )
    .with_local_repository(Arc::clone(&local));
    let fetched = offline
        .fetch_descriptor(&lib(), &repositories)
        .await
        .unwrap()
        .found()
        .unwrap();
    assert_eq!(fetched.repository_id, None);

    let other = Coordinate::new("com.example", "other", "1.0");
    match offline.fetch_descriptor(&other, &repositories).await.unwrap() {
        FetchOutcome::Missing { attempts } => {
            assert!(matches!(attempts[0].outcome, AttemptOutcome::Skipped { .. }));
        }
        FetchOutcome::Found(_) => panic!("offline fetch must not reach the network"),
    }
}

#[tokio::test]
async fn test_checksum_fail_policy_moves_on() {
    let bad = MockServer::start().await;
    serve(&bad, "/com/example/lib/1.0/lib-1.0.pom", 200, POM).await;
    serve(&bad, "/com/example/lib/1.0/lib-1.0.pom.sha1", 200, "0000000000000000000000000000000000000000").await;

    let good = MockServer::start().await;
    serve(&good, "/com/example/lib/1.0/lib-1.0.pom", 200, POM).await;
    let digest = ChecksumAlgorithm::Sha1.digest_hex(POM.as_bytes());
    serve(&good, "/com/example/lib/1.0/lib-1.0.pom.sha1", 200, &digest).await;

    let repositories = vec![
        RepositoryDescriptor::new("bad", bad.uri()).with_checksum_policy(ChecksumPolicy::Fail),
        RepositoryDescriptor::new("good", good.uri()).with_checksum_policy(ChecksumPolicy::Fail),
    ];
    let fetcher = fetcher();
    let fetched = fetcher
        .fetch_descriptor(&lib(), &repositories)
        .await
        .unwrap()
        .found()
        .unwrap();
    assert_eq!(fetched.repository_id.as_deref(), Some("good"));
    assert!(matches!(
        fetched.attempts[0].outcome,
        AttemptOutcome::ChecksumMismatch { .. }
    ));
}

#[tokio::test]
async fn test_checksum_warn_policy_accepts() {
    let server = MockServer::start().await;
    serve(&server, "/com/example/lib/1.0/lib-1.0.pom", 200, POM).await;
    serve(&server, "/com/example/lib/1.0/lib-1.0.pom.sha1", 200, "ffff").await;

    let repositories = vec![RepositoryDescriptor::new("warn", server.uri())];
    let fetcher = fetcher();
    assert!(fetcher.fetch_descriptor(&lib(), &repositories).await.unwrap().is_found());

    let failures = fetcher.failures().snapshot();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].kind, FailureKind::ChecksumMismatch);
}

#[tokio::test]
async fn test_timestamped_snapshot_descriptor() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/com/example/lib/2.0-SNAPSHOT/maven-metadata.xml",
        200,
        r#"<metadata><groupId>com.example</groupId><artifactId>lib</artifactId><version>2.0-SNAPSHOT</version>
<versioning><snapshot><timestamp>20240102.030405</timestamp><buildNumber>7</buildNumber></snapshot></versioning>
</metadata>"#,
    )
    .await;
    serve(
        &server,
        "/com/example/lib/2.0-SNAPSHOT/lib-2.0-20240102.030405-7.pom",
        200,
        "<project><artifactId>lib</artifactId></project>",
    )
    .await;

    let repositories = vec![RepositoryDescriptor::new("snaps", server.uri())];
    let snapshot = Coordinate::new("com.example", "lib", "2.0-SNAPSHOT");
    let fetched = fetcher()
        .fetch_descriptor(&snapshot, &repositories)
        .await
        .unwrap()
        .found()
        .unwrap();
    assert!(fetched.uri.ends_with("lib-2.0-20240102.030405-7.pom"));
}

#[tokio::test]
async fn test_metadata_merged_across_repositories() {
    let a = MockServer::start().await;
    serve(
        &a,
        "/com/example/lib/maven-metadata.xml",
        200,
        "<metadata><versioning><release>1.0</release><versions><version>1.0</version></versions>\
         <lastUpdated>20230101000000</lastUpdated></versioning></metadata>",
    )
    .await;
    let b = MockServer::start().await;
    serve(
        &b,
        "/com/example/lib/maven-metadata.xml",
        200,
        "<metadata><versioning><release>1.1</release><versions><version>1.1</version><version>1.2-SNAPSHOT</version>\
         </versions><lastUpdated>20240101000000</lastUpdated></versioning></metadata>",
    )
    .await;

    let repositories = vec![
        RepositoryDescriptor::new("a", a.uri()),
        RepositoryDescriptor::new("b", b.uri()).with_snapshots(false),
    ];
    let (_guard, local) = temp_local();
    let fetcher = fetcher().with_local_repository(Arc::clone(&local));
    let artifact = GroupArtifact::new("com.example", "lib");
    let metadata = fetcher
        .fetch_metadata(&artifact, &repositories)
        .await
        .unwrap()
        .found()
        .unwrap();
    assert_eq!(metadata.versions, vec!["1.0", "1.1"]);
    assert_eq!(metadata.release.as_deref(), Some("1.1"));

    // Offline, the cached per-repository listings are merged instead
    let offline = RepositoryFetcher::new(
        client(),
        FetcherOptions {
            offline: true,
            ..FetcherOptions::default()
        },
    )
    .with_local_repository(local);
    let cached = offline
        .fetch_metadata(&artifact, &repositories)
        .await
        .unwrap()
        .found()
        .unwrap();
    assert!(cached.versions.contains(&"1.0".to_string()));
    assert!(cached.versions.contains(&"1.1".to_string()));
}

#[tokio::test]
async fn test_metadata_missing_everywhere() {
    let server = MockServer::start().await;
    let repositories = vec![RepositoryDescriptor::new("empty", server.uri())];
    let outcome = fetcher()
        .fetch_metadata(&GroupArtifact::new("org.none", "x"), &repositories)
        .await
        .unwrap();
    assert!(!outcome.is_found());
    assert!(!outcome.is_errored());
}

#[tokio::test]
async fn test_cancelled_fetcher_issues_no_requests() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(POM))
        .expect(0)
        .mount(&server)
        .await;

    let cancel = CancellationFlag::new();
    let fetcher = fetcher().with_cancellation(cancel.clone());
    cancel.cancel();
    assert!(fetcher.cancellation().is_cancelled());

    let repositories = vec![RepositoryDescriptor::new("remote", server.uri())];
    let result = fetcher.fetch_descriptor(&lib(), &repositories).await;
    assert!(matches!(result, Err(PommelError::Cancelled)));
}

#[tokio::test]
async fn test_shared_response_cache_and_sink() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/com/example/lib/1.0/lib-1.0.pom"))
        .respond_with(ResponseTemplate::new(200).set_body_string(POM))
        .expect(1)
        .mount(&server)
        .await;
    let repositories = vec![RepositoryDescriptor::new("a", server.uri())];

    let responses = Arc::new(ResponseCache::new());
    let sink = FailureSink::new();
    let first = fetcher()
        .with_response_cache(Arc::clone(&responses))
        .with_failure_sink(sink.clone());
    let second = fetcher()
        .with_response_cache(Arc::clone(&responses))
        .with_failure_sink(sink.clone());

    assert!(first.fetch_descriptor(&lib(), &repositories).await.unwrap().is_found());
    assert!(second.fetch_descriptor(&lib(), &repositories).await.unwrap().is_found());
    assert_eq!(responses.stats().fresh_entries, 1);

    let missing = Coordinate::new("com.example", "gone", "1.0");
    assert!(!second.fetch_descriptor(&missing, &repositories).await.unwrap().is_found());
    first.failures().push(ResolutionFailure::for_coordinate(&missing, FailureKind::UnresolvableDependency));
    assert_eq!(sink.len(), 1);
}
