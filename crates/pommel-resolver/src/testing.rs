//! Test fixtures: a throwaway `file://` repository and descriptor builders

use std::path::{Path, PathBuf};
use std::time::Duration;

use pommel_core::utils::path_to_file_url;
use pommel_core::RepositoryDescriptor;
use pommel_registry::{ClientConfig, FetcherOptions, RepositoryClient, RepositoryFetcher, RetryConfig};

use crate::session::ResolutionSession;

pub(crate) struct TestRepository {
    dir: tempfile::TempDir,
}

impl TestRepository {
    pub(crate) fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub(crate) fn path(&self) -> &Path {
        self.dir.path()
    }

    pub(crate) fn descriptor(&self) -> RepositoryDescriptor {
        RepositoryDescriptor::new("test", path_to_file_url(self.dir.path()).unwrap()).with_snapshots(true)
    }

    /// Store `body` as the descriptor of `g:a:v`
    pub(crate) fn publish(&self, group: &str, artifact: &str, version: &str, body: &str) -> PathBuf {
        let dir = self
            .dir
            .path()
            .join(group.replace('.', "/"))
            .join(artifact)
            .join(version);
        std::fs::create_dir_all(&dir).unwrap();
        let file = dir.join(format!("{}-{}.pom", artifact, version));
        std::fs::write(&file, body).unwrap();
        file
    }

    /// Store `maven-metadata.xml` listing `versions`
    pub(crate) fn versions(&self, group: &str, artifact: &str, versions: &[&str]) {
        let dir = self.dir.path().join(group.replace('.', "/")).join(artifact);
        std::fs::create_dir_all(&dir).unwrap();
        let listed: String = versions
            .iter()
            .map(|v| format!("<version>{}</version>", v))
            .collect();
        let body = format!(
            "<metadata><groupId>{}</groupId><artifactId>{}</artifactId><versioning><versions>{}</versions>\
             </versioning></metadata>",
            group, artifact, listed
        );
        std::fs::write(dir.join("maven-metadata.xml"), body).unwrap();
    }

    pub(crate) fn session(&self) -> ResolutionSession {
        session(vec![self.descriptor()])
    }
}

pub(crate) fn client() -> RepositoryClient {
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

pub(crate) fn session(repositories: Vec<RepositoryDescriptor>) -> ResolutionSession {
    let fetcher = RepositoryFetcher::new(client(), FetcherOptions::default());
    ResolutionSession::new(fetcher, repositories).with_build_timestamp("20240101-0000")
}

/// A descriptor with the given body inside `<project>`
pub(crate) fn pom(group: &str, artifact: &str, version: &str, body: &str) -> String {
    format!(
        "<project><modelVersion>4.0.0</modelVersion><groupId>{}</groupId><artifactId>{}</artifactId>\
         <version>{}</version>{}</project>",
        group, artifact, version, body
    )
}

/// `<dependency>` element; `extra` is inserted verbatim
pub(crate) fn dep(group: &str, artifact: &str, version: &str, extra: &str) -> String {
    format!(
        "<dependency><groupId>{}</groupId><artifactId>{}</artifactId><version>{}</version>{}</dependency>",
        group, artifact, version, extra
    )
}

pub(crate) fn dependencies(entries: &[String]) -> String {
    format!("<dependencies>{}</dependencies>", entries.concat())
}
