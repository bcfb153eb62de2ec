//! `pommel versions`: list and select published versions

use anyhow::bail;
use pommel_core::{FailureKind, GroupArtifact, ResolutionFailure, Version};
use pommel_registry::{FetchOutcome, MavenMetadata};
use pommel_resolver::VersionSelector;

use super::{flush_local_repository, CommandContext};

pub async fn execute(
    artifact: String,
    select: Option<String>,
    current: Option<String>,
    ctx: &CommandContext,
) -> anyhow::Result<()> {
    let ga: GroupArtifact = artifact.parse()?;
    let session = ctx.session().await?;
    let outcome = session.fetcher().fetch_metadata(&ga, session.repositories()).await;
    flush_local_repository(&session);

    let metadata = match outcome? {
        FetchOutcome::Found(metadata) => metadata,
        FetchOutcome::Missing { attempts } => {
            let failure =
                ResolutionFailure::for_artifact(&ga, FailureKind::MetadataUnavailable).with_attempts(attempts);
            ctx.report_failures(&[failure]);
            bail!("no version listing found for {}", ga);
        }
    };

    let versions = metadata.sorted_versions();
    for line in describe_versions(&metadata, &versions) {
        ctx.output.print(&line);
    }

    if let Some(expression) = select {
        let current = current.as_deref().map(Version::parse).transpose()?;
        let selector = VersionSelector::parse(&expression)?;
        let selector = match &current {
            Some(base) => selector.relative_to(base.clone()),
            None => selector,
        };
        let selected = selector.select(&versions, current.as_ref(), false)?;
        ctx.output.success(&format!("'{}' selects {}", expression, selected));
    }
    Ok(())
}

/// One line per version, oldest first, with release/latest markers
pub fn describe_versions(metadata: &MavenMetadata, versions: &[Version]) -> Vec<String> {
    versions
        .iter()
        .map(|version| {
            let mut line = version.to_string();
            if metadata.release.as_deref() == Some(version.as_str()) {
                line.push_str(" (release)");
            }
            if metadata.latest.as_deref() == Some(version.as_str()) {
                line.push_str(" (latest)");
            }
            line
        })
        .collect()
}
