//! `pommel cache`: local repository maintenance

use anyhow::bail;
use pommel_cache::LocalRepository;

use super::CommandContext;
use crate::CacheAction;

pub async fn execute(action: CacheAction, ctx: &CommandContext) -> anyhow::Result<()> {
    let config = ctx.load_config().await?;
    let local = LocalRepository::open(&config.settings().local_repository)?;

    match action {
        CacheAction::Stats => {
            let stats = local.stats();
            ctx.output.heading(&format!("Local repository {}", local.root()));
            ctx.output.print(&format!("  files:       {}", stats.files));
            ctx.output.print(&format!("  descriptors: {}", stats.descriptors));
            ctx.output.print(&format!("  metadata:    {}", stats.metadata));
            ctx.output.print(&format!("  indexed:     {}", stats.indexed));
            ctx.output.print(&format!("  size:        {}", stats.format_size()));
        }
        CacheAction::Verify => {
            let report = local.verify_all();
            if !report.is_clean() {
                for key in &report.corrupted {
                    ctx.output.error(&format!("corrupted: {}", key));
                }
                for key in &report.missing {
                    ctx.output.error(&format!("missing: {}", key));
                }
                bail!(
                    "{} of {} cached entries failed verification",
                    report.corrupted.len() + report.missing.len(),
                    report.checked
                );
            }
            ctx.output.success(&format!("{} cached entries verified", report.checked));
        }
        CacheAction::Clean => {
            let removed = local.clean()?;
            ctx.output.success(&format!(
                "Removed {} files ({})",
                removed.files,
                removed.format_size()
            ));
        }
    }
    Ok(())
}
