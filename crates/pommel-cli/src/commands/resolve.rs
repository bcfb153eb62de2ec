//! `pommel resolve` and `pommel tree`

use anyhow::anyhow;
use pommel_core::Scope;
use pommel_resolver::{ResolutionResult, Resolver};
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};

use super::{flush_local_repository, CommandContext};

pub async fn execute(pom: PathBuf, scope: Option<String>, json: bool, ctx: &CommandContext) -> anyhow::Result<()> {
    let buckets = match scope.as_deref() {
        Some(name) => vec![parse_bucket(name)?],
        None => Scope::BUCKETS.to_vec(),
    };
    let result = run(&pom, ctx).await?;

    if json {
        ctx.output.print(&serde_json::to_string_pretty(&to_json(&result, &buckets)?)?);
    } else {
        for bucket in &buckets {
            let entries = result.graph.entries(*bucket);
            ctx.output.heading(&format!("{} ({})", bucket, entries.len()));
            for entry in entries {
                let mut line = format!("  {}", entry.coordinate);
                if entry.kind != "jar" {
                    line.push_str(&format!(" [{}]", entry.kind));
                }
                if entry.depth > 0 {
                    line.push_str(&format!(" (depth {})", entry.depth));
                }
                ctx.output.print(&line);
            }
        }
        let summary = format!("Resolved {} in {}ms", result.effective.id(), result.resolution_time_ms);
        if result.is_complete() {
            ctx.output.success(&summary);
        } else {
            ctx.output.warn(&format!("{} with missing pieces", summary));
        }
    }
    ctx.report_failures(&result.failures);
    Ok(())
}

pub async fn tree(pom: PathBuf, scope: String, ctx: &CommandContext) -> anyhow::Result<()> {
    let bucket = parse_bucket(&scope)?;
    let result = run(&pom, ctx).await?;

    match result.tree(bucket) {
        Some(tree) => ctx.output.print(tree.render_tree().trim_end()),
        None => ctx.output.info(&format!("No {} dependencies", bucket)),
    }
    ctx.report_failures(&result.failures);
    Ok(())
}

async fn run(pom: &Path, ctx: &CommandContext) -> anyhow::Result<ResolutionResult> {
    let resolver = Resolver::new(ctx.session().await?);
    let result = resolver.resolve_file(&ctx.resolve_path(pom)).await;
    flush_local_repository(resolver.session());
    Ok(result?)
}

/// A resolved-graph bucket by name
pub fn parse_bucket(name: &str) -> anyhow::Result<Scope> {
    Scope::parse(name)
        .filter(|scope| Scope::BUCKETS.contains(scope))
        .ok_or_else(|| anyhow!("unknown scope '{}', expected compile, runtime, test or provided", name))
}

pub fn to_json(result: &ResolutionResult, buckets: &[Scope]) -> anyhow::Result<Value> {
    let mut dependencies = Map::new();
    for bucket in buckets {
        dependencies.insert(
            bucket.as_str().to_string(),
            serde_json::to_value(result.graph.entries(*bucket))?,
        );
    }
    Ok(json!({
        "project": result.effective.id(),
        "dependencies": dependencies,
        "failures": result.failures,
        "resolution_time_ms": result.resolution_time_ms,
    }))
}
