//! `pommel effective`: print the effective descriptor of a project

use pommel_core::Dependency;
use pommel_pom::Descriptor;
use pommel_resolver::EffectiveDescriptor;
use std::fmt::Write;
use std::path::PathBuf;

use super::{flush_local_repository, CommandContext};

pub async fn execute(pom: PathBuf, json: bool, ctx: &CommandContext) -> anyhow::Result<()> {
    let session = ctx.session().await?;
    let descriptor = Descriptor::from_file(&ctx.resolve_path(&pom))?;
    let effective = session.effective_root(descriptor).await;
    flush_local_repository(&session);
    let effective = effective?;

    if json {
        ctx.output.print(&serde_json::to_string_pretty(&*effective)?);
    } else {
        ctx.output.print(&render_effective(&effective));
    }
    ctx.report_failures(&session.failures().snapshot());
    Ok(())
}

/// Human-readable summary of an effective descriptor
pub fn render_effective(effective: &EffectiveDescriptor) -> String {
    let descriptor = &effective.descriptor;
    let mut out = String::new();

    let _ = writeln!(out, "{}", effective.id());
    let _ = writeln!(
        out,
        "  packaging: {}",
        descriptor.packaging.as_deref().unwrap_or("jar")
    );
    if effective.lineage.len() > 1 {
        let _ = writeln!(out, "  lineage: {}", effective.lineage.join(" <- "));
    }
    if !effective.active_profiles.is_empty() {
        let _ = writeln!(out, "  active profiles: {}", effective.active_profiles.join(", "));
    }

    if !descriptor.properties.is_empty() {
        let _ = writeln!(out, "  properties:");
        for (key, value) in &descriptor.properties {
            let _ = writeln!(out, "    {} = {}", key, value);
        }
    }
    render_dependencies(&mut out, "dependency management", &descriptor.dependency_management);
    render_dependencies(&mut out, "dependencies", &descriptor.dependencies);

    if !effective.imported_boms.is_empty() {
        let boms: Vec<String> = effective.imported_boms.iter().map(ToString::to_string).collect();
        let _ = writeln!(out, "  imported BOMs: {}", boms.join(", "));
    }
    if !effective.unresolved_properties.is_empty() {
        let _ = writeln!(
            out,
            "  unresolved properties: {}",
            effective.unresolved_properties.join(", ")
        );
    }
    out.truncate(out.trim_end().len());
    out
}

fn render_dependencies(out: &mut String, title: &str, dependencies: &[Dependency]) {
    if dependencies.is_empty() {
        return;
    }
    let _ = writeln!(out, "  {}:", title);
    for dependency in dependencies {
        let _ = write!(
            out,
            "    {}:{}:{}",
            dependency.group_id,
            dependency.artifact_id,
            dependency.version.as_deref().unwrap_or("?")
        );
        if let Some(scope) = &dependency.scope {
            let _ = write!(out, " [{}]", scope);
        }
        if dependency.optional {
            out.push_str(" (optional)");
        }
        out.push('\n');
    }
}
