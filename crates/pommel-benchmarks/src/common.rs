//! Common utilities for benchmarks

use criterion::Criterion;
use pommel_core::utils::path_to_file_url;
use pommel_core::RepositoryDescriptor;
use pprof::criterion::{Output, PProfProfiler};
use std::path::Path;

/// Configure criterion with flamegraph profiling support
pub fn criterion_config() -> Criterion {
    Criterion::default()
        .warm_up_time(std::time::Duration::from_secs(3))
        .measurement_time(std::time::Duration::from_secs(10))
        .sample_size(100)
        .with_profiler(PProfProfiler::new(100, Output::Flamegraph(None)))
}

/// A descriptor declaring `dependency_count` dependencies whose versions
/// come from properties
pub fn descriptor_text(dependency_count: usize) -> String {
    let mut properties = String::new();
    let mut dependencies = String::new();
    for i in 0..dependency_count {
        properties.push_str(&format!("<dep{0}.version>1.{0}.0</dep{0}.version>", i));
        dependencies.push_str(&format!(
            "<dependency><groupId>org.bench.g{0}</groupId><artifactId>artifact-{0}</artifactId>\
             <version>${{dep{0}.version}}</version><scope>{1}</scope></dependency>",
            i,
            if i % 5 == 0 { "test" } else { "compile" }
        ));
    }
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<project><modelVersion>4.0.0</modelVersion>\
         <groupId>org.bench</groupId><artifactId>root</artifactId><version>1.0.0</version>\
         <name>${{project.artifactId}} bench</name>\
         <properties>{}</properties><dependencies>{}</dependencies></project>",
        properties, dependencies
    )
}

/// Version strings mixing releases, qualifiers and snapshots
pub fn version_strings(count: usize) -> Vec<String> {
    let qualifiers = ["", "-alpha-1", "-beta", "-RC2", "-SNAPSHOT", ".Final", "-sp1"];
    (0..count)
        .map(|i| format!("{}.{}.{}{}", i % 7, (i / 7) % 13, i % 3, qualifiers[i % qualifiers.len()]))
        .collect()
}

/// Publish a layered dependency graph into a `file://` repository:
/// `width` artifacts per level, each depending on every artifact of the
/// next level
pub fn publish_layers(root: &Path, depth: usize, width: usize) -> std::io::Result<String> {
    for level in 0..depth {
        for index in 0..width {
            let mut dependencies = String::new();
            if level + 1 < depth {
                for next in 0..width {
                    dependencies.push_str(&format!(
                        "<dependency><groupId>org.bench</groupId><artifactId>l{}-{}</artifactId>\
                         <version>1.0</version></dependency>",
                        level + 1,
                        next
                    ));
                }
            }
            let artifact = format!("l{}-{}", level, index);
            let dir = root.join("org/bench").join(&artifact).join("1.0");
            std::fs::create_dir_all(&dir)?;
            std::fs::write(
                dir.join(format!("{}-1.0.pom", artifact)),
                format!(
                    "<project><groupId>org.bench</groupId><artifactId>{}</artifactId><version>1.0</version>\
                     <dependencies>{}</dependencies></project>",
                    artifact, dependencies
                ),
            )?;
        }
    }

    let direct: String = (0..width)
        .map(|index| {
            format!(
                "<dependency><groupId>org.bench</groupId><artifactId>l0-{}</artifactId><version>1.0</version>\
                 </dependency>",
                index
            )
        })
        .collect();
    Ok(format!(
        "<project><groupId>org.bench</groupId><artifactId>app</artifactId><version>1.0</version>\
         <dependencies>{}</dependencies></project>",
        direct
    ))
}

/// Repository descriptor for a local directory
pub fn file_repository(root: &Path) -> RepositoryDescriptor {
    let url = path_to_file_url(root).unwrap_or_else(|| format!("file://{}", root.display()));
    RepositoryDescriptor::new("bench", url)
}
