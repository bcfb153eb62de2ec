//! Embeds build information shown by `pommel version`

use std::process::Command;

/// First line of a command's stdout, or "unknown"
fn command_output(program: &str, args: &[&str]) -> String {
    Command::new(program)
        .args(args)
        .output()
        .ok()
        .filter(|output| output.status.success())
        .and_then(|output| {
            String::from_utf8_lossy(&output.stdout)
                .lines()
                .next()
                .map(|line| line.trim().to_string())
        })
        .filter(|line| !line.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

fn main() {
    let built = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
    println!("cargo:rustc-env=BUILD_DATE={}", built);
    println!("cargo:rustc-env=RUSTC_VERSION={}", command_output("rustc", &["--version"]));
    println!(
        "cargo:rustc-env=GIT_COMMIT={}",
        command_output("git", &["rev-parse", "--short", "HEAD"])
    );

    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=Cargo.toml");
}
