//! Stamps the binary with the version and commit it was built from.
//!
//! Packagers can pin both through `MPVCTL_VERSION` and `MPVCTL_GIT_SHA`.
//! Without them the crate version and the checkout's short hash are used.

use std::env;
use std::path::Path;
use std::process::Command;

const SHORT_SHA_LEN: usize = 7;

fn main() {
    let version = pinned("MPVCTL_VERSION")
        .or_else(|| pinned("CARGO_PKG_VERSION"))
        .unwrap_or_else(|| "unknown".to_string());

    let sha = pinned("MPVCTL_GIT_SHA")
        .or_else(|| pinned("GITHUB_SHA").map(|sha| shorten(&sha)))
        .or_else(checkout_sha)
        .unwrap_or_else(|| "unknown".to_string());

    stamp("MPVCTL_VERSION", &version);
    stamp("MPVCTL_GIT_SHA", &sha);

    for var in ["MPVCTL_VERSION", "MPVCTL_GIT_SHA", "GITHUB_SHA"] {
        println!("cargo:rerun-if-env-changed={var}");
    }
    // A missing path would rerun the script on every build
    if Path::new(".git/HEAD").exists() {
        println!("cargo:rerun-if-changed=.git/HEAD");
    }
}

/// A set, non-blank variable.
fn pinned(var: &str) -> Option<String> {
    env::var(var)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn shorten(sha: &str) -> String {
    sha.chars().take(SHORT_SHA_LEN).collect()
}

fn checkout_sha() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let sha = String::from_utf8(output.stdout).ok()?;
    Some(sha.trim().to_string()).filter(|sha| !sha.is_empty())
}

fn stamp(key: &str, value: &str) {
    println!("cargo:rustc-env={key}={value}");
}
