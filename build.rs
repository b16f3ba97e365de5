use std::process::Command;

fn main() {
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs");
    println!("cargo:rerun-if-env-changed=TASKMIRROR_BUILD_GIT_SHA");

    if std::env::var_os("TASKMIRROR_BUILD_GIT_SHA").is_some() {
        return;
    }

    let Ok(output) = Command::new("git")
        .args(["rev-parse", "--short=12", "HEAD"])
        .output()
    else {
        return;
    };
    if !output.status.success() {
        return;
    }

    let sha = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if !sha.is_empty() {
        println!("cargo:rustc-env=TASKMIRROR_BUILD_GIT_SHA={sha}");
    }
}
