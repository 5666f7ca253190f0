use std::process::Command;

fn main() {
    let git_hash = Command::new("git")
        .args(["describe", "--tags", "--always", "--dirty"])
        .output()
        .ok()
        .filter(|o| o.status.success())
        .and_then(|o| String::from_utf8(o.stdout).ok())
        .unwrap_or_default();

    println!("cargo:rustc-env=GIT_HASH={}", git_hash.trim());

    let pandoc_check = Command::new("pandoc").arg("--version").output();

    if pandoc_check.is_err() {
        println!("cargo:warning=pandoc not found in PATH, document export will not work");
    }
}
