use std::process::Command;

fn capture(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program).args(args).output().ok()?;
    output
        .status
        .success()
        .then(|| String::from_utf8_lossy(&output.stdout).trim().to_string())
}

fn main() {
    let date = capture("date", &["+%y-%m-%d"]).unwrap_or_else(|| "00-00-00".to_string());
    let commits = capture("git", &["rev-list", "--count", "HEAD"]).unwrap_or_else(|| "0".to_string());

    // YY-MM-DD-COMMITCOUNT, shown by --version and sent as the gateway User-Agent
    println!("cargo:rustc-env=SAMVEDANA_VERSION={}-{}", date, commits);
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/heads/");
}
