use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn mrag_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("mrag");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let files_dir = root.join("files");
    fs::create_dir_all(&files_dir).unwrap();
    fs::write(
        files_dir.join("fox.txt"),
        "The quick brown fox jumps over the lazy dog. The fox runs fast.",
    )
    .unwrap();
    fs::write(
        files_dir.join("deploy.md"),
        "# Deployment\n\nThe service is deployed with Docker.\n\nKubernetes manifests live in the ops repo.",
    )
    .unwrap();
    fs::write(files_dir.join("tool.exe"), "MZ").unwrap();

    let config_content = format!(
        r#"[server]
bind = "127.0.0.1:0"

[storage]
data_dir = "{}/data"

[chunking]
chunk_size = 50
chunk_overlap = 10

[llm]
provider = "mock"
"#,
        root.display()
    );

    let config_path = config_dir.join("mrag.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_mrag(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = mrag_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run mrag binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

fn upload(tmp: &TempDir, config_path: &Path, name: &str) -> String {
    let file = tmp.path().join("files").join(name);
    let (stdout, stderr, success) = run_mrag(config_path, &["upload", file.to_str().unwrap()]);
    assert!(success, "upload failed: stdout={}, stderr={}", stdout, stderr);
    stdout
        .lines()
        .find_map(|l| l.strip_prefix(&format!("Uploaded {} as ", name)))
        .map(str::to_string)
        .unwrap_or_else(|| panic!("no id in upload output: {}", stdout))
}

#[test]
fn test_upload_then_list() {
    let (tmp, config_path) = setup_test_env();
    let id = upload(&tmp, &config_path, "fox.txt");

    let (stdout, _, success) = run_mrag(&config_path, &["list"]);
    assert!(success);
    assert!(stdout.contains(&id));
    assert!(stdout.contains("fox.txt"));
    assert!(stdout.contains("chunks=2"));

    let artifact = tmp.path().join("data/markdown").join(format!("{}.md", id));
    assert!(artifact.exists());
}

#[test]
fn test_query_returns_sources() {
    let (tmp, config_path) = setup_test_env();
    upload(&tmp, &config_path, "fox.txt");
    upload(&tmp, &config_path, "deploy.md");

    let (stdout, stderr, success) = run_mrag(&config_path, &["query", "docker deployment"]);
    assert!(success, "query failed: {}", stderr);
    assert!(stdout.contains("Sources:"));
    assert!(stdout.contains("deploy.md"));
    assert!(!stdout.contains("fox.txt"));
}

#[test]
fn test_query_without_matches() {
    let (tmp, config_path) = setup_test_env();
    upload(&tmp, &config_path, "fox.txt");

    let (stdout, _, success) = run_mrag(&config_path, &["query", "quantum chromodynamics"]);
    assert!(success);
    assert!(stdout.contains("cannot find relevant information"));
    assert!(!stdout.contains("Sources:"));
}

#[test]
fn test_disallowed_extension_fails() {
    let (tmp, config_path) = setup_test_env();
    let file = tmp.path().join("files/tool.exe");
    let (_, stderr, success) = run_mrag(&config_path, &["upload", file.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("not allowed"));
}

#[test]
fn test_delete_and_missing_delete() {
    let (tmp, config_path) = setup_test_env();
    let id = upload(&tmp, &config_path, "fox.txt");

    let (stdout, _, success) = run_mrag(&config_path, &["delete", &id]);
    assert!(success);
    assert!(stdout.contains("Deleted"));

    let (stdout, _, _) = run_mrag(&config_path, &["list"]);
    assert!(!stdout.contains(&id));

    let (_, stderr, success) = run_mrag(&config_path, &["delete", &id]);
    assert!(!success, "deleting a missing id should exit non-zero");
    assert!(stderr.contains("not found"));
}

#[test]
fn test_stats() {
    let (tmp, config_path) = setup_test_env();
    upload(&tmp, &config_path, "fox.txt");
    upload(&tmp, &config_path, "deploy.md");

    let (stdout, _, success) = run_mrag(&config_path, &["stats"]);
    assert!(success);
    assert!(stdout.contains("Documents: 2"));
    assert!(stdout.contains("markdown_files"));
    assert!(stdout.contains("operational"));
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) = run_mrag(&tmp.path().join("nope.toml"), &["stats"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"));
}
