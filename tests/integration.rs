use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn docidx_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_docidx"))
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let files_dir = root.join("files");
    fs::create_dir_all(&files_dir).unwrap();
    fs::write(
        files_dir.join("alpha.md"),
        "# Alpha Document\n\nThis is the alpha document about Rust programming.\n\nIt contains information about cargo and crates.",
    ).unwrap();
    fs::write(
        files_dir.join("beta.md"),
        "# Beta Document\n\nThis document discusses Python and machine learning.\n\nDeep learning frameworks like PyTorch are covered.",
    ).unwrap();
    fs::write(
        files_dir.join("gamma.txt"),
        "Gamma plain text file.\n\nContains notes about deployment and infrastructure.\n\nKubernetes and Docker are mentioned here.",
    ).unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/docidx.sqlite"

[chunking]
min_chunk_size = 20

[export]
on_close = false
"#,
        root.display()
    );

    let config_path = config_dir.join("docidx.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn files_dir(config_path: &Path) -> PathBuf {
    config_path.parent().unwrap().parent().unwrap().join("files")
}

fn run_docidx(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = docidx_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run docidx binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

fn index_files(config_path: &Path) -> String {
    let files = files_dir(config_path);
    let (stdout, stderr, success) = run_docidx(config_path, &["index", files.to_str().unwrap()]);
    assert!(success, "index failed: {}", stderr);
    stdout
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_docidx(&config_path, &["init"]);
    assert!(success, "init failed: {}", stderr);
    assert!(stdout.contains("Database initialized successfully"));
    assert!(tmp.path().join("data/docidx.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, first) = run_docidx(&config_path, &["init"]);
    let (_, stderr, second) = run_docidx(&config_path, &["init"]);
    assert!(first);
    assert!(second, "second init failed: {}", stderr);
}

#[test]
fn test_index_directory() {
    let (_tmp, config_path) = setup_test_env();

    let stdout = index_files(&config_path);
    assert!(stdout.contains("files found:    3"), "{}", stdout);
    assert!(stdout.contains("indexed:        3"), "{}", stdout);
    assert!(stdout.contains("errors:         0"), "{}", stdout);
}

#[test]
fn test_index_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    index_files(&config_path);
    let stdout = index_files(&config_path);
    assert!(stdout.contains("indexed:        0"), "{}", stdout);
    assert!(stdout.contains("skipped:        3"), "{}", stdout);

    let files = files_dir(&config_path);
    let (stdout, _, success) = run_docidx(
        &config_path,
        &["index", files.to_str().unwrap(), "--force"],
    );
    assert!(success);
    assert!(stdout.contains("indexed:        3"), "{}", stdout);

    let (stdout, _, _) = run_docidx(&config_path, &["stats"]);
    assert!(stdout.contains("Documents:   3"), "{}", stdout);
}

#[test]
fn test_index_with_pattern() {
    let (_tmp, config_path) = setup_test_env();
    let files = files_dir(&config_path);

    let (stdout, stderr, success) = run_docidx(
        &config_path,
        &["index", files.to_str().unwrap(), "--pattern", r"\.md$"],
    );
    assert!(success, "{}", stderr);
    assert!(stdout.contains("files found:    2"), "{}", stdout);
}

#[test]
fn test_index_single_file() {
    let (_tmp, config_path) = setup_test_env();
    let file = files_dir(&config_path).join("alpha.md");

    let (stdout, stderr, success) = run_docidx(&config_path, &["index", file.to_str().unwrap()]);
    assert!(success, "{}", stderr);
    assert!(stdout.contains("Indexed"));
    assert!(stdout.contains("markdown"));

    let (stdout, _, _) = run_docidx(&config_path, &["index", file.to_str().unwrap()]);
    assert!(stdout.contains("Skipped"));
}

#[test]
fn test_search_ranks_relevant_document_first() {
    let (_tmp, config_path) = setup_test_env();
    index_files(&config_path);

    let (stdout, stderr, success) = run_docidx(&config_path, &["search", "python learning"]);
    assert!(success, "search failed: {}", stderr);
    let first = stdout.lines().next().unwrap_or_default();
    assert!(first.starts_with("1. ["), "{}", stdout);
    assert!(first.contains("beta.md"), "{}", stdout);
}

#[test]
fn test_search_deterministic() {
    let (_tmp, config_path) = setup_test_env();
    index_files(&config_path);

    let (first, _, _) = run_docidx(&config_path, &["search", "deployment docker"]);
    let (second, _, _) = run_docidx(&config_path, &["search", "deployment docker"]);
    assert_eq!(first, second);
}

#[test]
fn test_search_empty_query() {
    let (_tmp, config_path) = setup_test_env();
    index_files(&config_path);

    let (stdout, _, success) = run_docidx(&config_path, &["search", "   "]);
    assert!(success);
    assert!(stdout.contains("No results."));
}

#[test]
fn test_search_before_indexing() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_docidx(&config_path, &["search", "anything"]);
    assert!(!success);
    assert!(stderr.contains("vocabulary not loaded"), "{}", stderr);
}

#[test]
fn test_list_and_delete() {
    let (_tmp, config_path) = setup_test_env();
    index_files(&config_path);

    let (stdout, _, success) = run_docidx(&config_path, &["list"]);
    assert!(success);
    assert_eq!(stdout.lines().count(), 4, "{}", stdout);

    let (stdout, _, _) = run_docidx(&config_path, &["list", "--content-type", "text"]);
    let rows: Vec<&str> = stdout.lines().skip(1).collect();
    assert_eq!(rows.len(), 1, "{}", stdout);
    assert!(rows[0].ends_with("gamma.txt"));

    let id = rows[0].split_whitespace().next().unwrap().to_string();
    let (stdout, stderr, success) = run_docidx(&config_path, &["delete", &id]);
    assert!(success, "{}", stderr);
    assert!(stdout.contains(&id));

    let (stdout, _, _) = run_docidx(&config_path, &["list", "--name", "GAMMA"]);
    assert!(stdout.contains("No documents."));

    let (_, _, success) = run_docidx(&config_path, &["delete", &id]);
    assert!(!success);
}

#[test]
fn test_rebuild() {
    let (_tmp, config_path) = setup_test_env();
    index_files(&config_path);

    let (stdout, stderr, success) = run_docidx(&config_path, &["rebuild"]);
    assert!(success, "{}", stderr);
    assert!(stdout.contains("Rebuilt 3 embeddings"), "{}", stdout);
}

#[test]
fn test_export() {
    let (tmp, config_path) = setup_test_env();
    index_files(&config_path);

    let out = tmp.path().join("out");
    let (stdout, stderr, success) =
        run_docidx(&config_path, &["export", "--dir", out.to_str().unwrap()]);
    assert!(success, "{}", stderr);
    assert!(stdout.contains("Exported index to"));

    let current = fs::read_to_string(out.join("index-current.json")).unwrap();
    let value: serde_json::Value = serde_json::from_str(&current).unwrap();
    assert_eq!(value["documents"].as_array().unwrap().len(), 3);
    assert_eq!(value["stats"]["chunks"], 3);
}

#[test]
fn test_export_on_close() {
    let (tmp, config_path) = setup_test_env();
    let config = fs::read_to_string(&config_path)
        .unwrap()
        .replace("on_close = false", "on_close = true");
    fs::write(&config_path, config).unwrap();

    index_files(&config_path);
    assert!(tmp.path().join("data/exports/index-current.json").exists());
}

#[test]
fn test_logs_go_to_stderr() {
    let (_tmp, config_path) = setup_test_env();
    let files = files_dir(&config_path);

    let (stdout, stderr, success) = run_docidx(
        &config_path,
        &["--verbose", "index", files.to_str().unwrap()],
    );
    assert!(success);
    assert!(stderr.contains("indexed document"), "{}", stderr);
    assert!(!stdout.contains("indexed document"));
}
