use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn folio_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("folio");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let papers_dir = root.join("papers");
    fs::create_dir_all(&papers_dir).unwrap();
    fs::write(
        papers_dir.join("attention.txt"),
        "We ran controlled experiments against a strong baseline. \
         The transformer encoder was trained on a benchmark dataset. \
         Validation used a held-out test set and cross-validation. \
         The toolkit is open-source and ready for deployment.",
    )
    .unwrap();
    fs::write(
        papers_dir.join("survey.txt"),
        "This survey collected questionnaire responses from respondents. \
         Interviews were coded with thematic analysis.",
    )
    .unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/folio.sqlite"

[server]
bind = "127.0.0.1:8000"

[models.contextual]
provider = "hashing"
dims = 256

[models.sentence]
provider = "hashing"
dims = 256

[models.general]
provider = "hashing"
dims = 256
"#,
        root.display()
    );

    let config_path = config_dir.join("folio.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_folio(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = folio_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run folio binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

/// Runs `paper add` and returns the new id from the "Created research N" line.
fn add_paper(config_path: &Path, args: &[&str]) -> i64 {
    let mut full = vec!["paper", "add"];
    full.extend_from_slice(args);
    let (stdout, stderr, success) = run_folio(config_path, &full);
    assert!(success, "paper add failed: stdout={}, stderr={}", stdout, stderr);
    stdout
        .lines()
        .find_map(|l| l.strip_prefix("Created research "))
        .and_then(|id| id.trim().parse().ok())
        .unwrap_or_else(|| panic!("no id in output: {}", stdout))
}

fn json_after_first_line(stdout: &str) -> serde_json::Value {
    let body: String = stdout.lines().skip(1).collect::<Vec<_>>().join("\n");
    serde_json::from_str(&body).unwrap()
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_folio(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/folio.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, first) = run_folio(&config_path, &["init"]);
    assert!(first, "First init failed");
    let (_, _, second) = run_folio(&config_path, &["init"]);
    assert!(second, "Second init failed (not idempotent)");
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) = run_folio(&tmp.path().join("nope.toml"), &["init"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"), "{}", stderr);
}

#[test]
fn test_analyze_prints_scores() {
    let (tmp, config_path) = setup_test_env();
    let content = tmp.path().join("papers/attention.txt");

    let (stdout, stderr, success) = run_folio(
        &config_path,
        &[
            "analyze",
            "--title",
            "Sparse attention",
            "--abstract",
            "We propose a novel attention mechanism.",
            "--content-file",
            content.to_str().unwrap(),
            "--keyword",
            "nlp",
        ],
    );
    assert!(success, "analyze failed: stdout={}, stderr={}", stdout, stderr);

    let result: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let overall = result["overall_score"].as_f64().unwrap();
    assert!((0.0..=1.0).contains(&overall));
    let types = result["methodology"]["methodology_types"].as_array().unwrap();
    assert!(types.iter().any(|t| t == "experimental"));
}

#[test]
fn test_topics_command() {
    let (tmp, config_path) = setup_test_env();
    let content = tmp.path().join("papers/survey.txt");

    let (stdout, stderr, success) =
        run_folio(&config_path, &["topics", content.to_str().unwrap()]);
    assert!(success, "topics failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("topic_0"));
    assert_eq!(stdout.lines().count(), 10);
}

#[test]
fn test_paper_lifecycle() {
    let (tmp, config_path) = setup_test_env();
    run_folio(&config_path, &["init"]);
    let content = tmp.path().join("papers/attention.txt");

    let id = add_paper(
        &config_path,
        &[
            "--title",
            "Sparse attention for long documents",
            "--abstract",
            "We propose a sparse attention mechanism.",
            "--content-file",
            content.to_str().unwrap(),
            "--keyword",
            "attention",
            "--author",
            "Ada Lovelace@Analytical Engines",
        ],
    );

    let (stdout, _, success) = run_folio(&config_path, &["paper", "get", &id.to_string()]);
    assert!(success);
    let paper: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(paper["title"], "Sparse attention for long documents");
    assert_eq!(paper["status"], "draft");
    assert!(paper["analysis_results"]["overall_score"].is_number());
    assert_eq!(paper["authors"][0]["affiliation"], "Analytical Engines");

    let (stdout, _, success) = run_folio(&config_path, &["paper", "list"]);
    assert!(success);
    assert!(stdout.contains("Sparse attention for long documents"));

    let (stdout, _, success) = run_folio(
        &config_path,
        &["paper", "update", &id.to_string(), "--status", "published"],
    );
    assert!(success);
    assert!(!stdout.contains("re-analyzed"));
    assert_eq!(json_after_first_line(&stdout)["status"], "published");

    let (stdout, _, success) = run_folio(
        &config_path,
        &["paper", "update", &id.to_string(), "--title", "Dense attention"],
    );
    assert!(success);
    assert!(stdout.contains("re-analyzed"));

    let (stdout, _, success) = run_folio(&config_path, &["paper", "reanalyze", &id.to_string()]);
    assert!(success);
    let analysis: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert!(analysis["overall_score"].is_number());

    let (stdout, _, success) = run_folio(&config_path, &["paper", "delete", &id.to_string()]);
    assert!(success);
    assert!(stdout.contains("Deleted research"));

    let (_, stderr, success) = run_folio(&config_path, &["paper", "get", &id.to_string()]);
    assert!(!success);
    assert!(stderr.contains("not found"), "{}", stderr);
}

#[test]
fn test_search_and_similar() {
    let (tmp, config_path) = setup_test_env();
    run_folio(&config_path, &["init"]);
    let attention = tmp.path().join("papers/attention.txt");
    let survey = tmp.path().join("papers/survey.txt");

    let a = add_paper(
        &config_path,
        &[
            "--title",
            "Transformer encoders",
            "--content-file",
            attention.to_str().unwrap(),
        ],
    );
    let b = add_paper(
        &config_path,
        &[
            "--title",
            "Transformer decoders",
            "--content-file",
            attention.to_str().unwrap(),
        ],
    );
    add_paper(
        &config_path,
        &[
            "--title",
            "Questionnaire methods",
            "--content-file",
            survey.to_str().unwrap(),
        ],
    );

    let (stdout, _, success) =
        run_folio(&config_path, &["paper", "list", "--search", "questionnaire"]);
    assert!(success);
    assert!(stdout.contains("Questionnaire methods"));
    assert!(!stdout.contains("Transformer"));

    let (stdout, _, success) = run_folio(&config_path, &["paper", "similar", &a.to_string()]);
    assert!(success);
    let first = stdout.lines().next().unwrap();
    assert!(first.trim_start().starts_with(&b.to_string()), "{}", stdout);
    assert!(!stdout.contains("Transformer encoders"));
}

#[test]
fn test_invalid_paper_rejected() {
    let (_tmp, config_path) = setup_test_env();
    run_folio(&config_path, &["init"]);

    let (_, stderr, success) = run_folio(
        &config_path,
        &["paper", "add", "--title", "T", "--status", "retracted"],
    );
    assert!(!success);
    assert!(stderr.contains("status"), "{}", stderr);

    let (_, _, success) = run_folio(&config_path, &["paper", "add", "--title", "T", "--category", "99"]);
    assert!(!success);
}
