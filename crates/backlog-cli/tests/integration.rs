#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn backlog(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("backlog").unwrap();
    cmd.current_dir(dir.path())
        .env("BACKLOG_ROOT", dir.path())
        .env_remove("BACKLOG_USER")
        .env_remove("BACKLOG_CLOUD_TOKEN");
    cmd
}

fn init_project(dir: &TempDir) {
    backlog(dir).arg("init").assert().success();
}

fn save_json(dir: &TempDir, name: &str, description: &str) -> serde_json::Value {
    let out = backlog(dir)
        .args([
            "--json",
            "project",
            "save",
            "--name",
            name,
            "--description",
            description,
        ])
        .output()
        .unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    serde_json::from_slice(&out.stdout).unwrap()
}

fn list_json(dir: &TempDir) -> Vec<serde_json::Value> {
    let out = backlog(dir)
        .args(["--json", "project", "list"])
        .output()
        .unwrap();
    assert!(out.status.success());
    serde_json::from_slice(&out.stdout).unwrap()
}

// ---------------------------------------------------------------------------
// backlog init
// ---------------------------------------------------------------------------

#[test]
fn init_creates_config() {
    let dir = TempDir::new().unwrap();
    backlog(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("created: .backlog/config.yaml"));
    assert!(dir.path().join(".backlog/config.yaml").exists());
    assert!(dir.path().join(".backlog/local").is_dir());
}

#[test]
fn init_is_idempotent() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    backlog(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("exists:"));
}

#[test]
fn init_rejects_unknown_backend() {
    let dir = TempDir::new().unwrap();
    backlog(&dir)
        .args(["init", "--backend", "sqlite"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown local backend"));
}

#[test]
fn commands_require_init() {
    let dir = TempDir::new().unwrap();
    backlog(&dir)
        .args(["project", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not initialized"));
}

// ---------------------------------------------------------------------------
// backlog project
// ---------------------------------------------------------------------------

#[test]
fn save_show_and_list() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);

    let saved = save_json(&dir, "Acme", "widgets for everyone");
    let id = saved["id"].as_str().unwrap().to_string();
    assert!(id.starts_with("proj_"));
    assert_eq!(saved["syncedToFirestore"], false);
    assert_eq!(saved["name"], "Acme");

    backlog(&dir)
        .args(["project", "show", &id])
        .assert()
        .success()
        .stdout(predicate::str::contains("Acme"))
        .stdout(predicate::str::contains("Store:    local"));

    backlog(&dir)
        .args(["project", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains(id.as_str()));
}

#[test]
fn same_description_keeps_one_project() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);

    let a = save_json(&dir, "A", "foo");
    let b = save_json(&dir, "B", "foo");
    assert_eq!(a["id"], b["id"]);

    let listed = list_json(&dir);
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["name"], "B");
}

#[test]
fn save_from_draft_file_with_document() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);

    let draft = serde_json::json!({
        "product": { "name": "Shop", "description": "online shop", "sector": "retail" },
        "epics": [{
            "id": "E1",
            "title": "Checkout",
            "user_stories": [{
                "id": "US-1",
                "description": "pay by card",
                "acceptance_criteria": ["card is charged"],
                "priority": "high"
            }]
        }],
        "prd": { "title": "Shop PRD", "custom_section": { "kept": true } }
    });
    std::fs::write(dir.path().join("draft.json"), draft.to_string()).unwrap();
    std::fs::write(dir.path().join("brief.md"), "# Brief\nSell things.").unwrap();

    let out = backlog(&dir)
        .args([
            "--json",
            "project",
            "save",
            "--file",
            "draft.json",
            "--document",
            "brief.md",
        ])
        .output()
        .unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let saved: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(saved["documentFileName"], "brief.md");
    assert_eq!(saved["prd"]["custom_section"]["kept"], true);
    assert_eq!(saved["epics"][0]["user_stories"][0]["priority"], "high");

    backlog(&dir)
        .args(["project", "show", saved["id"].as_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("US-1 [high]"))
        .stdout(predicate::str::contains("Artifacts: prd"));
}

#[test]
fn update_changes_only_given_fields() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    let saved = save_json(&dir, "Acme", "widgets");
    let id = saved["id"].as_str().unwrap();

    backlog(&dir)
        .args(["project", "update", id, "--name", "X"])
        .assert()
        .success();

    let out = backlog(&dir)
        .args(["--json", "project", "show", id])
        .output()
        .unwrap();
    let shown: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(shown["name"], "X");
    assert_eq!(shown["description"], "widgets");
    assert_eq!(shown["product"], saved["product"]);
    assert_eq!(shown["created_at"], saved["created_at"]);
}

#[test]
fn updated_description_dedups_later_saves() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    let saved = save_json(&dir, "Acme", "widgets");
    let id = saved["id"].as_str().unwrap();

    backlog(&dir)
        .args(["project", "update", id, "--description", "gadgets"])
        .assert()
        .success();

    let again = save_json(&dir, "Acme 2", "gadgets");
    assert_eq!(again["id"], saved["id"]);
    assert_eq!(again["product"]["description"], "gadgets");
    assert_eq!(list_json(&dir).len(), 1);
}

#[test]
fn update_requires_fields_and_existing_project() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);

    backlog(&dir)
        .args(["project", "update", "proj_1_missing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("nothing to update"));

    backlog(&dir)
        .args(["project", "update", "proj_1_missing", "--name", "X"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn archive_hides_and_restore_shows() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    let saved = save_json(&dir, "Acme", "widgets");
    let id = saved["id"].as_str().unwrap();

    backlog(&dir)
        .args(["project", "archive", id])
        .assert()
        .success();
    assert!(list_json(&dir).is_empty());

    backlog(&dir)
        .args(["project", "restore", id])
        .assert()
        .success();
    assert_eq!(list_json(&dir).len(), 1);
}

#[test]
fn delete_then_show_is_not_found() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    let saved = save_json(&dir, "Acme", "widgets");
    let id = saved["id"].as_str().unwrap();

    backlog(&dir)
        .args(["project", "delete", id])
        .assert()
        .success();
    backlog(&dir)
        .args(["project", "delete", id])
        .assert()
        .success();
    backlog(&dir)
        .args(["project", "show", id])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn invalid_id_is_rejected() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    backlog(&dir)
        .args(["project", "show", "../../etc/passwd"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid project id"));
}

#[test]
fn migrate_needs_user_and_cloud() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);

    backlog(&dir)
        .args(["project", "migrate"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("needs a user"));

    backlog(&dir)
        .args(["--user", "alice", "project", "migrate"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not configured"));
}

#[test]
fn unreachable_cloud_falls_back_to_local() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    std::fs::write(
        dir.path().join(".backlog/config.yaml"),
        "version: 1\ncloud:\n  project_id: demo\n  base_url: http://127.0.0.1:9\n  timeout_secs: 2\n",
    )
    .unwrap();

    let out = backlog(&dir)
        .args(["--json", "--user", "alice", "project", "save", "--name", "A", "--description", "a"])
        .output()
        .unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let saved: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(saved["syncedToFirestore"], false);

    // Visible without an identity, straight from the local store.
    let listed = list_json(&dir);
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["id"], saved["id"]);
}

// ---------------------------------------------------------------------------
// backlog config
// ---------------------------------------------------------------------------

#[test]
fn config_show_and_validate() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);

    backlog(&dir)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("local.backend: file"))
        .stdout(predicate::str::contains("cloud: disabled"));

    backlog(&dir)
        .args(["config", "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No warnings"));
}

#[test]
fn config_validate_fails_on_errors() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    std::fs::write(
        dir.path().join(".backlog/config.yaml"),
        "version: 1\ncloud:\n  project_id: ''\n",
    )
    .unwrap();

    backlog(&dir)
        .args(["config", "validate"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("[error] cloud.project_id is empty"));
}

#[test]
fn redb_backend_round_trip() {
    let dir = TempDir::new().unwrap();
    backlog(&dir)
        .args(["init", "--backend", "redb"])
        .assert()
        .success();
    let saved = save_json(&dir, "Acme", "widgets");
    assert!(dir.path().join(".backlog/local.redb").exists());
    let listed = list_json(&dir);
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["id"], saved["id"]);
}
