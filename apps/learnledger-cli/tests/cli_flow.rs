use std::path::Path;

use predicates::prelude::*;
use serde_json::Value;
use tempfile::tempdir;

fn bin(db: &Path) -> assert_cmd::Command {
    let mut cmd = assert_cmd::Command::cargo_bin("learnledger").expect("binary");
    cmd.env_remove("LEARNLEDGER_CONFIG")
        .env("RUST_LOG", "warn")
        .arg("--db")
        .arg(db);
    cmd
}

fn json_out(cmd: &mut assert_cmd::Command) -> Value {
    let out = cmd.assert().success().get_output().stdout.clone();
    serde_json::from_slice(&out).expect("stdout is json")
}

#[test]
fn register_claim_report_round_trip() {
    let tmp = tempdir().expect("tmpdir");
    let db = tmp.path().join("ledger.sqlite");

    let problem = json_out(bin(&db).args([
        "problem",
        "register",
        "--id",
        "p1",
        "--address",
        "addr-p1",
        "--batch-size",
        "2",
        "--test-data",
        "t0",
    ]));
    assert_eq!(problem["problem_key"], "problem_p1");

    for key in ["d0", "d1", "d2"] {
        let data = json_out(bin(&db).args(["data", "register", "--key", key, "--problem", "problem_p1"]));
        assert_eq!(data["created"], 0, "no algorithm yet");
    }
    bin(&db)
        .args(["data", "register", "--key", "d0", "--problem", "problem_p1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already registered"));

    let algo = json_out(bin(&db).args(["algo", "register", "--key", "algo_a", "--problem", "problem_p1"]));
    assert_eq!(algo["created"], 2);

    let todo = json_out(bin(&db).args(["task", "list", "--status", "todo"]));
    let todo = todo.as_array().expect("array");
    assert_eq!(todo.len(), 2);
    let first = todo
        .iter()
        .find(|t| t["rank"] == 0)
        .expect("rank 0 task");
    assert_eq!(first["train_data_keys"], serde_json::json!(["d0", "d1"]));
    let key = first["key"].as_str().expect("key").to_string();

    let claimed = json_out(bin(&db).args(["task", "claim", key.as_str(), "--worker", "w1"]));
    assert_eq!(claimed["status"], "pending");
    assert_eq!(claimed["worker"], "w1");

    bin(&db)
        .args(["task", "claim", key.as_str(), "--worker", "w2"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot claim a task in status pending"));

    let done = json_out(bin(&db).args([
        "task",
        "report",
        key.as_str(),
        "--status",
        "done",
        "--perf",
        "0.8",
        "--train-perf",
        "d0 0.7, d1 0.9",
        "--test-perf",
        "t0 0.8",
        "--model",
        "M0",
    ]));
    assert_eq!(done["status"], "done");
    assert_eq!(done["model_end_address"], "M0");

    let lineage = json_out(bin(&db).args(["lineage", "algo_a"]));
    assert_eq!(lineage["rank"], 1);

    let by_algo = json_out(bin(&db).args(["task", "list", "--algo", "algo_a"]));
    assert_eq!(by_algo.as_array().map(Vec::len), Some(2));
}

#[test]
fn report_rejects_non_terminal_status() {
    let tmp = tempdir().expect("tmpdir");
    let db = tmp.path().join("ledger.sqlite");
    bin(&db)
        .args(["task", "report", "learnuplet_x", "--status", "pending"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("done or failed"));
}

#[test]
fn missing_task_is_reported() {
    let tmp = tempdir().expect("tmpdir");
    let db = tmp.path().join("ledger.sqlite");
    bin(&db)
        .args(["task", "show", "learnuplet_missing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn task_list_needs_a_filter() {
    let tmp = tempdir().expect("tmpdir");
    let db = tmp.path().join("ledger.sqlite");
    bin(&db).args(["task", "list"]).assert().failure();
}

#[test]
fn config_schema_and_config_file() {
    let tmp = tempdir().expect("tmpdir");
    let schema_path = tmp.path().join("schema.json");
    let mut cmd = assert_cmd::Command::cargo_bin("learnledger").expect("binary");
    cmd.args(["config", "schema", "--out"])
        .arg(&schema_path)
        .assert()
        .success();
    let schema: Value =
        serde_json::from_str(&std::fs::read_to_string(&schema_path).expect("schema")).expect("json");
    assert!(schema["properties"]["logging"].is_object());

    let cfg = tmp.path().join("learnledger.toml");
    std::fs::write(&cfg, "[store]\nbackend = \"memory\"\n").expect("write config");
    let mut cmd = assert_cmd::Command::cargo_bin("learnledger").expect("binary");
    cmd.arg("--config")
        .arg(&cfg)
        .args(["problem", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[]"));

    std::fs::write(&cfg, "[store]\nbackend = \"redis\"\n").expect("write config");
    let mut cmd = assert_cmd::Command::cargo_bin("learnledger").expect("binary");
    cmd.arg("--config")
        .arg(&cfg)
        .args(["problem", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid config"));
}
