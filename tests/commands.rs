use std::process::Command;

const HISTORY: &str = r#"{
    "commits": [
        {"hash": "hash1", "author": "alice", "committerDate": "2017-12-31T23:01:01Z"},
        {"hash": "hash2", "parents": ["hash1"], "author": "bob",
         "committerDate": "2018-01-01T10:00:00Z", "message": "Fix parser"},
        {"hash": "hash3", "parents": ["hash2"], "author": "carol",
         "committerDate": "2018-01-04T10:00:00Z"},
        {"hash": "hash4", "parents": ["hash3"], "author": "carol",
         "committerDate": "2018-01-10T10:00:00Z", "validatedBugfix": true,
         "fixedIssueIds": ["i1"]}
    ],
    "fileActions": [
        {"id": "fa1", "commit": "hash1", "path": "src/A.java", "mode": "A", "linesAdded": 10, "hunks": 1,
         "induces": [{"fixActionId": "fa4", "label": "JLMIV++", "szzType": "inducing"}]},
        {"id": "fa2", "commit": "hash2", "path": "src/B.java", "mode": "R", "oldPath": "src/Old.java"},
        {"id": "fa0", "commit": "hash1", "path": "src/Old.java", "mode": "A", "linesAdded": 4, "hunks": 1},
        {"id": "fa3", "commit": "hash3", "path": "src/A.java", "mode": "M", "linesAdded": 2,
         "linesDeleted": 1, "hunks": 1},
        {"id": "fa4", "commit": "hash4", "path": "src/A.java", "mode": "M", "linesAdded": 1, "hunks": 1}
    ],
    "issues": [{"id": "i1", "externalId": "IS-7", "priority": "Critical", "issueType": "Bug"}],
    "files": {"hash3": ["src/A.java", "src/B.java", "src/test/ATest.java"]}
}"#;

fn strata(dir: &std::path::Path, args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_strata"))
        .args(args)
        .current_dir(dir)
        .output()
        .unwrap()
}

#[test]
fn metrics_from_exported_history() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("history.json"), HISTORY).unwrap();

    let output = strata(
        dir.path(),
        &["metrics", "--history", "history.json", "--release", "hash3", "--format", "json"],
    );
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["summary"]["release"], "hash3");
    let files = report["files"].as_array().unwrap();
    assert_eq!(files.len(), 2);

    let a = files.iter().find(|f| f["path"] == "src/A.java").unwrap();
    assert_eq!(a["revisions"], 2);
    assert_eq!(a["moser"]["authors"], 2);
    assert_eq!(a["bugLinks"][0]["issue"], "IS-7");
    assert_eq!(a["bugLinks"][0]["severity"], "critical");
    assert!(a["dambros"].is_object());

    let b = files.iter().find(|f| f["path"] == "src/B.java").unwrap();
    assert_eq!(b["firstOccurrence"], "2017-12-31T23:01:01Z");
    assert_eq!(b["moser"]["bugfix"], 1);
}

#[test]
fn paths_text_lists_every_path() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("history.json"), HISTORY).unwrap();

    let output = strata(
        dir.path(),
        &["paths", "--history", "history.json", "--from", "hash1", "--direction", "forward"],
    );
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("1 paths forward from hash1"));
    assert!(stdout.contains("hash1 -> hash2 -> hash3 -> hash4"));
}

#[test]
fn paths_rejects_unknown_direction() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("history.json"), HISTORY).unwrap();

    let output = strata(
        dir.path(),
        &["paths", "--history", "history.json", "--from", "hash1", "--direction", "sideways"],
    );
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("sideways"));
}

#[test]
fn aggregate_prints_json() {
    let dir = tempfile::tempdir().unwrap();
    let output = strata(dir.path(), &["aggregate", "2", "10", "--format", "json"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let values: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(values["median"], 6.0);
    let theil = values["theil"].as_f64().unwrap();
    assert!((theil - 0.24258597169364066).abs() < 1e-9);
}

#[test]
fn metrics_outside_a_repository_fails_with_hint() {
    let dir = tempfile::tempdir().unwrap();
    let output = strata(dir.path(), &["metrics", "--release", "HEAD"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Not a git repository"));
}
