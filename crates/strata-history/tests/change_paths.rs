use std::collections::BTreeMap;

use chrono::{DateTime, Duration, TimeZone, Utc};
use strata_core::{
    ClassMetrics, CommitNode, DeltaMetric, FileAction, FileMode, InducingEdge, Issue,
    MiningConfig, Refactoring, SourceMetric, StrataError, SzzType,
};
use strata_history::{build_histories, tracked_files, CommitClassification, CommitGraph, MemoryHistory};

fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
}

fn commit(hash: &str, parents: &[&str], date: DateTime<Utc>) -> CommitNode {
    CommitNode {
        hash: hash.into(),
        parents: parents.iter().map(|p| p.to_string()).collect(),
        author: format!("author-of-{hash}"),
        committer_date: date,
        message: format!("message {hash}"),
        fixed_issue_ids: vec![],
        validated_bugfix: false,
    }
}

fn action(commit: &str, path: &str, mode: FileMode) -> FileAction {
    FileAction {
        id: format!("{commit}:{path}"),
        commit: commit.into(),
        path: path.into(),
        mode,
        lines_added: 2,
        lines_deleted: 1,
        hunks: 1,
        old_path: None,
        induces: vec![],
    }
}

fn rename(commit: &str, old: &str, new: &str) -> FileAction {
    FileAction {
        old_path: Some(old.into()),
        lines_added: 0,
        lines_deleted: 0,
        hunks: 0,
        ..action(commit, new, FileMode::Rename)
    }
}

fn induces(fix_action: &str, label: &str, szz_type: SzzType) -> InducingEdge {
    InducingEdge {
        fix_action_id: fix_action.into(),
        label: label.into(),
        szz_type,
    }
}

fn config(label: &str) -> MiningConfig {
    MiningConfig {
        inducing_label: label.into(),
        ..Default::default()
    }
}

/// D/D.java is added with A/A.java, renamed to C/C.java and then to B/B.java
/// before the release at hash4. hash5 fixes IS-1 in B/B.java.
fn rename_tracking() -> MemoryHistory {
    let mut fix = commit("hash5", &["hash4"], at(2018, 1, 10, 10, 0, 0));
    fix.validated_bugfix = true;
    fix.fixed_issue_ids = vec!["i1".into()];

    let mut d_added = action("hash1", "D/D.java", FileMode::Add);
    d_added.induces = vec![induces("hash5:B/B.java", "JLMIV+", SzzType::Inducing)];
    let mut b_release = action("hash4", "B/B.java", FileMode::Modify);
    b_release.induces = vec![induces("hash5:B/B.java", "JLMIV+", SzzType::PartialFix)];

    MemoryHistory {
        commits: vec![
            commit("hash1", &[], at(2017, 12, 31, 23, 1, 1)),
            commit("hash2", &["hash1"], at(2018, 1, 1, 10, 0, 0)),
            commit("hash3", &["hash2"], at(2018, 1, 2, 10, 0, 0)),
            commit("hash4", &["hash3"], at(2018, 1, 4, 10, 0, 0)),
            fix,
        ],
        file_actions: vec![
            action("hash1", "A/A.java", FileMode::Add),
            d_added,
            rename("hash2", "D/D.java", "C/C.java"),
            rename("hash3", "C/C.java", "B/B.java"),
            action("hash4", "A/A.java", FileMode::Modify),
            b_release,
            action("hash5", "B/B.java", FileMode::Modify),
        ],
        issues: vec![Issue {
            id: "i1".into(),
            external_id: "IS-1".into(),
            priority: Some("Major".into()),
            issue_type: Some("Bug".into()),
            created_at: Some(at(2018, 1, 8, 0, 0, 0)),
        }],
        files: BTreeMap::from([(
            "hash4".to_string(),
            vec!["A/A.java".to_string(), "B/B.java".to_string(), "README.md".to_string()],
        )]),
        ..Default::default()
    }
}

fn run(history: &MemoryHistory, release: &str, label: &str) -> strata_core::Result<strata_history::MiningRun> {
    let graph = CommitGraph::from_commits(history.commits.clone());
    let files = tracked_files(history, release, &Default::default())?;
    build_histories(&graph, release, &files, history, &config(label))
}

#[test]
fn renamed_file_shares_first_occurrence() {
    let history = rename_tracking();
    let mined = run(&history, "hash4", "JLMIV+").unwrap();

    let first = at(2017, 12, 31, 23, 1, 1);
    assert_eq!(mined.first_occurrences["A/A.java"], first);
    assert_eq!(mined.first_occurrences["B/B.java"], first);
    assert_eq!(mined.histories.len(), 2);
}

#[test]
fn histories_follow_renames_oldest_first() {
    let history = rename_tracking();
    let mined = run(&history, "hash4", "JLMIV+").unwrap();

    let b = &mined.histories["B/B.java"];
    assert_eq!(b.revisions, vec!["hash1", "hash2", "hash3", "hash4"]);
    assert_eq!(b.lines_added, vec![2, 0, 0, 2]);
    assert_eq!(b.ages, vec![0, 0, 1, 3]);
    assert_eq!(b.days_from_release, vec![3, 3, 2, 0]);
    assert_eq!(b.authors[0], "author-of-hash1");
    assert_eq!(b.commit_messages[3], "message hash4");
    // hash1 touched both files with one hunk each
    assert_eq!(b.changesets, vec![2, 0, 0, 2]);
    assert_eq!(b.age, 3);

    let a = &mined.histories["A/A.java"];
    assert_eq!(a.revisions, vec!["hash1", "hash4"]);
}

#[test]
fn bug_fix_reaches_file_through_renames() {
    let history = rename_tracking();
    let mined = run(&history, "hash4", "JLMIV+").unwrap();

    let links = &mined.bug_links["B/B.java"];
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].issue, "IS-1");
    assert_eq!(links[0].file, "B/B.java");
    assert_eq!(links[0].bugfix_commit, "hash5");
    assert_eq!(links[0].severity, "major");
    assert_eq!(links[0].issue_type, "bug");
    assert!(!mined.bug_links.contains_key("A/A.java"));
}

#[test]
fn other_labels_are_ignored() {
    let history = rename_tracking();
    let mined = run(&history, "hash4", "JLMIV++").unwrap();
    assert!(mined.bug_links.is_empty());
}

#[test]
fn hard_suspects_are_skipped() {
    let mut history = rename_tracking();
    for fa in &mut history.file_actions {
        for edge in &mut fa.induces {
            edge.szz_type = SzzType::HardSuspect;
        }
    }
    let mined = run(&history, "hash4", "JLMIV+").unwrap();
    assert!(mined.bug_links.is_empty());
}

/// hash6 fixes IS-1 in A/A.java, blaming hash1 and hash5b, which comes after
/// the release and fixes `blamed_issues`.
fn with_unreachable_blame(blamed_issues: &[&str]) -> MemoryHistory {
    let mut history = rename_tracking();
    let mut fix = commit("hash6", &["hash5"], at(2018, 1, 12, 10, 0, 0));
    fix.validated_bugfix = true;
    fix.fixed_issue_ids = vec!["i1".into()];
    let mut later = commit("hash5b", &["hash4"], at(2018, 1, 11, 10, 0, 0));
    later.fixed_issue_ids = blamed_issues.iter().map(|i| i.to_string()).collect();
    history.commits.extend([later, fix]);

    for fa in &mut history.file_actions {
        fa.induces = if fa.id == "hash1:A/A.java" {
            vec![induces("hash6:A/A.java", "JLMIV+", SzzType::Inducing)]
        } else {
            vec![]
        };
    }
    let mut unreachable = action("hash5b", "A/A.java", FileMode::Modify);
    unreachable.induces = vec![induces("hash6:A/A.java", "JLMIV+", SzzType::Inducing)];
    // listed first so the unreachable blame is seen before the reachable one
    history.file_actions.insert(0, unreachable);
    history
        .file_actions
        .push(action("hash6", "A/A.java", FileMode::Modify));
    history
}

#[test]
fn unreachable_blame_drops_the_fix_action() {
    let history = with_unreachable_blame(&[]);
    let mined = run(&history, "hash4", "JLMIV+").unwrap();
    assert!(!mined.bug_links.contains_key("A/A.java"));
}

#[test]
fn partial_fix_skips_only_itself() {
    let history = with_unreachable_blame(&["i1"]);
    let mined = run(&history, "hash4", "JLMIV+").unwrap();
    let links = &mined.bug_links["A/A.java"];
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].bugfix_commit, "hash6");
}

#[test]
fn snapshots_pair_into_deltas() {
    let start = at(2018, 1, 1, 0, 0, 0);
    let commits = vec![
        commit("c1", &[], start),
        commit("c2", &["c1"], start + Duration::days(20)),
        commit("c3", &["c2"], start + Duration::days(40)),
        commit("c4", &["c3"], start + Duration::days(60)),
    ];
    let wmc = |path: &str, v: f64| ClassMetrics {
        path: path.into(),
        values: BTreeMap::from([(SourceMetric::Wmc, v), (SourceMetric::Dit, 1.0)]),
    };
    let history = MemoryHistory {
        commits,
        file_actions: vec![
            action("c1", "F.java", FileMode::Add),
            action("c2", "F.java", FileMode::Modify),
            action("c3", "F.java", FileMode::Modify),
            action("c4", "F.java", FileMode::Modify),
        ],
        class_states: BTreeMap::from([
            ("c1".to_string(), vec![wmc("F.java", 10.0)]),
            ("c2".to_string(), vec![wmc("F.java", 4.0)]),
            ("c3".to_string(), vec![wmc("F.java", 1.0)]),
            ("c4".to_string(), vec![wmc("F.java", 2.0), wmc("F.java", 4.0)]),
        ]),
        files: BTreeMap::from([("c4".to_string(), vec!["F.java".to_string()])]),
        ..Default::default()
    };
    let mined = run(&history, "c4", "JLMIV++").unwrap();

    assert_eq!(
        mined.deltas.series(DeltaMetric::Wmc, "F.java"),
        Some(&[Some(6.0), Some(2.0)][..])
    );
    assert_eq!(
        mined.deltas.series(DeltaMetric::Dit, "F.java"),
        Some(&[Some(0.0), Some(0.0)][..])
    );
    assert_eq!(
        mined.deltas.series(DeltaMetric::Tloc, "F.java"),
        Some(&[None, None][..])
    );
    assert_eq!(mined.histories["F.java"].days_from_release, vec![60, 40, 20, 0]);
}

#[test]
fn change_window_bounds_the_history() {
    let start = at(2018, 1, 1, 0, 0, 0);
    let history = MemoryHistory {
        commits: vec![
            commit("old", &[], start),
            commit("mid", &["old"], start + Duration::days(100)),
            commit("rel", &["mid"], start + Duration::days(250)),
        ],
        file_actions: vec![
            action("old", "F.java", FileMode::Add),
            action("mid", "F.java", FileMode::Modify),
            action("rel", "F.java", FileMode::Modify),
        ],
        files: BTreeMap::from([("rel".to_string(), vec!["F.java".to_string()])]),
        ..Default::default()
    };
    let mined = run(&history, "rel", "JLMIV++").unwrap();

    assert_eq!(mined.histories["F.java"].revisions, vec!["mid", "rel"]);
    assert_eq!(mined.histories["F.java"].age, 250);
    assert_eq!(mined.first_occurrences["F.java"], start);
    assert!(mined.summary.commits.contains("mid"));
    assert!(!mined.summary.commits.contains("old"));
    assert_eq!(mined.summary.release, "rel");
    assert_eq!(mined.summary.cutoff, at(2018, 3, 8, 0, 0, 0));
}

#[test]
fn refactorings_and_change_types_are_recorded() {
    let start = at(2018, 1, 1, 0, 0, 0);
    let refactor = |entity: &str| Refactoring {
        path: "F.java".into(),
        kind: "extract_method".into(),
        entity: entity.into(),
    };
    let history = MemoryHistory {
        commits: vec![
            commit("c1", &[], start),
            commit("c2", &["c1"], start + Duration::days(1)),
        ],
        file_actions: vec![
            action("c1", "F.java", FileMode::Add),
            action("c2", "F.java", FileMode::Modify),
        ],
        refactorings: BTreeMap::from([(
            "c2".to_string(),
            vec![refactor("F.run"), refactor("F.run"), refactor("F.stop")],
        )]),
        classifications: vec![CommitClassification {
            old_commit: "c1".into(),
            new_commit: "c2".into(),
            files: BTreeMap::from([(
                "F.java".to_string(),
                BTreeMap::from([("STATEMENT_INSERT".to_string(), 2), ("statement_insert".to_string(), 1)]),
            )]),
        }],
        files: BTreeMap::from([("c2".to_string(), vec!["F.java".to_string()])]),
        ..Default::default()
    };
    let mined = run(&history, "c2", "JLMIV++").unwrap();

    let f = &mined.histories["F.java"];
    assert_eq!(f.refactorings, vec!["extract_method", "extract_method"]);
    assert_eq!(f.change_types.len(), 1);
    assert_eq!(f.change_types[0]["statement_insert"], 3);
}

#[test]
fn merge_additions_use_the_fallback_scan() {
    let start = at(2018, 1, 1, 0, 0, 0);
    let history = MemoryHistory {
        commits: vec![
            commit("a", &[], start),
            commit("b", &["a"], start + Duration::days(1)),
            commit("c", &["a"], start + Duration::days(2)),
            commit("m", &["b", "c"], start + Duration::days(3)),
        ],
        file_actions: vec![
            action("a", "Y.java", FileMode::Add),
            action("m", "X.java", FileMode::Add),
        ],
        files: BTreeMap::from([(
            "m".to_string(),
            vec!["X.java".to_string(), "Y.java".to_string()],
        )]),
        ..Default::default()
    };
    let mined = run(&history, "m", "JLMIV++").unwrap();
    assert_eq!(mined.first_occurrences["X.java"], start + Duration::days(3));
    assert_eq!(mined.first_occurrences["Y.java"], start);
    // the merge itself is not a change
    assert!(mined.histories["X.java"].revisions.is_empty());
}

#[test]
fn file_without_addition_fails() {
    let history = MemoryHistory {
        commits: vec![commit("a", &[], at(2018, 1, 1, 0, 0, 0))],
        file_actions: vec![action("a", "Y.java", FileMode::Modify)],
        files: BTreeMap::from([("a".to_string(), vec!["Y.java".to_string()])]),
        ..Default::default()
    };
    let err = run(&history, "a", "JLMIV++").unwrap_err();
    assert!(matches!(err, StrataError::FirstOccurrenceUnresolved { ref path } if path == "Y.java"));
}

#[test]
fn unknown_release_fails() {
    let history = rename_tracking();
    let graph = CommitGraph::from_commits(history.commits.clone());
    let err = build_histories(&graph, "nope", &[], &history, &config("JLMIV+")).unwrap_err();
    assert!(matches!(err, StrataError::UnknownCommit(_)));
}
