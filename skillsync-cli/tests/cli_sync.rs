use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

fn skillsync_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("skillsync"));
    cmd.env("HOME", home)
        .env("USERPROFILE", home)
        .env("SKILLSYNC_CONFIG", home.join("config.yaml"))
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG");
    cmd
}

/// Keep fetched copies and snapshots inside the test's home.
fn write_config(home: &Path) {
    fs::write(
        home.join("config.yaml"),
        format!(
            "temp_root: {}\nbackup_root: {}\n",
            home.join("tmp").display(),
            home.join("backups").display()
        ),
    )
    .expect("config");
}

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
    fs::write(path, content).expect("write");
}

fn git(dir: &Path, args: &[&str]) -> String {
    let out = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(["-c", "user.name=test", "-c", "user.email=t@t", "-c", "commit.gpgsign=false"])
        .args(args)
        .output()
        .expect("launch git");
    assert!(out.status.success(), "git {args:?} failed");
    String::from_utf8_lossy(&out.stdout).trim().to_string()
}

fn commit_all(repo: &Path, message: &str) -> String {
    git(repo, &["add", "."]);
    git(repo, &["commit", "-q", "-m", message]);
    git(repo, &["rev-parse", "HEAD"])
}

/// Upstream repo holding `skills/pdf`, a local copy of it, and a registry entry.
fn registered_bundle(home: &Path) -> (PathBuf, PathBuf, String) {
    let repo = home.join("upstream");
    write(&repo, "skills/pdf/SKILL.md", "# PDF\nv1\n");
    write(&repo, "skills/pdf/scripts/fill.py", "print('fill')\n");
    git(&repo, &["init", "-q"]);
    let r1 = commit_all(&repo, "init");

    let local = home.join("local/pdf");
    write(&local, "SKILL.md", "# PDF\nv1\n");
    write(&local, "scripts/fill.py", "print('fill')\n");
    write(&local, "LOCAL_NOTES.md", "ours\n");

    skillsync_cmd(home)
        .args(["registry", "add", "pdf", "--source"])
        .arg(&repo)
        .args(["--subpath", "skills/pdf", "--local"])
        .arg(&local)
        .args(["--revision", r1.as_str()])
        .assert()
        .success();
    (repo, local, r1)
}

#[test]
fn diff_file_prints_unified_diff() {
    let home = TempDir::new().expect("home");
    write(home.path(), "a/SKILL.md", "one\ntwo\n");
    write(home.path(), "b/SKILL.md", "one\nthree\n");

    skillsync_cmd(home.path())
        .args(["diff", "file"])
        .arg(home.path().join("a/SKILL.md"))
        .arg(home.path().join("b/SKILL.md"))
        .assert()
        .success()
        .stdout(contains("--- local/SKILL.md"))
        .stdout(contains("+++ upstream/SKILL.md"))
        .stdout(contains("-two"))
        .stdout(contains("+three"));
}

#[test]
fn diff_dir_reports_each_status() {
    let home = TempDir::new().expect("home");
    let local = home.path().join("local");
    let upstream = home.path().join("upstream");
    write(&local, "SKILL.md", "old\n");
    write(&local, "gone.md", "bye\n");
    write(&upstream, "SKILL.md", "new\n");
    write(&upstream, "added.md", "hi\n");

    skillsync_cmd(home.path())
        .args(["diff", "dir"])
        .arg(&local)
        .arg(&upstream)
        .assert()
        .success()
        .stdout(contains("[MODIFIED] SKILL.md"))
        .stdout(contains("[NEW] added.md"))
        .stdout(contains("[DELETED] gone.md"))
        .stdout(contains("3 file(s) differ"));

    let out = skillsync_cmd(home.path())
        .args(["diff", "dir", "--json"])
        .arg(&local)
        .arg(&upstream)
        .output()
        .expect("run diff");
    assert!(out.status.success());
    let json: serde_json::Value = serde_json::from_slice(&out.stdout).expect("json");
    assert_eq!(json["summary"]["modified"], 1);
    assert_eq!(json["summary"]["new"], 1);
    assert_eq!(json["summary"]["deleted"], 1);
    assert_eq!(json["files"][0]["status"], "modified");
    assert_eq!(json["files"][1]["path"], "added.md");
    assert_eq!(json["files"][2]["status"], "deleted");
}

#[test]
fn diff_dir_of_identical_trees_says_so() {
    let home = TempDir::new().expect("home");
    write(home.path(), "a/SKILL.md", "same\n");
    write(home.path(), "b/SKILL.md", "same\n");
    skillsync_cmd(home.path())
        .args(["diff", "dir"])
        .arg(home.path().join("a"))
        .arg(home.path().join("b"))
        .assert()
        .success()
        .stdout(contains("No differences found."));
}

#[test]
fn diff_dir_with_missing_root_fails() {
    let home = TempDir::new().expect("home");
    write(home.path(), "a/SKILL.md", "x\n");
    skillsync_cmd(home.path())
        .args(["diff", "dir"])
        .arg(home.path().join("a"))
        .arg(home.path().join("missing"))
        .assert()
        .failure();
}

#[test]
fn backup_copy_restore_round_trip() {
    let home = TempDir::new().expect("home");
    write_config(home.path());
    let local = home.path().join("pdf");
    let upstream = home.path().join("up");
    write(&local, "SKILL.md", "local edit\n");
    write(&local, "mine.md", "only here\n");
    write(&upstream, "SKILL.md", "upstream\n");
    write(&upstream, "extra/new.md", "new\n");

    skillsync_cmd(home.path())
        .arg("backup")
        .arg(&local)
        .assert()
        .success()
        .stdout(contains("Backed up to"));
    let snapshots: Vec<PathBuf> = fs::read_dir(home.path().join("backups"))
        .expect("backups")
        .map(|e| e.expect("entry").path())
        .collect();
    assert_eq!(snapshots.len(), 1);
    let snapshot = &snapshots[0];
    assert!(snapshot
        .file_name()
        .expect("name")
        .to_string_lossy()
        .starts_with("pdf-"));

    skillsync_cmd(home.path())
        .arg("copy")
        .arg(&upstream)
        .arg(&local)
        .assert()
        .success()
        .stdout(contains("Copied 2 file(s)"));
    assert_eq!(fs::read_to_string(local.join("SKILL.md")).unwrap(), "upstream\n");
    assert_eq!(fs::read_to_string(local.join("mine.md")).unwrap(), "only here\n");

    skillsync_cmd(home.path())
        .arg("restore")
        .arg(snapshot)
        .arg(&local)
        .assert()
        .success();
    assert_eq!(fs::read_to_string(local.join("SKILL.md")).unwrap(), "local edit\n");
    assert!(!local.join("extra").exists());
}

#[test]
fn restore_from_missing_backup_fails_without_touching_local() {
    let home = TempDir::new().expect("home");
    let local = home.path().join("pdf");
    write(&local, "SKILL.md", "keep\n");
    skillsync_cmd(home.path())
        .arg("restore")
        .arg(home.path().join("no-such-backup"))
        .arg(&local)
        .assert()
        .failure();
    assert_eq!(fs::read_to_string(local.join("SKILL.md")).unwrap(), "keep\n");
}

#[test]
fn check_reports_current_then_updates() {
    let home = TempDir::new().expect("home");
    write_config(home.path());
    let (repo, _local, r1) = registered_bundle(home.path());

    skillsync_cmd(home.path())
        .args(["check", "pdf"])
        .assert()
        .success()
        .stdout(contains("CURRENT"));

    write(&repo, "skills/pdf/SKILL.md", "# PDF\nv2\n");
    let r2 = commit_all(&repo, "feat: pdf v2");

    let out = skillsync_cmd(home.path())
        .args(["check", "--all", "--json"])
        .output()
        .expect("run check");
    assert!(out.status.success());
    let json: serde_json::Value = serde_json::from_slice(&out.stdout).expect("json");
    assert_eq!(json[0]["name"], "pdf");
    assert_eq!(json[0]["has_updates"], true);
    assert_eq!(json[0]["old_revision"], r1.as_str());
    assert_eq!(json[0]["new_revision"], r2.as_str());
    assert!(json[0]["commit_log"]["text"]
        .as_str()
        .expect("log")
        .contains("feat: pdf v2"));

    let leftovers = fs::read_dir(home.path().join("tmp")).expect("tmp").count();
    assert_eq!(leftovers, 0, "check must release fetched copies");
}

#[test]
fn log_lists_commits_since_revision() {
    let home = TempDir::new().expect("home");
    write_config(home.path());
    let (repo, _local, r1) = registered_bundle(home.path());
    write(&repo, "skills/pdf/SKILL.md", "# PDF\nv2\n");
    commit_all(&repo, "feat: second");

    skillsync_cmd(home.path())
        .args(["log", "--remote"])
        .arg(&repo)
        .args(["--since", r1.as_str()])
        .assert()
        .success()
        .stdout(contains("feat: second"))
        .stdout(contains("init").not());
}

#[test]
fn diff_bundle_shows_upstream_changes() {
    let home = TempDir::new().expect("home");
    write_config(home.path());
    let (repo, _local, _) = registered_bundle(home.path());
    write(&repo, "skills/pdf/SKILL.md", "# PDF\nv2\n");
    commit_all(&repo, "feat: v2");

    skillsync_cmd(home.path())
        .args(["diff", "bundle", "pdf"])
        .assert()
        .success()
        .stdout(contains("[MODIFIED] SKILL.md"))
        .stdout(contains("+v2"))
        .stdout(contains("[DELETED] LOCAL_NOTES.md"));
}

#[test]
fn update_applies_records_and_keeps_backup() {
    let home = TempDir::new().expect("home");
    write_config(home.path());
    let (repo, local, r1) = registered_bundle(home.path());
    write(&repo, "skills/pdf/SKILL.md", "# PDF\nv2\n");
    write(&repo, "skills/pdf/forms.md", "forms\n");
    let r2 = commit_all(&repo, "feat: v2");

    skillsync_cmd(home.path())
        .args(["update", "pdf", "--dry-run"])
        .assert()
        .success()
        .stdout(contains("Dry run"));
    assert_eq!(fs::read_to_string(local.join("SKILL.md")).unwrap(), "# PDF\nv1\n");

    skillsync_cmd(home.path())
        .args(["update", "pdf"])
        .assert()
        .success()
        .stdout(contains("Updated 'pdf'"))
        .stdout(contains("Backup:"));

    assert_eq!(fs::read_to_string(local.join("SKILL.md")).unwrap(), "# PDF\nv2\n");
    assert!(local.join("forms.md").exists());
    assert_eq!(fs::read_to_string(local.join("LOCAL_NOTES.md")).unwrap(), "ours\n");
    assert!(!local.join(".git").exists());

    let out = skillsync_cmd(home.path())
        .args(["registry", "get", "pdf"])
        .output()
        .expect("run get");
    let entry: serde_json::Value = serde_json::from_slice(&out.stdout).expect("json");
    assert_eq!(entry["last_checked_revision"], r2.as_str());
    assert_eq!(entry["baseline_revision"], r1.as_str());

    let backups: Vec<PathBuf> = fs::read_dir(home.path().join("backups"))
        .expect("backups")
        .map(|e| e.expect("entry").path())
        .collect();
    assert_eq!(backups.len(), 1);
    assert_eq!(
        fs::read_to_string(backups[0].join("SKILL.md")).unwrap(),
        "# PDF\nv1\n"
    );

    skillsync_cmd(home.path())
        .args(["update", "pdf"])
        .assert()
        .success()
        .stdout(contains("already up to date"));
}

#[test]
fn check_of_unreachable_remote_is_unknown() {
    let home = TempDir::new().expect("home");
    write_config(home.path());
    skillsync_cmd(home.path())
        .args([
            "registry", "add", "gone", "--source", "/nonexistent/skills-repo", "--local", "/tmp/gone",
            "--revision", "abc",
        ])
        .assert()
        .success();

    skillsync_cmd(home.path())
        .args(["check", "--all"])
        .assert()
        .success()
        .stdout(contains("UNKNOWN"));
}
