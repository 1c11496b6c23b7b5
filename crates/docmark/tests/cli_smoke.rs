use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;

fn docmark(dir: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("docmark").expect("binary exists");
    cmd.current_dir(dir)
        .env_remove("DOCMARK_STORE")
        .env_remove("DOCMARK_THEME_LIGHT")
        .env_remove("DOCMARK_THEME_DARK");
    cmd
}

#[test]
fn help_displays_usage() {
    Command::cargo_bin("docmark")
        .expect("binary exists")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage"));
}

#[test]
fn select_then_render_shows_the_mark() {
    let temp = tempfile::tempdir().expect("tempdir");
    fs::write(
        temp.path().join("guide.md"),
        "Hello world.\n\nSecond paragraph.\n",
    )
    .expect("write doc");
    let store = temp.path().join("highlights.json");

    docmark(temp.path())
        .args(["select", "guide.md", "--block", "0", "--anchor", "0", "--focus", "5"])
        .arg("--store")
        .arg(&store)
        .assert()
        .success()
        .stdout(predicate::str::contains("added highlight 1 at [0, 0, 0, 5]"));

    docmark(temp.path())
        .args(["render", "guide.md", "--store"])
        .arg(&store)
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "<mark class=\"highlight\" data-highlight-id=\"1\">Hello</mark> world.",
        ));

    docmark(temp.path())
        .args(["list", "--store"])
        .arg(&store)
        .assert()
        .success()
        .stdout(predicate::str::contains("1\tguide\t[0, 0, 0, 5]"));

    docmark(temp.path())
        .args(["click", "1", "--store"])
        .arg(&store)
        .assert()
        .success()
        .stdout(predicate::str::contains("removed highlight 1"));

    docmark(temp.path())
        .args(["list", "--title", "guide", "--store"])
        .arg(&store)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn render_missing_file_fails() {
    let temp = tempfile::tempdir().expect("tempdir");
    docmark(temp.path())
        .args(["render", "missing.md"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read missing.md"));
}
