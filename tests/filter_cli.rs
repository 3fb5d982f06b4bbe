//! Integration tests for the documentation commands
//!
//! These run the `doxprep` binary the way Doxygen and the docs workflow do.

use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

fn doxprep(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_doxprep"))
        .args(args)
        .current_dir(dir)
        .env_remove("DOXPREP_LOG")
        .output()
        .expect("Failed to run doxprep")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn test_filter_change_log_file() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("ChangeLog.md"),
        "# Changelog\n\n## [1.2.3] - Fixed something\n\n### Added\n- thing\n",
    )
    .unwrap();

    let output = doxprep(dir.path(), &["filter", "ChangeLog.md"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(
        stdout(&output),
        "# ChangeLog {#change_log}\n\n\
         @section change_log_1-2-3 [1.2.3] - Fixed something\n\
         GitHub Release: [1.2.3]\n\
         ### Added  {#change_log_1-2-3_added}\n- thing\n"
    );
}

#[test]
fn test_filter_input_file_flag_and_example_readme() {
    let dir = tempfile::tempdir().unwrap();
    let example = dir.path().join("examples").join("foo");
    fs::create_dir_all(&example).unwrap();
    fs::write(example.join("ReadMe.md"), "# Setup {#custom}\n## Wiring\n").unwrap();

    let output = doxprep(
        dir.path(),
        &["filter", "--input_file", "examples/foo/ReadMe.md"],
    );
    assert!(output.status.success());
    assert_eq!(
        stdout(&output),
        "# Setup {#custom}\n## Wiring  {#example_foo_wiring}\n"
    );
}

#[test]
fn test_filter_reads_stdin() {
    let dir = tempfile::tempdir().unwrap();
    let mut child = Command::new(env!("CARGO_BIN_EXE_doxprep"))
        .arg("filter")
        .current_dir(dir.path())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .expect("Failed to spawn doxprep");
    child
        .stdin
        .take()
        .unwrap()
        .write_all(b"```mermaid\ngraph TD\n```\nplain")
        .unwrap();
    let output = child.wait_with_output().unwrap();
    assert!(output.status.success());
    assert_eq!(stdout(&output), "<pre class=\"mermaid\">\ngraph TD\n</pre>\nplain");
}

#[test]
fn test_filter_repo_from_config() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("doxprep.toml"), "[docs]\nrepo = \"ModularSensors\"\n").unwrap();
    fs::write(
        dir.path().join("ReadMe.md"),
        "[log](https://envirodiy.github.io/ModularSensors/change_log.html)\n",
    )
    .unwrap();

    let output = doxprep(dir.path(), &["filter", "ReadMe.md"]);
    assert!(output.status.success());
    assert_eq!(stdout(&output), "[log](@ref change_log)\n");
}

#[test]
fn test_filter_invalid_utf8_is_replaced() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("notes.md"), b"caf\xe9\n").unwrap();
    let output = doxprep(dir.path(), &["filter", "notes.md"]);
    assert!(output.status.success());
    assert_eq!(stdout(&output), "caf\u{fffd}\n");
}

#[test]
fn test_filter_missing_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let output = doxprep(dir.path(), &["filter", "nope.md"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("nope.md"));
}

#[test]
fn test_escape_and_unescape_commands() {
    let dir = tempfile::tempdir().unwrap();
    let output = doxprep(dir.path(), &["escape", "A:B", "--allow-dots", "--allow-underscore"]);
    assert_eq!(stdout(&output), "_a_1_b\n");

    let output = doxprep(dir.path(), &["unescape", "class_logger_base"]);
    assert_eq!(stdout(&output), "LoggerBase\n");

    let output = doxprep(dir.path(), &["unescape", "page_intro"]);
    assert_eq!(stdout(&output), "page_intro\n");
}

#[test]
fn test_strip_links_command() {
    let dir = tempfile::tempdir().unwrap();
    let html = dir.path().join("html");
    fs::create_dir_all(&html).unwrap();
    fs::write(
        html.join("index.html"),
        "<p><a class=\"el\" href=\"page_a.html\">DELETE THIS LINK</a></p>\n<p>kept</p>\n",
    )
    .unwrap();

    let output = doxprep(dir.path(), &["strip-links", "html"]);
    assert!(output.status.success());
    assert_eq!(
        fs::read_to_string(html.join("index.html")).unwrap(),
        "\n<p>kept</p>\n"
    );
    assert!(html.join("index.html_pre_cleaned").exists());
}

#[test]
fn test_completion_command() {
    let dir = tempfile::tempdir().unwrap();
    let output = doxprep(dir.path(), &["completion", "bash"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("doxprep"));
}
