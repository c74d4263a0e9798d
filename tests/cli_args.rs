use predicates::prelude::*;

fn penmanship() -> assert_cmd::Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("penmanship");
    cmd.env_remove("PENMANSHIP_LOG")
        .env_remove("PENMANSHIP_WEBDRIVER_URL")
        .env_remove("PENMANSHIP_SELECTORS")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn help_lists_every_flag() {
    penmanship()
        .arg("--help")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("--text")
                .and(predicate::str::contains("--output"))
                .and(predicate::str::contains("--line-style"))
                .and(predicate::str::contains("--letter-style"))
                .and(predicate::str::contains("--visible"))
                .and(predicate::str::contains("--webdriver-url")),
        );
}

#[test]
fn invalid_line_style_is_a_usage_error() {
    let temp = tempfile::TempDir::new().unwrap();
    let output = temp.path().join("sheet.pdf");

    penmanship()
        .args(["--line-style", "wavy", "--output"])
        .arg(&output)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("invalid value 'wavy'"));

    assert!(!output.exists());
}

#[test]
fn unknown_flag_is_a_usage_error() {
    penmanship()
        .arg("--landscape")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unexpected argument"));
}

#[test]
fn missing_output_directory_fails_before_starting_a_browser() {
    let temp = tempfile::TempDir::new().unwrap();
    let output = temp.path().join("missing").join("sheet.pdf");

    penmanship()
        .arg("--output")
        .arg(&output)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("output directory does not exist"))
        .stdout(predicate::str::contains("Creating handwriting worksheet").not());
}

#[test]
fn blank_text_is_rejected() {
    penmanship()
        .args(["--text", "   "])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("--text must not be empty"));
}

#[test]
fn unreachable_webdriver_is_an_environment_failure() {
    let temp = tempfile::TempDir::new().unwrap();
    let output = temp.path().join("sheet.pdf");

    penmanship()
        .current_dir(temp.path())
        .args(["--webdriver-url", "http://127.0.0.1:1", "--output"])
        .arg(&output)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Creating handwriting worksheet"))
        .stderr(
            predicate::str::contains("environment error")
                .and(predicate::str::contains("--visible").or(predicate::str::contains("chromedriver"))),
        );

    assert!(!output.exists());
}

#[test]
fn rust_log_debug_emits_parsed_cli_to_stderr() {
    let temp = tempfile::TempDir::new().unwrap();

    penmanship()
        .env("RUST_LOG", "debug")
        .current_dir(temp.path())
        .args(["--webdriver-url", "http://127.0.0.1:1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("parsed cli"));
}
