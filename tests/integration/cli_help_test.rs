use assert_cmd::Command;
use predicates::str::{contains, starts_with};

const BIN: &str = "flowent";

#[test]
fn version_flag_prints_crate_version() {
    let expected = format!("{BIN} {}", flowent::VERSION);

    Command::cargo_bin(BIN)
        .expect("binary should build")
        .arg("--version")
        .assert()
        .success()
        .stdout(starts_with(expected));
}

#[test]
fn help_lists_node_commands() {
    Command::cargo_bin(BIN)
        .expect("binary should build")
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("NODE COMMANDS"))
        .stdout(contains("run"))
        .stdout(contains("nodes"))
        .stdout(contains("validate"));
}

#[test]
fn run_help_describes_inputs() {
    Command::cargo_bin(BIN)
        .expect("binary should build")
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(contains("--node"))
        .stdout(contains("--catalog"))
        .stdout(contains("--context-out"))
        .stdout(contains("flowent run --catalog"));
}

#[test]
fn missing_subcommand_is_a_usage_error() {
    Command::cargo_bin(BIN)
        .expect("binary should build")
        .assert()
        .failure()
        .stderr(contains("Usage"));
}
