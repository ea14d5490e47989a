//! Integration tests for the lnpos-rewards CLI
//!
//! Each test runs against its own temp config directory so reward and PIN
//! state never leaks between tests or into the real user config.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

struct TestEnv {
    _temp_dir: TempDir,
    config_path: PathBuf,
}

impl TestEnv {
    fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        let config_content = format!(
            r#"[database]
path = "{}"

[merchant]
username = "testmerchant"
currency = "USD"

[state]
rewards_file = "{}"
pin_file = "{}"
"#,
            temp_dir.path().join("transactions.db").display(),
            temp_dir.path().join("rewards.toml").display(),
            temp_dir.path().join("pin.toml").display(),
        );

        fs::write(&config_path, config_content).unwrap();

        Self {
            _temp_dir: temp_dir,
            config_path,
        }
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("lnpos-rewards").unwrap();
        cmd.env("LNPOS_CONFIG", &self.config_path);

        // Deployment overrides on the host would skew the defaults under test
        for var in [
            "LNPOS_REWARD_RATE",
            "LNPOS_MIN_REWARD_SATS",
            "LNPOS_MAX_REWARD_SATS",
            "LNPOS_STANDALONE_REWARD_SATS",
            "LNPOS_REWARDS_ENABLED",
        ] {
            cmd.env_remove(var);
        }

        cmd
    }

    fn set_pin(&self, pin: &str) {
        self.cmd()
            .args(["pin", "set", "--stdin"])
            .write_stdin(format!("{}\n", pin))
            .assert()
            .success();
    }
}

#[test]
fn test_show_default_settings() {
    let env = TestEnv::new();

    env.cmd()
        .arg("show")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("Reward program:")
                .and(predicate::str::contains("enabled"))
                .and(predicate::str::contains("2.0%"))
                .and(predicate::str::contains("1000 sats"))
                .and(predicate::str::contains("21 sats"))
                .and(predicate::str::contains("Event:")),
        );
}

#[test]
fn test_show_json() {
    let env = TestEnv::new();

    let output = env
        .cmd()
        .args(["show", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let v: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(v["config"]["reward_rate"], 0.02);
    assert_eq!(v["config"]["minimum_reward"], 1);
    assert_eq!(v["config"]["maximum_reward"], 1000);
    assert_eq!(v["config"]["is_enabled"], true);
    assert_eq!(v["event"]["active"], false);
    assert!(v["event"].get("reward_rate").is_none());
}

#[test]
fn test_set_updates_settings() {
    let env = TestEnv::new();

    env.cmd()
        .args(["set", "--rate", "0.05", "--min", "5"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("✓ Reward settings updated")
                .and(predicate::str::contains("5.0%"))
                .and(predicate::str::contains("5 sats")),
        );

    env.cmd()
        .arg("show")
        .assert()
        .success()
        .stdout(predicate::str::contains("5.0%"));
}

#[test]
fn test_set_clamps_out_of_range_rate() {
    let env = TestEnv::new();

    env.cmd()
        .args(["set", "--rate", "0.5"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("clamped").and(predicate::str::contains("10.0%")),
        );

    env.cmd()
        .arg("show")
        .assert()
        .success()
        .stdout(predicate::str::contains("10.0%"));
}

#[test]
fn test_set_requires_at_least_one_field() {
    let env = TestEnv::new();

    env.cmd()
        .arg("set")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Nothing to update"));
}

#[test]
fn test_validate_accepts_good_settings() {
    let env = TestEnv::new();

    env.cmd()
        .args(["validate", "--rate", "0.05", "--min", "5", "--max", "500"])
        .assert()
        .success()
        .stdout(predicate::str::contains("✓ Settings are valid"));
}

#[test]
fn test_validate_rejects_bad_settings() {
    let env = TestEnv::new();

    env.cmd()
        .args(["validate", "--rate", "0.25", "--min", "0"])
        .assert()
        .failure()
        .code(3)
        .stdout(
            predicate::str::contains("Reward rate must be between 0% and 10%")
                .and(predicate::str::contains("Minimum reward must be at least 1 sat")),
        );
}

#[test]
fn test_validate_does_not_change_settings() {
    let env = TestEnv::new();

    env.cmd()
        .args(["validate", "--rate", "0.25"])
        .assert()
        .failure();

    env.cmd()
        .arg("show")
        .assert()
        .success()
        .stdout(predicate::str::contains("2.0%"));
}

#[test]
fn test_reset_restores_defaults() {
    let env = TestEnv::new();

    env.cmd()
        .args(["set", "--rate", "0.05"])
        .assert()
        .success();

    env.cmd()
        .args(["reset", "--force"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("✓ Reward settings reset")
                .and(predicate::str::contains("2.0%")),
        );
}

#[test]
fn test_reset_requires_force_without_terminal() {
    let env = TestEnv::new();

    env.cmd()
        .arg("reset")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));
}

#[test]
fn test_calc_purchase_reward() {
    let env = TestEnv::new();

    env.cmd()
        .args(["calc", "--amount", "1000"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("Reward: 20 sats")
                .and(predicate::str::contains("2.0% of 1000 sats")),
        );
}

#[test]
fn test_calc_minimum_applied() {
    let env = TestEnv::new();

    env.cmd()
        .args(["calc", "--amount", "10"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("Reward: 1 sats")
                .and(predicate::str::contains("(minimum applied)")),
        );
}

#[test]
fn test_calc_standalone() {
    let env = TestEnv::new();

    env.cmd()
        .arg("calc")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("Reward: 21 sats")
                .and(predicate::str::contains("Standalone reward (no purchase)")),
        );
}

#[test]
fn test_calc_json() {
    let env = TestEnv::new();

    let output = env
        .cmd()
        .args(["calc", "--amount", "1000", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let v: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(v["reward_amount"], 20);
    assert_eq!(v["calculation_type"], "purchase-based");
    assert_eq!(v["purchase_amount"], 1000);
    assert_eq!(v["applied_minimum"], false);
}

#[test]
fn test_event_lifecycle() {
    let env = TestEnv::new();

    env.cmd()
        .args([
            "event",
            "start",
            "--rate",
            "0.10",
            "--merchant-id",
            "summer-promo",
        ])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("✓ Event started")
                .and(predicate::str::contains("10.0%"))
                .and(predicate::str::contains("summer-promo")),
        );

    // The event rate substitutes the base rate in calculations
    env.cmd()
        .args(["calc", "--amount", "1000"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Reward: 100 sats"));

    env.cmd()
        .args(["event", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("yes"));

    env.cmd()
        .args(["event", "stop"])
        .assert()
        .success()
        .stdout(predicate::str::contains("✓ Event stopped"));

    env.cmd()
        .args(["calc", "--amount", "1000"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Reward: 20 sats"));
}

#[test]
fn test_event_start_rejects_out_of_range_rate() {
    let env = TestEnv::new();

    env.cmd()
        .args(["event", "start", "--rate", "1.5"])
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("between 0% and 100%"));

    env.cmd()
        .args(["event", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("yes").not());
}

#[test]
fn test_event_start_rejects_bad_merchant_id() {
    let env = TestEnv::new();

    env.cmd()
        .args(["event", "start", "--merchant-id", "bad id!"])
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("Merchant reward ID"));
}

#[test]
fn test_pin_status_without_pin() {
    let env = TestEnv::new();

    env.cmd()
        .args(["pin", "status"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("PIN: not set")
                .and(predicate::str::contains("Session timeout: 15 minutes")),
        );
}

#[test]
fn test_pin_set_and_status() {
    let env = TestEnv::new();

    env.cmd()
        .args(["pin", "set", "--stdin"])
        .write_stdin("1234\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("✓ PIN set"));

    env.cmd()
        .args(["pin", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("PIN: set"));
}

#[test]
fn test_pin_set_refuses_overwrite() {
    let env = TestEnv::new();
    env.set_pin("1234");

    env.cmd()
        .args(["pin", "set", "--stdin"])
        .write_stdin("5678\n")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already set"));
}

#[test]
fn test_pin_set_rejects_bad_format() {
    let env = TestEnv::new();

    env.cmd()
        .args(["pin", "set", "--stdin"])
        .write_stdin("12ab\n")
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("4 digits"));
}

#[test]
fn test_pin_gates_settings_changes() {
    let env = TestEnv::new();
    env.set_pin("1234");

    // No terminal and no --pin-stdin
    env.cmd()
        .args(["set", "--rate", "0.05"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--pin-stdin"));

    // Wrong PIN
    env.cmd()
        .args(["set", "--rate", "0.05", "--pin-stdin"])
        .write_stdin("9999\n")
        .assert()
        .failure()
        .code(2);

    // Correct PIN
    env.cmd()
        .args(["set", "--rate", "0.05", "--pin-stdin"])
        .write_stdin("1234\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("✓ Reward settings updated"));
}

#[test]
fn test_pin_change_and_reauthorize() {
    let env = TestEnv::new();
    env.set_pin("1234");

    env.cmd()
        .args(["pin", "change", "--stdin"])
        .write_stdin("1234\n5678\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("✓ PIN changed"));

    env.cmd()
        .args(["set", "--rate", "0.03", "--pin-stdin"])
        .write_stdin("5678\n")
        .assert()
        .success();
}

#[test]
fn test_pin_change_wrong_current_pin() {
    let env = TestEnv::new();
    env.set_pin("1234");

    env.cmd()
        .args(["pin", "change", "--stdin"])
        .write_stdin("0000\n5678\n")
        .assert()
        .failure()
        .code(2);
}

#[test]
fn test_pin_remove() {
    let env = TestEnv::new();
    env.set_pin("1234");

    env.cmd()
        .args(["pin", "remove", "--force", "--pin-stdin"])
        .write_stdin("1234\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("✓ PIN removed"));

    env.cmd()
        .args(["pin", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("PIN: not set"));
}

#[test]
fn test_pin_timeout() {
    let env = TestEnv::new();

    env.cmd()
        .args(["pin", "timeout", "30"])
        .assert()
        .success()
        .stdout(predicate::str::contains("✓ Session timeout set to 30 minutes"));

    env.cmd()
        .args(["pin", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Session timeout: 30 minutes"));
}
