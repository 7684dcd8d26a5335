use std::path::Path;
use std::process::{Command, Output};

const DEPLOYER: &str = "0xd0d0d0d0d0d0d0d0d0d0d0d0d0d0d0d0d0d0d0d0";
const ALICE: &str = "0x0101010101010101010101010101010101010101";
const BOB: &str = "0x0202020202020202020202020202020202020202";

fn sdft(state: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_sdft"))
        .arg("--state")
        .arg(state)
        .args(args)
        .output()
        .expect("run sdft")
}

fn stdout(output: &Output) -> String {
    assert!(
        output.status.success(),
        "sdft failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout.clone()).unwrap()
}

#[test]
fn genesis_transfer_and_auto_burn() {
    let dir = tempfile::tempdir().unwrap();
    let state = dir.path().join("state.json");

    let out = stdout(&sdft(&state, &["genesis", "--deployer", DEPLOYER]));
    assert!(out.contains(r#""type":"transfer""#));
    assert_eq!(stdout(&sdft(&state, &["balance", DEPLOYER])).trim(), "1000000.0");

    stdout(&sdft(&state, &["transfer", "--from", DEPLOYER, "--to", ALICE, "1"]));
    let out = stdout(&sdft(
        &state,
        &["transfer-burn", "--from", ALICE, "--to", BOB, "1"],
    ));
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains(r#""type":"burn""#));
    assert!(lines[0].contains(r#""amount":"100000000000000000""#));
    assert!(lines[1].contains(r#""type":"transfer""#));

    assert_eq!(stdout(&sdft(&state, &["balance", BOB])).trim(), "0.9");
    assert_eq!(stdout(&sdft(&state, &["balance", ALICE])).trim(), "0.0");
    let info = stdout(&sdft(&state, &["info"]));
    assert!(info.contains("Simple DeFi Token"));
    assert!(info.contains("total supply: 999999.9"));
}

#[test]
fn failed_transfer_exits_nonzero_and_keeps_state() {
    let dir = tempfile::tempdir().unwrap();
    let state = dir.path().join("state.json");
    stdout(&sdft(&state, &["genesis", "--deployer", DEPLOYER]));
    stdout(&sdft(&state, &["transfer", "--from", DEPLOYER, "--to", ALICE, "5"]));
    let before = std::fs::read(&state).unwrap();

    let output = sdft(&state, &["transfer", "--from", ALICE, "--to", BOB, "10"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("insufficient balance"));
    assert_eq!(std::fs::read(&state).unwrap(), before);
    assert_eq!(stdout(&sdft(&state, &["balance", ALICE])).trim(), "5.0");
}

#[test]
fn concurrent_transfers_are_all_applied() {
    let dir = tempfile::tempdir().unwrap();
    let state = dir.path().join("state.json");
    stdout(&sdft(&state, &["genesis", "--deployer", DEPLOYER]));

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let state = state.clone();
            std::thread::spawn(move || {
                sdft(&state, &["transfer", "--from", DEPLOYER, "--to", ALICE, "1"])
            })
        })
        .collect();
    for handle in handles {
        let output = handle.join().unwrap();
        assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    }

    assert_eq!(stdout(&sdft(&state, &["balance", ALICE])).trim(), "16.0");
    assert_eq!(stdout(&sdft(&state, &["balance", DEPLOYER])).trim(), "999984.0");
    let info = stdout(&sdft(&state, &["info"]));
    assert!(info.contains("height:       16"));
}

#[test]
fn genesis_refuses_to_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    let state = dir.path().join("state.json");
    stdout(&sdft(&state, &["genesis", "--deployer", DEPLOYER]));
    assert!(!sdft(&state, &["genesis", "--deployer", ALICE]).status.success());
    stdout(&sdft(&state, &["genesis", "--deployer", ALICE, "--force"]));
    assert_eq!(stdout(&sdft(&state, &["balance", ALICE])).trim(), "1000000.0");
}

#[test]
fn unit_conversion_commands() {
    let dir = tempfile::tempdir().unwrap();
    let state = dir.path().join("unused.json");
    assert_eq!(
        stdout(&sdft(&state, &["to-units", "0.9"])).trim(),
        "900000000000000000"
    );
    assert_eq!(
        stdout(&sdft(&state, &["from-units", "999999900000000000000000"])).trim(),
        "999999.9"
    );
    assert!(!sdft(&state, &["to-units", "1.2.3"]).status.success());
}
