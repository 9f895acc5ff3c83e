use std::process::Command;

#[test]
fn help_exits_successfully() {
    let output = Command::new(env!("CARGO_BIN_EXE_tewn"))
        .arg("--help")
        .output()
        .expect("failed to run tewn");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("A chromatic CLI tuner."));
    assert!(stdout.contains("--help"));
}

#[test]
fn unknown_flag_is_an_error() {
    let output = Command::new(env!("CARGO_BIN_EXE_tewn"))
        .arg("--frobnicate")
        .output()
        .expect("failed to run tewn");

    assert!(!output.status.success());
}
