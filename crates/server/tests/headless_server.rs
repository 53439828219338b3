use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use tempfile::TempDir;

fn repo_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
}

fn copy_dir(from: &Path, to: &Path) {
    fs::create_dir_all(to).expect("create dir");
    for entry in fs::read_dir(from).expect("read dir") {
        let entry = entry.expect("entry");
        let target = to.join(entry.file_name());
        if entry.file_type().expect("file type").is_dir() {
            copy_dir(&entry.path(), &target);
        } else {
            fs::copy(entry.path(), target).expect("copy");
        }
    }
}

/// A project root holding the real base content and zone scripts.
fn project_root() -> TempDir {
    let temp = TempDir::new().expect("temp");
    fs::write(temp.path().join("Cargo.toml"), "[workspace]\n").expect("marker");
    copy_dir(&repo_root().join("assets"), &temp.path().join("assets"));
    copy_dir(&repo_root().join("data"), &temp.path().join("data"));
    temp
}

fn run_server(root: &Path, config: &str, stdin: &str) -> Output {
    let config_path = root.join("server.json");
    fs::write(&config_path, config).expect("write config");

    let mut child = Command::new(env!("CARGO_BIN_EXE_server"))
        .env("RPG_ROOT", root)
        .env("RPG_SERVER_CONFIG", &config_path)
        .env("RUST_LOG", "info")
        .env("NO_COLOR", "1")
        .env_remove("RPG_ENABLED_MODS")
        .env_remove("RPG_MAX_TURNS")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn server");
    if let Some(mut input) = child.stdin.take() {
        input.write_all(stdin.as_bytes()).expect("write stdin");
    }
    child.wait_with_output().expect("server output")
}

fn combined(output: &Output) -> String {
    format!(
        "{}{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    )
}

#[test]
fn headless_run_stops_at_turn_limit() {
    let root = project_root();
    let output = run_server(
        root.path(),
        r#"{ "console": false, "maxTurns": 3, "turnDurationMs": 1, "rngSeed": 9 }"#,
        "",
    );
    let text = combined(&output);

    assert!(output.status.success(), "{text}");
    assert!(text.contains("world_ready"), "{text}");
    assert!(text.contains("server_loop_stopped"), "{text}");
}

#[test]
fn console_session_talks_to_zelan_and_saves_on_quit() {
    let root = project_root();
    let output = run_server(
        root.path(),
        r#"{ "turnDurationMs": 5 }"#,
        "login Hero\ntalk Hero Zelan hi\nnpcs\nquit\n",
    );
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "{}", combined(&output));
    assert!(stdout.contains("Hero logged in as #1 in 0_semos_city"), "{stdout}");
    assert!(stdout.contains("Zelan: Hello there, traveller."), "{stdout}");
    assert!(stdout.contains("Zelan (-7_deniran_atlantis)"), "{stdout}");
    assert!(stdout.contains("shutting down"), "{stdout}");
    assert!(root.path().join("saves").join("hero.json").is_file());
}

#[test]
fn invalid_config_fails_startup() {
    let root = project_root();
    let output = run_server(root.path(), r#"{ "maxTurnsPerFrame": "many" }"#, "");

    assert!(!output.status.success());
    assert!(combined(&output).contains("startup_failed"));
}
