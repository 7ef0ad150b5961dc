use std::path::{Path, PathBuf};
use std::process::Command;

use assert_cmd::prelude::*;
use chrono::Utc;
use predicates::prelude::PredicateBooleanExt;
use predicates::str::contains;
use rusqlite::{params, Connection};
use tempfile::TempDir;

use courier_store::{apple_time::to_apple_nanos, schema::MINIMAL_SCHEMA};

fn courier_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("courier"));
    cmd.env("HOME", home)
        .env("USERPROFILE", home)
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG");
    cmd
}

/// A chat.db with one inbound and one outbound message from a minute ago.
fn fixture_db(dir: &Path) -> PathBuf {
    let path = dir.join("chat.db");
    let conn = Connection::open(&path).expect("create db");
    conn.execute_batch(MINIMAL_SCHEMA).expect("schema");
    conn.execute("INSERT INTO handle (id) VALUES ('+15550001')", [])
        .expect("handle");
    conn.execute(
        "INSERT INTO chat (guid) VALUES ('iMessage;-;+15550001')",
        [],
    )
    .expect("chat");

    let minute_ago = to_apple_nanos(Utc::now() - chrono::Duration::seconds(60));
    for (guid, from_me, text) in [("m-in", 0, "are you around?"), ("m-out", 1, "yes")] {
        conn.execute(
            "INSERT INTO message (guid, text, handle_id, is_from_me, date) \
             VALUES (?1, ?2, 1, ?3, ?4)",
            params![guid, text, from_me, minute_ago],
        )
        .expect("message");
        conn.execute(
            "INSERT INTO chat_message_join (chat_id, message_id) VALUES (1, ?1)",
            params![conn.last_insert_rowid()],
        )
        .expect("join");
    }
    path
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

#[test]
fn help_lists_subcommands() {
    let home = TempDir::new().expect("home");
    courier_cmd(home.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("watch").and(contains("poll")).and(contains("config")));
}

#[test]
fn config_show_prints_defaults_without_a_file() {
    let home = TempDir::new().expect("home");
    courier_cmd(home.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(
            contains("(defaults)")
                .and(contains("debounce_ms: 500"))
                .and(contains("text_timeout_ms: 30000"))
                .and(contains("Library/Messages/chat.db")),
        );
}

#[test]
fn config_init_writes_once_unless_forced() {
    let home = TempDir::new().expect("home");
    let config_path = home.path().join(".courier").join("config.yaml");

    courier_cmd(home.path())
        .args(["config", "init"])
        .assert()
        .success()
        .stdout(contains("config.yaml"));
    assert!(config_path.exists());

    courier_cmd(home.path())
        .args(["config", "init"])
        .assert()
        .failure()
        .stderr(contains("--force"));

    courier_cmd(home.path())
        .args(["--database", "/tmp/elsewhere.db", "config", "init", "--force"])
        .assert()
        .success();
    let written = std::fs::read_to_string(&config_path).expect("read config");
    assert!(written.contains("/tmp/elsewhere.db"));

    courier_cmd(home.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(contains("(loaded)").and(contains("/tmp/elsewhere.db")));
}

// ---------------------------------------------------------------------------
// poll / watch
// ---------------------------------------------------------------------------

#[test]
fn poll_prints_recent_events_as_json_lines() {
    let home = TempDir::new().expect("home");
    let db = fixture_db(home.path());

    let output = courier_cmd(home.path())
        .arg("--database")
        .arg(&db)
        .args(["poll", "--since-minutes", "10", "--json"])
        .output()
        .expect("run courier");
    assert!(output.status.success(), "{output:?}");

    let lines: Vec<serde_json::Value> = String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(|line| serde_json::from_str(line).expect("json line"))
        .collect();
    let categories: Vec<&str> = lines
        .iter()
        .filter_map(|line| line["category"].as_str())
        .collect();
    assert_eq!(categories, ["new-message", "self-message"]);
    assert_eq!(lines[0]["messages"][0]["guid"], "m-in");
    assert_eq!(lines[1]["messages"][0]["text"], "yes");
}

#[test]
fn poll_text_output_names_sender_and_chat() {
    let home = TempDir::new().expect("home");
    let db = fixture_db(home.path());

    courier_cmd(home.path())
        .arg("--database")
        .arg(&db)
        .arg("poll")
        .assert()
        .success()
        .stdout(
            contains("new-message (1)")
                .and(contains("iMessage;-;+15550001"))
                .and(contains("+15550001"))
                .and(contains("are you around?")),
        );
}

#[test]
fn poll_window_excludes_older_rows() {
    let home = TempDir::new().expect("home");
    let db = fixture_db(home.path());
    let conn = Connection::open(&db).expect("open");
    conn.execute(
        "UPDATE message SET date = ?1",
        params![to_apple_nanos(Utc::now() - chrono::Duration::hours(2))],
    )
    .expect("age rows");
    drop(conn);

    courier_cmd(home.path())
        .arg("--database")
        .arg(&db)
        .args(["poll", "--since-minutes", "10", "--json"])
        .assert()
        .success()
        .stdout(predicates::str::is_empty());
}

#[test]
fn missing_database_is_reported() {
    let home = TempDir::new().expect("home");
    let missing = home.path().join("nope.db");

    for command in ["poll", "watch"] {
        courier_cmd(home.path())
            .arg("--database")
            .arg(&missing)
            .arg(command)
            .assert()
            .failure()
            .stderr(contains("chat database not found"));
    }
}
