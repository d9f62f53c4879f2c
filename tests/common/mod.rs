//! Shared integration-test harness for spawning `partyline` as a child
//! process and talking to it over stdio NDJSON.

#![allow(dead_code)]

use std::path::PathBuf;
use std::time::Duration;

use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};

/// Default timeout for waiting on a single outbound operation.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// A running `partyline run` process.
///
/// The child process is killed on drop via `kill_on_drop(true)`.
pub struct PartylineProcess {
    child: Child,
    stdin: Option<tokio::process::ChildStdin>,
    reader: BufReader<tokio::process::ChildStdout>,
}

impl PartylineProcess {
    /// Spawns `partyline run` with extra arguments.
    pub fn spawn(extra: &[&str]) -> Self {
        let bin = env!("CARGO_BIN_EXE_partyline");
        let mut child = Command::new(bin)
            .arg("run")
            .args(extra)
            .arg("--quiet")
            .env_remove("PARTYLINE_CONFIG")
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .expect("failed to spawn partyline");

        let stdin = child.stdin.take().expect("stdin not captured");
        let stdout = child.stdout.take().expect("stdout not captured");

        Self {
            child,
            stdin: Some(stdin),
            reader: BufReader::new(stdout),
        }
    }

    /// Writes one raw line to stdin.
    pub async fn send_line(&mut self, line: &str) {
        let stdin = self.stdin.as_mut().expect("stdin already closed");
        stdin
            .write_all(format!("{line}\n").as_bytes())
            .await
            .expect("failed to write to stdin");
        stdin.flush().await.expect("failed to flush stdin");
    }

    /// Sends an inbound action.
    pub async fn send(&mut self, action: &Value) {
        let line = serde_json::to_string(action).expect("failed to serialize action");
        self.send_line(&line).await;
    }

    /// Reads one outbound operation.
    ///
    /// Panics on EOF or if nothing arrives within `timeout`.
    pub async fn read_op(&mut self, timeout: Duration) -> Value {
        let mut line = String::new();
        let result = tokio::time::timeout(timeout, async {
            loop {
                line.clear();
                let n = self
                    .reader
                    .read_line(&mut line)
                    .await
                    .expect("read_line I/O error");
                assert!(n > 0, "unexpected EOF from partyline");
                let trimmed = line.trim();
                if !trimmed.is_empty() {
                    return serde_json::from_str::<Value>(trimmed)
                        .unwrap_or_else(|e| panic!("invalid JSON from partyline: {e}\nline: {line}"));
                }
            }
        })
        .await;
        result.expect("timed out waiting for output from partyline")
    }

    /// Reads operations until one satisfies `pred`, returning it.
    pub async fn expect_op(&mut self, pred: impl Fn(&Value) -> bool) -> Value {
        loop {
            let op = self.read_op(DEFAULT_TIMEOUT).await;
            if pred(&op) {
                return op;
            }
        }
    }

    /// Reads until the reply carrying `token` arrives and returns its body.
    pub async fn expect_reply(&mut self, token: &str) -> String {
        let op = self
            .expect_op(|op| op["op"] == "reply" && op["token"] == token)
            .await;
        op["content"]["body"].as_str().unwrap_or_default().to_owned()
    }

    /// Closes stdin and waits for the process to exit.
    pub async fn finish(mut self) -> std::process::ExitStatus {
        drop(self.stdin.take());
        tokio::time::timeout(DEFAULT_TIMEOUT, self.child.wait())
            .await
            .expect("partyline did not exit after stdin closed")
            .expect("failed to wait on partyline")
    }

    /// Runs the binary to completion with the given arguments.
    pub fn spawn_command(args: &[&str]) -> std::process::Output {
        std::process::Command::new(env!("CARGO_BIN_EXE_partyline"))
            .args(args)
            .env_remove("PARTYLINE_CONFIG")
            .output()
            .expect("failed to run partyline")
    }

    /// Path to a file under `tests/fixtures`.
    pub fn fixture_path(name: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests")
            .join("fixtures")
            .join(name)
    }
}

/// A command action from `actor` in channel `c1` of group `g1`.
pub fn command(actor: &str, name: &str, args: &[&str], token: &str) -> Value {
    action("command", actor, name, args, token)
}

/// A button press from `actor` in channel `c1` of group `g1`.
pub fn button(actor: &str, custom_id: &str, token: &str) -> Value {
    action("button", actor, custom_id, &[], token)
}

fn action(kind: &str, actor: &str, custom_id: &str, values: &[&str], token: &str) -> Value {
    json!({
        "kind": kind,
        "actor": actor,
        "actor_name": actor.to_uppercase(),
        "custom_id": custom_id,
        "values": values,
        "origin": { "type": "channel", "group": "g1", "channel": "c1" },
        "reply_token": token,
    })
}
