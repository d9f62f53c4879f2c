mod common;

use common::{PartylineProcess, button, command};
use serde_json::json;

#[tokio::test]
async fn play_opens_a_lobby_board() {
    let mut proc = PartylineProcess::spawn(&[]);

    proc.send(&command("alice", "play", &["spycheck"], "t1")).await;
    assert_eq!(proc.expect_reply("t1").await, "SpyCheck created.");

    let board = proc
        .expect_op(|op| op["op"] == "send_public" && op["content"]["title"] == "SpyCheck")
        .await;
    assert_eq!(board["channel"], "c1");
    assert_eq!(board["content"]["fields"][0]["name"], "Players (1/9)");

    proc.send(&command("bob", "play", &["spyfall"], "t2")).await;
    assert_eq!(
        proc.expect_reply("t2").await,
        "A game is already running in this channel."
    );

    assert!(proc.finish().await.success());
}

#[tokio::test]
async fn join_updates_the_board() {
    let mut proc = PartylineProcess::spawn(&[]);

    proc.send(&command("alice", "play", &["spyfall"], "t1")).await;
    let board = proc
        .expect_op(|op| op["op"] == "send_public" && op["content"]["title"] == "SpyFall")
        .await;
    let board_id = board["message_id"].clone();

    proc.send(&button("bob", "join", "t2")).await;
    assert_eq!(proc.expect_reply("t2").await, "You joined the game.");
    let edit = proc
        .expect_op(|op| op["op"] == "edit_public" && op["message_id"] == board_id)
        .await;
    assert_eq!(edit["content"]["fields"][0]["name"], "Players (2/8)");

    proc.send(&button("bob", "join", "t3")).await;
    assert_eq!(proc.expect_reply("t3").await, "You already joined.");

    proc.send(&button("bob", "start", "t4")).await;
    assert_eq!(proc.expect_reply("t4").await, "Only the host can start the game.");

    assert!(proc.finish().await.success());
}

#[tokio::test]
async fn commands_outside_a_game() {
    let mut proc = PartylineProcess::spawn(&[]);

    proc.send_line("{not json").await;
    proc.send_line("").await;

    proc.send(&command("alice", "play", &["spyfal"], "t1")).await;
    assert_eq!(
        proc.expect_reply("t1").await,
        "Unknown game 'spyfal'. Did you mean 'spyfall'?"
    );

    proc.send(&command("alice", "stop", &[], "t2")).await;
    assert_eq!(proc.expect_reply("t2").await, "No game is running in this channel.");

    let mut direct = command("alice", "play", &["spycheck"], "t3");
    direct["origin"] = json!({ "type": "direct" });
    proc.send(&direct).await;
    assert_eq!(
        proc.expect_reply("t3").await,
        "Games can only be started in a channel."
    );

    proc.send(&command("alice", "dance", &[], "t4")).await;
    assert_eq!(proc.expect_reply("t4").await, "Unknown command 'dance'.");

    assert!(proc.finish().await.success());
}

#[tokio::test]
async fn host_stop_ends_the_session() {
    let mut proc = PartylineProcess::spawn(&[]);

    proc.send(&command("alice", "play", &["spycheck"], "t1")).await;
    proc.expect_reply("t1").await;

    proc.send(&command("alice", "stop", &[], "t2")).await;
    assert_eq!(proc.expect_reply("t2").await, "Stopping the game.");
    proc.expect_op(|op| op["op"] == "send_public" && op["content"]["title"] == "Game stopped")
        .await;

    proc.send(&command("alice", "play", &["spyfall"], "t3")).await;
    assert_eq!(proc.expect_reply("t3").await, "SpyFall created.");

    assert!(proc.finish().await.success());
}

#[tokio::test]
async fn disabled_games_are_refused() {
    let mut proc = PartylineProcess::spawn(&["--game", "spyfall"]);

    proc.send(&command("alice", "play", &["spycheck"], "t1")).await;
    assert_eq!(proc.expect_reply("t1").await, "spycheck is not enabled here.");

    assert!(proc.finish().await.success());
}

#[tokio::test]
async fn events_file_records_session_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let events = dir.path().join("events.jsonl");
    let mut proc = PartylineProcess::spawn(&["--events-file", events.to_str().unwrap()]);

    proc.send(&command("alice", "play", &["spycheck"], "t1")).await;
    proc.expect_reply("t1").await;
    assert!(proc.finish().await.success());

    let log = std::fs::read_to_string(&events).unwrap();
    let types: Vec<String> = log
        .lines()
        .map(|line| {
            let event: serde_json::Value = serde_json::from_str(line).unwrap();
            event["type"].as_str().unwrap_or_default().to_owned()
        })
        .collect();
    assert_eq!(types.first().map(String::as_str), Some("SessionCreated"));
    assert!(types.iter().any(|t| t == "SessionExpired"));
}

#[tokio::test]
async fn config_file_overrides_limits() {
    let config = PartylineProcess::fixture_path("valid.yaml");
    let mut proc = PartylineProcess::spawn(&["--config", config.to_str().unwrap()]);

    proc.send(&command("alice", "play", &["spyfall"], "t1")).await;
    let board = proc
        .expect_op(|op| op["op"] == "send_public" && op["content"]["title"] == "SpyFall")
        .await;
    assert_eq!(board["content"]["fields"][0]["name"], "Players (1/6)");

    assert!(proc.finish().await.success());
}
