//! Stdio platform adapter.
//!
//! Reads [`InboundAction`]s as NDJSON from stdin and writes [`Outbound`]
//! operations as NDJSON to stdout. Lets the engine run headless behind any
//! chat front-end that can speak line-delimited JSON.

use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashSet;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;

use super::wire::{AudioAction, InboundAction, Outbound};
use super::{
    AudioSink, Content, Cue, DEFAULT_MAX_MESSAGE_SIZE, DEFAULT_STDIO_BUFFER_SIZE, MessageRef,
    Messenger, Result,
};
use crate::engine::action::{ChannelId, UserId};
use crate::error::TransportError;

/// Configuration for the stdio adapter.
#[derive(Debug, Clone, Copy)]
pub struct StdioConfig {
    /// Maximum inbound line size in bytes.
    pub max_message_size: usize,
    /// Read/write buffer size in bytes.
    pub buffer_size: usize,
}

impl StdioConfig {
    /// Loads configuration from environment variables with defaults.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `PARTYLINE_MAX_MESSAGE_SIZE` | 1 MiB |
    /// | `PARTYLINE_STDIO_BUFFER_SIZE` | 64 KB |
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            max_message_size: env_or("PARTYLINE_MAX_MESSAGE_SIZE", DEFAULT_MAX_MESSAGE_SIZE),
            buffer_size: env_or("PARTYLINE_STDIO_BUFFER_SIZE", DEFAULT_STDIO_BUFFER_SIZE),
        }
    }
}

impl Default for StdioConfig {
    fn default() -> Self {
        Self {
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            buffer_size: DEFAULT_STDIO_BUFFER_SIZE,
        }
    }
}

enum WriterCmd {
    Op(Outbound),
    Flush(oneshot::Sender<()>),
}

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

/// NDJSON platform over a reader/writer pair.
///
/// Outbound operations go through a single writer task so lines from
/// concurrent sessions never interleave and keep their send order.
pub struct StdioPlatform {
    reader: Mutex<BufReader<BoxedReader>>,
    outbound: mpsc::UnboundedSender<WriterCmd>,
    next_message_id: AtomicU64,
    live: DashSet<u64>,
    config: StdioConfig,
}

impl StdioPlatform {
    /// Creates an adapter on the process's stdin/stdout.
    ///
    /// Must be called inside a Tokio runtime; the returned handle is the
    /// writer task.
    #[must_use]
    pub fn new(config: StdioConfig) -> (Self, JoinHandle<()>) {
        Self::with_io(tokio::io::stdin(), tokio::io::stdout(), config)
    }

    /// Creates an adapter over arbitrary async I/O.
    #[must_use]
    pub fn with_io<R, W>(reader: R, writer: W, config: StdioConfig) -> (Self, JoinHandle<()>)
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let writer = BufWriter::with_capacity(config.buffer_size, writer);
        let handle = tokio::spawn(write_loop(writer, rx));
        let boxed: BoxedReader = Box::new(reader);
        let platform = Self {
            reader: Mutex::new(BufReader::with_capacity(config.buffer_size, boxed)),
            outbound: tx,
            next_message_id: AtomicU64::new(1),
            live: DashSet::new(),
            config,
        };
        (platform, handle)
    }

    /// Reads the next inbound action.
    ///
    /// Oversized lines, invalid UTF-8, blank lines and malformed JSON are
    /// logged and skipped. Returns `Ok(None)` at end of input.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Io` if the underlying read fails.
    #[allow(clippy::significant_drop_tightening)] // reader must be held across the loop
    pub async fn receive(&self) -> Result<Option<InboundAction>> {
        let mut reader = self.reader.lock().await;
        // Bounded line reading: copy at most max_message_size + 1 bytes and
        // drain the rest of an oversized line without buffering it.
        let read_limit = self.config.max_message_size + 1;
        let mut buf: Vec<u8> = Vec::with_capacity(read_limit.min(64 * 1024));

        loop {
            buf.clear();
            let mut overflowed = false;

            loop {
                let available = reader.fill_buf().await?;
                if available.is_empty() {
                    if buf.is_empty() {
                        return Ok(None);
                    }
                    break;
                }

                if let Some(pos) = available.iter().position(|&b| b == b'\n') {
                    if !overflowed {
                        let remaining_cap = read_limit.saturating_sub(buf.len());
                        let copy_len = pos.min(remaining_cap);
                        buf.extend_from_slice(&available[..copy_len]);
                        if pos > remaining_cap {
                            overflowed = true;
                        }
                    }
                    reader.consume(pos + 1);
                    break;
                }

                if !overflowed {
                    let remaining_cap = read_limit.saturating_sub(buf.len());
                    if remaining_cap == 0 {
                        overflowed = true;
                    } else {
                        let copy_len = available.len().min(remaining_cap);
                        buf.extend_from_slice(&available[..copy_len]);
                        if available.len() > remaining_cap {
                            overflowed = true;
                        }
                    }
                }
                let consumed = available.len();
                reader.consume(consumed);
            }

            if overflowed || buf.len() > self.config.max_message_size {
                tracing::warn!(
                    limit = self.config.max_message_size,
                    "inbound line exceeds size limit, skipping"
                );
                continue;
            }

            let line = match std::str::from_utf8(&buf) {
                Ok(s) => s,
                Err(e) => {
                    tracing::warn!("invalid UTF-8 in inbound line, skipping: {e}");
                    continue;
                }
            };
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            match serde_json::from_str::<InboundAction>(trimmed) {
                Ok(action) => return Ok(Some(action)),
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        line = %sanitize_for_log(trimmed, 200),
                        "invalid inbound action, skipping"
                    );
                }
            }
        }
    }

    /// Waits until every operation queued so far has been written.
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        if self.outbound.send(WriterCmd::Flush(tx)).is_ok() {
            let _ = rx.await;
        }
    }

    fn push(&self, op: Outbound) -> Result<()> {
        self.outbound
            .send(WriterCmd::Op(op))
            .map_err(|_| TransportError::Rejected("output closed".to_owned()))
    }

    fn push_audio(&self, channel: &ChannelId, action: AudioAction, cue: Option<Cue>) {
        let op = Outbound::Audio {
            channel: channel.clone(),
            action,
            cue,
        };
        if self.push(op).is_err() {
            tracing::trace!(%channel, "audio dropped, output closed");
        }
    }
}

impl std::fmt::Debug for StdioPlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StdioPlatform")
            .field("config", &self.config)
            .field("live_messages", &self.live.len())
            .finish_non_exhaustive()
    }
}

async fn write_loop<W: AsyncWrite + Unpin>(
    mut writer: BufWriter<W>,
    mut rx: mpsc::UnboundedReceiver<WriterCmd>,
) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WriterCmd::Op(op) => {
                let line = match serde_json::to_string(&op) {
                    Ok(line) => line,
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to serialize outbound op");
                        continue;
                    }
                };
                let written = async {
                    writer.write_all(line.as_bytes()).await?;
                    writer.write_all(b"\n").await?;
                    writer.flush().await
                }
                .await;
                if let Err(e) = written {
                    tracing::warn!(error = %e, "output closed, stopping writer");
                    break;
                }
            }
            WriterCmd::Flush(done) => {
                let _ = writer.flush().await;
                let _ = done.send(());
            }
        }
    }
}

#[async_trait::async_trait]
impl Messenger for StdioPlatform {
    async fn send_public(&self, channel: &ChannelId, content: &Content) -> Result<MessageRef> {
        let id = self.next_message_id.fetch_add(1, Ordering::Relaxed);
        self.push(Outbound::SendPublic {
            channel: channel.clone(),
            message_id: id,
            content: content.clone(),
        })?;
        self.live.insert(id);
        Ok(MessageRef {
            channel: channel.clone(),
            id,
        })
    }

    async fn edit_public(&self, message: &MessageRef, content: &Content) -> Result<()> {
        if !self.live.contains(&message.id) {
            return Err(TransportError::UnknownMessage(message.id));
        }
        self.push(Outbound::EditPublic {
            channel: message.channel.clone(),
            message_id: message.id,
            content: content.clone(),
        })
    }

    async fn delete_public(&self, message: &MessageRef) -> Result<()> {
        if self.live.remove(&message.id).is_none() {
            return Err(TransportError::UnknownMessage(message.id));
        }
        self.push(Outbound::DeletePublic {
            channel: message.channel.clone(),
            message_id: message.id,
        })
    }

    async fn send_private(&self, user: &UserId, token: &str, content: &Content) -> Result<()> {
        if token.is_empty() {
            return Err(TransportError::TokenUnavailable(user.to_string()));
        }
        self.push(Outbound::SendPrivate {
            user: user.clone(),
            token: token.to_owned(),
            content: content.clone(),
        })
    }

    async fn send_direct(&self, user: &UserId, content: &Content) -> Result<()> {
        self.push(Outbound::SendDirect {
            user: user.clone(),
            content: content.clone(),
        })
    }

    async fn reply(&self, token: &str, content: &Content, ephemeral: bool) -> Result<()> {
        if token.is_empty() {
            return Err(TransportError::Rejected("empty reply token".to_owned()));
        }
        self.push(Outbound::Reply {
            token: token.to_owned(),
            ephemeral,
            content: content.clone(),
        })
    }
}

impl AudioSink for StdioPlatform {
    fn play_cue(&self, channel: &ChannelId, cue: Cue) {
        self.push_audio(channel, AudioAction::Play, Some(cue));
    }

    fn pause_cue(&self, channel: &ChannelId) {
        self.push_audio(channel, AudioAction::Pause, None);
    }

    fn resume_cue(&self, channel: &ChannelId) {
        self.push_audio(channel, AudioAction::Resume, None);
    }

    fn stop(&self, channel: &ChannelId) {
        self.push_audio(channel, AudioAction::Stop, None);
    }
}

/// Truncates and strips control characters from untrusted input before logging.
pub(crate) fn sanitize_for_log(input: &str, max_len: usize) -> String {
    input
        .chars()
        .take(max_len)
        .map(|c| {
            if c.is_control() && c != '\t' {
                '\u{FFFD}'
            } else {
                c
            }
        })
        .collect()
}

/// Reads an environment variable, parsing it to type `T`, or returns the default.
///
/// Logs a warning if the variable is set but cannot be parsed.
fn env_or<T: FromStr>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(v) => v.parse().unwrap_or_else(|_| {
            tracing::warn!(name, value = %v, "invalid env var value, using default");
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use tokio::io::{AsyncBufReadExt, BufReader, DuplexStream};

    use super::*;
    use crate::engine::action::ActionKind;

    fn platform(input: &str, config: StdioConfig) -> (StdioPlatform, DuplexStream) {
        let (writer, observer) = tokio::io::duplex(64 * 1024);
        let (platform, _handle) =
            StdioPlatform::with_io(Cursor::new(input.as_bytes().to_vec()), writer, config);
        (platform, observer)
    }

    async fn read_lines(observer: DuplexStream, n: usize) -> Vec<serde_json::Value> {
        let mut lines = BufReader::new(observer).lines();
        let mut out = Vec::new();
        for _ in 0..n {
            let line = lines.next_line().await.unwrap().unwrap();
            out.push(serde_json::from_str(&line).unwrap());
        }
        out
    }

    #[test]
    fn test_stdio_config_default() {
        let config = StdioConfig::default();
        assert_eq!(config.max_message_size, DEFAULT_MAX_MESSAGE_SIZE);
        assert_eq!(config.buffer_size, DEFAULT_STDIO_BUFFER_SIZE);
    }

    #[test]
    fn test_env_or_default() {
        let result: usize = env_or("PARTYLINE_TEST_NONEXISTENT_VAR_12345", 42);
        assert_eq!(result, 42);
    }

    #[test]
    fn test_sanitize_for_log_strips_control_chars() {
        assert_eq!(sanitize_for_log("a\u{1b}[31mb\tc", 100), "a\u{FFFD}[31mb\tc");
        assert_eq!(sanitize_for_log("abcdef", 3), "abc");
    }

    #[tokio::test]
    async fn test_receive_skips_garbage_and_reads_actions() {
        let input = concat!(
            "\n",
            "not json\n",
            r#"{"kind":"button","actor":"u1","custom_id":"join","origin":{"type":"channel","group":"g","channel":"c"}}"#,
            "\n",
            r#"{"kind":"command","actor":"u2","custom_id":"refresh","origin":{"type":"direct"},"reply_token":"t"}"#,
        );
        let (platform, _observer) = platform(input, StdioConfig::default());

        let first = platform.receive().await.unwrap().unwrap();
        assert!(first.is(ActionKind::Button, "join"));
        assert_eq!(first.channel(), Some(&ChannelId::from("c")));

        let second = platform.receive().await.unwrap().unwrap();
        assert_eq!(second.reply_token.as_deref(), Some("t"));
        assert!(second.channel().is_none());

        assert!(platform.receive().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_receive_skips_oversized_line() {
        let big = format!(
            r#"{{"kind":"button","actor":"{}","custom_id":"join","origin":{{"type":"direct"}}}}"#,
            "x".repeat(200)
        );
        let small = r#"{"kind":"button","actor":"u1","custom_id":"leave","origin":{"type":"direct"}}"#;
        let input = format!("{big}\n{small}\n");
        let config = StdioConfig {
            max_message_size: 128,
            buffer_size: 16,
        };
        let (platform, _observer) = platform(&input, config);

        let action = platform.receive().await.unwrap().unwrap();
        assert_eq!(action.custom_id, "leave");
    }

    #[tokio::test]
    async fn test_public_messages_get_ids_in_order() {
        let (platform, observer) = platform("", StdioConfig::default());
        let channel = ChannelId::from("c1");

        let first = platform
            .send_public(&channel, &Content::text("one"))
            .await
            .unwrap();
        let second = platform
            .send_public(&channel, &Content::text("two"))
            .await
            .unwrap();
        platform
            .edit_public(&first, &Content::text("one!"))
            .await
            .unwrap();
        platform.play_cue(&channel, Cue::Join);
        platform.flush().await;

        assert!(second.id > first.id);
        let lines = read_lines(observer, 4).await;
        assert_eq!(lines[0]["op"], "send_public");
        assert_eq!(lines[1]["content"]["body"], "two");
        assert_eq!(lines[2]["op"], "edit_public");
        assert_eq!(lines[2]["message_id"], first.id);
        assert_eq!(lines[3]["op"], "audio");
        assert_eq!(lines[3]["cue"], "join");
    }

    #[tokio::test]
    async fn test_deleted_message_cannot_be_edited() {
        let (platform, _observer) = platform("", StdioConfig::default());
        let msg = platform
            .send_public(&ChannelId::from("c1"), &Content::text("bye"))
            .await
            .unwrap();
        platform.delete_public(&msg).await.unwrap();

        let err = platform
            .edit_public(&msg, &Content::text("again"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::UnknownMessage(id) if id == msg.id));
        assert!(platform.delete_public(&msg).await.is_err());
    }

    #[tokio::test]
    async fn test_private_send_requires_token() {
        let (platform, _observer) = platform("", StdioConfig::default());
        let err = platform
            .send_private(&UserId::from("u1"), "", &Content::text("secret"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::TokenUnavailable(_)));
    }
}
