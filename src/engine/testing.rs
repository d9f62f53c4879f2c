//! Recording doubles for the platform traits.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use crate::engine::action::{ActionKind, ChannelId, GroupId, InboundAction, Origin, UserId};
use crate::engine::core::GameDriver;
use crate::engine::participant::ReplyPolicy;
use crate::engine::session::{GameSession, SessionParts};
use crate::observability::EventEmitter;
use crate::error::TransportError;
use crate::transport::{AudioSink, Content, Cue, MessageRef, Messenger, Result};

/// One recorded messenger call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Public {
        channel: ChannelId,
        id: u64,
        content: Content,
    },
    Edit {
        id: u64,
        content: Content,
    },
    Delete {
        id: u64,
    },
    Private {
        user: UserId,
        token: String,
        content: Content,
    },
    Direct {
        user: UserId,
        content: Content,
    },
    Reply {
        token: String,
        content: Content,
        ephemeral: bool,
    },
}

#[derive(Default)]
pub struct RecordingMessenger {
    sent: Mutex<Vec<Sent>>,
    next_id: AtomicU64,
    fail_private: AtomicBool,
}

impl RecordingMessenger {
    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }

    pub fn set_fail_private(&self, fail: bool) {
        self.fail_private.store(fail, Ordering::SeqCst);
    }

    pub fn privates_to(&self, user: &UserId) -> Vec<Content> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Private { user: u, content, .. } if &u == user => Some(content),
                _ => None,
            })
            .collect()
    }

    pub fn directs_to(&self, user: &UserId) -> Vec<Content> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Direct { user: u, content } if &u == user => Some(content),
                _ => None,
            })
            .collect()
    }

    pub fn publics(&self) -> Vec<Content> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Public { content, .. } | Sent::Edit { content, .. } => Some(content),
                _ => None,
            })
            .collect()
    }

    pub fn replies(&self) -> Vec<Content> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Reply { content, .. } => Some(content),
                _ => None,
            })
            .collect()
    }

    /// Returns `true` if any public message or edit mentions `needle`.
    pub fn public_mentions(&self, needle: &str) -> bool {
        self.publics().iter().any(|c| mentions(c, needle))
    }

    /// Returns `true` if any reply mentions `needle`.
    pub fn reply_mentions(&self, needle: &str) -> bool {
        self.replies().iter().any(|c| mentions(c, needle))
    }

    fn record(&self, sent: Sent) {
        self.sent.lock().unwrap().push(sent);
    }
}

pub fn mentions(content: &Content, needle: &str) -> bool {
    content.title.as_deref().is_some_and(|t| t.contains(needle))
        || content.body.contains(needle)
        || content
            .fields
            .iter()
            .any(|f| f.name.contains(needle) || f.value.contains(needle))
}

#[async_trait::async_trait]
impl Messenger for RecordingMessenger {
    async fn send_public(&self, channel: &ChannelId, content: &Content) -> Result<MessageRef> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.record(Sent::Public {
            channel: channel.clone(),
            id,
            content: content.clone(),
        });
        Ok(MessageRef {
            channel: channel.clone(),
            id,
        })
    }

    async fn edit_public(&self, message: &MessageRef, content: &Content) -> Result<()> {
        self.record(Sent::Edit {
            id: message.id,
            content: content.clone(),
        });
        Ok(())
    }

    async fn delete_public(&self, message: &MessageRef) -> Result<()> {
        self.record(Sent::Delete { id: message.id });
        Ok(())
    }

    async fn send_private(&self, user: &UserId, token: &str, content: &Content) -> Result<()> {
        if self.fail_private.load(Ordering::SeqCst) {
            return Err(TransportError::TokenUnavailable(user.to_string()));
        }
        self.record(Sent::Private {
            user: user.clone(),
            token: token.to_owned(),
            content: content.clone(),
        });
        Ok(())
    }

    async fn send_direct(&self, user: &UserId, content: &Content) -> Result<()> {
        self.record(Sent::Direct {
            user: user.clone(),
            content: content.clone(),
        });
        Ok(())
    }

    async fn reply(&self, token: &str, content: &Content, ephemeral: bool) -> Result<()> {
        self.record(Sent::Reply {
            token: token.to_owned(),
            content: content.clone(),
            ephemeral,
        });
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Played {
    Cue(Cue),
    Pause,
    Resume,
    Stop,
}

#[derive(Default)]
pub struct RecordingAudio {
    played: Mutex<Vec<Played>>,
}

impl RecordingAudio {
    pub fn played(&self) -> Vec<Played> {
        self.played.lock().unwrap().clone()
    }

    pub fn cues(&self) -> Vec<Cue> {
        self.played()
            .into_iter()
            .filter_map(|p| match p {
                Played::Cue(c) => Some(c),
                _ => None,
            })
            .collect()
    }
}

impl AudioSink for RecordingAudio {
    fn play_cue(&self, _channel: &ChannelId, cue: Cue) {
        self.played.lock().unwrap().push(Played::Cue(cue));
    }

    fn pause_cue(&self, _channel: &ChannelId) {
        self.played.lock().unwrap().push(Played::Pause);
    }

    fn resume_cue(&self, _channel: &ChannelId) {
        self.played.lock().unwrap().push(Played::Resume);
    }

    fn stop(&self, _channel: &ChannelId) {
        self.played.lock().unwrap().push(Played::Stop);
    }
}

/// A session over recording doubles: host `host`, group `g`, table `t`.
pub struct Harness {
    pub session: Arc<GameSession>,
    pub messenger: Arc<RecordingMessenger>,
    pub audio: Arc<RecordingAudio>,
}

pub fn harness(core: Arc<dyn GameDriver>) -> Harness {
    harness_with(core, &["host"])
}

/// Like [`harness`], with every id in `members` joined in order.
pub fn harness_with(core: Arc<dyn GameDriver>, members: &[&str]) -> Harness {
    let messenger = Arc::new(RecordingMessenger::default());
    let audio = Arc::new(RecordingAudio::default());
    let session = GameSession::new(SessionParts {
        host: UserId::from(members.first().copied().unwrap_or("host")),
        group: Some(GroupId::from("g")),
        tables: vec![ChannelId::from("t")],
        core,
        messenger: messenger.clone(),
        audio: audio.clone(),
        registry: Weak::new(),
        emitter: Arc::new(EventEmitter::noop()),
        policy: ReplyPolicy::default(),
    });
    for member in members {
        let mut action = inbound(ActionKind::Button, member, "join");
        action.reply_token = Some(format!("tok-{member}"));
        if let Some(participant) = session.add_participant(&action) {
            participant.acknowledge(None);
        }
    }
    Harness {
        session,
        messenger,
        audio,
    }
}

/// A channel action in group `g`, table `t`, with a reply token.
pub fn inbound(kind: ActionKind, actor: &str, custom_id: &str) -> InboundAction {
    InboundAction {
        kind,
        actor: UserId::from(actor),
        actor_name: actor.to_uppercase(),
        custom_id: custom_id.to_string(),
        values: Vec::new(),
        origin: Origin::Channel {
            group: GroupId::from("g"),
            channel: ChannelId::from("t"),
        },
        reply_token: Some(format!("tok-{actor}")),
    }
}

/// Like [`inbound`], carrying `values`.
pub fn inbound_with(kind: ActionKind, actor: &str, custom_id: &str, values: &[&str]) -> InboundAction {
    let mut action = inbound(kind, actor, custom_id);
    action.values = values.iter().map(|v| (*v).to_string()).collect();
    action
}

/// Yields until spawned tasks have drained.
pub async fn settle() {
    for _ in 0..200 {
        tokio::task::yield_now().await;
    }
}
