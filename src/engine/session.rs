//! A running game instance's roster and platform surface.
//!
//! A [`GameSession`] owns the host identity, the participants in join
//! order and the bound channels ("tables"), and links 1:1 to a
//! [`GameDriver`]. All messaging from phases goes through it. Each session
//! runs its own action dispatcher task so one slow session never blocks
//! another.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use chrono::Utc;
use indexmap::IndexMap;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use super::action::{ChannelId, GroupId, InboundAction, UserId};
use super::core::GameDriver;
use super::countdown::TimerSurface;
use super::lock;
use super::participant::{ParticipantHandle, ReplyPolicy};
use super::registry::Registry;
use crate::observability::{Event, EventEmitter, session_span};
use crate::transport::{AudioSink, Content, Cue, MessageRef, Messenger};

/// Everything needed to build a session.
pub struct SessionParts {
    /// Host participant
    pub host: UserId,
    /// Hosting group, if any
    pub group: Option<GroupId>,
    /// Bound channels
    pub tables: Vec<ChannelId>,
    /// The game core
    pub core: Arc<dyn GameDriver>,
    /// Outbound messaging
    pub messenger: Arc<dyn Messenger>,
    /// Voice output
    pub audio: Arc<dyn AudioSink>,
    /// Registry the session lives in
    pub registry: Weak<Registry>,
    /// Event sink
    pub emitter: Arc<EventEmitter>,
    /// Reply-lifetime policy for new participants
    pub policy: ReplyPolicy,
}

/// One running game instance.
pub struct GameSession {
    id: Uuid,
    host: UserId,
    group: Option<GroupId>,
    tables: Vec<ChannelId>,
    participants: Mutex<IndexMap<UserId, Arc<ParticipantHandle>>>,
    paused: AtomicBool,
    last_public: Mutex<Vec<MessageRef>>,
    core: Arc<dyn GameDriver>,
    messenger: Arc<dyn Messenger>,
    audio: Arc<dyn AudioSink>,
    registry: Weak<Registry>,
    inbox: mpsc::UnboundedSender<InboundAction>,
    inbox_rx: Mutex<Option<mpsc::UnboundedReceiver<InboundAction>>>,
    cancel: CancellationToken,
    expired: AtomicBool,
    emitter: Arc<EventEmitter>,
    policy: ReplyPolicy,
}

impl std::fmt::Debug for GameSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameSession")
            .field("id", &self.id)
            .field("host", &self.host)
            .field("tables", &self.tables)
            .field("participants", &self.participant_count())
            .field("expired", &self.is_expired())
            .finish_non_exhaustive()
    }
}

impl GameSession {
    /// Creates a session. Call [`start`](Self::start) to run it.
    #[must_use]
    pub fn new(parts: SessionParts) -> Arc<Self> {
        let (inbox, inbox_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            id: Uuid::new_v4(),
            host: parts.host,
            group: parts.group,
            tables: parts.tables,
            participants: Mutex::new(IndexMap::new()),
            paused: AtomicBool::new(false),
            last_public: Mutex::new(Vec::new()),
            core: parts.core,
            messenger: parts.messenger,
            audio: parts.audio,
            registry: parts.registry,
            inbox,
            inbox_rx: Mutex::new(Some(inbox_rx)),
            cancel: CancellationToken::new(),
            expired: AtomicBool::new(false),
            emitter: parts.emitter,
            policy: parts.policy,
        })
    }

    /// Spawns the action dispatcher and launches the core.
    pub fn start(self: &Arc<Self>) {
        if let Some(mut rx) = lock(&self.inbox_rx).take() {
            let session = Arc::clone(self);
            let span = self.span();
            tokio::spawn(
                async move {
                    loop {
                        tokio::select! {
                            biased;
                            () = session.cancel.cancelled() => break,
                            next = rx.recv() => match next {
                                Some(action) => {
                                    let core = Arc::clone(&session.core);
                                    core.dispatch(Arc::clone(&session), action).await;
                                }
                                None => break,
                            },
                        }
                    }
                }
                .instrument(span),
            );
        }
        Arc::clone(&self.core).launch(Arc::clone(self));
    }

    /// Span for tasks serving this session.
    #[must_use]
    pub fn span(&self) -> tracing::Span {
        session_span(self.id, self.core.info().kind.id())
    }

    /// Session id.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Host id.
    #[must_use]
    pub const fn host(&self) -> &UserId {
        &self.host
    }

    /// Returns `true` if `user` hosts this session.
    #[must_use]
    pub fn is_host(&self, user: &UserId) -> bool {
        &self.host == user
    }

    /// Hosting group, if any.
    #[must_use]
    pub const fn group(&self) -> Option<&GroupId> {
        self.group.as_ref()
    }

    /// Bound channels.
    #[must_use]
    pub fn tables(&self) -> &[ChannelId] {
        &self.tables
    }

    /// The game core.
    #[must_use]
    pub const fn core(&self) -> &Arc<dyn GameDriver> {
        &self.core
    }

    // ------------------------------------------------------------------------
    // Roster
    // ------------------------------------------------------------------------

    /// Adds the actor of `action` as a participant holding its reply token.
    ///
    /// Returns `None` if the actor already joined.
    pub fn add_participant(&self, action: &InboundAction) -> Option<Arc<ParticipantHandle>> {
        let mut participants = lock(&self.participants);
        if participants.contains_key(&action.actor) {
            return None;
        }
        let handle = ParticipantHandle::new(
            action.actor.clone(),
            action.display_name(),
            action.reply_token.clone(),
            Arc::clone(&self.messenger),
            self.policy,
        );
        participants.insert(action.actor.clone(), Arc::clone(&handle));
        Some(handle)
    }

    /// Removes a participant and expires their handle. Removing the host
    /// expires the session.
    pub fn remove_participant(&self, id: &UserId) -> Option<Arc<ParticipantHandle>> {
        let removed = lock(&self.participants).shift_remove(id);
        if let Some(handle) = &removed {
            handle.expire();
        }
        if self.is_host(id) {
            self.expire("host left");
        }
        removed
    }

    /// Looks up a participant.
    #[must_use]
    pub fn participant(&self, id: &UserId) -> Option<Arc<ParticipantHandle>> {
        lock(&self.participants).get(id).cloned()
    }

    /// Returns `true` if `id` joined.
    #[must_use]
    pub fn has_participant(&self, id: &UserId) -> bool {
        lock(&self.participants).contains_key(id)
    }

    /// Participants in join order.
    #[must_use]
    pub fn participants(&self) -> Vec<Arc<ParticipantHandle>> {
        lock(&self.participants).values().cloned().collect()
    }

    /// Number of participants.
    #[must_use]
    pub fn participant_count(&self) -> usize {
        lock(&self.participants).len()
    }

    // ------------------------------------------------------------------------
    // Messaging
    // ------------------------------------------------------------------------

    /// Posts to every table and remembers the posts as the last public
    /// messages.
    pub async fn send_public(&self, content: &Content) -> Vec<MessageRef> {
        let mut sent = Vec::with_capacity(self.tables.len());
        for table in &self.tables {
            match self.messenger.send_public(table, content).await {
                Ok(message) => sent.push(message),
                Err(e) => tracing::warn!(session = %self.id, %table, error = %e, "public send failed"),
            }
        }
        *lock(&self.last_public) = sent.clone();
        sent
    }

    /// Replaces the last public messages' content.
    pub async fn edit_last_public(&self, content: &Content) {
        let targets = lock(&self.last_public).clone();
        for message in &targets {
            if let Err(e) = self.messenger.edit_public(message, content).await {
                tracing::warn!(session = %self.id, error = %e, "public edit failed");
            }
        }
    }

    /// Edits specific public messages.
    pub async fn edit_public(&self, messages: &[MessageRef], content: &Content) {
        for message in messages {
            if let Err(e) = self.messenger.edit_public(message, content).await {
                tracing::warn!(session = %self.id, error = %e, "public edit failed");
            }
        }
    }

    /// Deletes the last public messages.
    pub async fn delete_last_public(&self) {
        let targets = std::mem::take(&mut *lock(&self.last_public));
        self.delete_public(&targets).await;
    }

    /// Deletes specific public messages.
    pub async fn delete_public(&self, messages: &[MessageRef]) {
        for message in messages {
            if let Err(e) = self.messenger.delete_public(message).await {
                tracing::debug!(session = %self.id, error = %e, "public delete failed");
            }
        }
    }

    /// Replies to `action`. A successful reply refreshes the actor's
    /// private token.
    pub async fn reply(&self, action: &InboundAction, content: &Content, ephemeral: bool) -> bool {
        let Some(token) = action.reply_token.as_deref() else {
            tracing::trace!(actor = %action.actor, "action carries no reply token");
            return false;
        };
        match self.messenger.reply(token, content, ephemeral).await {
            Ok(()) => {
                if let Some(participant) = self.participant(&action.actor) {
                    participant.acknowledge(Some(token.to_owned()));
                }
                true
            }
            Err(e) => {
                tracing::warn!(session = %self.id, actor = %action.actor, error = %e, "reply failed");
                false
            }
        }
    }

    /// Sends a private message to a participant.
    ///
    /// Returns `false` if the participant is unknown or the message
    /// degraded to the direct channel.
    pub async fn send_private(&self, user: &UserId, content: &Content) -> bool {
        match self.participant(user) {
            Some(participant) => participant.send_private(content).await,
            None => false,
        }
    }

    // ------------------------------------------------------------------------
    // Audio
    // ------------------------------------------------------------------------

    /// Plays a cue in the first table's voice room.
    pub fn cue(&self, cue: Cue) {
        if let Some(table) = self.tables.first() {
            self.audio.play_cue(table, cue);
        }
    }

    /// Pauses voice playback.
    pub fn pause_audio(&self) {
        if let Some(table) = self.tables.first() {
            self.audio.pause_cue(table);
        }
    }

    /// Resumes voice playback.
    pub fn resume_audio(&self) {
        if let Some(table) = self.tables.first() {
            self.audio.resume_cue(table);
        }
    }

    /// Stops voice playback.
    pub fn stop_audio(&self) {
        if let Some(table) = self.tables.first() {
            self.audio.stop(table);
        }
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    /// Sets the paused flag.
    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::SeqCst);
    }

    /// Returns `true` while an interruption is being resolved.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Queues an action for this session's current phase.
    ///
    /// Returns `false` once the session has expired.
    pub fn dispatch(&self, action: InboundAction) -> bool {
        !self.is_expired() && self.inbox.send(action).is_ok()
    }

    /// Announces `reason` to the tables and expires the session.
    pub async fn force_stop(&self, reason: &str) {
        if self.is_expired() {
            return;
        }
        tracing::warn!(session = %self.id, reason, "force stopping session");
        self.send_public(&Content::titled("Game stopped", reason)).await;
        self.expire(reason);
    }

    /// Expires the session, its core and every participant, and leaves the
    /// registry. Idempotent.
    pub fn expire(&self, reason: &str) {
        if self.expired.swap(true, Ordering::SeqCst) {
            return;
        }
        self.core.expire();
        for participant in lock(&self.participants).values() {
            participant.expire();
        }
        self.cancel.cancel();
        self.stop_audio();
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }
        self.emit(Event::SessionExpired {
            timestamp: Utc::now(),
            session_id: self.id.to_string(),
            reason: reason.to_owned(),
        });
        tracing::info!(session = %self.id, reason, "session expired");
    }

    /// Returns `true` once expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expired.load(Ordering::SeqCst)
    }

    /// Writes the current options through to the group's cache.
    pub fn save_options(&self) {
        let (Some(group), Some(registry)) = (&self.group, self.registry.upgrade()) else {
            return;
        };
        registry
            .options()
            .save(group, self.core.info().kind, self.core.options());
    }

    /// Emits a structured event.
    pub fn emit(&self, event: Event) {
        self.emitter.emit(event);
    }
}

#[async_trait::async_trait]
impl TimerSurface for GameSession {
    async fn show_timer(&self, content: &Content) {
        self.edit_last_public(content).await;
    }

    fn timer_cue(&self, cue: Cue) {
        self.cue(cue);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::core::{GameCore, GameInfo};
    use crate::engine::options::GameOptions;
    use crate::engine::settings::EngineSettings;
    use crate::engine::testing::{Played, Sent, harness, inbound};
    use crate::engine::ActionKind;
    use partyline_core::config::schema::GameKind;

    fn idle_core() -> Arc<GameCore<()>> {
        GameCore::new(
            GameInfo {
                kind: GameKind::Spyfall,
                title: "Idle",
                min_players: 1,
                max_players: 8,
            },
            GameOptions::default(),
            (),
            EngineSettings::default(),
            Vec::new(),
        )
    }

    #[tokio::test]
    async fn test_reply_acknowledges_participant() {
        let h = harness(idle_core());
        let mut action = inbound(ActionKind::Button, "u2", "join");
        action.reply_token = Some("tok-u2".to_string());
        let p = h.session.add_participant(&action).unwrap();
        assert!(h.session.add_participant(&action).is_none());

        action.reply_token = Some("tok-u2b".to_string());
        assert!(h.session.reply(&action, &Content::text("joined"), true).await);
        assert!(p.is_valid());
        assert!(h.session.send_private(p.id(), &Content::text("role")).await);
        assert!(matches!(
            h.messenger.sent().last(),
            Some(Sent::Private { token, .. }) if token == "tok-u2b"
        ));
    }

    #[tokio::test]
    async fn test_removing_host_expires_everything() {
        let core = idle_core();
        let h = harness(core.clone());
        let guest = h
            .session
            .add_participant(&inbound(ActionKind::Button, "u2", "join"))
            .unwrap();

        h.session.remove_participant(&UserId::from("host"));
        assert!(h.session.is_expired());
        assert!(core.is_expired());
        assert!(guest.is_expired());
        assert!(h.audio.played().contains(&Played::Stop));
        assert!(!h.session.dispatch(inbound(ActionKind::Button, "u2", "leave")));
    }

    #[tokio::test]
    async fn test_public_messages_are_tracked_for_edit_and_delete() {
        let h = harness(idle_core());
        let sent = h.session.send_public(&Content::text("lobby")).await;
        assert_eq!(sent.len(), 1);
        h.session.edit_last_public(&Content::text("lobby 2")).await;
        h.session.delete_last_public().await;
        h.session.edit_last_public(&Content::text("gone")).await;

        let log = h.messenger.sent();
        assert_eq!(log.len(), 3);
        assert!(matches!(log[1], Sent::Edit { id, .. } if id == sent[0].id));
        assert!(matches!(log[2], Sent::Delete { id } if id == sent[0].id));
    }

    #[tokio::test]
    async fn test_force_stop_announces_and_expires() {
        let h = harness(idle_core());
        h.session.force_stop("out of questions").await;
        assert!(h.session.is_expired());
        assert!(h.messenger.public_mentions("out of questions"));
        h.session.force_stop("again").await;
        assert!(!h.messenger.public_mentions("again"));
    }
}
