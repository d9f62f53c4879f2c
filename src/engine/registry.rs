//! Session registry and inbound action routing.
//!
//! The [`Registry`] is created once at startup and passed around by `Arc`.
//! Sessions are inserted when a `play` command creates them and removed
//! when they expire. Every inbound action goes through
//! [`Registry::handle`]: commands are served here, everything else is
//! routed to exactly one session or dropped.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use partyline_core::config::schema::GameKind;
use uuid::Uuid;

use super::action::{ActionKind, ChannelId, InboundAction};
use super::options::OptionsStore;
use super::participant::{REFRESH_BUTTON_ID, ReplyPolicy};
use super::session::{GameSession, SessionParts};
use super::settings::EngineSettings;
use crate::games::GameCatalog;
use crate::observability::{Event, EventEmitter, metrics};
use crate::transport::{AudioSink, Content, Cue, Messenger};

/// Live sessions and their channel bindings.
pub struct Registry {
    sessions: DashMap<Uuid, Arc<GameSession>>,
    channels: DashMap<ChannelId, Uuid>,
    options: OptionsStore,
    catalog: GameCatalog,
    messenger: Arc<dyn Messenger>,
    audio: Arc<dyn AudioSink>,
    emitter: Arc<EventEmitter>,
    settings: EngineSettings,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("sessions", &self.sessions.len())
            .field("channels", &self.channels.len())
            .finish_non_exhaustive()
    }
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new(
        catalog: GameCatalog,
        messenger: Arc<dyn Messenger>,
        audio: Arc<dyn AudioSink>,
        emitter: Arc<EventEmitter>,
        settings: EngineSettings,
    ) -> Arc<Self> {
        Arc::new(Self {
            sessions: DashMap::new(),
            channels: DashMap::new(),
            options: OptionsStore::new(),
            catalog,
            messenger,
            audio,
            emitter,
            settings,
        })
    }

    /// The options cache.
    #[must_use]
    pub const fn options(&self) -> &OptionsStore {
        &self.options
    }

    /// Number of live sessions.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// The session bound to `channel`.
    #[must_use]
    pub fn session_for_channel(&self, channel: &ChannelId) -> Option<Arc<GameSession>> {
        let id = *self.channels.get(channel)?.value();
        self.sessions.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    /// Resolves an action to its session.
    ///
    /// Channel actions go to the channel's session. Private actions go to
    /// the first session the actor participates in.
    #[must_use]
    pub fn route(&self, action: &InboundAction) -> Option<Arc<GameSession>> {
        match action.channel() {
            Some(channel) => self.session_for_channel(channel),
            None => self
                .sessions
                .iter()
                .find(|entry| entry.value().has_participant(&action.actor))
                .map(|entry| Arc::clone(entry.value())),
        }
    }

    /// Serves one inbound action.
    pub async fn handle(self: &Arc<Self>, action: InboundAction) {
        let kind = action.kind;
        let routed = if kind == ActionKind::Command {
            self.handle_command(&action).await;
            true
        } else if action.is(ActionKind::Button, REFRESH_BUTTON_ID) {
            self.refresh(&action).await;
            true
        } else if let Some(session) = self.route(&action) {
            session.dispatch(action)
        } else {
            tracing::trace!(
                actor = %action.actor,
                custom_id = %action.custom_id,
                "no session for action, dropping"
            );
            self.emitter.emit(Event::ActionDropped {
                timestamp: Utc::now(),
                actor: action.actor.to_string(),
                custom_id: action.custom_id.clone(),
            });
            false
        };
        metrics::record_action(kind.as_str(), routed);
    }

    /// Removes a session and its channel bindings.
    pub fn remove(&self, id: Uuid) {
        if let Some((_, session)) = self.sessions.remove(&id) {
            for table in session.tables() {
                self.channels.remove_if(table, |_, bound| *bound == id);
            }
        }
        metrics::set_sessions_active(self.sessions.len());
    }

    /// Expires every session.
    pub fn shutdown(&self, reason: &str) {
        let sessions: Vec<Arc<GameSession>> = self
            .sessions
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        for session in sessions {
            session.expire(reason);
        }
    }

    // ------------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------------

    async fn handle_command(self: &Arc<Self>, action: &InboundAction) {
        match action.custom_id.as_str() {
            "play" => self.play(action).await,
            "stop" => self.stop(action).await,
            "refresh" => self.refresh(action).await,
            "voice" => self.voice(action).await,
            "feedback" => {
                tracing::info!(
                    actor = %action.actor,
                    text = %action.values.join(" "),
                    "feedback received"
                );
                self.reply(action, "Thanks for the feedback!").await;
            }
            other => {
                tracing::debug!(command = other, "unknown command");
                self.reply(action, &format!("Unknown command '{other}'.")).await;
            }
        }
    }

    async fn play(self: &Arc<Self>, action: &InboundAction) {
        let Some(channel) = action.channel().cloned() else {
            self.reply(action, "Games can only be started in a channel.")
                .await;
            return;
        };
        if self.channels.contains_key(&channel) {
            self.reply(action, "A game is already running in this channel.")
                .await;
            return;
        }
        let requested = action.first_value().unwrap_or_default();
        let Some(kind) = GameKind::from_id(requested) else {
            let message = suggest_game(requested).map_or_else(
                || format!("Unknown game '{requested}'. Available: {}.", game_list()),
                |s| format!("Unknown game '{requested}'. Did you mean '{s}'?"),
            );
            self.reply(action, &message).await;
            return;
        };
        if !self.catalog.is_enabled(kind) {
            self.reply(action, &format!("{kind} is not enabled here."))
                .await;
            return;
        }

        let session = self.create_session(kind, channel, action);
        session.reply(
            action,
            &Content::text(format!("{} created.", self.catalog.info(kind).title)),
            true,
        )
        .await;
        session.start();
    }

    fn create_session(
        self: &Arc<Self>,
        kind: GameKind,
        channel: ChannelId,
        action: &InboundAction,
    ) -> Arc<GameSession> {
        let mut options = self.catalog.default_options(kind);
        if let Some(cached) = action.group().and_then(|g| self.options.load(g, kind)) {
            options.merge_from(&cached);
        }
        let core = self.catalog.build(kind, options);

        let session = GameSession::new(SessionParts {
            host: action.actor.clone(),
            group: action.group().cloned(),
            tables: vec![channel.clone()],
            core,
            messenger: Arc::clone(&self.messenger),
            audio: Arc::clone(&self.audio),
            registry: Arc::downgrade(self),
            emitter: Arc::clone(&self.emitter),
            policy: ReplyPolicy::from(&self.settings),
        });
        session.add_participant(action);

        self.sessions.insert(session.id(), Arc::clone(&session));
        self.channels.insert(channel.clone(), session.id());
        metrics::set_sessions_active(self.sessions.len());
        self.emitter.emit(Event::SessionCreated {
            timestamp: Utc::now(),
            session_id: session.id().to_string(),
            game: kind.id().to_owned(),
            host: action.actor.to_string(),
            channel: channel.to_string(),
        });
        tracing::info!(session = %session.id(), game = %kind, %channel, "session created");
        session
    }

    async fn stop(&self, action: &InboundAction) {
        let Some(session) = action.channel().and_then(|c| self.session_for_channel(c)) else {
            self.reply(action, "No game is running in this channel.").await;
            return;
        };
        if !session.is_host(&action.actor) {
            self.reply(action, "Only the host can stop the game.").await;
            return;
        }
        self.reply(action, "Stopping the game.").await;
        session.force_stop("The host stopped the game.").await;
    }

    async fn refresh(&self, action: &InboundAction) {
        let session = self.route(action).filter(|s| s.has_participant(&action.actor));
        match session {
            Some(session) => {
                let acknowledged = session
                    .reply(action, &Content::text("Your private menu is refreshed."), true)
                    .await;
                let participant = session.participant(&action.actor);
                if let (true, Some(participant)) = (acknowledged, participant) {
                    participant.resend_menu().await;
                }
            }
            None => self.reply(action, "You are not in a game.").await,
        }
    }

    async fn voice(&self, action: &InboundAction) {
        let Some(channel) = action.channel() else {
            self.reply(action, "Voice is only available in a channel.").await;
            return;
        };
        self.reply(action, "Reconnecting audio.").await;
        self.audio.stop(channel);
        self.audio.play_cue(channel, Cue::Reconnect);
    }

    async fn reply(&self, action: &InboundAction, text: &str) {
        let Some(token) = action.reply_token.as_deref() else {
            return;
        };
        if let Err(e) = self.messenger.reply(token, &Content::text(text), true).await {
            tracing::warn!(actor = %action.actor, error = %e, "command reply failed");
        }
    }
}

fn game_list() -> String {
    GameKind::ALL
        .iter()
        .map(|k| k.id())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Closest game id to a misspelled request.
fn suggest_game(requested: &str) -> Option<&'static str> {
    let requested = requested.to_lowercase();
    GameKind::ALL
        .iter()
        .map(|k| (k.id(), strsim::jaro_winkler(&requested, k.id())))
        .filter(|(_, score)| *score >= 0.8)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(id, _)| id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::action::{Origin, UserId};
    use crate::engine::phase::PhaseKind;
    use crate::engine::testing::{RecordingAudio, RecordingMessenger, inbound, inbound_with, settle};
    use crate::games::content::ContentLibrary;

    struct Fixture {
        registry: Arc<Registry>,
        messenger: Arc<RecordingMessenger>,
        audio: Arc<RecordingAudio>,
    }

    fn fixture() -> Fixture {
        let messenger = Arc::new(RecordingMessenger::default());
        let audio = Arc::new(RecordingAudio::default());
        let settings = EngineSettings {
            pacing_scale: 0.0,
            ..EngineSettings::default()
        };
        let catalog = GameCatalog::new(
            Default::default(),
            Arc::new(ContentLibrary::builtin()),
            settings,
        );
        let registry = Registry::new(
            catalog,
            messenger.clone(),
            audio.clone(),
            Arc::new(EventEmitter::noop()),
            settings,
        );
        Fixture {
            registry,
            messenger,
            audio,
        }
    }

    fn play(actor: &str, game: &str) -> InboundAction {
        inbound_with(ActionKind::Command, actor, "play", &[game])
    }

    #[tokio::test]
    async fn test_play_creates_one_session_per_channel() {
        let f = fixture();
        f.registry.handle(play("host", "spycheck")).await;
        settle().await;

        assert_eq!(f.registry.session_count(), 1);
        let session = f.registry.session_for_channel(&ChannelId::from("t")).unwrap();
        assert!(session.is_host(&UserId::from("host")));
        assert_eq!(session.core().current_phase(), Some(PhaseKind::Lobby));
        assert!(f.messenger.publics().iter().any(|c| c.has_control("join")));

        f.registry.handle(play("u2", "spyfall")).await;
        assert_eq!(f.registry.session_count(), 1);
        assert!(f.messenger.reply_mentions("already running"));
    }

    #[tokio::test]
    async fn test_play_suggests_close_game_name() {
        let f = fixture();
        f.registry.handle(play("host", "spychek")).await;
        assert_eq!(f.registry.session_count(), 0);
        assert!(f.messenger.reply_mentions("Did you mean 'spycheck'?"));
    }

    #[tokio::test]
    async fn test_play_rejected_in_direct_context() {
        let f = fixture();
        let mut action = play("host", "spyfall");
        action.origin = Origin::Direct;
        f.registry.handle(action).await;
        assert_eq!(f.registry.session_count(), 0);
    }

    #[tokio::test]
    async fn test_stop_is_host_only() {
        let f = fixture();
        f.registry.handle(play("host", "spyfall")).await;
        settle().await;

        f.registry.handle(inbound(ActionKind::Command, "u2", "stop")).await;
        assert_eq!(f.registry.session_count(), 1);
        assert!(f.messenger.reply_mentions("Only the host"));

        let session = f.registry.session_for_channel(&ChannelId::from("t")).unwrap();
        f.registry.handle(inbound(ActionKind::Command, "host", "stop")).await;
        assert_eq!(f.registry.session_count(), 0);
        assert!(session.is_expired());
        assert!(session.core().is_expired());
    }

    #[tokio::test]
    async fn test_direct_actions_route_by_membership() {
        let f = fixture();
        f.registry.handle(play("host", "spycheck")).await;
        settle().await;

        let mut direct = inbound(ActionKind::Select, "host", "answer_select");
        direct.origin = Origin::Direct;
        assert!(f.registry.route(&direct).is_some());

        let mut stranger = inbound(ActionKind::Select, "nobody", "answer_select");
        stranger.origin = Origin::Direct;
        assert!(f.registry.route(&stranger).is_none());
    }

    #[tokio::test]
    async fn test_unrouted_action_is_dropped() {
        let f = fixture();
        f.registry.handle(inbound(ActionKind::Button, "u1", "join")).await;
        assert_eq!(f.registry.session_count(), 0);
        assert!(f.messenger.sent().is_empty());
    }

    #[tokio::test]
    async fn test_refresh_outside_a_game() {
        let f = fixture();
        f.registry.handle(inbound(ActionKind::Command, "u1", "refresh")).await;
        assert!(f.messenger.reply_mentions("You are not in a game."));
        assert!(f.messenger.privates_to(&UserId::from("u1")).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_restores_private_menu() {
        let f = fixture();
        f.registry.handle(play("host", "spycheck")).await;
        settle().await;
        let host = UserId::from("host");
        let session = f.registry.session_for_channel(&ChannelId::from("t")).unwrap();
        let participant = session.participant(&host).unwrap();

        tokio::time::sleep(std::time::Duration::from_secs(841)).await;
        f.messenger.clear();
        let menu = Content::text("Pick your answer").button("answer_1", "Yes");
        assert!(!session.send_private(&host, &menu).await);
        assert!(f.messenger.privates_to(&host).is_empty());
        assert!(!participant.is_valid());

        f.registry.handle(inbound(ActionKind::Command, "host", "refresh")).await;
        assert!(f.messenger.reply_mentions("Your private menu is refreshed."));
        assert!(participant.is_valid());
        assert_eq!(f.messenger.privates_to(&host), vec![menu.clone()]);

        let mut pressed = inbound(ActionKind::Button, "host", REFRESH_BUTTON_ID);
        pressed.origin = Origin::Direct;
        f.registry.handle(pressed).await;
        assert_eq!(f.messenger.privates_to(&host), vec![menu.clone(), menu]);
    }

    #[tokio::test]
    async fn test_voice_restarts_audio() {
        let f = fixture();
        f.registry.handle(inbound(ActionKind::Command, "u1", "voice")).await;
        assert_eq!(f.audio.cues(), vec![Cue::Reconnect]);
        assert!(f.messenger.reply_mentions("Reconnecting"));
    }

    #[tokio::test]
    async fn test_shutdown_expires_all_sessions() {
        let f = fixture();
        f.registry.handle(play("host", "spycheck")).await;
        let mut other = play("h2", "spyfall");
        other.origin = Origin::Channel {
            group: "g2".into(),
            channel: "t2".into(),
        };
        f.registry.handle(other).await;
        assert_eq!(f.registry.session_count(), 2);

        f.registry.shutdown("input closed");
        assert_eq!(f.registry.session_count(), 0);
    }

    #[test]
    fn test_suggest_game() {
        assert_eq!(suggest_game("spyfal"), Some("spyfall"));
        assert_eq!(suggest_game("chess"), None);
    }
}
