//! Per-participant reply-lifetime guard.
//!
//! A participant can receive targeted private messages only through the
//! reply token of their last acknowledged interaction, and only for a
//! bounded time after it. [`ParticipantHandle::is_valid`] is the single
//! predicate gating every private send; a private send that cannot be
//! delivered degrades to the token-less direct channel.
//!
//! A ticker task per participant prompts a refresh before the token goes
//! stale and declares it dead a little later.

use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::action::UserId;
use super::lock;
use super::settings::EngineSettings;
use crate::observability::metrics;
use crate::transport::{Content, Messenger};

/// Button id of the refresh prompt.
pub const REFRESH_BUTTON_ID: &str = "refresh_private_menu";

/// Timing of the reply-lifetime guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyPolicy {
    /// How long a token stays valid after issuance
    pub ttl: Duration,
    /// Ticker period
    pub ticker_period: Duration,
    /// Tick at which a refresh is prompted
    pub refresh_tick: u32,
    /// Tick at which the token dies
    pub dead_tick: u32,
}

impl From<&EngineSettings> for ReplyPolicy {
    fn from(settings: &EngineSettings) -> Self {
        Self {
            ttl: settings.reply_ttl,
            ticker_period: settings.ticker_period,
            refresh_tick: settings.refresh_prompt_tick,
            dead_tick: settings.dead_tick,
        }
    }
}

impl Default for ReplyPolicy {
    fn default() -> Self {
        Self::from(&EngineSettings::default())
    }
}

#[derive(Debug)]
struct TokenState {
    token: Option<String>,
    issued_at: Instant,
    expired: bool,
}

/// One player's identity and private-reply capability.
pub struct ParticipantHandle {
    id: UserId,
    display_name: String,
    state: Mutex<TokenState>,
    menu: Mutex<Option<Content>>,
    ticker: Mutex<Option<JoinHandle<()>>>,
    messenger: Arc<dyn Messenger>,
    policy: ReplyPolicy,
}

impl std::fmt::Debug for ParticipantHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParticipantHandle")
            .field("id", &self.id)
            .field("display_name", &self.display_name)
            .field("valid", &self.is_valid())
            .finish_non_exhaustive()
    }
}

impl ParticipantHandle {
    /// Creates a handle holding `token`, issued now.
    ///
    /// The ticker starts on the first [`acknowledge`](Self::acknowledge).
    #[must_use]
    pub fn new(
        id: UserId,
        display_name: impl Into<String>,
        token: Option<String>,
        messenger: Arc<dyn Messenger>,
        policy: ReplyPolicy,
    ) -> Arc<Self> {
        Arc::new(Self {
            id,
            display_name: display_name.into(),
            state: Mutex::new(TokenState {
                token,
                issued_at: Instant::now(),
                expired: false,
            }),
            menu: Mutex::new(None),
            ticker: Mutex::new(None),
            messenger,
            policy,
        })
    }

    /// Participant id.
    #[must_use]
    pub const fn id(&self) -> &UserId {
        &self.id
    }

    /// Display name.
    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// When the current token was issued.
    #[must_use]
    pub fn issued_at(&self) -> Instant {
        lock(&self.state).issued_at
    }

    /// Records a successful reply: stores `token` if given, resets the
    /// issuance time and restarts the ticker.
    pub fn acknowledge(self: &Arc<Self>, token: Option<String>) {
        {
            let mut state = lock(&self.state);
            if state.expired {
                return;
            }
            if let Some(token) = token {
                state.token = Some(token);
            }
            state.issued_at = Instant::now();
        }
        self.restart_ticker();
    }

    /// Returns `true` if a private send may use the token now.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Instant::now())
    }

    /// Validity at `now`. A token exactly `ttl` old is still valid.
    #[must_use]
    pub fn is_valid_at(&self, now: Instant) -> bool {
        let state = lock(&self.state);
        !state.expired
            && state.token.is_some()
            && now.saturating_duration_since(state.issued_at) <= self.policy.ttl
    }

    /// Sends a private message, degrading to a direct alert on failure.
    ///
    /// The content is kept as the current private menu, even when it could
    /// not be delivered, so [`resend_menu`](Self::resend_menu) can restore it.
    /// Returns `false` if the message was not delivered privately.
    pub async fn send_private(&self, content: &Content) -> bool {
        *lock(&self.menu) = Some(content.clone());
        self.deliver_private(content).await
    }

    /// Re-sends the current private menu, if any.
    ///
    /// Returns `false` if there was no menu or it was not delivered.
    pub async fn resend_menu(&self) -> bool {
        let menu = lock(&self.menu).clone();
        match menu {
            Some(menu) => self.deliver_private(&menu).await,
            None => false,
        }
    }

    async fn deliver_private(&self, content: &Content) -> bool {
        let token = {
            let state = lock(&self.state);
            let valid = !state.expired
                && Instant::now().saturating_duration_since(state.issued_at) <= self.policy.ttl;
            if valid { state.token.clone() } else { None }
        };

        if let Some(token) = token {
            match self.messenger.send_private(&self.id, &token, content).await {
                Ok(()) => return true,
                Err(e) => {
                    tracing::warn!(participant = %self.id, error = %e, "private send failed");
                }
            }
        }
        self.alert_expired().await;
        false
    }

    /// Sends a message through the direct channel, which needs no token.
    pub async fn send_direct(&self, content: &Content) -> bool {
        match self.messenger.send_direct(&self.id, content).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(participant = %self.id, error = %e, "direct send failed");
                false
            }
        }
    }

    /// Invalidates the handle and stops its ticker.
    pub fn expire(&self) {
        {
            let mut state = lock(&self.state);
            state.expired = true;
            state.token = None;
        }
        lock(&self.menu).take();
        if let Some(ticker) = lock(&self.ticker).take() {
            ticker.abort();
        }
    }

    /// Returns `true` once expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        lock(&self.state).expired
    }

    fn restart_ticker(self: &Arc<Self>) {
        let mut slot = lock(&self.ticker);
        if let Some(old) = slot.take() {
            old.abort();
        }
        *slot = Some(tokio::spawn(run_ticker(Arc::downgrade(self), self.policy)));
    }

    async fn alert_expired(&self) {
        metrics::record_private_fallback();
        let alert = Content::titled(
            "Private menu expired",
            "Your private game menu is no longer reachable. Use /refresh in the game channel to get a new one.",
        );
        self.send_direct(&alert).await;
    }

    async fn prompt_refresh(&self) {
        let prompt = Content::text("Your private menu will go stale soon. Tap to refresh it.")
            .button(REFRESH_BUTTON_ID, "Refresh");
        self.deliver_private(&prompt).await;
    }

    async fn declare_dead(&self) {
        lock(&self.state).token = None;
        tracing::debug!(participant = %self.id, "reply token died");
        self.alert_expired().await;
    }
}

impl Drop for ParticipantHandle {
    fn drop(&mut self) {
        if let Some(ticker) = lock(&self.ticker).take() {
            ticker.abort();
        }
    }
}

async fn run_ticker(handle: Weak<ParticipantHandle>, policy: ReplyPolicy) {
    let mut interval =
        tokio::time::interval_at(Instant::now() + policy.ticker_period, policy.ticker_period);
    let mut count: u32 = 0;
    loop {
        interval.tick().await;
        let Some(handle) = handle.upgrade() else {
            break;
        };
        count += 1;
        if count >= policy.dead_tick {
            handle.declare_dead().await;
            break;
        }
        if count == policy.refresh_tick {
            handle.prompt_refresh().await;
        }
    }
}
