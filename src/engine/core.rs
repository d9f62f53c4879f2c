//! Phase graph owner and chain driver.
//!
//! A [`GameCore`] owns the phases of one game instance, its options and
//! its round state. Chains run on a single driver task per core that
//! receives `Cycle(kind)` requests over a channel, so no two phase
//! invocations of one core are ever in flight together.
//!
//! [`GameDriver`] is the type-erased face of a core that sessions and the
//! registry hold.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use partyline_core::config::schema::GameKind;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::action::{InboundAction, UserId};
use super::countdown::{Countdown, TimerDisplay};
use super::lock;
use super::options::GameOptions;
use super::phase::{Phase, PhaseKind, Step};
use super::round::RoundState;
use super::session::GameSession;
use super::settings::EngineSettings;
use crate::error::PhaseError;
use crate::observability::{Event, metrics};
use crate::transport::Content;

/// Static description of a game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameInfo {
    /// Game kind
    pub kind: GameKind,
    /// Display title
    pub title: &'static str,
    /// Fewest participants that may start
    pub min_players: usize,
    /// Most participants that may join
    pub max_players: usize,
}

struct PhaseSlot<G> {
    phase: Arc<dyn Phase<G>>,
    expired: AtomicBool,
}

/// Owner of one instance's phase graph and state.
pub struct GameCore<G> {
    info: GameInfo,
    phases: Mutex<HashMap<PhaseKind, Arc<PhaseSlot<G>>>>,
    current: Mutex<Option<PhaseKind>>,
    options: Mutex<GameOptions>,
    state: Mutex<RoundState<G>>,
    started: AtomicBool,
    expired: AtomicBool,
    cancel: CancellationToken,
    driver_tx: mpsc::UnboundedSender<PhaseKind>,
    driver_rx: Mutex<Option<mpsc::UnboundedReceiver<PhaseKind>>>,
    settings: EngineSettings,
}

impl<G> std::fmt::Debug for GameCore<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameCore")
            .field("info", &self.info)
            .field("current", &*lock(&self.current))
            .field("started", &self.started.load(Ordering::Relaxed))
            .field("expired", &self.expired.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

enum StepKind {
    Enter,
    Act,
    Exit,
}

impl<G: Send + 'static> GameCore<G> {
    /// Creates a core with its phase graph.
    ///
    /// A later phase with the same kind replaces an earlier one.
    #[must_use]
    pub fn new(
        info: GameInfo,
        options: GameOptions,
        game: G,
        settings: EngineSettings,
        phases: impl IntoIterator<Item = Arc<dyn Phase<G>>>,
    ) -> Arc<Self> {
        let phases = phases
            .into_iter()
            .map(|phase| {
                (
                    phase.kind(),
                    Arc::new(PhaseSlot {
                        phase,
                        expired: AtomicBool::new(false),
                    }),
                )
            })
            .collect();
        let (driver_tx, driver_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            info,
            phases: Mutex::new(phases),
            current: Mutex::new(None),
            options: Mutex::new(options),
            state: Mutex::new(RoundState::new(game)),
            started: AtomicBool::new(false),
            expired: AtomicBool::new(false),
            cancel: CancellationToken::new(),
            driver_tx,
            driver_rx: Mutex::new(Some(driver_rx)),
            settings,
        })
    }

    /// Runs `f` against the round state.
    ///
    /// The lock is synchronous; never hold state across an await.
    pub fn with_state<R>(&self, f: impl FnOnce(&mut RoundState<G>) -> R) -> R {
        f(&mut lock(&self.state))
    }

    /// Engine settings.
    #[must_use]
    pub const fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Token cancelled on expiry.
    #[must_use]
    pub const fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Marks the game started. Returns `false` if it already was.
    pub fn mark_started(&self) -> bool {
        !self.started.swap(true, Ordering::SeqCst)
    }

    fn slot(&self, kind: PhaseKind) -> Option<Arc<PhaseSlot<G>>> {
        lock(&self.phases).get(&kind).cloned()
    }

    fn guard_expired(&self, slot: &PhaseSlot<G>, kind: PhaseKind) -> bool {
        if self.expired.load(Ordering::SeqCst) || slot.expired.load(Ordering::SeqCst) {
            tracing::debug!(
                game = self.info.kind.id(),
                error = %PhaseError::Expired(kind.to_string()),
                "halting chain"
            );
            return true;
        }
        false
    }

    /// Runs the chain starting at `start` until a step halts it, an expiry
    /// guard trips, or a phase has no successor.
    pub async fn do_cycle(self: &Arc<Self>, session: &Arc<GameSession>, start: PhaseKind) {
        let ctx = PhaseContext {
            session: Arc::clone(session),
            core: Arc::clone(self),
        };
        let mut kind = start;

        loop {
            let Some(slot) = self.slot(kind) else {
                if self.expired.load(Ordering::SeqCst) {
                    tracing::debug!(phase = %kind, "core expired, chain ends");
                } else {
                    tracing::error!(
                        session = %session.id(),
                        error = %PhaseError::NotFound(kind.to_string()),
                        "halting chain"
                    );
                }
                return;
            };
            if self.guard_expired(&slot, kind) {
                return;
            }

            *lock(&self.current) = Some(kind);
            metrics::record_phase_entered(self.info.kind.id(), kind.as_str());
            session.emit(Event::PhaseEntered {
                timestamp: Utc::now(),
                session_id: session.id().to_string(),
                phase: kind.as_str().to_owned(),
            });
            tracing::info!(session = %session.id(), phase = %kind, "entering phase");

            let mut next = kind.default_next();
            for step in [StepKind::Enter, StepKind::Act, StepKind::Exit] {
                let outcome = match step {
                    StepKind::Enter => slot.phase.enter(&ctx).await,
                    StepKind::Act => slot.phase.act(&ctx).await,
                    StepKind::Exit => slot.phase.exit(&ctx).await,
                };
                if self.guard_expired(&slot, kind) {
                    return;
                }
                match outcome {
                    Step::Continue => {}
                    Step::Halt => {
                        tracing::debug!(phase = %kind, "chain halted");
                        return;
                    }
                    Step::Branch(target) => next = Some(target),
                }
            }

            match next {
                Some(n) => kind = n,
                None => return,
            }
        }
    }
}

// ============================================================================
// Phase Context
// ============================================================================

/// What a phase step sees: its session and its core.
pub struct PhaseContext<G> {
    /// Owning session
    pub session: Arc<GameSession>,
    /// Owning core
    pub core: Arc<GameCore<G>>,
}

impl<G> Clone for PhaseContext<G> {
    fn clone(&self) -> Self {
        Self {
            session: Arc::clone(&self.session),
            core: Arc::clone(&self.core),
        }
    }
}

impl<G: Send + 'static> PhaseContext<G> {
    /// Runs `f` against the round state.
    pub fn state<R>(&self, f: impl FnOnce(&mut RoundState<G>) -> R) -> R {
        self.core.with_state(f)
    }

    /// Snapshot of the game options.
    #[must_use]
    pub fn options(&self) -> GameOptions {
        lock(&self.core.options).clone()
    }

    /// Selected value of a numeric option, or `default`.
    #[must_use]
    pub fn option_u64(&self, id: &str, default: u64) -> u64 {
        lock(&self.core.options).selected_u64(id).unwrap_or(default)
    }

    /// Selected value of a boolean option, or `false`.
    #[must_use]
    pub fn option_bool(&self, id: &str) -> bool {
        lock(&self.core.options).selected_bool(id).unwrap_or(false)
    }

    /// Game description.
    #[must_use]
    pub fn info(&self) -> &GameInfo {
        &self.core.info
    }

    /// A fresh countdown bound to this core's expiry.
    #[must_use]
    pub fn countdown(&self) -> Countdown {
        Countdown::new(self.core.cancel.clone(), &self.core.settings)
    }

    /// A fresh countdown that renders progress below `base` on the tables.
    #[must_use]
    pub fn countdown_with_display(&self, base: Content) -> Countdown {
        self.countdown().with_display(TimerDisplay {
            surface: self.session.clone(),
            base,
        })
    }

    /// Sleeps for a presentational pause, scaled by the pacing setting.
    ///
    /// Returns early if the core expires.
    pub async fn pause_for(&self, base: Duration) {
        let scaled = self.core.settings.pace(base);
        if scaled.is_zero() {
            return;
        }
        tokio::select! {
            () = tokio::time::sleep(scaled) => {}
            () = self.core.cancel.cancelled() => {}
        }
    }

    /// Queues a chain starting at `kind` on the driver.
    ///
    /// # Errors
    ///
    /// See [`GameDriver::enqueue`].
    pub fn enqueue(&self, kind: PhaseKind) -> Result<(), PhaseError> {
        self.core.enqueue(kind)
    }

    /// Returns `true` once the core has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.core.is_expired()
    }

    /// Metrics label of the game.
    #[must_use]
    pub fn game_id(&self) -> &'static str {
        self.core.info.kind.id()
    }
}

// ============================================================================
// Type-erased driver
// ============================================================================

/// Object-safe view of a [`GameCore`] of any game type.
#[async_trait::async_trait]
pub trait GameDriver: Send + Sync {
    /// Game description.
    fn info(&self) -> &GameInfo;

    /// The phase currently running or last halted in.
    fn current_phase(&self) -> Option<PhaseKind>;

    /// Returns `true` after a successful start.
    fn is_started(&self) -> bool;

    /// Returns `true` once expired.
    fn is_expired(&self) -> bool;

    /// Clears the phase graph and cancels everything waiting on the core.
    /// Idempotent.
    fn expire(&self);

    /// Queues a chain starting at `kind`.
    ///
    /// # Errors
    ///
    /// Returns `PhaseError::Expired` after expiry, `PhaseError::NotFound`
    /// if no phase of that kind exists, and `PhaseError::DriverGone` if the
    /// driver task has ended.
    fn enqueue(&self, kind: PhaseKind) -> Result<(), PhaseError>;

    /// Spawns the driver task and queues the lobby.
    fn launch(self: Arc<Self>, session: Arc<GameSession>);

    /// Hands an action to the current phase.
    async fn dispatch(self: Arc<Self>, session: Arc<GameSession>, action: InboundAction);

    /// Snapshot of the options.
    fn options(&self) -> GameOptions;

    /// Selects an option value. Returns `false` if the id or value is
    /// unknown.
    fn select_option(&self, id: &str, value: &str) -> bool;

    /// Ids of the living participants.
    fn living_ids(&self) -> Vec<UserId>;
}

#[async_trait::async_trait]
impl<G: Send + 'static> GameDriver for GameCore<G> {
    fn info(&self) -> &GameInfo {
        &self.info
    }

    fn current_phase(&self) -> Option<PhaseKind> {
        *lock(&self.current)
    }

    fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    fn is_expired(&self) -> bool {
        self.expired.load(Ordering::SeqCst)
    }

    fn expire(&self) {
        if self.expired.swap(true, Ordering::SeqCst) {
            return;
        }
        for (_, slot) in lock(&self.phases).drain() {
            slot.expired.store(true, Ordering::SeqCst);
        }
        *lock(&self.current) = None;
        self.cancel.cancel();
        tracing::debug!(game = self.info.kind.id(), "core expired");
    }

    fn enqueue(&self, kind: PhaseKind) -> Result<(), PhaseError> {
        if self.is_expired() {
            return Err(PhaseError::Expired(kind.to_string()));
        }
        if !lock(&self.phases).contains_key(&kind) {
            return Err(PhaseError::NotFound(kind.to_string()));
        }
        self.driver_tx
            .send(kind)
            .map_err(|_| PhaseError::DriverGone(self.info.kind.id().to_string()))
    }

    fn launch(self: Arc<Self>, session: Arc<GameSession>) {
        let Some(mut rx) = lock(&self.driver_rx).take() else {
            tracing::warn!(session = %session.id(), "driver already launched");
            return;
        };
        let core = Arc::clone(&self);
        let span = session.span();
        tokio::spawn(
            async move {
                loop {
                    tokio::select! {
                        biased;
                        () = core.cancel.cancelled() => break,
                        next = rx.recv() => match next {
                            Some(kind) => core.do_cycle(&session, kind).await,
                            None => break,
                        },
                    }
                }
                tracing::debug!("driver stopped");
            }
            .instrument(span),
        );
        if let Err(e) = self.enqueue(PhaseKind::Lobby) {
            tracing::error!(error = %e, "cannot open lobby");
        }
    }

    async fn dispatch(self: Arc<Self>, session: Arc<GameSession>, action: InboundAction) {
        let Some(kind) = self.current_phase() else {
            tracing::trace!(custom_id = %action.custom_id, "no current phase, dropping action");
            return;
        };
        let Some(slot) = self.slot(kind) else {
            return;
        };
        if slot.expired.load(Ordering::SeqCst) {
            return;
        }
        let ctx = PhaseContext {
            session,
            core: self,
        };
        slot.phase.on_action(&ctx, &action).await;
    }

    fn options(&self) -> GameOptions {
        lock(&self.options).clone()
    }

    fn select_option(&self, id: &str, value: &str) -> bool {
        lock(&self.options).select(id, value)
    }

    fn living_ids(&self) -> Vec<UserId> {
        lock(&self.state).living_ids()
    }
}
