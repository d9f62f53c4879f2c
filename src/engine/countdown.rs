//! Cancelable, pausable countdown.
//!
//! A [`Countdown`] gives a phase a best-effort deadline that other tasks
//! can resolve early ([`Countdown::cancel`]) or freeze
//! ([`Countdown::pause`] / [`Countdown::resume`]). The waiting side calls
//! [`Countdown::start`] and is woken by whichever happens first: the
//! deadline, a cancel, or the owning core's cancellation token.
//!
//! Handles are cheap clones of one shared timer. One instance serves one
//! phase segment and is never reused.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::lock;
use super::settings::EngineSettings;
use crate::transport::{Content, Cue};

/// How a countdown finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Finish {
    /// The full duration ran out
    Elapsed,
    /// `cancel()` ran or the owner was cancelled
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerState {
    Idle,
    Running { deadline: Instant },
    Paused { remaining: Duration },
    Finished(Finish),
}

/// Where a countdown renders its progress.
#[async_trait::async_trait]
pub trait TimerSurface: Send + Sync {
    /// Replaces the visible timer message.
    async fn show_timer(&self, content: &Content);

    /// Plays an audio cue.
    fn timer_cue(&self, cue: Cue);
}

/// A progress readout attached to a countdown.
pub struct TimerDisplay {
    /// Render target
    pub surface: Arc<dyn TimerSurface>,
    /// Message the progress line is appended to
    pub base: Content,
}

struct Inner {
    state: watch::Sender<TimerState>,
    token: CancellationToken,
    floor: Duration,
    warn_threshold: Duration,
    display: Mutex<Option<TimerDisplay>>,
}

/// A cancelable, pausable timed wait.
#[derive(Clone)]
pub struct Countdown {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Countdown {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Countdown")
            .field("state", &*self.inner.state.borrow())
            .finish_non_exhaustive()
    }
}

impl Countdown {
    /// Creates an idle countdown bound to `token`.
    #[must_use]
    pub fn new(token: CancellationToken, settings: &EngineSettings) -> Self {
        let (state, _) = watch::channel(TimerState::Idle);
        Self {
            inner: Arc::new(Inner {
                state,
                token,
                floor: settings.countdown_floor,
                warn_threshold: settings.countdown_warn_threshold,
                display: Mutex::new(None),
            }),
        }
    }

    /// Attaches a progress display used by the next `start`.
    #[must_use]
    pub fn with_display(self, display: TimerDisplay) -> Self {
        *lock(&self.inner.display) = Some(display);
        self
    }

    /// Waits until `duration` elapses or the countdown is cancelled.
    ///
    /// Pauses extend the wait by the paused time. A countdown cancelled
    /// before `start` returns [`Finish::Cancelled`] immediately.
    pub async fn start(&self, duration: Duration) -> Finish {
        if duration >= self.inner.warn_threshold {
            tracing::warn!(
                seconds = duration.as_secs(),
                "implausibly long countdown, check the unit"
            );
        }

        let mut rx = self.inner.state.subscribe();
        let deadline = Instant::now()
            .checked_add(duration)
            .unwrap_or_else(|| Instant::now() + self.inner.warn_threshold);
        let armed = self.inner.state.send_if_modified(|s| {
            if *s == TimerState::Idle {
                *s = TimerState::Running { deadline };
                true
            } else {
                false
            }
        });
        if !armed {
            tracing::debug!(state = ?*rx.borrow(), "countdown already armed or finished");
        }

        let display = if duration >= self.inner.floor {
            lock(&self.inner.display)
                .take()
                .map(|d| tokio::spawn(run_display(self.inner.state.subscribe(), d, duration)))
        } else {
            None
        };

        let finish = loop {
            let current = *rx.borrow_and_update();
            match current {
                TimerState::Finished(finish) => break finish,
                TimerState::Running { deadline } => {
                    tokio::select! {
                        () = tokio::time::sleep_until(deadline) => {
                            self.inner.state.send_if_modified(|s| {
                                if *s == (TimerState::Running { deadline }) {
                                    *s = TimerState::Finished(Finish::Elapsed);
                                    true
                                } else {
                                    false
                                }
                            });
                        }
                        changed = rx.changed() => {
                            if changed.is_err() {
                                break Finish::Cancelled;
                            }
                        }
                        () = self.inner.token.cancelled() => {
                            self.cancel();
                        }
                    }
                }
                TimerState::Idle | TimerState::Paused { .. } => {
                    tokio::select! {
                        changed = rx.changed() => {
                            if changed.is_err() {
                                break Finish::Cancelled;
                            }
                        }
                        () = self.inner.token.cancelled() => {
                            self.cancel();
                        }
                    }
                }
            }
        };

        if let Some(handle) = display {
            handle.abort();
        }
        finish
    }

    /// Resolves the wait now and returns the time that was left.
    ///
    /// Returns zero if the countdown already finished; a second call is a
    /// no-op returning zero.
    pub fn cancel(&self) -> Duration {
        let mut remaining = Duration::ZERO;
        self.inner.state.send_if_modified(|s| match *s {
            TimerState::Running { deadline } => {
                remaining = deadline.saturating_duration_since(Instant::now());
                *s = TimerState::Finished(Finish::Cancelled);
                true
            }
            TimerState::Paused { remaining: left } => {
                remaining = left;
                *s = TimerState::Finished(Finish::Cancelled);
                true
            }
            TimerState::Idle => {
                *s = TimerState::Finished(Finish::Cancelled);
                true
            }
            TimerState::Finished(_) => false,
        });
        remaining
    }

    /// Freezes the timer and returns the remaining time.
    ///
    /// The waiter keeps waiting; only the deadline is torn down.
    pub fn pause(&self) -> Duration {
        let mut remaining = Duration::ZERO;
        self.inner.state.send_if_modified(|s| match *s {
            TimerState::Running { deadline } => {
                remaining = deadline.saturating_duration_since(Instant::now());
                *s = TimerState::Paused { remaining };
                true
            }
            TimerState::Paused { remaining: left } => {
                remaining = left;
                false
            }
            TimerState::Idle | TimerState::Finished(_) => false,
        });
        remaining
    }

    /// Re-arms a paused timer for exactly its remaining time.
    ///
    /// Returns `false` if the countdown was not paused.
    pub fn resume(&self) -> bool {
        self.inner.state.send_if_modified(|s| match *s {
            TimerState::Paused { remaining } => {
                *s = TimerState::Running {
                    deadline: Instant::now() + remaining,
                };
                true
            }
            _ => false,
        })
    }

    /// Time left on the timer.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        match *self.inner.state.borrow() {
            TimerState::Running { deadline } => deadline.saturating_duration_since(Instant::now()),
            TimerState::Paused { remaining } => remaining,
            TimerState::Idle | TimerState::Finished(_) => Duration::ZERO,
        }
    }

    /// Returns `true` while paused.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        matches!(*self.inner.state.borrow(), TimerState::Paused { .. })
    }

    /// Returns `true` once the wait has resolved.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        matches!(*self.inner.state.borrow(), TimerState::Finished(_))
    }
}

async fn run_display(state: watch::Receiver<TimerState>, display: TimerDisplay, total: Duration) {
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut warned = false;

    loop {
        ticker.tick().await;
        let current = *state.borrow();
        let remaining = match current {
            TimerState::Running { deadline } => deadline.saturating_duration_since(Instant::now()),
            TimerState::Idle | TimerState::Paused { .. } => continue,
            TimerState::Finished(_) => break,
        };

        if !warned && remaining <= Duration::from_secs(10) {
            warned = true;
            display.surface.timer_cue(Cue::Countdown10);
        }
        let content = display.base.clone().line(progress_line(remaining, total));
        display.surface.show_timer(&content).await;

        if remaining.is_zero() {
            break;
        }
    }
}

/// Renders a ten-cell bar followed by the seconds left.
#[must_use]
pub fn progress_line(remaining: Duration, total: Duration) -> String {
    const CELLS: u128 = 10;
    let total_ms = total.as_millis().max(1);
    let filled = (remaining.as_millis().min(total_ms) * CELLS).div_ceil(total_ms);
    let filled = usize::try_from(filled).unwrap_or(10);
    format!(
        "{}{} {}s",
        "■".repeat(filled),
        "□".repeat(10 - filled),
        remaining.as_secs_f64().ceil()
    )
}
