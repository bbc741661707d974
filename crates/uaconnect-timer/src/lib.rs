//! Shared timer queue and single-shot auto-connect timers.
//!
//! All timers of the process are driven by one background task, the
//! [`TimerQueue`]. Each session owns an [`AutoConnectTimer`] registered with
//! that queue:
//!
//! ```text
//!   Session A ── AutoConnectTimer ─┐
//!   Session B ── AutoConnectTimer ─┼──→ TimerQueue task
//!   Session C ── AutoConnectTimer ─┘      BTreeSet<(deadline, id)>
//!                                         sleep_until(earliest)
//!                                            │ expiry
//!                                            ▼
//!                                       callback() (once)
//! ```
//!
//! # Semantics
//!
//! - [`AutoConnectTimer::start`] arms the timer for its fixed delay. Starting
//!   an armed timer replaces the deadline.
//! - On expiry the callback runs exactly once on the queue task. The timer
//!   does not restart itself; the owner re-arms it if needed.
//! - [`AutoConnectTimer::cancel`] disarms it. A cancelled arming never fires.
//! - Dropping the timer cancels it and releases its queue entry.
//!
//! Callbacks run on the shared queue task, so they must return quickly. The
//! intended use is posting a message to the owner's own task.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

/// Callback invoked when a timer expires.
pub type TimerCallback = Arc<dyn Fn() + Send + Sync>;

/// Identifies one timer within its queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(u64);

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Shared slot state
// ---------------------------------------------------------------------------

/// State shared between a timer handle and the queue task.
///
/// `epoch` changes on every start and cancel. The queue only fires an entry
/// whose epoch is still current, so a cancel that races with an expiry
/// already queued behind it wins.
struct Slot {
    id: TimerId,
    callback: TimerCallback,
    state: Mutex<SlotState>,
}

#[derive(Debug, Default)]
struct SlotState {
    epoch: u64,
    armed: bool,
}

impl Slot {
    fn lock(&self) -> MutexGuard<'_, SlotState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs the callback if `epoch` is still the current arming.
    fn fire(&self, epoch: u64) {
        {
            let mut state = self.lock();
            if !state.armed || state.epoch != epoch {
                trace!(timer = %self.id, "stale expiry ignored");
                return;
            }
            state.armed = false;
        }
        trace!(timer = %self.id, "timer expired");
        (self.callback)();
    }
}

// ---------------------------------------------------------------------------
// Queue task
// ---------------------------------------------------------------------------

enum TimerCommand {
    Arm {
        deadline: Instant,
        epoch: u64,
        slot: Arc<Slot>,
    },
    Cancel {
        id: TimerId,
    },
}

struct Entry {
    deadline: Instant,
    epoch: u64,
    slot: Arc<Slot>,
}

/// The state owned by the queue task.
#[derive(Default)]
struct QueueState {
    deadlines: BTreeSet<(Instant, TimerId)>,
    entries: HashMap<TimerId, Entry>,
}

impl QueueState {
    fn apply(&mut self, cmd: TimerCommand) {
        match cmd {
            TimerCommand::Arm {
                deadline,
                epoch,
                slot,
            } => {
                let id = slot.id;
                self.remove(id);
                self.deadlines.insert((deadline, id));
                self.entries.insert(
                    id,
                    Entry {
                        deadline,
                        epoch,
                        slot,
                    },
                );
            }
            TimerCommand::Cancel { id } => self.remove(id),
        }
    }

    fn remove(&mut self, id: TimerId) {
        if let Some(old) = self.entries.remove(&id) {
            self.deadlines.remove(&(old.deadline, id));
        }
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.deadlines.first().map(|(deadline, _)| *deadline)
    }

    /// Fires every entry due at `now`, earliest first.
    fn fire_due(&mut self, now: Instant) {
        while let Some(&(deadline, id)) = self.deadlines.first() {
            if deadline > now {
                break;
            }
            self.deadlines.pop_first();
            if let Some(entry) = self.entries.remove(&id) {
                entry.slot.fire(entry.epoch);
            }
        }
    }
}

async fn run_queue(mut rx: mpsc::UnboundedReceiver<TimerCommand>) {
    let mut state = QueueState::default();
    debug!("timer queue started");

    loop {
        let next = state.next_deadline();
        tokio::select! {
            cmd = rx.recv() => match cmd {
                Some(cmd) => state.apply(cmd),
                None => break,
            },
            () = sleep_until_or_pending(next) => state.fire_due(Instant::now()),
        }
    }

    debug!(pending = state.entries.len(), "timer queue stopped");
}

/// Sleeps until `deadline`, or pends forever when there is none so the
/// `select!` keeps serving commands.
async fn sleep_until_or_pending(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        None => future::pending::<()>().await,
    }
}

// ---------------------------------------------------------------------------
// TimerQueue handle
// ---------------------------------------------------------------------------

/// Handle to the shared timer task.
///
/// Cheap to clone. The task stops once the last handle and the last timer
/// created from it are dropped.
#[derive(Clone)]
pub struct TimerQueue {
    cmd_tx: mpsc::UnboundedSender<TimerCommand>,
    next_id: Arc<AtomicU64>,
}

impl TimerQueue {
    /// Spawns the queue task on the current Tokio runtime.
    ///
    /// # Panics
    /// Panics when called outside a Tokio runtime.
    pub fn spawn() -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        tokio::spawn(run_queue(cmd_rx));
        Self {
            cmd_tx,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Creates a disarmed timer that runs `callback` `delay` after each
    /// [`start`](AutoConnectTimer::start).
    pub fn timer<F>(&self, delay: Duration, callback: F) -> AutoConnectTimer
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = TimerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        AutoConnectTimer {
            delay,
            cmd_tx: self.cmd_tx.clone(),
            slot: Arc::new(Slot {
                id,
                callback: Arc::new(callback),
                state: Mutex::new(SlotState::default()),
            }),
        }
    }

    /// Whether the queue task is still running.
    pub fn is_running(&self) -> bool {
        !self.cmd_tx.is_closed()
    }
}

impl fmt::Debug for TimerQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerQueue")
            .field("running", &self.is_running())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// AutoConnectTimer
// ---------------------------------------------------------------------------

/// Single-shot timer with a fixed delay, owned by one session.
pub struct AutoConnectTimer {
    delay: Duration,
    cmd_tx: mpsc::UnboundedSender<TimerCommand>,
    slot: Arc<Slot>,
}

impl AutoConnectTimer {
    /// Arms the timer to fire after its delay, replacing any pending
    /// deadline.
    pub fn start(&self) {
        let deadline = Instant::now() + self.delay;
        let epoch = {
            let mut state = self.slot.lock();
            state.epoch += 1;
            state.armed = true;
            state.epoch
        };

        let cmd = TimerCommand::Arm {
            deadline,
            epoch,
            slot: Arc::clone(&self.slot),
        };
        if self.cmd_tx.send(cmd).is_err() {
            self.slot.lock().armed = false;
            warn!(timer = %self.slot.id, "timer queue stopped, timer not armed");
            return;
        }
        debug!(
            timer = %self.slot.id,
            delay_ms = self.delay.as_millis() as u64,
            "timer armed"
        );
    }

    /// Disarms the timer. No-op when it is not armed.
    pub fn cancel(&self) {
        {
            let mut state = self.slot.lock();
            if !state.armed {
                return;
            }
            state.epoch += 1;
            state.armed = false;
        }
        // A stopped queue fires nothing, so a failed send needs no handling.
        let _ = self.cmd_tx.send(TimerCommand::Cancel { id: self.slot.id });
        debug!(timer = %self.slot.id, "timer cancelled");
    }

    /// Whether an expiry is pending.
    pub fn is_armed(&self) -> bool {
        self.slot.lock().armed
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn id(&self) -> TimerId {
        self.slot.id
    }
}

impl fmt::Debug for AutoConnectTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AutoConnectTimer")
            .field("id", &self.slot.id)
            .field("delay", &self.delay)
            .field("armed", &self.is_armed())
            .finish()
    }
}

impl Drop for AutoConnectTimer {
    fn drop(&mut self) {
        self.cancel();
        trace!(timer = %self.slot.id, "timer released");
    }
}
