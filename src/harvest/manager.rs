//! Session manager: one live session per consumer
//!
//! A new request for a consumer supersedes its running session. The old
//! session is cancelled and awaited, so its browser is gone before the new
//! one launches. Requests for the same consumer are serialized, so two
//! racing starts still leave at most one browser per consumer. Consumer
//! sessions are bounded by the configured maximum duration; on expiry the
//! consumer receives a timeout notice. Detached sessions run until cancelled.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, OwnedMutexGuard, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::control::SessionControl;
use super::session::{Session, SessionOutcome};
use super::types::{ConsumerId, HarvestError, SessionId, SessionRequest, SessionState, StopReason};
use crate::config::HarvestConfig;
use crate::link_store::LinkStore;
use crate::page_driver::DriverLauncher;
use crate::sink::{LinkSink, OutboundMessage};

/// Initial capacity for the consumer session map
const SESSION_MAP_INITIAL_CAPACITY: usize = 16;

/// How often finished sessions are swept from the registry
const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

struct LiveSession {
    session_id: SessionId,
    control: SessionControl,
    state: watch::Receiver<SessionState>,
    task: JoinHandle<SessionOutcome>,
    started_at: Instant,
}

impl LiveSession {
    fn is_finished(&self) -> bool {
        self.state.borrow().is_terminal() || self.task.is_finished()
    }
}

/// Tracks and supervises harvesting sessions
pub struct SessionManager {
    config: Arc<HarvestConfig>,
    launcher: Arc<dyn DriverLauncher>,
    store: Arc<dyn LinkStore>,
    sessions: Mutex<HashMap<ConsumerId, LiveSession>>,
    /// Held for the whole of a start or disconnect of one consumer
    gates: parking_lot::Mutex<HashMap<ConsumerId, Arc<Mutex<()>>>>,
    /// Sessions without a consumer, e.g. the boot-time seed
    detached: Mutex<Vec<LiveSession>>,
    shutting_down: AtomicBool,
}

impl SessionManager {
    #[must_use]
    pub fn new(
        config: Arc<HarvestConfig>,
        launcher: Arc<dyn DriverLauncher>,
        store: Arc<dyn LinkStore>,
    ) -> Self {
        Self {
            config,
            launcher,
            store,
            sessions: Mutex::new(HashMap::with_capacity(SESSION_MAP_INITIAL_CAPACITY)),
            gates: parking_lot::Mutex::new(HashMap::with_capacity(SESSION_MAP_INITIAL_CAPACITY)),
            detached: Mutex::new(Vec::new()),
            shutting_down: AtomicBool::new(false),
        }
    }

    /// Start a session for `consumer`, superseding any session it already has
    ///
    /// An invalid request is rejected before the running session is touched.
    pub async fn start(
        &self,
        consumer: ConsumerId,
        request: SessionRequest,
        sink: Arc<dyn LinkSink>,
    ) -> Result<SessionId, HarvestError> {
        self.ensure_accepting()?;
        let (session, state_rx, control) = self.prepare(request, Some(Arc::clone(&sink)))?;

        let _gate = self.gate(consumer).await;

        let previous = self.sessions.lock().await.remove(&consumer);
        if let Some(previous) = previous {
            info!(
                consumer = %consumer,
                old = %previous.session_id,
                new = %session.id(),
                "Superseding session"
            );
            previous.control.cancel(StopReason::Superseded);
            Self::join(previous).await;
        }

        self.ensure_accepting()?;

        let limit = self.config.max_session_duration();
        let live = Self::launch(session, state_rx, control, limit, Some(sink));
        let session_id = live.session_id;

        let mut sessions = self.sessions.lock().await;
        if self.shutting_down.load(Ordering::Acquire) {
            // Shutdown drained the map while this session was launching
            drop(sessions);
            live.control.cancel(StopReason::Shutdown);
            Self::join(live).await;
            return Err(HarvestError::ShuttingDown);
        }
        let stale = sessions.insert(consumer, live);
        drop(sessions);

        if let Some(stale) = stale {
            warn!(consumer = %consumer, session = %stale.session_id, "Replacing unexpected session");
            stale.control.cancel(StopReason::Superseded);
            Self::join(stale).await;
        }
        Ok(session_id)
    }

    /// Start a session nobody is listening to; links are stored only
    ///
    /// Detached sessions are not bound by the maximum session duration and
    /// run until shutdown.
    pub async fn start_detached(&self, request: SessionRequest) -> Result<SessionId, HarvestError> {
        self.ensure_accepting()?;
        let (session, state_rx, control) = self.prepare(request, None)?;
        let live = Self::launch(session, state_rx, control, None, None);
        let session_id = live.session_id;

        let mut detached = self.detached.lock().await;
        if self.shutting_down.load(Ordering::Acquire) {
            drop(detached);
            live.control.cancel(StopReason::Shutdown);
            Self::join(live).await;
            return Err(HarvestError::ShuttingDown);
        }
        detached.push(live);
        Ok(session_id)
    }

    /// Cancel whatever `consumer` is running and wait for it to release its browser
    pub async fn disconnect(&self, consumer: ConsumerId) {
        let _gate = self.gate(consumer).await;
        let Some(live) = self.sessions.lock().await.remove(&consumer) else {
            return;
        };
        info!(
            consumer = %consumer,
            session = %live.session_id,
            "Consumer disconnected after {:.1}s, stopping session",
            live.started_at.elapsed().as_secs_f64()
        );
        live.control.cancel(StopReason::Disconnected);
        Self::join(live).await;
    }

    /// Current state of the consumer's session
    pub async fn state(&self, consumer: ConsumerId) -> Option<SessionState> {
        let sessions = self.sessions.lock().await;
        sessions.get(&consumer).map(|live| live.state.borrow().clone())
    }

    pub async fn session_id(&self, consumer: ConsumerId) -> Option<SessionId> {
        let sessions = self.sessions.lock().await;
        sessions.get(&consumer).map(|live| live.session_id)
    }

    /// Subscribe to state changes of the consumer's current session
    pub async fn watch_state(&self, consumer: ConsumerId) -> Option<watch::Receiver<SessionState>> {
        let sessions = self.sessions.lock().await;
        sessions.get(&consumer).map(|live| live.state.clone())
    }

    /// Number of sessions that have not reached a terminal state
    pub async fn live_sessions(&self) -> usize {
        let attached = self
            .sessions
            .lock()
            .await
            .values()
            .filter(|live| !live.is_finished())
            .count();
        let detached = self
            .detached
            .lock()
            .await
            .iter()
            .filter(|live| !live.is_finished())
            .count();
        attached + detached
    }

    /// Cancel every session and wait for all of them to release their browsers
    ///
    /// Later `start` calls are rejected.
    pub async fn shutdown(&self) {
        self.shutting_down.store(true, Ordering::Release);

        let mut all: Vec<LiveSession> = self.sessions.lock().await.drain().map(|(_, s)| s).collect();
        all.append(&mut *self.detached.lock().await);

        info!("Shutting down {} session(s)", all.len());
        for live in &all {
            live.control.cancel(StopReason::Shutdown);
        }
        futures::future::join_all(all.into_iter().map(Self::join)).await;
    }

    /// Drop finished sessions from the registry
    async fn cleanup_sessions(&self) {
        let mut sessions = self.sessions.lock().await;
        let initial_count = sessions.len();
        sessions.retain(|consumer, live| {
            let keep = !live.is_finished();
            if !keep {
                log::debug!(
                    "Removing finished session {} of consumer {consumer}: {}",
                    live.session_id,
                    *live.state.borrow()
                );
            }
            keep
        });
        let mut cleaned = initial_count - sessions.len();
        // A gate still cloned elsewhere belongs to a start or disconnect in flight
        self.gates
            .lock()
            .retain(|consumer, gate| sessions.contains_key(consumer) || Arc::strong_count(gate) > 1);
        drop(sessions);

        let mut detached = self.detached.lock().await;
        let initial_detached = detached.len();
        detached.retain(|live| !live.is_finished());
        cleaned += initial_detached - detached.len();

        if cleaned > 0 {
            log::info!("Cleaned up {cleaned} finished sessions");
        }
    }

    /// Start background cleanup task (call once at initialization)
    ///
    /// Spawns a tokio task that sweeps finished sessions every 60 seconds.
    pub fn start_cleanup_task(self: Arc<Self>) {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
            loop {
                interval.tick().await;
                if self.shutting_down.load(Ordering::Acquire) {
                    break;
                }
                self.cleanup_sessions().await;
            }
        });
    }

    /// Exclusive access to one consumer's slot
    async fn gate(&self, consumer: ConsumerId) -> OwnedMutexGuard<()> {
        let gate = Arc::clone(self.gates.lock().entry(consumer).or_default());
        gate.lock_owned().await
    }

    fn ensure_accepting(&self) -> Result<(), HarvestError> {
        if self.shutting_down.load(Ordering::Acquire) {
            return Err(HarvestError::ShuttingDown);
        }
        Ok(())
    }

    fn prepare(
        &self,
        request: SessionRequest,
        sink: Option<Arc<dyn LinkSink>>,
    ) -> Result<(Session, watch::Receiver<SessionState>, SessionControl), HarvestError> {
        let control = SessionControl::new();
        let (session, state_rx) = Session::new(
            request,
            Arc::clone(&self.config),
            Arc::clone(&self.launcher),
            Arc::clone(&self.store),
            sink,
            control.clone(),
        )?;
        Ok((session, state_rx, control))
    }

    fn launch(
        session: Session,
        state: watch::Receiver<SessionState>,
        control: SessionControl,
        limit: Option<Duration>,
        sink: Option<Arc<dyn LinkSink>>,
    ) -> LiveSession {
        let session_id = session.id();
        let task = tokio::spawn(supervise(session, control.clone(), limit, sink));
        LiveSession {
            session_id,
            control,
            state,
            task,
            started_at: Instant::now(),
        }
    }

    async fn join(live: LiveSession) -> Option<SessionOutcome> {
        match live.task.await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                warn!(session = %live.session_id, "Session task ended abnormally: {e}");
                None
            }
        }
    }
}

/// Run a session under its duration limit and report a timeout to the consumer
///
/// The timer shares the session's cancellation handle, so expiry and any
/// other cancellation race on one signal and the first reason wins.
async fn supervise(
    session: Session,
    control: SessionControl,
    limit: Option<Duration>,
    sink: Option<Arc<dyn LinkSink>>,
) -> SessionOutcome {
    let timer = limit.map(|limit| {
        let control = control.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = tokio::time::sleep(limit) => control.cancel(StopReason::TimedOut),
                () = control.cancelled() => {}
            }
        })
    });

    let outcome = session.run().await;

    if let Some(timer) = timer {
        timer.abort();
    }

    if outcome.state == SessionState::Stopped(StopReason::TimedOut)
        && let Some(sink) = sink
        && sink.is_ready()
        && let Err(e) = sink.send(OutboundMessage::timed_out())
    {
        warn!(session = %outcome.id, "Could not deliver timeout notice: {e}");
    }

    outcome
}
