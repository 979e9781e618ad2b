//! The harvesting session state machine
//!
//! A session owns exactly one page driver at a time. It polls the page,
//! records newly seen links in the shared store and forwards the new ones to
//! its consumer in batches. Every exit path goes through [`Session::run`],
//! which releases the driver before publishing the terminal state.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::control::SessionControl;
use super::extractor::{self, ScrollSettings};
use super::types::{FailureReason, HarvestError, SessionId, SessionRequest, SessionState, StopReason};
use crate::batcher::chunk;
use crate::config::HarvestConfig;
use crate::link_store::{AcceptOutcome, Link, LinkStore};
use crate::page_driver::{DriverError, DriverLauncher, PageDriver};
use crate::sink::{LinkSink, OutboundMessage};
use crate::utils::{build_target_url, with_timeout};

/// Counters accumulated over a session's lifetime
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Completed poll cycles
    pub cycles: u64,
    /// Links returned by the extractor, repeats included
    pub links_seen: u64,
    pub inserted: u64,
    pub duplicates: u64,
    pub store_errors: u64,
    pub batches_sent: u64,
    /// Cycles whose new links could not be handed to the consumer
    pub deliveries_skipped: u64,
    pub recycles: u64,
}

/// What a finished session reports back to its owner
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub id: SessionId,
    pub state: SessionState,
    pub stats: SessionStats,
}

pub struct Session {
    id: SessionId,
    request: SessionRequest,
    target_url: String,
    category: Option<String>,
    config: Arc<HarvestConfig>,
    launcher: Arc<dyn DriverLauncher>,
    store: Arc<dyn LinkStore>,
    sink: Option<Arc<dyn LinkSink>>,
    control: SessionControl,
    state_tx: watch::Sender<SessionState>,
    driver: Option<Box<dyn PageDriver>>,
    cycles_since_recycle: u32,
    stats: SessionStats,
}

impl Session {
    /// Prepare a session; nothing touches the browser until [`run`](Self::run)
    ///
    /// `sink` is `None` for consumerless sessions: links are still recorded,
    /// delivery is skipped.
    pub fn new(
        request: SessionRequest,
        config: Arc<HarvestConfig>,
        launcher: Arc<dyn DriverLauncher>,
        store: Arc<dyn LinkStore>,
        sink: Option<Arc<dyn LinkSink>>,
        control: SessionControl,
    ) -> Result<(Self, watch::Receiver<SessionState>), HarvestError> {
        request.validate()?;
        let target_url =
            build_target_url(config.target_base_url(), &request.query, &request.order)?;
        let (state_tx, state_rx) = watch::channel(SessionState::Starting);

        let session = Self {
            id: SessionId::new(),
            request,
            target_url: target_url.into(),
            category: config.category().map(str::to_string),
            config,
            launcher,
            store,
            sink,
            control,
            state_tx,
            driver: None,
            cycles_since_recycle: 0,
            stats: SessionStats::default(),
        };
        Ok((session, state_rx))
    }

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Drive the session until it is cancelled or fails
    pub async fn run(mut self) -> SessionOutcome {
        info!(
            session = %self.id,
            target = %self.target_url,
            selector = %self.request.div_selector,
            "Session starting"
        );

        let result = self.drive().await;
        self.release_driver().await;

        let state = match result {
            Ok(()) => {
                let reason = self.control.reason().unwrap_or(StopReason::Shutdown);
                info!(session = %self.id, %reason, "Session cancelled");
                SessionState::cancelled(reason)
            }
            Err(reason) => {
                error!(session = %self.id, %reason, "Session failed");
                SessionState::Failed(reason)
            }
        };
        self.set_state(state.clone());

        let stats = std::mem::take(&mut self.stats);
        info!(
            session = %self.id,
            cycles = stats.cycles,
            seen = stats.links_seen,
            inserted = stats.inserted,
            duplicates = stats.duplicates,
            store_errors = stats.store_errors,
            batches = stats.batches_sent,
            skipped = stats.deliveries_skipped,
            recycles = stats.recycles,
            "Session finished: {state}"
        );

        SessionOutcome {
            id: self.id,
            state,
            stats,
        }
    }

    /// `Ok(())` means the session was cancelled; `Err` is a terminal failure
    async fn drive(&mut self) -> Result<(), FailureReason> {
        if self.control.is_cancelled() {
            return Ok(());
        }
        self.open_driver().await?;

        let settings = ScrollSettings {
            step_px: self.config.scroll_step_px(),
            interval: self.config.scroll_interval(),
            evaluate_timeout: self.config.evaluate_timeout(),
        };

        loop {
            if self.control.is_cancelled() {
                return Ok(());
            }

            if self.cycles_since_recycle >= self.config.recycle_every() {
                info!(
                    session = %self.id,
                    cycles = self.stats.cycles,
                    "Recycling browser"
                );
                self.release_driver().await;
                self.cycles_since_recycle = 0;
                self.stats.recycles += 1;
                if self.control.is_cancelled() {
                    return Ok(());
                }
                self.open_driver().await?;
            }

            self.set_state(SessionState::Polling);
            let driver = self
                .driver
                .as_deref_mut()
                .ok_or_else(|| FailureReason::from(DriverError::Closed))?;
            let links = extractor::poll(driver, &self.request.div_selector, &settings).await?;

            self.stats.cycles += 1;
            self.cycles_since_recycle += 1;

            let delay = if links.is_empty() {
                self.config.idle_delay()
            } else {
                self.set_state(SessionState::Delivering);
                self.deliver(links).await;
                self.config.cycle_delay()
            };

            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = self.control.cancelled() => {}
            }
        }
    }

    /// Launch a browser, navigate to the target and wait for the container
    ///
    /// The driver is owned by the session as soon as it exists, so a failed
    /// navigation still releases it. Returns `Ok(())` early when cancelled;
    /// a launch already under way is allowed to finish so its browser can be
    /// closed, but no page call is made after cancellation.
    async fn open_driver(&mut self) -> Result<(), FailureReason> {
        self.set_state(SessionState::Starting);
        let control = self.control.clone();

        let driver = with_timeout(
            self.launcher.launch(),
            self.config.launch_timeout(),
            "browser launch",
        )
        .await
        .map_err(|e| match e {
            DriverError::Launch(msg) => FailureReason::LaunchFailure(msg),
            other => FailureReason::LaunchFailure(other.to_string()),
        })?;
        let driver = self.driver.insert(driver);
        if control.is_cancelled() {
            return Ok(());
        }

        let navigation = with_timeout(
            driver.goto(&self.target_url),
            self.config.navigation_timeout(),
            "navigation",
        );
        tokio::select! {
            result = navigation => result.map_err(|e| match e {
                DriverError::Navigation(msg) => FailureReason::NavigationFailure(msg),
                other => FailureReason::NavigationFailure(other.to_string()),
            })?,
            () = control.cancelled() => return Ok(()),
        }
        if control.is_cancelled() {
            return Ok(());
        }

        let selector = &self.request.div_selector;
        let selector_timeout = self.config.selector_timeout();
        let waited = tokio::select! {
            result = with_timeout(
                driver.wait_for_selector(selector, selector_timeout),
                selector_timeout,
                "selector wait",
            ) => result,
            () = control.cancelled() => return Ok(()),
        };
        match waited {
            Ok(true) => {
                debug!(session = %self.id, %selector, "Container selector present");
                Ok(())
            }
            Ok(false) | Err(DriverError::Timeout { .. }) => Err(FailureReason::SelectorNotFound {
                selector: selector.clone(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Record the cycle's links and forward the new ones
    ///
    /// Store errors leave the link unrecorded so the next cycle offers it
    /// again. Delivery that cannot happen now is dropped, not queued.
    async fn deliver(&mut self, links: Vec<String>) {
        self.stats.links_seen += links.len() as u64;

        let mut fresh = Vec::new();
        let mut duplicates = 0u64;
        let mut last_store_error = None;
        let mut store_errors = 0u64;

        for url in links {
            if !self.config.accepts_link(&url) {
                continue;
            }
            let link = Link::new(url, self.category.clone());
            match self.store.accept(&link).await {
                Ok(AcceptOutcome::Inserted) => fresh.push(link.url),
                Ok(AcceptOutcome::Duplicate) => duplicates += 1,
                Err(e) => {
                    store_errors += 1;
                    last_store_error = Some(e);
                }
            }
        }

        self.stats.inserted += fresh.len() as u64;
        self.stats.duplicates += duplicates;
        self.stats.store_errors += store_errors;

        if let Some(e) = last_store_error {
            warn!(
                session = %self.id,
                failed = store_errors,
                "Link store rejected writes, links will be offered again: {e}"
            );
        }
        debug!(
            session = %self.id,
            new = fresh.len(),
            duplicates,
            "Cycle {} recorded",
            self.stats.cycles
        );

        if fresh.is_empty() {
            return;
        }

        let Some(sink) = self.sink.as_ref() else {
            debug!(session = %self.id, "No consumer attached, {} new links stored only", fresh.len());
            return;
        };
        if !sink.is_ready() {
            warn!(
                session = %self.id,
                "Consumer not ready, dropping {} new links for this cycle",
                fresh.len()
            );
            self.stats.deliveries_skipped += 1;
            return;
        }

        for batch in chunk(&fresh, self.config.batch_size()) {
            if let Err(e) = sink.send(OutboundMessage::links(batch)) {
                warn!(session = %self.id, "Delivery interrupted: {e}");
                self.stats.deliveries_skipped += 1;
                break;
            }
            self.stats.batches_sent += 1;
        }
    }

    /// Close the current driver, if any; a second call is a no-op
    async fn release_driver(&mut self) {
        let Some(mut driver) = self.driver.take() else {
            return;
        };
        match with_timeout(driver.close(), self.config.teardown_timeout(), "teardown").await {
            Ok(()) => debug!(session = %self.id, "Browser released"),
            Err(e) => warn!(session = %self.id, "Browser teardown failed: {e}"),
        }
    }

    fn set_state(&self, state: SessionState) {
        if *self.state_tx.borrow() == state {
            return;
        }
        let previous = self.state_tx.send_replace(state);
        debug!(session = %self.id, "{previous} -> {}", *self.state_tx.borrow());
    }
}
