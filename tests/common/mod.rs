//! Test utilities for the linkharvest test suite
//!
//! `FakeLauncher` hands out scripted page drivers that record every call, so
//! session and manager tests can assert on exactly what the browser saw.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use kodegen_tools_linkharvest::{
    AcceptOutcome, DriverError, DriverLauncher, HarvestConfig, Link, LinkStore, MemoryLinkStore,
    PageDriver, StoreError,
};
use parking_lot::Mutex;
use serde_json::{Value, json};

/// One recorded page driver call; the number is the launch that produced the driver
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverEvent {
    Launch(usize),
    Goto(usize, String),
    Wait(usize, String),
    Scroll(usize),
    Extract(usize),
    Close(usize),
}

/// How the fake browser behaves
#[derive(Debug, Clone)]
pub struct FakeScript {
    /// Results of successive extract calls across all launches
    pub polls: Vec<Value>,
    /// Returned once `polls` is exhausted
    pub fallback: Value,
    pub selector_present: bool,
    pub goto_error: Option<String>,
    pub launch_error: Option<String>,
    /// Each extract call takes this long
    pub extract_delay: Duration,
    /// Each launch takes this long
    pub launch_delay: Duration,
    /// Each selector wait takes this long before answering
    pub selector_delay: Duration,
}

impl Default for FakeScript {
    fn default() -> Self {
        Self {
            polls: Vec::new(),
            fallback: json!([]),
            selector_present: true,
            goto_error: None,
            launch_error: None,
            extract_delay: Duration::ZERO,
            launch_delay: Duration::ZERO,
            selector_delay: Duration::ZERO,
        }
    }
}

struct FakeInner {
    script: FakeScript,
    polls: Mutex<VecDeque<Value>>,
    events: Mutex<Vec<DriverEvent>>,
    launches: AtomicUsize,
}

impl FakeInner {
    fn record(&self, event: DriverEvent) {
        self.events.lock().push(event);
    }
}

#[derive(Clone)]
pub struct FakeLauncher {
    inner: Arc<FakeInner>,
}

#[allow(dead_code)]
impl FakeLauncher {
    pub fn new(script: FakeScript) -> Self {
        let polls = script.polls.iter().cloned().collect();
        Self {
            inner: Arc::new(FakeInner {
                script,
                polls: Mutex::new(polls),
                events: Mutex::new(Vec::new()),
                launches: AtomicUsize::new(0),
            }),
        }
    }

    /// Driver that keeps returning `polls` in order, then nothing
    pub fn with_polls(polls: Vec<Value>) -> Self {
        Self::new(FakeScript {
            polls,
            ..FakeScript::default()
        })
    }

    pub fn events(&self) -> Vec<DriverEvent> {
        self.inner.events.lock().clone()
    }

    pub fn launches(&self) -> usize {
        self.inner.launches.load(Ordering::SeqCst)
    }

    pub fn count(&self, matches: impl Fn(&DriverEvent) -> bool) -> usize {
        self.inner.events.lock().iter().filter(|e| matches(e)).count()
    }

    /// Most drivers open at the same time over the recorded history
    pub fn max_alive(&self) -> usize {
        let mut alive = 0usize;
        let mut max = 0usize;
        for event in self.inner.events.lock().iter() {
            match event {
                DriverEvent::Launch(_) => {
                    alive += 1;
                    max = max.max(alive);
                }
                DriverEvent::Close(_) => alive = alive.saturating_sub(1),
                _ => {}
            }
        }
        max
    }

    /// Position of the first event matching `matches`
    pub fn position(&self, matches: impl Fn(&DriverEvent) -> bool) -> Option<usize> {
        self.inner.events.lock().iter().position(|e| matches(e))
    }
}

#[async_trait]
impl DriverLauncher for FakeLauncher {
    async fn launch(&self) -> Result<Box<dyn PageDriver>, DriverError> {
        let id = self.inner.launches.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.record(DriverEvent::Launch(id));
        if !self.inner.script.launch_delay.is_zero() {
            tokio::time::sleep(self.inner.script.launch_delay).await;
        }
        if let Some(msg) = &self.inner.script.launch_error {
            return Err(DriverError::Launch(msg.clone()));
        }
        Ok(Box::new(FakeDriver {
            id,
            inner: Arc::clone(&self.inner),
            closed: false,
        }))
    }
}

pub struct FakeDriver {
    id: usize,
    inner: Arc<FakeInner>,
    closed: bool,
}

#[async_trait]
impl PageDriver for FakeDriver {
    async fn goto(&mut self, url: &str) -> Result<(), DriverError> {
        self.inner.record(DriverEvent::Goto(self.id, url.to_string()));
        match &self.inner.script.goto_error {
            Some(msg) => Err(DriverError::Navigation(msg.clone())),
            None => Ok(()),
        }
    }

    async fn wait_for_selector(
        &mut self,
        selector: &str,
        _timeout: Duration,
    ) -> Result<bool, DriverError> {
        self.inner
            .record(DriverEvent::Wait(self.id, selector.to_string()));
        if !self.inner.script.selector_delay.is_zero() {
            tokio::time::sleep(self.inner.script.selector_delay).await;
        }
        Ok(self.inner.script.selector_present)
    }

    async fn evaluate(&mut self, script: &str) -> Result<Value, DriverError> {
        if self.closed {
            return Err(DriverError::Closed);
        }
        if script.contains("scrollBy") {
            self.inner.record(DriverEvent::Scroll(self.id));
            return Ok(json!(0));
        }
        if script.contains("' a img'") {
            if !self.inner.script.extract_delay.is_zero() {
                tokio::time::sleep(self.inner.script.extract_delay).await;
            }
            self.inner.record(DriverEvent::Extract(self.id));
            let next = self.inner.polls.lock().pop_front();
            return Ok(next.unwrap_or_else(|| self.inner.script.fallback.clone()));
        }
        Err(DriverError::Evaluate(format!("unexpected script: {script}")))
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        if !self.closed {
            self.closed = true;
            self.inner.record(DriverEvent::Close(self.id));
        }
        Ok(())
    }
}

/// Store that fails the first `failures` accepts, then behaves like memory
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryLinkStore,
    failures: AtomicUsize,
}

#[allow(dead_code)]
impl FlakyStore {
    pub fn failing(failures: usize) -> Self {
        Self {
            inner: MemoryLinkStore::new(),
            failures: AtomicUsize::new(failures),
        }
    }
}

#[async_trait]
impl LinkStore for FlakyStore {
    async fn ensure_unique_index(&self) -> Result<(), StoreError> {
        self.inner.ensure_unique_index().await
    }

    async fn accept(&self, link: &Link) -> Result<AcceptOutcome, StoreError> {
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(StoreError::Connect("store unavailable".into()));
        }
        self.inner.accept(link).await
    }

    async fn close(&self) {
        self.inner.close().await;
    }
}

/// Config tuned for fast tests: tiny delays, no session time limit
#[allow(dead_code)]
pub fn fast_config() -> HarvestConfig {
    fast_builder().build().unwrap()
}

#[allow(dead_code)]
pub fn fast_builder() -> kodegen_tools_linkharvest::config::HarvestConfigBuilder<
    kodegen_tools_linkharvest::config::WithStore,
> {
    HarvestConfig::builder()
        .store_path("unused.db")
        .cycle_delay(Duration::from_millis(5))
        .idle_delay(Duration::from_millis(5))
        .selector_timeout(Duration::from_millis(200))
        .navigation_timeout(Duration::from_millis(200))
        .evaluate_timeout(Duration::from_secs(2))
        .teardown_timeout(Duration::from_millis(200))
        .max_session_duration(None)
}

/// Poll `check` until it holds or `limit` passes
#[allow(dead_code)]
pub async fn wait_until(limit: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    check()
}
