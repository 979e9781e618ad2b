//! Type-safe builder for `HarvestConfig` using the typestate pattern
//!
//! The store location is the only required field; `build()` is not
//! available until it has been set.

use anyhow::{Result, anyhow, bail};
use std::marker::PhantomData;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

use super::types::HarvestConfig;
use crate::harvest::SessionRequest;
use crate::link_store::is_valid_table_name;
use crate::utils::{
    CATEGORIZED_BATCH_SIZE, DEFAULT_CYCLE_DELAY, DEFAULT_EVALUATE_TIMEOUT, DEFAULT_IDLE_DELAY,
    DEFAULT_LAUNCH_TIMEOUT, DEFAULT_MAX_SESSION_DURATION, DEFAULT_NAVIGATION_TIMEOUT,
    DEFAULT_RECYCLE_EVERY, DEFAULT_SELECTOR_TIMEOUT, DEFAULT_TABLE, DEFAULT_TARGET_BASE_URL,
    DEFAULT_TEARDOWN_TIMEOUT, SCROLL_INTERVAL, SCROLL_STEP_PX, UNCATEGORIZED_BATCH_SIZE,
    VIEWPORT_HEIGHT, VIEWPORT_WIDTH, build_target_url,
};

// Type states for the builder
pub struct WithStore;

pub struct HarvestConfigBuilder<State = ()> {
    pub(crate) store_path: Option<PathBuf>,
    pub(crate) table: String,
    pub(crate) target_base_url: String,
    pub(crate) category: Option<String>,
    pub(crate) link_prefix: Option<String>,
    pub(crate) batch_size: Option<usize>,
    pub(crate) idle_delay: Duration,
    pub(crate) cycle_delay: Duration,
    pub(crate) recycle_every: u32,
    pub(crate) launch_timeout: Duration,
    pub(crate) navigation_timeout: Duration,
    pub(crate) selector_timeout: Duration,
    pub(crate) evaluate_timeout: Duration,
    pub(crate) teardown_timeout: Duration,
    pub(crate) max_session_duration: Option<Duration>,
    pub(crate) headless: bool,
    pub(crate) viewport: (u32, u32),
    pub(crate) scroll_step_px: u32,
    pub(crate) scroll_interval: Duration,
    pub(crate) seed: Option<SessionRequest>,
    pub(crate) _phantom: PhantomData<State>,
}

impl Default for HarvestConfigBuilder<()> {
    fn default() -> Self {
        Self {
            store_path: None,
            table: DEFAULT_TABLE.to_string(),
            target_base_url: DEFAULT_TARGET_BASE_URL.to_string(),
            category: None,
            link_prefix: None,
            batch_size: None,
            idle_delay: DEFAULT_IDLE_DELAY,
            cycle_delay: DEFAULT_CYCLE_DELAY,
            recycle_every: DEFAULT_RECYCLE_EVERY,
            launch_timeout: DEFAULT_LAUNCH_TIMEOUT,
            navigation_timeout: DEFAULT_NAVIGATION_TIMEOUT,
            selector_timeout: DEFAULT_SELECTOR_TIMEOUT,
            evaluate_timeout: DEFAULT_EVALUATE_TIMEOUT,
            teardown_timeout: DEFAULT_TEARDOWN_TIMEOUT,
            max_session_duration: Some(DEFAULT_MAX_SESSION_DURATION),
            headless: true,
            viewport: (VIEWPORT_WIDTH, VIEWPORT_HEIGHT),
            scroll_step_px: SCROLL_STEP_PX,
            scroll_interval: SCROLL_INTERVAL,
            seed: None,
            _phantom: PhantomData,
        }
    }
}

impl HarvestConfig {
    /// Create a builder for configuring a `HarvestConfig` with a fluent interface
    #[must_use]
    pub fn builder() -> HarvestConfigBuilder<()> {
        HarvestConfigBuilder::default()
    }
}

impl HarvestConfigBuilder<()> {
    pub fn store_path(self, path: impl Into<PathBuf>) -> HarvestConfigBuilder<WithStore> {
        HarvestConfigBuilder {
            store_path: Some(path.into()),
            table: self.table,
            target_base_url: self.target_base_url,
            category: self.category,
            link_prefix: self.link_prefix,
            batch_size: self.batch_size,
            idle_delay: self.idle_delay,
            cycle_delay: self.cycle_delay,
            recycle_every: self.recycle_every,
            launch_timeout: self.launch_timeout,
            navigation_timeout: self.navigation_timeout,
            selector_timeout: self.selector_timeout,
            evaluate_timeout: self.evaluate_timeout,
            teardown_timeout: self.teardown_timeout,
            max_session_duration: self.max_session_duration,
            headless: self.headless,
            viewport: self.viewport,
            scroll_step_px: self.scroll_step_px,
            scroll_interval: self.scroll_interval,
            seed: self.seed,
            _phantom: PhantomData,
        }
    }
}

// Build method only available once the store location is set
impl HarvestConfigBuilder<WithStore> {
    pub fn build(self) -> Result<HarvestConfig> {
        let store_path = self
            .store_path
            .ok_or_else(|| anyhow!("store_path is required"))?;

        if !is_valid_table_name(&self.table) {
            bail!(
                "Invalid table name '{}': use letters, digits and underscores only",
                self.table
            );
        }

        // Probe the base URL with a throwaway query so a bad base fails here,
        // not inside the first session
        build_target_url(&self.target_base_url, "probe", "top")
            .map_err(|e| anyhow!("Invalid target base URL: {e}"))?;

        let default_batch = if self.category.is_some() {
            CATEGORIZED_BATCH_SIZE
        } else {
            UNCATEGORIZED_BATCH_SIZE
        };
        let batch_size = NonZeroUsize::new(self.batch_size.unwrap_or(default_batch))
            .ok_or_else(|| anyhow!("batch_size must be greater than zero"))?;

        if self.recycle_every == 0 {
            bail!("recycle_every must be greater than zero");
        }
        if self.scroll_step_px == 0 {
            bail!("scroll_step_px must be greater than zero");
        }
        if self.viewport.0 == 0 || self.viewport.1 == 0 {
            bail!(
                "viewport must be non-empty, got {}x{}",
                self.viewport.0,
                self.viewport.1
            );
        }
        if let Some(seed) = &self.seed {
            seed.validate()
                .map_err(|e| anyhow!("Invalid seed session: {e}"))?;
        }

        // Enforce headless mode in release builds
        #[cfg(not(debug_assertions))]
        let headless = if self.headless {
            true
        } else {
            tracing::warn!(
                "Forcing headless mode in release build. \
                Headed mode is only available in debug builds for development."
            );
            true
        };

        #[cfg(debug_assertions)]
        let headless = self.headless;

        Ok(HarvestConfig {
            store_path,
            table: self.table,
            target_base_url: self.target_base_url,
            category: self.category,
            link_prefix: self.link_prefix,
            batch_size,
            idle_delay: self.idle_delay,
            cycle_delay: self.cycle_delay,
            recycle_every: self.recycle_every,
            launch_timeout: self.launch_timeout,
            navigation_timeout: self.navigation_timeout,
            selector_timeout: self.selector_timeout,
            evaluate_timeout: self.evaluate_timeout,
            teardown_timeout: self.teardown_timeout,
            max_session_duration: self.max_session_duration,
            headless,
            viewport: self.viewport,
            scroll_step_px: self.scroll_step_px,
            scroll_interval: self.scroll_interval,
            seed: self.seed,
        })
    }
}

// Optional settings, available in any state
impl<State> HarvestConfigBuilder<State> {
    #[must_use]
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    #[must_use]
    pub fn target_base_url(mut self, url: impl Into<String>) -> Self {
        self.target_base_url = url.into();
        self
    }

    /// Tag every stored link with `category`
    ///
    /// Also switches the default batch size to the categorized one unless
    /// `batch_size` is set explicitly.
    #[must_use]
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Drop discovered links that do not start with `prefix`
    ///
    /// The match is anchored at the start of the link. A link that merely
    /// contains `prefix` further along, such as a proxy URL wrapping it, is
    /// dropped.
    #[must_use]
    pub fn link_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.link_prefix = Some(prefix.into());
        self
    }

    #[must_use]
    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = Some(size);
        self
    }

    #[must_use]
    pub fn idle_delay(mut self, delay: Duration) -> Self {
        self.idle_delay = delay;
        self
    }

    #[must_use]
    pub fn cycle_delay(mut self, delay: Duration) -> Self {
        self.cycle_delay = delay;
        self
    }

    /// Recycle the browser after this many completed poll cycles
    #[must_use]
    pub fn recycle_every(mut self, cycles: u32) -> Self {
        self.recycle_every = cycles;
        self
    }

    #[must_use]
    pub fn launch_timeout(mut self, timeout: Duration) -> Self {
        self.launch_timeout = timeout;
        self
    }

    #[must_use]
    pub fn navigation_timeout(mut self, timeout: Duration) -> Self {
        self.navigation_timeout = timeout;
        self
    }

    #[must_use]
    pub fn selector_timeout(mut self, timeout: Duration) -> Self {
        self.selector_timeout = timeout;
        self
    }

    #[must_use]
    pub fn evaluate_timeout(mut self, timeout: Duration) -> Self {
        self.evaluate_timeout = timeout;
        self
    }

    #[must_use]
    pub fn teardown_timeout(mut self, timeout: Duration) -> Self {
        self.teardown_timeout = timeout;
        self
    }

    /// Cap the wall-clock duration of each session; `None` removes the cap
    #[must_use]
    pub fn max_session_duration(mut self, limit: Option<Duration>) -> Self {
        self.max_session_duration = limit;
        self
    }

    #[must_use]
    pub fn headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    #[must_use]
    pub fn viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport = (width, height);
        self
    }

    #[must_use]
    pub fn scroll(mut self, step_px: u32, interval: Duration) -> Self {
        self.scroll_step_px = step_px;
        self.scroll_interval = interval;
        self
    }

    /// Start a session for `request` at boot, with nobody to deliver to
    #[must_use]
    pub fn seed(mut self, request: SessionRequest) -> Self {
        self.seed = Some(request);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_size_follows_category() {
        let plain = HarvestConfig::builder()
            .store_path("links.db")
            .build()
            .unwrap();
        assert_eq!(plain.batch_size().get(), UNCATEGORIZED_BATCH_SIZE);

        let categorized = HarvestConfig::builder()
            .store_path("links.db")
            .category("waitforplot2")
            .build()
            .unwrap();
        assert_eq!(categorized.batch_size().get(), CATEGORIZED_BATCH_SIZE);

        let explicit = HarvestConfig::builder()
            .category("waitforplot2")
            .batch_size(7)
            .store_path("links.db")
            .build()
            .unwrap();
        assert_eq!(explicit.batch_size().get(), 7);
    }

    #[test]
    fn test_rejects_zero_sizes() {
        assert!(
            HarvestConfig::builder()
                .store_path("links.db")
                .batch_size(0)
                .build()
                .is_err()
        );
        assert!(
            HarvestConfig::builder()
                .store_path("links.db")
                .recycle_every(0)
                .build()
                .is_err()
        );
        assert!(
            HarvestConfig::builder()
                .store_path("links.db")
                .viewport(0, 800)
                .build()
                .is_err()
        );
    }

    #[test]
    fn test_rejects_bad_table_and_base() {
        assert!(
            HarvestConfig::builder()
                .store_path("links.db")
                .table("links;--")
                .build()
                .is_err()
        );
        assert!(
            HarvestConfig::builder()
                .store_path("links.db")
                .target_base_url("not a url")
                .build()
                .is_err()
        );
    }

    #[test]
    fn test_rejects_invalid_seed() {
        let seed = SessionRequest::new("", "top", ".previewFeed");
        assert!(
            HarvestConfig::builder()
                .store_path("links.db")
                .seed(seed)
                .build()
                .is_err()
        );
    }

    #[test]
    fn test_defaults() {
        let config = HarvestConfig::builder()
            .store_path("links.db")
            .build()
            .unwrap();
        assert_eq!(config.table(), DEFAULT_TABLE);
        assert_eq!(config.cycle_delay(), DEFAULT_CYCLE_DELAY);
        assert_eq!(config.recycle_every(), DEFAULT_RECYCLE_EVERY);
        assert_eq!(
            config.max_session_duration(),
            Some(DEFAULT_MAX_SESSION_DURATION)
        );
        assert_eq!(config.viewport(), (VIEWPORT_WIDTH, VIEWPORT_HEIGHT));
        assert!(config.seed().is_none());
    }
}
