//! Getter methods for `HarvestConfig`

use std::num::NonZeroUsize;
use std::path::Path;
use std::time::Duration;

use super::types::HarvestConfig;
use crate::harvest::SessionRequest;

impl HarvestConfig {
    #[must_use]
    pub fn store_path(&self) -> &Path {
        &self.store_path
    }

    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    #[must_use]
    pub fn target_base_url(&self) -> &str {
        &self.target_base_url
    }

    #[must_use]
    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    #[must_use]
    pub fn link_prefix(&self) -> Option<&str> {
        self.link_prefix.as_deref()
    }

    #[must_use]
    pub fn batch_size(&self) -> NonZeroUsize {
        self.batch_size
    }

    #[must_use]
    pub fn idle_delay(&self) -> Duration {
        self.idle_delay
    }

    #[must_use]
    pub fn cycle_delay(&self) -> Duration {
        self.cycle_delay
    }

    #[must_use]
    pub fn recycle_every(&self) -> u32 {
        self.recycle_every
    }

    #[must_use]
    pub fn launch_timeout(&self) -> Duration {
        self.launch_timeout
    }

    #[must_use]
    pub fn navigation_timeout(&self) -> Duration {
        self.navigation_timeout
    }

    #[must_use]
    pub fn selector_timeout(&self) -> Duration {
        self.selector_timeout
    }

    #[must_use]
    pub fn evaluate_timeout(&self) -> Duration {
        self.evaluate_timeout
    }

    #[must_use]
    pub fn teardown_timeout(&self) -> Duration {
        self.teardown_timeout
    }

    #[must_use]
    pub fn max_session_duration(&self) -> Option<Duration> {
        self.max_session_duration
    }

    #[must_use]
    pub fn headless(&self) -> bool {
        self.headless
    }

    /// Viewport as `(width, height)` in CSS pixels
    #[must_use]
    pub fn viewport(&self) -> (u32, u32) {
        self.viewport
    }

    #[must_use]
    pub fn scroll_step_px(&self) -> u32 {
        self.scroll_step_px
    }

    #[must_use]
    pub fn scroll_interval(&self) -> Duration {
        self.scroll_interval
    }

    #[must_use]
    pub fn seed(&self) -> Option<&SessionRequest> {
        self.seed.as_ref()
    }

    /// Whether a discovered link passes the configured prefix filter
    #[must_use]
    pub fn accepts_link(&self, link: &str) -> bool {
        self.link_prefix
            .as_deref()
            .is_none_or(|prefix| link.starts_with(prefix))
    }
}
