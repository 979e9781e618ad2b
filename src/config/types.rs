//! Core configuration types for link harvesting
//!
//! `HarvestConfig` is shared read-only by the session manager and every
//! session it spawns.

use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

use crate::harvest::SessionRequest;

/// Main configuration struct for harvesting sessions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestConfig {
    /// SQLite database file backing the link store
    pub(crate) store_path: PathBuf,
    /// Table holding harvested links. Always a plain SQL identifier.
    pub(crate) table: String,
    pub(crate) target_base_url: String,

    /// Category label attached to every stored link
    pub(crate) category: Option<String>,
    /// Only links starting with this prefix are stored and delivered
    pub(crate) link_prefix: Option<String>,
    /// Resolved at build time from `category` when not set explicitly
    pub(crate) batch_size: NonZeroUsize,

    pub(crate) idle_delay: Duration,
    pub(crate) cycle_delay: Duration,
    pub(crate) recycle_every: u32,

    pub(crate) launch_timeout: Duration,
    pub(crate) navigation_timeout: Duration,
    pub(crate) selector_timeout: Duration,
    pub(crate) evaluate_timeout: Duration,
    pub(crate) teardown_timeout: Duration,
    /// `None` lets sessions run until cancelled
    pub(crate) max_session_duration: Option<Duration>,

    pub(crate) headless: bool,
    pub(crate) viewport: (u32, u32),
    pub(crate) scroll_step_px: u32,
    pub(crate) scroll_interval: Duration,

    /// Session started at boot without a consumer attached
    pub(crate) seed: Option<SessionRequest>,
}
