//! Shared configuration constants for linkharvest
//!
//! This module contains default values and configuration constants used
//! throughout the codebase to ensure consistency and avoid magic numbers.

use std::time::Duration;

/// Base URL that harvest queries are appended to as a path segment.
///
/// The full target is `{base}{query}?order={order}`.
pub const DEFAULT_TARGET_BASE_URL: &str = "https://www.redgifs.com/niches/";

/// Batch size for sessions that tag links with a category label
pub const CATEGORIZED_BATCH_SIZE: usize = 40;

/// Batch size for sessions without a category label
pub const UNCATEGORIZED_BATCH_SIZE: usize = 400;

/// Delay between two poll cycles after a cycle that found links
pub const DEFAULT_CYCLE_DELAY: Duration = Duration::from_millis(50);

/// Delay between two poll cycles after a cycle that found nothing
pub const DEFAULT_IDLE_DELAY: Duration = Duration::from_millis(50);

/// Number of completed poll cycles after which the browser is recycled
///
/// A single long-lived Chrome context keeps growing (DOM nodes, decoded
/// images, JS heap) as the feed is scrolled. Tearing it down every 100
/// cycles keeps memory flat.
pub const DEFAULT_RECYCLE_EVERY: u32 = 100;

/// Timeout for starting Chrome and opening its first page
///
/// Generous because the first launch on a machine without Chrome downloads
/// a managed build.
pub const DEFAULT_LAUNCH_TIMEOUT: Duration = Duration::from_secs(120);

/// Timeout for `page.goto()` plus the wait for the load to settle
pub const DEFAULT_NAVIGATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for the container selector to appear after navigation
pub const DEFAULT_SELECTOR_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for a single script evaluation (the scroll pass is the slow one)
pub const DEFAULT_EVALUATE_TIMEOUT: Duration = Duration::from_secs(60);

/// Timeout for closing the browser and waiting for the process to exit
pub const DEFAULT_TEARDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum wall-clock duration of one session
pub const DEFAULT_MAX_SESSION_DURATION: Duration = Duration::from_secs(30);

/// Default table name for harvested links
pub const DEFAULT_TABLE: &str = "links";

/// Viewport width in CSS pixels
pub const VIEWPORT_WIDTH: u32 = 1200;

/// Viewport height in CSS pixels
pub const VIEWPORT_HEIGHT: u32 = 800;

/// Distance scrolled per scroll tick
pub const SCROLL_STEP_PX: u32 = 100;

/// Interval between scroll ticks
pub const SCROLL_INTERVAL: Duration = Duration::from_millis(100);

/// Interval between container selector probes while waiting for it to appear
pub const SELECTOR_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Message sent to a consumer whose session hit the maximum duration
pub const TIMEOUT_MESSAGE: &str = "Operation timed out";

/// Chrome user agent string
///
/// Updated: 2025-01-29 to Chrome 132 (current stable)
///
/// Chrome releases new stable versions ~every 4 weeks.
/// Update quarterly to stay within reasonable version window.
pub const CHROME_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.6834.160 Safari/537.36";
