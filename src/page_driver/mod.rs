//! Page driver capability
//!
//! A page driver is one browser instance with one open page. Sessions only
//! talk to the browser through [`PageDriver`], which keeps the harvest loop
//! independent of chromiumoxide and lets tests script the browser.
//!
//! `launch()` covers both starting the browser and opening its page, so a
//! driver handed out by a [`DriverLauncher`] is always ready to navigate.

mod chromium;
mod discovery;
pub mod scripts;

pub use chromium::{ChromiumDriver, ChromiumLauncher};
pub use discovery::{download_managed_browser, find_browser_executable};

use async_trait::async_trait;
use std::time::Duration;

/// Errors reported by a page driver
#[derive(Debug, Clone, thiserror::Error)]
pub enum DriverError {
    /// Browser process could not be started or its page could not be opened
    #[error("Failed to launch browser: {0}")]
    Launch(String),

    /// Navigation to the target failed
    #[error("Navigation failed: {0}")]
    Navigation(String),

    /// Script evaluation failed or returned something unusable
    #[error("Script evaluation failed: {0}")]
    Evaluate(String),

    /// Operation did not finish within its deadline
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    /// Browser shut down with errors
    #[error("Browser teardown failed: {0}")]
    Teardown(String),

    /// Driver was used after `close()`
    #[error("Page driver is closed")]
    Closed,
}

/// Starts fresh page drivers
#[async_trait]
pub trait DriverLauncher: Send + Sync {
    /// Launch a browser and open a blank page on it
    async fn launch(&self) -> Result<Box<dyn PageDriver>, DriverError>;
}

/// One browser instance with one open page
#[async_trait]
pub trait PageDriver: Send {
    /// Navigate to `url` and wait for the load to settle
    async fn goto(&mut self, url: &str) -> Result<(), DriverError>;

    /// Wait until `selector` matches an element
    ///
    /// Returns `Ok(false)` when the selector never appeared within `timeout`;
    /// errors are reserved for a broken browser connection.
    async fn wait_for_selector(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<bool, DriverError>;

    /// Evaluate a JS expression in the page and return its JSON value
    ///
    /// Promises are awaited. An `undefined` result comes back as `Value::Null`.
    async fn evaluate(&mut self, script: &str) -> Result<serde_json::Value, DriverError>;

    /// Close the page and the browser
    ///
    /// Calling `close` more than once is a no-op.
    async fn close(&mut self) -> Result<(), DriverError>;
}
