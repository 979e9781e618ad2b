//! chromiumoxide-backed page driver
//!
//! Each launch gets its own Chrome process and its own throwaway profile
//! directory, so a recycled driver starts from a clean slate.

use anyhow::Context;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfigBuilder, HeadlessMode};
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::task::{self, JoinHandle};
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use super::discovery::{download_managed_browser, find_browser_executable};
use super::scripts;
use super::{DriverError, DriverLauncher, PageDriver};
use crate::config::HarvestConfig;
use crate::utils::constants::{CHROME_USER_AGENT, SELECTOR_POLL_INTERVAL};

/// Launches headless Chrome instances for harvest sessions
#[derive(Debug, Clone)]
pub struct ChromiumLauncher {
    headless: bool,
    viewport: (u32, u32),
    request_timeout: Duration,
    executable: Option<PathBuf>,
}

impl ChromiumLauncher {
    #[must_use]
    pub fn new(config: &HarvestConfig) -> Self {
        Self {
            headless: config.headless(),
            viewport: config.viewport(),
            request_timeout: config.navigation_timeout(),
            executable: None,
        }
    }

    /// Use a fixed executable instead of searching for one on every launch
    #[must_use]
    pub fn with_executable(mut self, path: PathBuf) -> Self {
        self.executable = Some(path);
        self
    }

    async fn resolve_executable(&self) -> anyhow::Result<PathBuf> {
        if let Some(path) = &self.executable {
            return Ok(path.clone());
        }
        match find_browser_executable() {
            Ok(path) => Ok(path),
            Err(e) => {
                warn!("{e}. Falling back to managed download.");
                download_managed_browser().await
            }
        }
    }

    async fn launch_inner(&self) -> anyhow::Result<ChromiumDriver> {
        let chrome_path = self.resolve_executable().await?;

        let user_data_dir =
            std::env::temp_dir().join(format!("kodegen_linkharvest_chrome_{}", Uuid::new_v4()));
        std::fs::create_dir_all(&user_data_dir)
            .context("Failed to create user data directory")?;

        let (width, height) = self.viewport;
        let mut builder = BrowserConfigBuilder::default()
            .request_timeout(self.request_timeout)
            .window_size(width, height)
            .viewport(Viewport {
                width,
                height,
                ..Viewport::default()
            })
            .user_data_dir(user_data_dir.clone())
            .chrome_executable(chrome_path);

        builder = if self.headless {
            builder.headless_mode(HeadlessMode::default())
        } else {
            builder.with_head()
        };

        let config = builder
            .arg(format!("--user-agent={CHROME_USER_AGENT}"))
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-infobars")
            .arg("--disable-notifications")
            .arg("--disable-extensions")
            .arg("--disable-popup-blocking")
            .arg("--disable-background-networking")
            .arg("--disable-background-timer-throttling")
            .arg("--disable-backgrounding-occluded-windows")
            .arg("--disable-renderer-backgrounding")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--no-sandbox")
            .arg("--mute-audio")
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("Failed to launch browser")?;

        let handler_task = task::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    let msg = e.to_string();
                    // chromiumoxide does not know every CDP event Chrome emits
                    if msg.contains("data did not match any variant of untagged enum Message")
                        || msg.contains("Failed to deserialize WS response")
                    {
                        trace!("Suppressed benign CDP serialization error: {msg}");
                    } else {
                        error!("Browser handler error: {e:?}");
                    }
                }
            }
            debug!("Browser handler task completed");
        });

        let mut driver = ChromiumDriver {
            browser: Some(browser),
            page: None,
            handler: handler_task,
            user_data_dir: Some(user_data_dir),
        };

        let page = match driver.browser_ref()?.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                let _ = driver.close().await;
                return Err(anyhow::anyhow!("Failed to create blank page: {e}"));
            }
        };
        driver.page = Some(page);

        Ok(driver)
    }
}

#[async_trait]
impl DriverLauncher for ChromiumLauncher {
    async fn launch(&self) -> Result<Box<dyn PageDriver>, DriverError> {
        info!("Launching browser");
        let driver = self
            .launch_inner()
            .await
            .map_err(|e| DriverError::Launch(format!("{e:#}")))?;
        Ok(Box::new(driver))
    }
}

/// A running Chrome process with one page
///
/// The handler task is aborted and the profile directory removed on close,
/// and again on drop as a fallback when `close()` was never reached.
pub struct ChromiumDriver {
    browser: Option<Browser>,
    page: Option<Page>,
    handler: JoinHandle<()>,
    user_data_dir: Option<PathBuf>,
}

impl ChromiumDriver {
    fn browser_ref(&self) -> Result<&Browser, DriverError> {
        self.browser.as_ref().ok_or(DriverError::Closed)
    }

    fn page_ref(&self) -> Result<&Page, DriverError> {
        self.page.as_ref().ok_or(DriverError::Closed)
    }

    fn cleanup_temp_dir(&mut self) {
        if let Some(path) = self.user_data_dir.take() {
            debug!("Cleaning up browser profile: {}", path.display());
            if let Err(e) = std::fs::remove_dir_all(&path) {
                warn!(
                    "Failed to clean up browser profile {}: {e}. Manual cleanup may be required.",
                    path.display()
                );
            }
        }
    }
}

#[async_trait]
impl PageDriver for ChromiumDriver {
    async fn goto(&mut self, url: &str) -> Result<(), DriverError> {
        let page = self.page_ref()?;
        page.goto(url)
            .await
            .map_err(|e| DriverError::Navigation(format!("{url}: {e}")))?;
        page.wait_for_navigation()
            .await
            .map_err(|e| DriverError::Navigation(format!("{url}: {e}")))?;
        Ok(())
    }

    async fn wait_for_selector(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<bool, DriverError> {
        let probe = scripts::selector_present(selector);
        let started = Instant::now();
        loop {
            if self.evaluate(&probe).await?.as_bool() == Some(true) {
                debug!(
                    "Selector '{selector}' present after {:.2}s",
                    started.elapsed().as_secs_f64()
                );
                return Ok(true);
            }
            if started.elapsed() >= timeout {
                return Ok(false);
            }
            tokio::time::sleep(SELECTOR_POLL_INTERVAL).await;
        }
    }

    async fn evaluate(&mut self, script: &str) -> Result<serde_json::Value, DriverError> {
        let result = self
            .page_ref()?
            .evaluate(script)
            .await
            .map_err(|e| DriverError::Evaluate(e.to_string()))?;
        // `undefined` carries no value
        Ok(result
            .into_value::<serde_json::Value>()
            .unwrap_or(serde_json::Value::Null))
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        let Some(mut browser) = self.browser.take() else {
            return Ok(());
        };

        let mut errors = Vec::new();

        if let Some(page) = self.page.take()
            && let Err(e) = page.close().await
        {
            debug!("Failed to close page: {e}");
        }
        if let Err(e) = browser.close().await {
            errors.push(format!("close: {e}"));
        }
        if let Err(e) = browser.wait().await {
            errors.push(format!("wait: {e}"));
        }

        self.handler.abort();
        self.cleanup_temp_dir();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(DriverError::Teardown(errors.join("; ")))
        }
    }
}

impl Drop for ChromiumDriver {
    fn drop(&mut self) {
        self.handler.abort();
        if self.browser.is_some() {
            warn!("ChromiumDriver dropped without close() - Chrome is killed on drop");
        }
        self.cleanup_temp_dir();
    }
}
