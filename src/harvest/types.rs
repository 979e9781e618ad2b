//! Session identifiers, requests and lifecycle states

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::page_driver::DriverError;

/// Unique identifier of one harvesting session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies one connected consumer; owns at most one live session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConsumerId(Uuid);

impl ConsumerId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConsumerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConsumerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Inbound request starting (or replacing) a consumer's session
///
/// Wire form: `{ "query": "...", "order": "...", "divSelector": "..." }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRequest {
    pub query: String,
    pub order: String,
    #[serde(rename = "divSelector")]
    pub div_selector: String,
}

impl SessionRequest {
    #[must_use]
    pub fn new(
        query: impl Into<String>,
        order: impl Into<String>,
        div_selector: impl Into<String>,
    ) -> Self {
        Self {
            query: query.into(),
            order: order.into(),
            div_selector: div_selector.into(),
        }
    }

    /// Reject requests that could never produce a usable session
    pub fn validate(&self) -> Result<(), HarvestError> {
        if self.query.trim().is_empty() {
            return Err(HarvestError::InvalidRequest("query must not be empty".into()));
        }
        if self.div_selector.trim().is_empty() {
            return Err(HarvestError::InvalidRequest(
                "divSelector must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Why a session was cancelled from outside
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// A newer request for the same consumer replaced it
    Superseded,
    /// The consumer's connection closed
    Disconnected,
    /// The maximum session duration elapsed
    TimedOut,
    /// The process is shutting down
    Shutdown,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Superseded => "superseded",
            Self::Disconnected => "consumer disconnected",
            Self::TimedOut => "timed out",
            Self::Shutdown => "shutdown",
        };
        f.write_str(s)
    }
}

/// Why a session ended on its own
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FailureReason {
    /// The container selector never matched after navigation
    #[error("container selector '{selector}' not found")]
    SelectorNotFound { selector: String },

    /// Navigating to the target failed or timed out
    #[error("navigation failed: {0}")]
    NavigationFailure(String),

    /// The browser could not be started
    #[error("browser launch failed: {0}")]
    LaunchFailure(String),

    /// Any other unrecoverable driver error while polling
    #[error("page driver failed: {0}")]
    DriverFailure(String),
}

impl From<DriverError> for FailureReason {
    fn from(err: DriverError) -> Self {
        match err {
            DriverError::Launch(msg) => Self::LaunchFailure(msg),
            DriverError::Navigation(msg) => Self::NavigationFailure(msg),
            other => Self::DriverFailure(other.to_string()),
        }
    }
}

/// Lifecycle state of a session
///
/// `Starting -> Polling -> (Delivering) -> Polling -> ... -> terminal`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Acquiring a driver, navigating and waiting for the container
    Starting,
    /// Running the extractor
    Polling,
    /// Recording and forwarding the links of the current cycle
    Delivering,
    /// Cancelled from outside for a reason other than supersession
    Stopped(StopReason),
    /// Ended by an unrecoverable error
    Failed(FailureReason),
    /// Replaced by a newer session for the same consumer
    Superseded,
}

impl SessionState {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped(_) | Self::Failed(_) | Self::Superseded)
    }

    /// Terminal state reached when cancelled for `reason`
    #[must_use]
    pub fn cancelled(reason: StopReason) -> Self {
        match reason {
            StopReason::Superseded => Self::Superseded,
            other => Self::Stopped(other),
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Starting => f.write_str("starting"),
            Self::Polling => f.write_str("polling"),
            Self::Delivering => f.write_str("delivering"),
            Self::Stopped(reason) => write!(f, "stopped ({reason})"),
            Self::Failed(reason) => write!(f, "failed ({reason})"),
            Self::Superseded => f.write_str("superseded"),
        }
    }
}

/// Errors rejecting a session before it starts
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HarvestError {
    #[error("Invalid session request: {0}")]
    InvalidRequest(String),

    #[error("Session manager is shutting down")]
    ShuttingDown,
}
