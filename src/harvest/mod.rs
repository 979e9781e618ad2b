//! Harvesting sessions
//!
//! - [`extractor`]: one scroll-and-collect pass over the page
//! - [`session`]: the per-consumer polling loop and its state machine
//! - [`manager`]: start, supersede, time out and shut down sessions

pub mod control;
pub mod extractor;
pub mod manager;
pub mod session;
pub mod types;

pub use control::SessionControl;
pub use extractor::{ScrollSettings, poll};
pub use manager::SessionManager;
pub use session::{Session, SessionOutcome, SessionStats};
pub use types::{
    ConsumerId, FailureReason, HarvestError, SessionId, SessionRequest, SessionState, StopReason,
};
