pub mod batcher;
pub mod config;
pub mod harvest;
pub mod link_store;
pub mod page_driver;
pub mod server;
pub mod sink;
pub mod utils;

pub use batcher::chunk;
pub use config::HarvestConfig;
pub use harvest::{
    ConsumerId, FailureReason, HarvestError, Session, SessionControl, SessionId, SessionManager,
    SessionOutcome, SessionRequest, SessionState, SessionStats, StopReason,
};
pub use link_store::{AcceptOutcome, Link, LinkStore, MemoryLinkStore, SqliteLinkStore, StoreError};
pub use page_driver::{
    ChromiumDriver, ChromiumLauncher, DriverError, DriverLauncher, PageDriver,
    download_managed_browser, find_browser_executable,
};
pub use sink::{ChannelSink, LinkSink, OutboundMessage, SinkError};
