pub mod constants;
pub mod timeout;
pub mod url_utils;

pub use constants::*;
pub use timeout::with_timeout;
pub use url_utils::build_target_url;
