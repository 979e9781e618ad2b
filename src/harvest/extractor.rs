//! One poll cycle against a page driver

use std::time::Duration;

use serde_json::Value;
use tracing::trace;

use crate::page_driver::{DriverError, PageDriver, scripts};
use crate::utils::with_timeout;

/// Scroll pacing and the evaluation deadline for one poll
#[derive(Debug, Clone, Copy)]
pub struct ScrollSettings {
    pub step_px: u32,
    pub interval: Duration,
    pub evaluate_timeout: Duration,
}

/// Scroll to the bottom of the rendered feed and collect every anchored image
///
/// Returns the full set of sources currently visible under
/// `container_selector`, in document order. Null and empty sources are
/// dropped; everything else is returned verbatim.
pub async fn poll(
    driver: &mut dyn PageDriver,
    container_selector: &str,
    settings: &ScrollSettings,
) -> Result<Vec<String>, DriverError> {
    let scroll = scripts::scroll_to_bottom(settings.step_px, settings.interval);
    let scrolled = with_timeout(
        driver.evaluate(&scroll),
        settings.evaluate_timeout,
        "scroll",
    )
    .await?;
    trace!("Scrolled {scrolled} px");

    let query = scripts::anchored_image_sources(container_selector);
    let value = with_timeout(
        driver.evaluate(&query),
        settings.evaluate_timeout,
        "extract",
    )
    .await?;

    decode_sources(value)
}

fn decode_sources(value: Value) -> Result<Vec<String>, DriverError> {
    let Value::Array(items) = value else {
        return Err(DriverError::Evaluate(format!(
            "expected an array of image sources, got {value}"
        )));
    };

    Ok(items
        .into_iter()
        .filter_map(|item| match item {
            Value::String(src) if !src.is_empty() => Some(src),
            _ => None,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_drops_null_and_empty() {
        let decoded = decode_sources(json!(["a", null, "", "b", 3, " c "])).unwrap();
        assert_eq!(decoded, vec!["a", "b", " c "]);
    }

    #[test]
    fn test_decode_rejects_non_array() {
        assert!(decode_sources(json!(null)).is_err());
        assert!(decode_sources(json!({"links": []})).is_err());
    }
}
