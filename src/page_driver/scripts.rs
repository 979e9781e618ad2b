//! JavaScript evaluation scripts
//!
//! Selectors are embedded as JSON string literals so quotes and backslashes
//! in user-supplied selectors cannot break out of the script.

use std::time::Duration;

/// Encode a string as a JS string literal
fn js_string(value: &str) -> String {
    // serde_json string encoding is a valid JS string literal
    serde_json::Value::String(value.to_owned()).to_string()
}

/// Scroll the window in fixed steps until the document height measured at
/// invocation time has been covered.
///
/// Content revealed by the scroll itself is picked up by the next poll, not
/// chased here. Resolves with the distance scrolled.
#[must_use]
pub fn scroll_to_bottom(step_px: u32, interval: Duration) -> String {
    format!(
        r#"
    (async () => {{
        const limit = document.body ? document.body.scrollHeight : 0;
        let scrolled = 0;
        await new Promise(resolve => {{
            const timer = setInterval(() => {{
                window.scrollBy(0, {step});
                scrolled += {step};
                if (scrolled >= limit) {{
                    clearInterval(timer);
                    resolve();
                }}
            }}, {interval_ms});
        }});
        return scrolled;
    }})()
"#,
        step = step_px,
        interval_ms = interval.as_millis()
    )
}

/// Collect the `src` of every image wrapped in an anchor under `container_selector`
///
/// Missing sources are reported as `null`; filtering happens on the Rust side.
#[must_use]
pub fn anchored_image_sources(container_selector: &str) -> String {
    format!(
        r#"
    (() => {{
        const selector = {container} + ' a img';
        return Array.from(document.querySelectorAll(selector))
            .map(img => img.src || null);
    }})()
"#,
        container = js_string(container_selector)
    )
}

/// Whether `selector` currently matches at least one element
#[must_use]
pub fn selector_present(selector: &str) -> String {
    format!(
        "(() => document.querySelector({}) !== null)()",
        js_string(selector)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_is_quoted() {
        let script = anchored_image_sources(r#"div[data-x="a'b"]"#);
        assert!(script.contains(r#""div[data-x=\"a'b\"]" + ' a img'"#));
    }

    #[test]
    fn test_scroll_script_uses_settings() {
        let script = scroll_to_bottom(100, Duration::from_millis(250));
        assert!(script.contains("window.scrollBy(0, 100)"));
        assert!(script.contains("}, 250);"));
        assert!(script.contains("return scrolled;"));
    }

    #[test]
    fn test_selector_present_script() {
        assert_eq!(
            selector_present(".previewFeed"),
            r#"(() => document.querySelector(".previewFeed") !== null)()"#
        );
    }
}
