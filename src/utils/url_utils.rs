//! URL construction for harvest targets.

use url::Url;

use crate::harvest::HarvestError;

/// Build the page a session harvests from.
///
/// The query is appended as a single percent-encoded path segment and the
/// ordering is passed as the `order` query parameter, giving
/// `{base}{query}?order={order}`.
pub fn build_target_url(base: &str, query: &str, order: &str) -> Result<Url, HarvestError> {
    let mut url = Url::parse(base)
        .map_err(|e| HarvestError::InvalidRequest(format!("invalid target base url '{base}': {e}")))?;

    url.path_segments_mut()
        .map_err(|()| HarvestError::InvalidRequest(format!("target base url '{base}' cannot be a base")))?
        .pop_if_empty()
        .push(query);

    url.query_pairs_mut().clear().append_pair("order", order);

    Ok(url)
}
