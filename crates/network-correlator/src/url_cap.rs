//! URL shortening applied before a descriptor is buffered.

/// Keeps scheme, authority and path untouched and truncates the query string
/// to at most `query_cap` characters. Fragments are dropped since they never
/// reach the server.
pub fn cap_url(raw: &str, query_cap: usize) -> String {
    let without_fragment = match raw.find('#') {
        Some(idx) => &raw[..idx],
        None => raw,
    };
    match without_fragment.split_once('?') {
        Some((base, query)) => {
            let mut capped = String::with_capacity(base.len() + 1 + query_cap.min(query.len()));
            capped.push_str(base);
            capped.push('?');
            capped.extend(query.chars().take(query_cap));
            capped
        }
        None => without_fragment.to_string(),
    }
}
