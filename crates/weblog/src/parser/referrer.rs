//! Referrer — referring-site and search-keyphrase extraction.
//!
//! The referrer is not decoded before keyphrase extraction since the
//! search query itself may contain an encoded `&`.

use super::url;

const SEARCH_REFERRERS: [&str; 3] = [
    "http://www.google.",
    "http://webcache.googleusercontent.com/",
    "http://translate.googleusercontent.com/",
];

/// Extract the search keyphrase from a Google search, cache or translate
/// referrer. Anything else (including `https://` referrers) yields `None`.
pub fn extract_keyphrase(referrer: &str, double_decode: bool) -> Option<String> {
    if !SEARCH_REFERRERS.iter().any(|s| referrer.contains(s)) {
        return None;
    }

    let (query, encoded) = locate_query(referrer)?;

    let query = if encoded {
        query.find("%26").map_or(query, |end| &query[..end])
    } else {
        query.find('&').map_or(query, |end| &query[..end])
    };

    let phrase = url::decode(query, double_decode)?.replace('+', " ");
    let phrase = phrase.trim();
    if phrase.is_empty() {
        return None;
    }
    Some(phrase.to_string())
}

/// Find where the query text starts, and whether it is still
/// percent-encoded.
fn locate_query(referrer: &str) -> Option<(&str, bool)> {
    // webcache.googleusercontent
    if referrer.contains("/+&") {
        return None;
    }
    if let Some(at) = referrer.find("/+") {
        return Some((&referrer[at + 2..], false));
    }
    if let Some(at) = referrer.find("q=cache:") {
        let rest = &referrer[at..];
        let start = rest.find('+').map_or(0, |plus| plus + 1);
        return Some((&rest[start..], false));
    }

    // www.google.* or translate.googleusercontent
    if let Some(at) = referrer.find("&q=").or_else(|| referrer.find("?q=")) {
        return Some((&referrer[at + 3..], false));
    }
    if let Some(at) = referrer.find("%26q%3D").or_else(|| referrer.find("%3Fq%3D")) {
        return Some((&referrer[at + 7..], true));
    }
    None
}

/// Extract the host part of a referrer URL,
/// i.e. `//www.example.com/path?x` → `www.example.com`.
///
/// The result is cut to at most `max_len - 1` bytes.
pub fn extract_site(referrer: &str, max_len: usize) -> Option<String> {
    let begin = referrer.find("//")? + 2;
    let host = &referrer[begin..];
    let host = host.find('/').map_or(host, |end| &host[..end]);
    if host.is_empty() {
        return None;
    }

    let mut len = host.len().min(max_len.saturating_sub(1));
    while !host.is_char_boundary(len) {
        len -= 1;
    }
    if len == 0 {
        return None;
    }
    Some(host[..len].to_string())
}
