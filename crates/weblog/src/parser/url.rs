use percent_encoding::percent_decode_str;

/// Percent-decode a URL-ish token.
///
/// Every `%XX` with two hex digits becomes its byte; any other `%` is kept
/// as-is. With `double_decode` the substitution runs a second time
/// (e.g. `%2520` → `%20` → ` `). Embedded CR/LF are dropped and the result
/// is trimmed. Returns `None` for empty input.
pub fn decode(text: &str, double_decode: bool) -> Option<String> {
    if text.is_empty() {
        return None;
    }

    let mut out = decode_once(text);
    if double_decode {
        out = decode_once(&out);
    }

    Some(strip_newlines(&out).trim().to_string())
}

fn decode_once(text: &str) -> String {
    percent_decode_str(text).decode_utf8_lossy().into_owned()
}

fn strip_newlines(text: &str) -> String {
    text.chars().filter(|c| *c != '\r' && *c != '\n').collect()
}
