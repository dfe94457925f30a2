//! Request — HTTP request-line splitting (`GET /path HTTP/1.1`).

use super::url;

/// Verbs recognised at the start of a request line or in a `%m` field.
/// Both spellings are accepted; matching is case-sensitive otherwise.
const HTTP_METHODS: [&str; 18] = [
    "OPTIONS", "GET", "HEAD", "POST", "PUT", "DELETE", "TRACE", "CONNECT", "PATCH",
    "options", "get", "head", "post", "put", "delete", "trace", "connect", "patch",
];

const PROTOCOL_MARKERS: [&str; 2] = [" HTTP/1.0", " HTTP/1.1"];
const HTTP_PROTOCOLS: [&str; 2] = ["HTTP/1.0", "HTTP/1.1"];

/// Placeholder path for request lines that cannot be split
pub const UNKNOWN_REQUEST: &str = "-";

/// Return the verb `token` starts with, if any.
pub fn extract_method(token: &str) -> Option<&'static str> {
    HTTP_METHODS.iter().copied().find(|m| token.starts_with(m))
}

/// True for exactly `HTTP/1.0` or `HTTP/1.1`.
pub fn is_valid_protocol(token: &str) -> bool {
    HTTP_PROTOCOLS.contains(&token)
}

/// Which parts of the request line to keep besides the path.
#[derive(Debug, Clone, Copy, Default)]
pub struct Capture {
    pub method: bool,
    pub protocol: bool,
}

/// Result of splitting a request line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLine {
    pub path: String,
    pub method: Option<String>,
    pub protocol: Option<String>,
}

impl RequestLine {
    fn path_only(path: String) -> Self {
        Self {
            path,
            method: None,
            protocol: None,
        }
    }
}

/// Split a full request line into path, method and protocol.
///
/// A line without a leading verb is used verbatim as the path. A line with
/// a verb but no ` HTTP/1.x` marker, or with nothing between the two,
/// yields the `-` placeholder.
pub fn parse(line: &str, capture: Capture, double_decode: bool) -> RequestLine {
    let Some(method) = extract_method(line) else {
        return RequestLine::path_only(decode_path(line.to_string(), double_decode));
    };

    let Some(proto_at) = PROTOCOL_MARKERS.iter().find_map(|m| line.find(m)) else {
        return RequestLine::path_only(UNKNOWN_REQUEST.to_string());
    };

    // skip the verb and the single separator after it
    let start = method.len() + 1;
    if proto_at <= start || !line.is_char_boundary(start) {
        return RequestLine::path_only(UNKNOWN_REQUEST.to_string());
    }

    let path = line[start..proto_at].to_string();
    RequestLine {
        path: decode_path(path, double_decode),
        method: capture.method.then(|| method.to_uppercase()),
        protocol: capture
            .protocol
            .then(|| line[proto_at + 1..].to_uppercase()),
    }
}

fn decode_path(path: String, double_decode: bool) -> String {
    url::decode(&path, double_decode).unwrap_or(path)
}
