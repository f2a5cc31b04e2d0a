use std::io;

use serde_json::Value;
use smallvec::SmallVec;
use tracing::error;

use crate::error::Fault;

use super::request::Request;

/// Maximum inline headers before heap allocation.
/// Most responses have ≤16 headers (no heap in the hot path).
pub const MAX_INLINE_HEADERS: usize = 16;

/// Ordered, case-insensitive multimap of header name/value pairs.
///
/// Insertion order is preserved; lookups compare names per RFC 7230
/// (ASCII case-insensitive). `set` replaces every entry of the same name,
/// `append` adds another entry (Set-Cookie and friends).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Headers {
    entries: SmallVec<[(String, String); MAX_INLINE_HEADERS]>,
}

impl Headers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// First value registered under `name`, if any.
    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// All values registered under `name`, in insertion order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> {
        self.entries
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Replace every entry named `name` with a single new entry.
    pub fn set(&mut self, name: &str, value: &str) {
        self.entries.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.entries.push((name.to_string(), value.to_string()));
    }

    /// Add an entry without touching existing ones of the same name.
    pub fn append(&mut self, name: &str, value: &str) {
        self.entries.push((name.to_string(), value.to_string()));
    }

    pub fn remove(&mut self, name: &str) {
        self.entries.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Response payload, tagged by how it serializes at transmission.
///
/// Structured values serialize as JSON with a defaulted
/// `application/json` content type; text passes through raw as
/// `text/plain`; bytes are written as-is.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Json(Value),
    Text(String),
    Bytes(Vec<u8>),
}

impl Default for Body {
    fn default() -> Self {
        Body::Json(Value::Object(serde_json::Map::new()))
    }
}

impl From<Value> for Body {
    fn from(value: Value) -> Self {
        Body::Json(value)
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Body::Text(text)
    }
}

impl From<&str> for Body {
    fn from(text: &str) -> Self {
        Body::Text(text.to_string())
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Body::Bytes(bytes)
    }
}

/// Write half of the underlying connection, as seen by the dispatcher.
///
/// The dispatcher triggers exactly one `write_response` per request; the
/// concrete implementation lives at the server boundary
/// (`server::service`) so the core never touches `may_minihttp` types.
pub trait Transport {
    fn write_response(&mut self, status: u16, headers: &Headers, body: &[u8]) -> io::Result<()>;
}

/// Per-request mutable result object with a one-shot "sent" transition.
///
/// `finished` means "logically complete, stop running middleware";
/// `sent` means "bytes already written, never write again".
/// Invariant: sent ⇒ finished. A sub-application may set `finished` and
/// delegate the actual transmission to its parent.
#[derive(Debug, Default)]
pub struct Response {
    pub status: u16,
    pub body: Body,
    pub headers: Headers,
    /// Last fault attached by the dispatcher, readable by error middleware.
    pub error: Option<Fault>,
    /// Set by the router before matching, cleared on a match. A downstream
    /// fallback middleware uses it to produce the 404.
    pub no_match: bool,
    finished: bool,
    sent: bool,
}

impl Response {
    #[must_use]
    pub fn new() -> Self {
        Self {
            status: 200,
            ..Self::default()
        }
    }

    #[inline]
    #[must_use]
    pub fn finished(&self) -> bool {
        self.finished
    }

    #[inline]
    #[must_use]
    pub fn sent(&self) -> bool {
        self.sent
    }

    /// Mark the response logically complete. Transmits nothing; the
    /// dispatcher performs the actual write at its transmission point.
    pub fn send(&mut self) {
        self.finished = true;
    }

    /// Mutable access to a structured body, replacing any non-JSON body
    /// with an empty object first.
    pub fn json_mut(&mut self) -> &mut Value {
        if !matches!(self.body, Body::Json(_)) {
            self.body = Body::default();
        }
        match &mut self.body {
            Body::Json(value) => value,
            _ => unreachable!(),
        }
    }

    /// Redirect to `url`: percent-encoded Location header, status 302, a
    /// short plain-text body, then [`send`](Self::send).
    pub fn redirect(&mut self, url: &str) {
        self.headers.set("Location", &encode_url(url));
        self.status = 302;
        self.headers.set("Content-Type", "text/plain; charset=utf-8");
        self.body = Body::Text(format!("Redirecting to {url}."));
        self.send();
    }

    /// Redirect to the request's Referer (either spelling), or `fallback`
    /// when the header is absent.
    pub fn redirect_back(&mut self, req: &Request, fallback: &str) {
        let target = req
            .header("referer")
            .or_else(|| req.header("referrer"))
            .unwrap_or(fallback)
            .to_string();
        self.redirect(&target);
    }

    /// One-shot transmission, guarded by `sent`.
    ///
    /// Applies an unconsumed `pending` fault (status defaults to 500, body
    /// to the fault's detail or message), defaults the content type per
    /// body kind, and writes status + headers + body to the transport
    /// exactly once. Transport write failures are logged, never re-raised
    /// into the middleware chain.
    ///
    /// Normally driven by the dispatcher's send-or-delegate step; exposed
    /// so transports can be exercised directly.
    pub fn transmit(&mut self, pending: Option<Fault>, transport: &mut dyn Transport) {
        if self.sent {
            return;
        }
        if let Some(fault) = pending {
            self.status = fault.status.unwrap_or(500);
            self.body = match &fault.detail {
                Some(detail) => Body::Json(detail.clone()),
                None => Body::Text(fault.message.clone()),
            };
            self.error = Some(fault);
        }
        let payload = match &self.body {
            Body::Json(value) => {
                if !self.headers.contains("content-type") {
                    self.headers.set("Content-Type", "application/json");
                }
                serde_json::to_vec(value).unwrap_or_default()
            }
            Body::Text(text) => {
                if !self.headers.contains("content-type") {
                    self.headers.set("Content-Type", "text/plain");
                }
                text.clone().into_bytes()
            }
            Body::Bytes(bytes) => {
                if !self.headers.contains("content-type") {
                    self.headers.set("Content-Type", "application/octet-stream");
                }
                bytes.clone()
            }
        };
        self.sent = true;
        self.finished = true;
        if let Err(err) = transport.write_response(self.status, &self.headers, &payload) {
            error!(error = %err, status = self.status, "Transport write failed");
        }
    }
}

/// Reason phrase for the status line.
pub(crate) fn status_reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        302 => "Found",
        400 => "Bad Request",
        401 => "Unauthorized",
        402 => "Payment Required",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        500 => "Internal Server Error",
        _ => "OK",
    }
}

/// Percent-encode the unsafe characters of a redirect target without
/// double-encoding existing escapes.
#[must_use]
pub fn encode_url(url: &str) -> String {
    let mut out = String::with_capacity(url.len());
    for &byte in url.as_bytes() {
        if is_url_safe(byte) {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

// The retained set mirrors RFC 3986 URI characters plus `%` so existing
// escape sequences survive re-encoding.
fn is_url_safe(byte: u8) -> bool {
    matches!(byte,
        b'!' | b'%' | b'&'..=b';' | b'=' | b'?'..=b'[' | b']' | b'_' | b'a'..=b'z' | b'~')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_reason() {
        assert_eq!(status_reason(200), "OK");
        assert_eq!(status_reason(404), "Not Found");
        assert_eq!(status_reason(402), "Payment Required");
    }

    #[test]
    fn test_encode_url_escapes_spaces_and_unicode() {
        assert_eq!(encode_url("/a b"), "/a%20b");
        assert_eq!(encode_url("/ok/path?q=1&x=2"), "/ok/path?q=1&x=2");
        assert_eq!(encode_url("/caf\u{e9}"), "/caf%C3%A9");
    }

    #[test]
    fn test_encode_url_preserves_existing_escapes() {
        assert_eq!(encode_url("/a%20b"), "/a%20b");
    }

    #[test]
    fn test_headers_case_insensitive_set_get() {
        let mut headers = Headers::new();
        headers.set("Content-Type", "text/plain");
        assert_eq!(headers.get("content-type"), Some("text/plain"));
        headers.set("content-type", "application/json");
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("Content-Type"), Some("application/json"));
    }

    #[test]
    fn test_headers_append_keeps_duplicates() {
        let mut headers = Headers::new();
        headers.append("Set-Cookie", "a=1");
        headers.append("Set-Cookie", "b=2");
        let values: Vec<&str> = headers.get_all("set-cookie").collect();
        assert_eq!(values, vec!["a=1", "b=2"]);
    }

    #[test]
    fn test_send_marks_finished_not_sent() {
        let mut res = Response::new();
        res.send();
        assert!(res.finished());
        assert!(!res.sent());
    }
}
