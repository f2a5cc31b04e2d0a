use std::collections::HashMap;
use std::io::Read;

use http::Method;
use once_cell::sync::OnceCell;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::Fault;
use crate::router::ParamVec;

use super::response::Headers;

/// Request body decoded by content type, at most once, on demand.
///
/// `application/json` parses to a JSON value, form submissions to a string
/// map, anything else (including missing content types) passes through as
/// text.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Json(Value),
    Form(HashMap<String, String>),
    Text(String),
}

/// Per-request wrapper around the parsed transport request.
///
/// Ownership is exclusive to one in-flight middleware chain. Besides the
/// request line and headers it carries the route parameters accumulated
/// across nested router matches, the consumed mount prefix (so nested
/// routers see a relative path), and a free-form `context` map for
/// collaborator middleware (sessions and the like).
#[derive(Debug)]
pub struct Request {
    pub method: Method,
    /// Request path without the query string.
    pub path: String,
    pub headers: Headers,
    /// Free-form metadata shared along the chain (e.g. the session).
    pub context: HashMap<String, Value>,
    raw_query: Option<String>,
    params: ParamVec,
    route_base: String,
    body_bytes: Vec<u8>,
    body_cache: OnceCell<Result<Option<RequestBody>, Fault>>,
    query_cache: OnceCell<HashMap<String, String>>,
    cookie_cache: OnceCell<HashMap<String, String>>,
}

impl Request {
    /// Build a request from a method and a request target (path plus
    /// optional query string).
    #[must_use]
    pub fn new(method: Method, target: &str) -> Self {
        let (path, raw_query) = match target.split_once('?') {
            Some((path, query)) => (path.to_string(), Some(query.to_string())),
            None => (target.to_string(), None),
        };
        Self {
            method,
            path,
            headers: Headers::new(),
            context: HashMap::new(),
            raw_query,
            params: ParamVec::new(),
            route_base: String::new(),
            body_bytes: Vec::new(),
            body_cache: OnceCell::new(),
            query_cache: OnceCell::new(),
            cookie_cache: OnceCell::new(),
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.append(&name.to_ascii_lowercase(), value);
        self
    }

    #[must_use]
    pub fn with_body(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.body_bytes = bytes.into();
        self
    }

    /// First header value by name (case-insensitive).
    #[inline]
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// Parsed body, decoding it on first access.
    ///
    /// Returns `Ok(None)` for an empty body. A malformed JSON body yields a
    /// 400 fault the chain can route to the error stack.
    pub fn body(&self) -> Result<Option<&RequestBody>, Fault> {
        let parsed = self
            .body_cache
            .get_or_init(|| parse_body(&self.headers, &self.body_bytes));
        match parsed {
            Ok(body) => Ok(body.as_ref()),
            Err(fault) => Err(fault.clone()),
        }
    }

    /// Preset the parsed body, bypassing the built-in decoding. Lets
    /// third-party body parsers slot in ahead of the lazy parse.
    pub fn set_body(&mut self, body: RequestBody) {
        self.body_cache = OnceCell::with_value(Ok(Some(body)));
    }

    /// Query parameters, parsed from the query string on first access.
    pub fn query(&self) -> &HashMap<String, String> {
        self.query_cache.get_or_init(|| match &self.raw_query {
            Some(raw) => url::form_urlencoded::parse(raw.as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect(),
            None => HashMap::new(),
        })
    }

    #[must_use]
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query().get(name).map(String::as_str)
    }

    /// Cookies from the Cookie header, parsed on first access.
    pub fn cookies(&self) -> &HashMap<String, String> {
        self.cookie_cache
            .get_or_init(|| parse_cookies(&self.headers))
    }

    #[must_use]
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies().get(name).map(String::as_str)
    }

    /// Get a route parameter by name.
    ///
    /// Uses "last write wins" semantics: when nested routers bind the same
    /// parameter name, the innermost match is returned.
    #[inline]
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn params(&self) -> &ParamVec {
        &self.params
    }

    /// Convert route parameters to a map. Later (inner) matches override
    /// earlier ones. This allocates; prefer [`param`](Self::param).
    #[must_use]
    pub fn params_map(&self) -> HashMap<String, String> {
        self.params
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    pub(crate) fn merge_params(&mut self, params: ParamVec) {
        self.params.extend(params);
    }

    /// The path prefix consumed by enclosing router mounts.
    pub(crate) fn route_base(&self) -> &str {
        &self.route_base
    }

    /// Extend the consumed prefix after a non-root mount match. The cursor
    /// accumulates across nesting levels so deep mounts resolve against the
    /// full consumed prefix.
    pub(crate) fn push_route_base(&mut self, matched: &str) {
        self.route_base.push_str(matched);
    }

    pub(crate) fn clear_route_base(&mut self) {
        self.route_base.clear();
    }
}

fn parse_body(headers: &Headers, bytes: &[u8]) -> Result<Option<RequestBody>, Fault> {
    if bytes.is_empty() {
        return Ok(None);
    }
    let content_type = headers
        .get("content-type")
        .unwrap_or("")
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    match content_type.as_str() {
        "application/json" => serde_json::from_slice(bytes)
            .map(|value| Some(RequestBody::Json(value)))
            .map_err(|err| Fault::with_status(400, format!("invalid JSON body: {err}"))),
        "application/x-www-form-urlencoded" => {
            let form = url::form_urlencoded::parse(bytes)
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect();
            Ok(Some(RequestBody::Form(form)))
        }
        _ => Ok(Some(RequestBody::Text(
            String::from_utf8_lossy(bytes).into_owned(),
        ))),
    }
}

/// Parse cookies out of a lowercased Cookie header.
pub(crate) fn parse_cookies(headers: &Headers) -> HashMap<String, String> {
    headers
        .get("cookie")
        .map(|raw| {
            raw.split(';')
                .filter_map(|pair| {
                    let mut parts = pair.trim().splitn(2, '=');
                    let name = parts.next()?.trim().to_string();
                    let value = parts.next().unwrap_or("").trim().to_string();
                    Some((name, value))
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Extract a [`Request`] from a raw `may_minihttp` request.
pub(crate) fn parse_request(req: may_minihttp::Request) -> Request {
    let method_str = req.method().to_string();
    let raw_path = req.path().to_string();

    let mut headers = Headers::new();
    for header in req.headers().iter() {
        headers.append(
            &header.name.to_ascii_lowercase(),
            &String::from_utf8_lossy(header.value),
        );
    }
    debug!(
        header_count = headers.len(),
        path = %raw_path,
        "Headers extracted"
    );

    let mut body_str = String::new();
    let body_bytes = match req.body().read_to_string(&mut body_str) {
        Ok(size) if size > 0 => {
            debug!(body_size_bytes = size, "Request body read");
            body_str.into_bytes()
        }
        _ => Vec::new(),
    };

    let method: Method = method_str.parse().unwrap_or(Method::GET);
    info!(method = %method, path = %raw_path, "HTTP request parsed");

    Request::new(method, &raw_path)
        .with_body(body_bytes)
        .with_raw_headers(headers)
}

impl Request {
    pub(crate) fn with_raw_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }
}
