//! Cookie-backed sessions.
//!
//! Two paired middleware share one options value captured at
//! construction: [`CookieSession`] decodes the session cookie into
//! `request.context["session"]` at the head of the chain, and its
//! [`saver`](CookieSession::saver) writes the (possibly mutated) session
//! back as a `Set-Cookie` header. Register the saver at the end of the
//! main stack: the after stack runs post-transmission, too late for
//! headers.
//!
//! The cookie value is the percent-encoded JSON session followed by a
//! `.`-separated integrity digest keyed on the configured secret; cookies
//! that fail the digest check are discarded and the request starts with a
//! fresh session.

use std::sync::Arc;

use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::Fault;
use crate::middleware::{Flow, Middleware};
use crate::server::{Request, Response};

/// Context key the session value lives under.
pub const SESSION_KEY: &str = "session";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

/// Session cookie options. A secret is required at construction;
/// everything else has the usual defaults.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub name: String,
    pub path: String,
    pub max_age: Option<u64>,
    pub http_only: bool,
    pub secure: bool,
    pub same_site: Option<SameSite>,
    secret: String,
}

impl SessionOptions {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            name: "cascade".to_string(),
            path: "/".to_string(),
            max_age: None,
            http_only: true,
            secure: false,
            same_site: None,
            secret: secret.into(),
        }
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    #[must_use]
    pub fn max_age(mut self, seconds: u64) -> Self {
        self.max_age = Some(seconds);
        self
    }

    #[must_use]
    pub fn http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    #[must_use]
    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    #[must_use]
    pub fn same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = Some(same_site);
        self
    }

    fn digest(&self, payload: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.secret.as_bytes());
        hasher.update(b".");
        hasher.update(payload.as_bytes());
        let digest = hasher.finalize();
        let mut out = String::with_capacity(digest.len() * 2);
        for byte in digest {
            out.push_str(&format!("{byte:02x}"));
        }
        out
    }
}

/// Session loader middleware; register at the head of the chain.
pub struct CookieSession {
    options: Arc<SessionOptions>,
}

impl CookieSession {
    pub fn new(options: SessionOptions) -> Self {
        Self {
            options: Arc::new(options),
        }
    }

    /// The paired write-back middleware; register at the end of the main
    /// stack so the cookie lands before transmission.
    #[must_use]
    pub fn saver(&self) -> CookieSessionSave {
        CookieSessionSave {
            options: Arc::clone(&self.options),
        }
    }

    fn decode(&self, raw: &str) -> Option<Value> {
        let (payload, signature) = raw.rsplit_once('.')?;
        if self.options.digest(payload) != signature {
            debug!(cookie = %self.options.name, "Session cookie failed the digest check");
            return None;
        }
        let json = urlencoding::decode(payload).ok()?;
        serde_json::from_str(&json).ok()
    }
}

impl Middleware for CookieSession {
    fn handle(&self, req: &mut Request, _res: &mut Response) -> Result<Flow, Fault> {
        let session = req
            .cookie(&self.options.name)
            .and_then(|raw| self.decode(raw))
            .unwrap_or_else(|| Value::Object(serde_json::Map::new()));
        req.context.insert(SESSION_KEY.to_string(), session);
        Ok(Flow::Continue)
    }
}

/// Session saver middleware, created through [`CookieSession::saver`].
pub struct CookieSessionSave {
    options: Arc<SessionOptions>,
}

impl Middleware for CookieSessionSave {
    fn handle(&self, req: &mut Request, res: &mut Response) -> Result<Flow, Fault> {
        let Some(session) = req.context.get(SESSION_KEY) else {
            return Ok(Flow::Continue);
        };
        let payload = urlencoding::encode(&session.to_string()).into_owned();
        let signature = self.options.digest(&payload);
        let mut cookie = format!(
            "{}={}.{}; Path={}",
            self.options.name, payload, signature, self.options.path
        );
        if let Some(age) = self.options.max_age {
            cookie.push_str(&format!("; Max-Age={age}"));
        }
        if self.options.http_only {
            cookie.push_str("; HttpOnly");
        }
        if self.options.secure {
            cookie.push_str("; Secure");
        }
        match self.options.same_site {
            Some(SameSite::Strict) => cookie.push_str("; SameSite=Strict"),
            Some(SameSite::Lax) => cookie.push_str("; SameSite=Lax"),
            Some(SameSite::None) => cookie.push_str("; SameSite=None"),
            None => {}
        }
        res.headers.append("Set-Cookie", &cookie);
        Ok(Flow::Continue)
    }
}

/// The request's session value, creating an empty one if the loader has
/// not run.
pub fn session_mut(req: &mut Request) -> &mut Value {
    req.context
        .entry(SESSION_KEY.to_string())
        .or_insert_with(|| Value::Object(serde_json::Map::new()))
}

/// The request's session value, if a loader has run.
#[must_use]
pub fn session(req: &Request) -> Option<&Value> {
    req.context.get(SESSION_KEY)
}
