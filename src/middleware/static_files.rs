//! Static file serving middleware.

use std::path::{Component, Path, PathBuf};

use http::Method;
use tracing::debug;

use crate::error::Fault;
use crate::middleware::{Flow, Middleware};
use crate::server::{Body, Request, Response};

/// Serving options; the defaults fall through to the rest of the chain on
/// anything the middleware cannot serve.
#[derive(Debug, Clone)]
pub struct StaticOptions {
    /// Continue the chain on a miss instead of raising a 404 fault.
    pub fallthrough: bool,
    pub immutable: bool,
    /// Cache-Control max-age in seconds.
    pub max_age: u64,
}

impl Default for StaticOptions {
    fn default() -> Self {
        Self {
            fallthrough: true,
            immutable: false,
            max_age: 0,
        }
    }
}

/// Serves GET/HEAD files below `endpoint` from a root directory.
///
/// Requests outside the endpoint fall through. Traversal segments, hidden
/// segments and NUL bytes are rejected with 403/400 faults before the
/// filesystem is touched.
pub struct ServeStatic {
    root: PathBuf,
    endpoint: String,
    options: StaticOptions,
}

impl ServeStatic {
    pub fn new(root: impl Into<PathBuf>, endpoint: &str) -> Self {
        Self::with_options(root, endpoint, StaticOptions::default())
    }

    pub fn with_options(root: impl Into<PathBuf>, endpoint: &str, options: StaticOptions) -> Self {
        let endpoint = if endpoint.starts_with('/') {
            endpoint.to_string()
        } else {
            format!("/{endpoint}")
        };
        Self {
            root: root.into(),
            endpoint,
            options,
        }
    }

    /// Map a URL path below the endpoint onto the root directory,
    /// rejecting anything that is not a plain downward component.
    fn map_path(&self, url_path: &str) -> Option<PathBuf> {
        let mut mapped = self.root.clone();
        for comp in Path::new(url_path.trim_start_matches('/')).components() {
            match comp {
                Component::Normal(segment) => mapped.push(segment),
                Component::CurDir => {}
                _ => return None,
            }
        }
        Some(mapped)
    }

    fn has_hidden_segment(url_path: &str) -> bool {
        url_path
            .split('/')
            .any(|segment| segment.starts_with('.') && !segment.is_empty())
    }

    fn content_type(path: &Path) -> &'static str {
        match path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_lowercase()
            .as_str()
        {
            "html" => "text/html",
            "css" => "text/css",
            "js" => "application/javascript",
            "json" => "application/json",
            "txt" => "text/plain",
            "png" => "image/png",
            "svg" => "image/svg+xml",
            "ico" => "image/x-icon",
            _ => "application/octet-stream",
        }
    }
}

impl Middleware for ServeStatic {
    fn handle(&self, req: &mut Request, res: &mut Response) -> Result<Flow, Fault> {
        if !req.path.starts_with(&self.endpoint) {
            return Ok(Flow::Continue);
        }

        if req.method != Method::GET && req.method != Method::HEAD {
            if self.options.fallthrough {
                return Ok(Flow::Continue);
            }
            res.status = 405;
            res.headers.set("Allow", "GET, HEAD");
            res.body = Body::Text(String::new());
            res.send();
            return Ok(Flow::Halt);
        }

        let rel = &req.path[self.endpoint.len()..];
        if rel.contains('\0') {
            return Err(Fault::with_status(400, "Malicious Path"));
        }
        if Self::has_hidden_segment(rel) {
            return Err(Fault::with_status(403, "Forbidden"));
        }
        let Some(path) = self.map_path(rel) else {
            return Err(Fault::with_status(403, "Forbidden"));
        };

        if path.is_dir() {
            return Err(Fault::with_status(403, "Forbidden"));
        }
        if !path.is_file() {
            if self.options.fallthrough {
                debug!(path = %path.display(), "Static miss, falling through");
                return Ok(Flow::Continue);
            }
            return Err(Fault::with_status(404, "Not found"));
        }

        let bytes = std::fs::read(&path).map_err(|err| Fault::with_status(404, err.to_string()))?;
        res.headers
            .set("Content-Length", &bytes.len().to_string());
        res.headers.set("Content-Type", Self::content_type(&path));
        if !res.headers.contains("cache-control") {
            let mut directives = format!("max-age={}", self.options.max_age);
            if self.options.immutable {
                directives.push_str(",immutable");
            }
            res.headers.set("Cache-Control", &directives);
        }
        res.status = 200;
        res.body = Body::Bytes(bytes);
        res.send();
        Ok(Flow::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_path_prevents_traversal() {
        let serve = ServeStatic::new("testdata", "/public");
        assert!(serve.map_path("../Cargo.toml").is_none());
        assert!(serve.map_path("a/../../Cargo.toml").is_none());
        assert!(serve.map_path("a/b.txt").is_some());
    }

    #[test]
    fn test_hidden_segments_detected() {
        assert!(ServeStatic::has_hidden_segment("/.git/config"));
        assert!(ServeStatic::has_hidden_segment("/a/.env"));
        assert!(!ServeStatic::has_hidden_segment("/a/b.txt"));
    }

    #[test]
    fn test_content_type_by_extension() {
        assert_eq!(
            ServeStatic::content_type(Path::new("index.html")),
            "text/html"
        );
        assert_eq!(
            ServeStatic::content_type(Path::new("data.bin")),
            "application/octet-stream"
        );
    }
}
