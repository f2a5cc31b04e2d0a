//! Router core - hot path for request routing.

use std::collections::HashMap;
use std::sync::Arc;

use http::Method;
use tracing::{debug, info, warn};

use crate::error::Fault;
use crate::middleware::{Flow, Middleware};
use crate::server::{Request, Response};

use super::pattern::PathPattern;

/// Methods a router accepts registrations for.
pub const SUPPORTED_METHODS: [Method; 4] =
    [Method::GET, Method::POST, Method::DELETE, Method::PATCH];

/// The two kinds of registered handler, carrying their anchoring mode
/// explicitly: a leaf middleware matches the whole relative path, a
/// mounted router matches a prefix and recurses.
pub enum RouteHandler {
    Leaf(Arc<dyn Middleware>),
    Mount(Arc<Router>),
}

/// One registered route: the original pattern, its compiled matcher and
/// the handler to invoke.
pub struct RouteEntry {
    pub pattern: String,
    matcher: PathPattern,
    handler: RouteHandler,
}

/// Per-HTTP-method ordered table of path patterns to handlers.
///
/// Matching runs in registration order and stops at the first hit — there
/// is no specificity ranking. A router is itself a [`Middleware`], so it
/// registers into an application stack or mounts inside another router.
///
/// "Not found" is never an error: the router flags `response.no_match`
/// and continues the chain, leaving the 404 to a downstream fallback.
#[derive(Default)]
pub struct Router {
    routes: HashMap<Method, Vec<RouteEntry>>,
}

impl Router {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a leaf handler for `pattern` (anchored, whole-path match).
    pub fn register(
        &mut self,
        method: Method,
        pattern: &str,
        middleware: impl Middleware + 'static,
    ) -> &mut Self {
        self.push(method, pattern, RouteHandler::Leaf(Arc::new(middleware)))
    }

    /// Mount a sub-router at `pattern` (open, prefix match). The matched
    /// prefix is consumed so the sub-router sees a relative path.
    pub fn mount(
        &mut self,
        method: Method,
        pattern: &str,
        router: impl Into<Arc<Router>>,
    ) -> &mut Self {
        self.push(method, pattern, RouteHandler::Mount(router.into()))
    }

    pub fn get(&mut self, pattern: &str, middleware: impl Middleware + 'static) -> &mut Self {
        self.register(Method::GET, pattern, middleware)
    }

    pub fn post(&mut self, pattern: &str, middleware: impl Middleware + 'static) -> &mut Self {
        self.register(Method::POST, pattern, middleware)
    }

    pub fn delete(&mut self, pattern: &str, middleware: impl Middleware + 'static) -> &mut Self {
        self.register(Method::DELETE, pattern, middleware)
    }

    pub fn patch(&mut self, pattern: &str, middleware: impl Middleware + 'static) -> &mut Self {
        self.register(Method::PATCH, pattern, middleware)
    }

    fn push(&mut self, method: Method, pattern: &str, handler: RouteHandler) -> &mut Self {
        if !SUPPORTED_METHODS.contains(&method) {
            warn!(method = %method, pattern = %pattern, "Unsupported method, route ignored");
            return self;
        }
        let anchored = matches!(handler, RouteHandler::Leaf(_));
        let matcher = PathPattern::compile(pattern, anchored);
        debug!(method = %method, pattern = %pattern, anchored, "Route registered");
        self.routes.entry(method).or_default().push(RouteEntry {
            pattern: pattern.to_string(),
            matcher,
            handler,
        });
        self
    }

    /// Number of routes registered for `method`.
    #[must_use]
    pub fn route_count(&self, method: &Method) -> usize {
        self.routes.get(method).map_or(0, Vec::len)
    }
}

impl Middleware for Router {
    fn handle(&self, req: &mut Request, res: &mut Response) -> Result<Flow, Fault> {
        res.no_match = true;

        // Strip the prefix consumed by enclosing mounts so this router
        // matches relative to where it was mounted.
        let relative = {
            let base = req.route_base();
            let rel = if base.is_empty() {
                req.path.as_str()
            } else {
                req.path.strip_prefix(base).unwrap_or(req.path.as_str())
            };
            if rel.is_empty() { "/" } else { rel }.to_string()
        };

        let Some(entries) = self.routes.get(&req.method) else {
            req.clear_route_base();
            debug!(method = %req.method, path = %req.path, "No routes for method");
            return Ok(Flow::Continue);
        };

        for entry in entries {
            let Some(matched) = entry.matcher.matches(&relative) else {
                continue;
            };
            res.no_match = false;
            req.merge_params(matched.params);
            match &entry.handler {
                RouteHandler::Mount(sub) => {
                    if matched.matched != "/" {
                        req.push_route_base(&matched.matched);
                    }
                    debug!(
                        method = %req.method,
                        path = %req.path,
                        pattern = %entry.pattern,
                        consumed = %matched.matched,
                        "Mount matched"
                    );
                    return sub.handle(req, res);
                }
                RouteHandler::Leaf(middleware) => {
                    req.clear_route_base();
                    info!(
                        method = %req.method,
                        path = %req.path,
                        pattern = %entry.pattern,
                        "Route matched"
                    );
                    return middleware.handle(req, res);
                }
            }
        }

        req.clear_route_base();
        warn!(method = %req.method, path = %req.path, "No route matched");
        Ok(Flow::Continue)
    }
}
