//! # cascade
//!
//! **cascade** is a phased-middleware HTTP toolkit for Rust built on the
//! `may` coroutine runtime and the `may_minihttp` transport primitive.
//!
//! An application owns four ordered middleware stacks — before, main,
//! after and error — and advances each request through them with explicit
//! control flow: every middleware returns `Result<Flow, Fault>` exactly
//! once. A fault diverts the chain to the error stack, a finished response
//! short-circuits to the one-shot transmission, and the after stack runs
//! post-transmission for logging and write-back concerns.
//!
//! Routing is a middleware like any other: a [`Router`] keeps one ordered
//! pattern table per HTTP method, matches first-registered-first, and
//! mounts sub-routers (or whole sub-applications) behind path prefixes.
//! Nested routers see paths relative to their mount point through a
//! request-scoped cursor.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use cascade::{App, Fault, Flow, Request, Response, Router};
//!
//! let mut router = Router::new();
//! router.get("/hello/:name", |req: &mut Request, res: &mut Response| -> Result<Flow, Fault> {
//!     res.body = serde_json::json!({ "hello": req.param("name") }).into();
//!     Ok(Flow::Continue)
//! });
//!
//! let mut app = App::new();
//! app.main(router);
//! app.main(|_req: &mut Request, res: &mut Response| -> Result<Flow, Fault> {
//!     if res.no_match {
//!         res.status = 404;
//!         res.body = "Not Found".into();
//!     }
//!     Ok(Flow::Continue)
//! });
//!
//! let handle = app.listen("127.0.0.1:8000").expect("bind failed");
//! handle.join().ok();
//! ```
//!
//! ## Modules
//!
//! - [`dispatcher`] — the phased dispatch state machine and app lifecycle
//! - [`router`] — first-match routing with nested mounting
//! - [`server`] — request/response types and the `may_minihttp` bridge
//! - [`middleware`] — the middleware contract plus bundled collaborators
//!   (cookie sessions, static files, access logging)
//! - [`error`] — the [`Fault`] value carried through the error stack
//!
//! ## Runtime considerations
//!
//! cascade runs on the `may` coroutine runtime, not tokio. Each connection
//! is serviced on its own coroutine; the accept loop does not wait for a
//! request's chain to finish before accepting the next. Stack size is
//! configurable via `CASCADE_STACK_SIZE`.

pub mod dispatcher;
pub mod error;
pub mod middleware;
pub mod router;
pub mod runtime_config;
pub mod server;

pub use dispatcher::{App, AppHandle, Phase};
pub use error::Fault;
pub use middleware::{Flow, Middleware};
pub use router::Router;
pub use server::{Body, Headers, Request, RequestBody, Response, Transport};
