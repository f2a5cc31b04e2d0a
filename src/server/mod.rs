//! HTTP server boundary: request/response types and the bridge to the
//! `may_minihttp` transport primitive.
//!
//! The core consumes the transport as an opaque request source — wire
//! parsing, keep-alive and socket I/O belong to `may_minihttp`. This
//! module owns the per-request [`Request`]/[`Response`] pair, the
//! [`Transport`] seam the dispatcher writes through, and the
//! [`HttpServer`]/[`AppService`] glue that runs an [`App`] behind a bound
//! address.
//!
//! [`App`]: crate::dispatcher::App

mod http_server;
mod request;
mod response;
mod service;

pub use http_server::{HttpServer, ServerHandle};
pub use request::{Request, RequestBody};
pub use response::{encode_url, Body, Headers, Response, Transport, MAX_INLINE_HEADERS};
pub use service::{AppService, WireTransport};
