//! Path routing: ordered first-match tables with nested mounting.
//!
//! A [`Router`] keeps one ordered route table per HTTP method. Each entry
//! is either a leaf handler (anchored match) or a mounted sub-router
//! (prefix match); the matched prefix is recorded on the request so nested
//! routers resolve paths relative to their mount point.

mod core;
mod pattern;

pub use core::{RouteEntry, RouteHandler, Router, SUPPORTED_METHODS};
pub use pattern::{ParamVec, PathPattern, PatternMatch, MAX_INLINE_PARAMS};
