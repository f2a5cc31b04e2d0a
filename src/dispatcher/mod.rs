//! Phased request dispatch.
//!
//! The dispatcher owns four ordered middleware stacks (before, main,
//! after, error) and advances through them per request. Control flow is
//! explicit: every middleware returns `Result<Flow, Fault>` exactly once,
//! a fault diverts the chain to the error stack, a finished response
//! short-circuits to the one-shot transmission, and an application without
//! a bound transport composes as a sub-handler inside a parent chain.

mod core;

pub use core::{App, AppHandle, Phase};
