//! Dispatcher core - the phased middleware state machine.

use std::fmt;
use std::io;
use std::net::ToSocketAddrs;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::Fault;
use crate::middleware::{Flow, Middleware};
use crate::runtime_config::RuntimeConfig;
use crate::server::{AppService, HttpServer, Request, Response, ServerHandle, Transport};

/// Middleware running longer than this is reported (not interrupted).
const SLOW_MIDDLEWARE: Duration = Duration::from_secs(1);

/// The four ordered middleware execution stages.
///
/// before → main → after form a linear chain; error is an overlay entered
/// on a fault from any phase, rejoining the chain at the transmission
/// point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Before,
    Main,
    After,
    Error,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Before => "before",
            Phase::Main => "main",
            Phase::After => "after",
            Phase::Error => "error",
        };
        f.write_str(name)
    }
}

/// The application core: four ordered middleware stacks and the dispatch
/// state machine that advances through them.
///
/// Registration order is execution order. Stacks are normally populated
/// before [`listen`](App::listen) and left alone afterwards.
///
/// An `App` that is never bound to a transport is itself a [`Middleware`]:
/// mounted inside another application's stacks it runs its before and main
/// phases, then delegates the outcome (including any unconsumed fault and
/// the `finished` flag) to the parent chain, which performs the final
/// transmission.
///
/// # Dispatch walk-through
///
/// 1. Run the current phase's stack in order. Each middleware returns
///    `Ok(Continue)`, `Ok(Halt)` or `Err(fault)` — exactly one signal,
///    exactly once.
/// 2. A fault is attached to the response and diverts the chain to the
///    error stack (if one is registered). Inside the error stack a further
///    fault advances to the next error middleware; it never re-enters the
///    error stack from the top.
/// 3. A finished response bypasses every remaining handler up to the
///    transmission point.
/// 4. Send-or-delegate: before advances to main (or error when a fault is
///    pending); main and error trigger the one-shot transmission on a
///    bound transport and continue into after; without a bound transport
///    the outcome is handed to the parent chain.
#[derive(Default)]
pub struct App {
    before: Vec<Arc<dyn Middleware>>,
    main: Vec<Arc<dyn Middleware>>,
    after: Vec<Arc<dyn Middleware>>,
    error: Vec<Arc<dyn Middleware>>,
}

impl App {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append to the before stack.
    pub fn before(&mut self, middleware: impl Middleware + 'static) -> &mut Self {
        self.before.push(Arc::new(middleware));
        self
    }

    /// Append to the main stack. This is the `use` of the middleware
    /// contract (`use` being a keyword, the convenience name is the only
    /// spellable one).
    pub fn main(&mut self, middleware: impl Middleware + 'static) -> &mut Self {
        self.main.push(Arc::new(middleware));
        self
    }

    /// Append to the after stack, which runs once per request after
    /// transmission.
    pub fn after(&mut self, middleware: impl Middleware + 'static) -> &mut Self {
        self.after.push(Arc::new(middleware));
        self
    }

    /// Append to the error stack, entered when a middleware returns a
    /// fault.
    pub fn error(&mut self, middleware: impl Middleware + 'static) -> &mut Self {
        self.error.push(Arc::new(middleware));
        self
    }

    fn stack(&self, phase: Phase) -> &[Arc<dyn Middleware>] {
        match phase {
            Phase::Before => &self.before,
            Phase::Main => &self.main,
            Phase::After => &self.after,
            Phase::Error => &self.error,
        }
    }

    /// Drive one request through the phase chain and transmit the response
    /// on `transport`. Entry point for a bound application.
    pub fn handle(&self, req: &mut Request, res: &mut Response, transport: &mut dyn Transport) {
        let _ = self.run(req, res, Some(transport));
    }

    /// The dispatch state machine. With a transport this is a complete
    /// request lifecycle; without one (sub-application) the return value is
    /// the outcome delegated to the parent: an unconsumed fault, or `None`
    /// for plain continuation.
    pub(crate) fn run(
        &self,
        req: &mut Request,
        res: &mut Response,
        mut transport: Option<&mut dyn Transport>,
    ) -> Option<Fault> {
        let mut phase = Phase::Before;
        let mut index = 0usize;
        let mut pending: Option<Fault> = None;

        loop {
            // A finished response bypasses all remaining handlers up to
            // transmission. Once sent, the after stack (and any error
            // overlay it raises) runs normally.
            let bypass = res.finished() && !res.sent();
            let stack = self.stack(phase);

            if !bypass && index < stack.len() {
                match self.invoke(stack[index].as_ref(), req, res, phase, index) {
                    Err(fault) => {
                        res.error = Some(fault.clone());
                        pending = Some(fault);
                        let diverts = !(res.finished() && !res.sent()) && !self.error.is_empty();
                        if diverts {
                            if phase == Phase::Error {
                                if index + 1 < self.error.len() {
                                    index += 1;
                                    continue;
                                }
                                // exhausted error stack falls through,
                                // carrying the last fault
                            } else {
                                phase = Phase::Error;
                                index = 0;
                                continue;
                            }
                        }
                    }
                    Ok(Flow::Continue) => {
                        pending = None;
                        if !res.finished() && index + 1 < stack.len() {
                            index += 1;
                            continue;
                        }
                    }
                    Ok(Flow::Halt) => {
                        pending = None;
                    }
                }
            }

            // Send-or-delegate. Empty and exhausted stacks land here alike,
            // preserving any pending fault.
            match phase {
                Phase::Before => {
                    phase = if pending.is_some() {
                        Phase::Error
                    } else {
                        Phase::Main
                    };
                    index = 0;
                }
                Phase::Main | Phase::Error => {
                    if let Some(t) = transport.as_mut() {
                        let already_sent = res.sent();
                        res.transmit(pending.take(), &mut **t);
                        if already_sent {
                            // error overlay entered from the after stack;
                            // transmission already happened, do not re-enter
                            // the after stack
                            debug!(phase = %phase, "Chain complete after post-send error handling");
                            return None;
                        }
                        phase = Phase::After;
                        index = 0;
                    } else {
                        return pending;
                    }
                }
                Phase::After => {
                    if transport.is_some() {
                        if let Some(fault) = &pending {
                            warn!(error = %fault, "After stack ended with an unconsumed fault");
                        } else {
                            debug!("Request complete; no parent to delegate to");
                        }
                        return None;
                    }
                    return pending;
                }
            }
        }
    }

    fn invoke(
        &self,
        middleware: &dyn Middleware,
        req: &mut Request,
        res: &mut Response,
        phase: Phase,
        index: usize,
    ) -> Result<Flow, Fault> {
        let start = Instant::now();
        let outcome = middleware.handle(req, res);
        let elapsed = start.elapsed();
        if elapsed > SLOW_MIDDLEWARE {
            warn!(
                phase = %phase,
                index,
                elapsed_ms = elapsed.as_millis() as u64,
                "Slow middleware detected"
            );
        }
        debug!(
            phase = %phase,
            index,
            ok = outcome.is_ok(),
            finished = res.finished(),
            "Middleware completed"
        );
        outcome
    }

    /// Bind the transport and start the accept loop.
    ///
    /// Each connection is serviced on its own `may` coroutine, so many
    /// requests are logically concurrent while each owns its
    /// request/response pair exclusively. In-flight chains run to their
    /// natural termination when the handle is closed.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid or the port cannot be
    /// bound.
    pub fn listen<A: ToSocketAddrs>(self, addr: A) -> io::Result<AppHandle> {
        let config = RuntimeConfig::from_env();
        may::config().set_stack_size(config.stack_size);
        let service = AppService::new(Arc::new(self));
        let handle = HttpServer(service).start(addr)?;
        Ok(AppHandle { inner: handle })
    }
}

impl Middleware for App {
    fn handle(&self, req: &mut Request, res: &mut Response) -> Result<Flow, Fault> {
        match self.run(req, res, None) {
            Some(fault) => Err(fault),
            None => Ok(Flow::Continue),
        }
    }
}

/// Handle to a bound application's transport.
///
/// Dropping the handle leaves the server running; call
/// [`close`](AppHandle::close) to release the transport or
/// [`join`](AppHandle::join) to block on it.
pub struct AppHandle {
    inner: ServerHandle,
}

impl AppHandle {
    /// Wait until the transport accepts connections. Useful in tests.
    pub fn wait_ready(&self) -> io::Result<()> {
        self.inner.wait_ready()
    }

    /// Release the transport and stop the accept loop.
    pub fn close(self) {
        self.inner.stop();
    }

    /// Block until the server terminates.
    pub fn join(self) -> std::thread::Result<()> {
        self.inner.join()
    }
}
