use crate::error::Fault;
use crate::server::{Request, Response};

/// What a middleware asks the dispatcher to do next.
///
/// Every middleware signals completion exactly once through its return
/// value; there is no continuation callback and no implicit fallthrough.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Hand control to the next middleware in the current stack.
    Continue,
    /// Stop the current stack and proceed straight to send-or-delegate.
    Halt,
}

/// The contract every handler in the system implements.
///
/// A middleware receives exclusive access to the in-flight request/response
/// pair and returns either a [`Flow`] or a [`Fault`]. `Err(fault)` diverts
/// the chain to the error stack; the fault is attached to the response
/// before any error middleware runs.
///
/// Closures work directly:
///
/// ```rust,ignore
/// app.main(|_req: &mut Request, res: &mut Response| {
///     res.body = serde_json::json!({ "ok": true }).into();
///     Ok(Flow::Continue)
/// });
/// ```
pub trait Middleware: Send + Sync {
    fn handle(&self, req: &mut Request, res: &mut Response) -> Result<Flow, Fault>;
}

impl<F> Middleware for F
where
    F: Fn(&mut Request, &mut Response) -> Result<Flow, Fault> + Send + Sync,
{
    fn handle(&self, req: &mut Request, res: &mut Response) -> Result<Flow, Fault> {
        self(req, res)
    }
}
