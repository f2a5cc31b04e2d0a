use tracing::info;

use crate::error::Fault;
use crate::middleware::{Flow, Middleware};
use crate::server::{Request, Response};

/// After-stack middleware emitting one structured event per completed
/// request.
pub struct AccessLog;

impl Middleware for AccessLog {
    fn handle(&self, req: &mut Request, res: &mut Response) -> Result<Flow, Fault> {
        info!(
            method = %req.method,
            path = %req.path,
            status = res.status,
            no_match = res.no_match,
            "Request complete"
        );
        Ok(Flow::Continue)
    }
}
