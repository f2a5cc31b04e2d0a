use std::io;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use may_minihttp::{HttpService, Request, Response};
use tracing::error;

use crate::dispatcher::App;

use super::request::parse_request;
use super::response::{status_reason, Headers, Transport};

/// `may_minihttp` service driving the application core.
///
/// Parses the raw request, builds the request/response pair and hands them
/// to the dispatcher with a wire-backed [`Transport`]. Middleware panics
/// are caught here and surfaced as a 500 instead of killing the connection
/// coroutine.
pub struct AppService {
    app: Arc<App>,
}

impl AppService {
    #[must_use]
    pub fn new(app: Arc<App>) -> Self {
        Self { app }
    }
}

impl Clone for AppService {
    fn clone(&self) -> Self {
        Self {
            app: Arc::clone(&self.app),
        }
    }
}

/// [`Transport`] adapter writing into the wire response through a closure,
/// so the core never names `may_minihttp` types.
pub struct WireTransport<F>
where
    F: FnMut(u16, &Headers, &[u8]) -> io::Result<()>,
{
    write: F,
}

impl<F> WireTransport<F>
where
    F: FnMut(u16, &Headers, &[u8]) -> io::Result<()>,
{
    pub fn new(write: F) -> Self {
        Self { write }
    }
}

impl<F> Transport for WireTransport<F>
where
    F: FnMut(u16, &Headers, &[u8]) -> io::Result<()>,
{
    fn write_response(&mut self, status: u16, headers: &Headers, body: &[u8]) -> io::Result<()> {
        (self.write)(status, headers, body)
    }
}

impl HttpService for AppService {
    fn call(&mut self, req: Request, res: &mut Response) -> io::Result<()> {
        let mut request = parse_request(req);
        let mut response = crate::server::Response::new();

        let wrote = std::cell::Cell::new(false);
        {
            let mut wire = WireTransport::new(|status, headers: &Headers, body: &[u8]| {
                res.status_code(status as usize, status_reason(status));
                for (name, value) in headers.iter() {
                    // may_minihttp wants 'static header lines
                    let line = format!("{name}: {value}").into_boxed_str();
                    res.header(&*Box::leak(line));
                }
                res.body_vec(body.to_vec());
                wrote.set(true);
                Ok(())
            });

            let app = Arc::clone(&self.app);
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                app.handle(&mut request, &mut response, &mut wire);
            }));

            if let Err(panic) = outcome {
                error!(
                    method = %request.method,
                    path = %request.path,
                    panic = ?panic,
                    "Middleware panicked"
                );
            }
        }

        if !wrote.get() {
            res.status_code(500, status_reason(500));
            res.header("Content-Type: application/json");
            res.body_vec(
                serde_json::json!({ "error": "Internal Server Error" })
                    .to_string()
                    .into_bytes(),
            );
        }
        Ok(())
    }
}
