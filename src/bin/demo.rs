//! Demo server wiring the toolkit together: nested routers, cookie
//! sessions, static files and a 404/error fallback.

use std::path::PathBuf;

use clap::Parser;
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

use cascade::middleware::{session_mut, AccessLog, CookieSession, ServeStatic, SessionOptions};
use cascade::{App, Fault, Flow, Request, Response, Router};

#[derive(Parser, Debug)]
#[command(name = "cascade-demo", about = "Run the cascade demo server")]
struct Args {
    /// Address to bind.
    #[arg(long, env = "CASCADE_ADDR", default_value = "127.0.0.1:8000")]
    addr: String,

    /// Directory served under /public.
    #[arg(long)]
    static_dir: Option<PathBuf>,

    /// Secret for the session cookie digest.
    #[arg(long, env = "CASCADE_SESSION_SECRET", default_value = "stuff")]
    session_secret: String,
}

fn build_router() -> Router {
    let mut deep = Router::new();
    deep.get("/test/:age", |req: &mut Request, res: &mut Response| -> Result<Flow, Fault> {
        *res.json_mut() = json!({
            "test": "/test/:name/test/:age",
            "params": req.params_map(),
        });
        Ok(Flow::Continue)
    });
    deep.get("/test", |req: &mut Request, res: &mut Response| -> Result<Flow, Fault> {
        *res.json_mut() = json!({
            "test": "/test/:name/test",
            "params": req.params_map(),
        });
        Ok(Flow::Continue)
    });

    let mut inner = Router::new();
    inner.get("/data", |req: &mut Request, res: &mut Response| -> Result<Flow, Fault> {
        *res.json_mut() = json!({ "test": "/data", "params": req.params_map() });
        Ok(Flow::Continue)
    });
    inner.mount(http::Method::GET, "/test/:name", deep);

    let mut router = Router::new();
    router.get("/testname/:name", |req: &mut Request, res: &mut Response| -> Result<Flow, Fault> {
        *res.json_mut() = json!({
            "test": "/testname/:name",
            "params": req.params_map(),
        });
        Ok(Flow::Continue)
    });
    router.get("/test", |_req: &mut Request, res: &mut Response| -> Result<Flow, Fault> {
        *res.json_mut() = json!({ "test": "/test" });
        Ok(Flow::Continue)
    });
    router.get("/error", |_req: &mut Request, _res: &mut Response| -> Result<Flow, Fault> {
        Err(Fault::with_status(402, "this is an error"))
    });
    router.get("/session", |req: &mut Request, res: &mut Response| -> Result<Flow, Fault> {
        let session = session_mut(req);
        let count = session["test"].as_i64().unwrap_or(-1) + 1;
        session["test"] = json!(count);
        *res.json_mut() = json!({ "test": count });
        Ok(Flow::Continue)
    });
    router.mount(http::Method::GET, "/", inner);
    router
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();

    let cookie_session = CookieSession::new(SessionOptions::new(args.session_secret.clone()));
    let session_saver = cookie_session.saver();

    let mut app = App::new();
    app.before(cookie_session);
    if let Some(static_dir) = &args.static_dir {
        app.main(ServeStatic::new(static_dir.clone(), "/public"));
    }
    app.main(build_router());
    app.main(|_req: &mut Request, res: &mut Response| -> Result<Flow, Fault> {
        if let Some(fault) = &res.error {
            res.status = fault.status.unwrap_or(500);
            res.body = fault.message.clone().into();
        } else if res.no_match {
            res.status = 404;
            res.body = "Not Found".into();
        }
        Ok(Flow::Continue)
    });
    app.error(|_req: &mut Request, res: &mut Response| -> Result<Flow, Fault> {
        let (status, message) = match &res.error {
            Some(fault) => (fault.status.unwrap_or(500), fault.message.clone()),
            None => (500, "Internal Server Error".to_string()),
        };
        res.status = status;
        res.body = message.into();
        Ok(Flow::Continue)
    });
    app.main(session_saver);
    app.after(AccessLog);

    info!(addr = %args.addr, "listening");
    let handle = app.listen(&args.addr)?;
    handle.join().ok();
    Ok(())
}
