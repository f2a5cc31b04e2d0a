//! Tests for the bundled collaborator middleware: cookie sessions, static
//! files and the lazy body parser.

mod common;

use std::fs;

use common::MockTransport;
use http::Method;
use serde_json::json;

use cascade::middleware::{session_mut, CookieSession, ServeStatic, SessionOptions, StaticOptions};
use cascade::{App, Body, Fault, Flow, Middleware, Request, RequestBody, Response};

fn session_app(secret: &str) -> App {
    let cookie_session = CookieSession::new(SessionOptions::new(secret.to_string()));
    let saver = cookie_session.saver();

    let mut app = App::new();
    app.before(cookie_session);
    app.main(|req: &mut Request, res: &mut Response| -> Result<Flow, Fault> {
        let session = session_mut(req);
        let count = session["count"].as_i64().unwrap_or(0) + 1;
        session["count"] = json!(count);
        res.body = json!({ "count": count }).into();
        Ok(Flow::Continue)
    });
    app.main(saver);
    app
}

fn set_cookie_value(transport: &MockTransport) -> String {
    let cookie = transport
        .single()
        .header("set-cookie")
        .expect("Set-Cookie written")
        .to_string();
    cookie
        .split(';')
        .next()
        .unwrap()
        .strip_prefix("cascade=")
        .unwrap()
        .to_string()
}

#[test]
fn test_cookie_session_round_trip() {
    let app = session_app("secret");

    // first request: no cookie, session starts empty
    let mut transport = MockTransport::new();
    let mut req = Request::new(Method::GET, "/");
    let mut res = Response::new();
    app.handle(&mut req, &mut res, &mut transport);
    assert_eq!(transport.single().body_json(), json!({ "count": 1 }));
    let cookie = set_cookie_value(&transport);

    // second request: the saved cookie comes back and the count advances
    let mut transport = MockTransport::new();
    let mut req =
        Request::new(Method::GET, "/").with_header("cookie", &format!("cascade={cookie}"));
    let mut res = Response::new();
    app.handle(&mut req, &mut res, &mut transport);
    assert_eq!(transport.single().body_json(), json!({ "count": 2 }));
}

#[test]
fn test_cookie_session_discards_tampered_cookie() {
    let app = session_app("secret");

    let mut transport = MockTransport::new();
    let mut req = Request::new(Method::GET, "/")
        .with_header("cookie", "cascade=%7B%22count%22%3A41%7D.badsignature");
    let mut res = Response::new();
    app.handle(&mut req, &mut res, &mut transport);

    // the forged count is ignored; the session starts over
    assert_eq!(transport.single().body_json(), json!({ "count": 1 }));
}

#[test]
fn test_cookie_session_attributes() {
    let options = SessionOptions::new("secret")
        .name("sid")
        .max_age(3600)
        .secure(true);
    let cookie_session = CookieSession::new(options);
    let saver = cookie_session.saver();

    let mut req = Request::new(Method::GET, "/");
    let mut res = Response::new();
    cookie_session.handle(&mut req, &mut res).unwrap();
    saver.handle(&mut req, &mut res).unwrap();

    let cookie = res.headers.get("set-cookie").unwrap();
    assert!(cookie.starts_with("sid="));
    assert!(cookie.contains("; Path=/"));
    assert!(cookie.contains("; Max-Age=3600"));
    assert!(cookie.contains("; HttpOnly"));
    assert!(cookie.contains("; Secure"));
}

#[test]
fn test_serve_static_serves_file_below_endpoint() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("hello.txt"), "Hello\n").unwrap();

    let serve = ServeStatic::new(dir.path(), "/public");
    let mut req = Request::new(Method::GET, "/public/hello.txt");
    let mut res = Response::new();
    let outcome = serve.handle(&mut req, &mut res).unwrap();

    assert_eq!(outcome, Flow::Continue);
    assert!(res.finished());
    assert_eq!(res.status, 200);
    assert_eq!(res.headers.get("content-type"), Some("text/plain"));
    assert_eq!(res.headers.get("content-length"), Some("6"));
    assert_eq!(res.body, Body::Bytes(b"Hello\n".to_vec()));
}

#[test]
fn test_serve_static_ignores_paths_outside_endpoint() {
    let dir = tempfile::tempdir().unwrap();
    let serve = ServeStatic::new(dir.path(), "/public");

    let mut req = Request::new(Method::GET, "/api/hello");
    let mut res = Response::new();
    let outcome = serve.handle(&mut req, &mut res).unwrap();

    assert_eq!(outcome, Flow::Continue);
    assert!(!res.finished());
}

#[test]
fn test_serve_static_rejects_traversal() {
    let dir = tempfile::tempdir().unwrap();
    let serve = ServeStatic::new(dir.path(), "/public");

    let mut req = Request::new(Method::GET, "/public/../outside.txt");
    let mut res = Response::new();
    let fault = serve.handle(&mut req, &mut res).unwrap_err();
    assert_eq!(fault.status, Some(403));
}

#[test]
fn test_serve_static_rejects_hidden_segments() {
    let dir = tempfile::tempdir().unwrap();
    let serve = ServeStatic::new(dir.path(), "/public");

    let mut req = Request::new(Method::GET, "/public/.env");
    let mut res = Response::new();
    let fault = serve.handle(&mut req, &mut res).unwrap_err();
    assert_eq!(fault.status, Some(403));
}

#[test]
fn test_serve_static_misses_fall_through_by_default() {
    let dir = tempfile::tempdir().unwrap();
    let serve = ServeStatic::new(dir.path(), "/public");

    let mut req = Request::new(Method::GET, "/public/absent.txt");
    let mut res = Response::new();
    let outcome = serve.handle(&mut req, &mut res).unwrap();
    assert_eq!(outcome, Flow::Continue);
    assert!(!res.finished());
}

#[test]
fn test_serve_static_miss_faults_without_fallthrough() {
    let dir = tempfile::tempdir().unwrap();
    let options = StaticOptions {
        fallthrough: false,
        ..StaticOptions::default()
    };
    let serve = ServeStatic::with_options(dir.path(), "/public", options);

    let mut req = Request::new(Method::GET, "/public/absent.txt");
    let mut res = Response::new();
    let fault = serve.handle(&mut req, &mut res).unwrap_err();
    assert_eq!(fault.status, Some(404));
}

#[test]
fn test_serve_static_non_get_without_fallthrough_responds_405() {
    let dir = tempfile::tempdir().unwrap();
    let options = StaticOptions {
        fallthrough: false,
        ..StaticOptions::default()
    };
    let serve = ServeStatic::with_options(dir.path(), "/public", options);

    let mut req = Request::new(Method::POST, "/public/hello.txt");
    let mut res = Response::new();
    let outcome = serve.handle(&mut req, &mut res).unwrap();

    assert_eq!(outcome, Flow::Halt);
    assert_eq!(res.status, 405);
    assert_eq!(res.headers.get("allow"), Some("GET, HEAD"));
    assert!(res.finished());
}

#[test]
fn test_body_parser_json() {
    let req = Request::new(Method::POST, "/items")
        .with_header("content-type", "application/json")
        .with_body(r#"{"name":"Max"}"#);
    match req.body().unwrap() {
        Some(RequestBody::Json(value)) => assert_eq!(value, &json!({ "name": "Max" })),
        other => panic!("expected JSON body, got {other:?}"),
    }
}

#[test]
fn test_body_parser_invalid_json_faults_with_400() {
    let req = Request::new(Method::POST, "/items")
        .with_header("content-type", "application/json")
        .with_body("{not json");
    let fault = req.body().unwrap_err();
    assert_eq!(fault.status, Some(400));
}

#[test]
fn test_body_parser_unknown_content_type_is_text() {
    let req = Request::new(Method::POST, "/items").with_body("raw payload");
    assert_eq!(
        req.body().unwrap(),
        Some(&RequestBody::Text("raw payload".into()))
    );
}

#[test]
fn test_faulting_body_parse_routes_to_error_stack() {
    let mut app = App::new();
    app.main(|req: &mut Request, res: &mut Response| -> Result<Flow, Fault> {
        let body = req.body()?;
        res.body = json!({ "got": format!("{body:?}") }).into();
        Ok(Flow::Continue)
    });
    app.error(|_req: &mut Request, res: &mut Response| -> Result<Flow, Fault> {
        let fault = res.error.clone().expect("fault attached");
        res.status = fault.status.unwrap_or(500);
        res.body = fault.message.into();
        Ok(Flow::Continue)
    });

    let mut transport = MockTransport::new();
    let mut req = Request::new(Method::POST, "/")
        .with_header("content-type", "application/json")
        .with_body("{broken");
    let mut res = Response::new();
    app.handle(&mut req, &mut res, &mut transport);

    assert_eq!(transport.single().status, 400);
}
