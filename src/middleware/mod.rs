//! The middleware contract and the bundled collaborators.
//!
//! Everything outside the dispatch/routing core — sessions, static files,
//! request logging — is a plain [`Middleware`] interacting with the core
//! only through [`handle`](Middleware::handle). Each collaborator captures
//! its configuration at construction; there is no process-wide mutable
//! configuration.

mod access_log;
mod cookie_session;
mod core;
mod static_files;

pub use access_log::AccessLog;
pub use cookie_session::{
    session, session_mut, CookieSession, CookieSessionSave, SameSite, SessionOptions, SESSION_KEY,
};
pub use core::{Flow, Middleware};
pub use static_files::{ServeStatic, StaticOptions};
