//! Example handlers, registered against the server at startup.
//!
//! These exist to demonstrate the router's argument coercion (literal route,
//! dynamic path segment, required/optional query parameters) end to end; an
//! embedding application registers its own handlers the same way via
//! [`Server::handle_func`](emberhttp_services::Server::handle_func).

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use emberhttp_core::Response;
use emberhttp_services::router::handler::RequestHandle;
use emberhttp_services::{RouterError, Server};
use http::{Method, StatusCode};

/// Per-reactor greeting counter. `Rc<RefCell<_>>` rather than a `Mutex` is
/// enough here: every connection on this socket reactor (and therefore every
/// handler invocation) runs on the same thread.
///
/// This is demo-app state, not library state — see the design notes on
/// why the core never reaches for anything like it.
thread_local! {
    static GREETED: RefCell<HashMap<String, u64>> = RefCell::new(HashMap::new());
}

pub fn register(server: &mut Server) -> Result<(), RouterError> {
    server.handle_func::<(), _>("/hello", &[Method::GET, Method::POST], hello)?;
    server.handle_func::<(String,), _>("/hello/{name}", &[Method::GET], hello_by_name)?;
    server.handle_func::<(String, Option<String>, i64), _>(
        "/hello?name&nick_name&age",
        &[Method::GET],
        hello_query,
    )?;
    server.handle_func::<(), _>("/healthz", &[Method::GET], healthz)?;
    Ok(())
}

async fn hello(handle: Rc<RequestHandle>) {
    handle.respond(Response::new(StatusCode::OK).with_body("text/plain; charset=utf-8", "hello, world"));
}

async fn hello_by_name(name: String, handle: Rc<RequestHandle>) {
    let count = GREETED.with(|g| {
        let mut g = g.borrow_mut();
        let count = g.entry(name.clone()).or_insert(0);
        *count += 1;
        *count
    });
    let body = format!("hello, {name} (greeted {count} time(s) on this reactor)");
    handle.respond(Response::new(StatusCode::OK).with_body("text/plain; charset=utf-8", body));
}

async fn hello_query(name: String, nick_name: Option<String>, age: i64, handle: Rc<RequestHandle>) {
    let nick = nick_name.unwrap_or_else(|| name.clone());
    let body = format!("hello, {name} (\"{nick}\"), age {age}");
    handle.respond(Response::new(StatusCode::OK).with_body("text/plain; charset=utf-8", body));
}

async fn healthz(handle: Rc<RequestHandle>) {
    handle.respond(Response::new(StatusCode::OK).with_body("text/plain; charset=utf-8", "ok"));
}
