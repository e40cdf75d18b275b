//! Black-box integration tests driving [`emberhttp_services::Server`] over a
//! real loopback TCP socket: literal vs. dynamic routes, query coercion,
//! method mismatch, and the reference CORS preflight.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::rc::Rc;
use std::time::Duration;

use emberhttp_core::{Response, Setting};
use emberhttp_services::router::handler::RequestHandle;
use emberhttp_services::{CorsFilter, OriginPolicy, Server};
use http::{Method, StatusCode};

async fn hello(handle: Rc<RequestHandle>) {
    handle.respond(Response::new(StatusCode::OK).with_body("text/plain", "hi"));
}

async fn hello_by_name(name: String, handle: Rc<RequestHandle>) {
    handle.respond(Response::new(StatusCode::OK).with_body("text/plain", format!("hi {name}")));
}

async fn hello_query(name: String, nick_name: Option<String>, age: i64, handle: Rc<RequestHandle>) {
    let nick = nick_name.unwrap_or_default();
    handle.respond(Response::new(StatusCode::OK).with_body("text/plain", format!("{name}/{nick}/{age}")));
}

fn spawn_server() -> Server {
    let setting = Setting::new().add_filter(std::sync::Arc::new(CorsFilter::new(
        OriginPolicy::Any,
        vec![Method::GET, Method::POST, Method::OPTIONS],
    )));
    let mut server = Server::new(setting);
    server.handle_func::<(), _>("/hello", &[Method::GET, Method::POST], hello).unwrap();
    server.handle_func::<(String,), _>("/hello/{name}", &[Method::GET], hello_by_name).unwrap();
    server
        .handle_func::<(String, Option<String>, i64), _>("/hello?name&nick_name&age", &[Method::GET], hello_query)
        .unwrap();
    server.listen_and_serve("127.0.0.1:0".parse().unwrap()).unwrap();
    server
}

fn roundtrip(addr: std::net::SocketAddr, request: &str) -> String {
    let mut stream = TcpStream::connect(addr).unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    stream.write_all(request.as_bytes()).unwrap();
    stream.write_all(b"Connection: close\r\n\r\n").unwrap();
    let mut out = String::new();
    stream.read_to_string(&mut out).unwrap();
    out
}

#[test]
fn literal_route_is_invoked() {
    let mut server = spawn_server();
    let addr = server.local_addr().unwrap();
    let response = roundtrip(addr, "GET /hello HTTP/1.1\r\nHost: localhost\r\n");
    assert!(response.starts_with("HTTP/1.1 200 OK"));
    assert!(response.ends_with("hi"));
    server.close().unwrap();
}

#[test]
fn dynamic_segment_is_coerced_into_handler_arg() {
    let mut server = spawn_server();
    let addr = server.local_addr().unwrap();
    let response = roundtrip(addr, "GET /hello/Ember HTTP/1.1\r\nHost: localhost\r\n");
    assert!(response.ends_with("hi Ember"));
    server.close().unwrap();
}

#[test]
fn query_params_are_coerced_and_optional_absence_is_tolerated() {
    let mut server = spawn_server();
    let addr = server.local_addr().unwrap();
    let response = roundtrip(addr, "GET /hello?name=xxx&age=34 HTTP/1.1\r\nHost: localhost\r\n");
    assert!(response.ends_with("xxx//34"));
    server.close().unwrap();
}

#[test]
fn coercion_failure_yields_bad_request() {
    let mut server = spawn_server();
    let addr = server.local_addr().unwrap();
    let response = roundtrip(addr, "GET /hello?name=yyy&age=bad HTTP/1.1\r\nHost: localhost\r\n");
    assert!(response.starts_with("HTTP/1.1 400 Bad Request"));
    server.close().unwrap();
}

#[test]
fn unknown_nested_path_yields_bad_request() {
    let mut server = spawn_server();
    let addr = server.local_addr().unwrap();
    let response = roundtrip(addr, "GET /hello/xxx/yyyy HTTP/1.1\r\nHost: localhost\r\n");
    assert!(response.starts_with("HTTP/1.1 400 Bad Request"));
    assert!(response.contains("connection: close"));
    server.close().unwrap();
}

#[test]
fn cors_preflight_short_circuits_with_echoed_origin() {
    let mut server = spawn_server();
    let addr = server.local_addr().unwrap();
    let response = roundtrip(
        addr,
        "OPTIONS /anything HTTP/1.1\r\nHost: localhost\r\nOrigin: https://a.example\r\nAccess-Control-Request-Method: POST\r\n",
    );
    assert!(response.starts_with("HTTP/1.1 200 OK"));
    assert!(response.contains("access-control-allow-origin: https://a.example"));
    assert!(response.contains("access-control-allow-methods: GET,POST,OPTIONS"));
    assert!(response.contains("access-control-max-age: 3600"));
    server.close().unwrap();
}

#[test]
fn close_is_idempotent_and_server_can_be_reopened() {
    let mut server = spawn_server();
    server.close().unwrap();
    server.close().unwrap();
    server.listen_and_serve("127.0.0.1:0".parse().unwrap()).unwrap();
    server.close().unwrap();
}
