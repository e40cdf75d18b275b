//! Request routing: template registration, dispatch, and the arity-based
//! binder disambiguation described alongside [`handler`].
//!
//! A route is first matched by path (literal paths via a `HashMap`, dynamic
//! paths via an ordered list of compiled regexes, first match wins), then by
//! method, then — when more than one handler was registered for the same
//! method and path template with different query signatures — by which
//! binder's required query parameters are all present on this particular
//! request.

pub mod handler;
pub mod template;
pub mod value;

use std::collections::HashMap;
use std::marker::PhantomData;
use std::net::SocketAddr;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Arc;

use emberhttp_core::Request;
use thiserror::Error;

use self::handler::{ArgTuple, Handler, RequestHandle};
use self::template::{Pattern, TemplateError};
use self::value::{CoercionError, Value};

pub use handler::HandlerFuture;

#[derive(Debug, Error)]
pub enum RouterError {
    #[error("handler argument count does not match the template's path and query parameter count")]
    ParamCount,
    #[error("invalid route template: {0}")]
    InvalidTemplate(#[from] TemplateError),
    #[error("request target could not be parsed as an origin-form URL")]
    BadTarget,
    #[error("no route matches this path")]
    NotFound,
    #[error("route exists but not for this method")]
    MethodNotAllowed,
    #[error("no registered binder satisfies the provided query parameters")]
    ParamMismatch,
    #[error(transparent)]
    Coercion(#[from] CoercionError),
}

#[derive(Debug, Clone)]
struct QuerySpec {
    name: String,
    required: bool,
}

trait ErasedHandler: Send + Sync {
    fn invoke<'a>(
        &'a self,
        values: Vec<Value>,
        handle: Rc<RequestHandle>,
    ) -> Pin<Box<dyn Future<Output = Result<(), RouterError>> + 'a>>;
}

use std::future::Future;

struct TypedHandler<Args, H> {
    handler: H,
    _marker: PhantomData<fn() -> Args>,
}

impl<Args, H> ErasedHandler for TypedHandler<Args, H>
where
    Args: ArgTuple + 'static,
    H: Handler<Args> + Send + Sync + 'static,
{
    fn invoke<'a>(
        &'a self,
        values: Vec<Value>,
        handle: Rc<RequestHandle>,
    ) -> Pin<Box<dyn Future<Output = Result<(), RouterError>> + 'a>> {
        Box::pin(async move {
            let args = Args::build(values)?;
            self.handler.call(args, handle).await;
            Ok(())
        })
    }
}

#[derive(Clone)]
struct Binder {
    query_params: Vec<QuerySpec>,
    handler: Arc<dyn ErasedHandler>,
}

#[derive(Default)]
struct RouteItem {
    methods: HashMap<http::Method, Vec<Binder>>,
}

/// The request router. Built up via [`Router::add_route`] before a server
/// starts serving; read-only (and therefore lock-free) from then on.
#[derive(Default)]
pub struct Router {
    literal: HashMap<String, RouteItem>,
    regex: Vec<(template::CompiledTemplate, RouteItem)>,
}

impl Router {
    pub fn new() -> Self {
        Router::default()
    }

    /// Registers `handler` for `methods` at `template`.
    ///
    /// `Args` is inferred from the handler's signature; its arity must equal
    /// the template's path-placeholder count plus its declared query
    /// parameter count, or this returns [`RouterError::ParamCount`].
    pub fn add_route<Args, H>(&mut self, template: &str, methods: &[http::Method], handler: H) -> Result<(), RouterError>
    where
        Args: ArgTuple + 'static,
        H: Handler<Args> + Send + Sync + 'static,
    {
        let compiled = template::compile(template)?;
        if Args::ARITY != compiled.path_arg_num + compiled.query_names.len() {
            return Err(RouterError::ParamCount);
        }

        let optional_flags = Args::optional_flags();
        let query_params = compiled
            .query_names
            .iter()
            .enumerate()
            .map(|(i, name)| QuerySpec {
                name: name.clone(),
                required: !optional_flags[compiled.path_arg_num + i],
            })
            .collect();

        let binder = Binder {
            query_params,
            handler: Arc::new(TypedHandler {
                handler,
                _marker: PhantomData,
            }),
        };

        match &compiled.pattern {
            Pattern::Literal(path) => {
                let item = self.literal.entry(path.clone()).or_default();
                for m in methods {
                    item.methods.entry(m.clone()).or_default().push(binder.clone());
                }
            }
            Pattern::Regex(_) => {
                let idx = self.regex.iter().position(|(t, _)| t.source == compiled.source);
                let item_idx = match idx {
                    Some(i) => i,
                    None => {
                        self.regex.push((compiled.clone(), RouteItem::default()));
                        self.regex.len() - 1
                    }
                };
                let item = &mut self.regex[item_idx].1;
                for m in methods {
                    item.methods.entry(m.clone()).or_default().push(binder.clone());
                }
            }
        }

        Ok(())
    }

    /// Matches `handle`'s request against the registered routes and invokes
    /// the most specific qualifying binder — the one declaring the most
    /// query parameters among those whose required parameters are all
    /// present, ties broken by registration order.
    pub async fn dispatch(&self, handle: Rc<RequestHandle>) -> Result<(), RouterError> {
        let target = handle.request().target().to_string();
        let method = handle.request().method().clone();
        let (path, query) = target.split_once('?').unwrap_or((target.as_str(), ""));
        if !path.starts_with('/') {
            return Err(RouterError::BadTarget);
        }

        let query_map = parse_query(query);
        let (item, captures) = self.match_route(path)?;
        let binders = item.methods.get(&method).ok_or(RouterError::MethodNotAllowed)?;

        // Among binders whose required query parameters are all present, the
        // one declaring the most query parameters wins: a zero-query binder
        // (e.g. a bare `/hello`) is vacuously satisfied by any request, so
        // picking strictly the first qualifying entry would starve a more
        // specific, later-registered binder of every request that actually
        // carries its query parameters. Ties (including "only one
        // qualifies") fall back to registration order.
        let mut binder: Option<&Binder> = None;
        for candidate in binders {
            let qualifies = candidate.query_params.iter().all(|q| !q.required || query_map.contains_key(&q.name));
            if !qualifies {
                continue;
            }
            if binder.map_or(true, |current| candidate.query_params.len() > current.query_params.len()) {
                binder = Some(candidate);
            }
        }
        let binder = binder.ok_or(RouterError::ParamMismatch)?;

        let mut values: Vec<Value> = captures.into_iter().map(Value::Str).collect();
        for q in &binder.query_params {
            values.push(match query_map.get(&q.name) {
                Some(v) => Value::Str(v.clone()),
                None => Value::Missing,
            });
        }

        binder.handler.invoke(values, handle).await
    }

    fn match_route(&self, path: &str) -> Result<(&RouteItem, Vec<String>), RouterError> {
        if let Some(item) = self.literal.get(path) {
            return Ok((item, Vec::new()));
        }
        for (tpl, item) in &self.regex {
            if let Pattern::Regex(re) = &tpl.pattern {
                if let Some(caps) = re.captures(path) {
                    let values = caps
                        .iter()
                        .skip(1)
                        .map(|m| m.map(|m| m.as_str().to_string()).unwrap_or_default())
                        .collect();
                    return Ok((item, values));
                }
            }
        }
        Err(RouterError::NotFound)
    }
}

fn parse_query(query: &str) -> HashMap<String, String> {
    url::form_urlencoded::parse(query.as_bytes())
        .map(|(k, v)| (emberhttp_core::util::lower_ascii(&k), v.into_owned()))
        .collect()
}

/// Builds the [`RequestHandle`] the router hands each matched handler.
pub fn handle_for(request: Rc<Request>, peer: SocketAddr) -> Rc<RequestHandle> {
    Rc::new(RequestHandle::new(request, peer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use emberhttp_core::{Response, Version};
    use http::{Method, StatusCode};

    fn req(target: &str) -> Rc<Request> {
        let raw = format!("GET {target} HTTP/1.1\r\nHost: localhost\r\n\r\n");
        match emberhttp_core::wire::try_parse_head(raw.as_bytes(), 8192).unwrap() {
            emberhttp_core::wire::ParseOutcome::Head { request, .. } => Rc::new(request),
            emberhttp_core::wire::ParseOutcome::Incomplete => panic!("test request must parse"),
        }
    }

    fn peer() -> SocketAddr {
        "127.0.0.1:1234".parse().unwrap()
    }

    async fn hello0(handle: Rc<RequestHandle>) {
        handle.respond(Response::new(StatusCode::OK).set_version(Version::Http11));
    }

    async fn hello1(_name: String, handle: Rc<RequestHandle>) {
        handle.respond(Response::new(StatusCode::OK));
    }

    #[monoio::test(enable_timer = false)]
    async fn dispatches_to_exact_literal_match() {
        let mut router = Router::new();
        router.add_route::<(), _>("/hello", &[Method::GET], hello0).unwrap();

        let handle = handle_for(req("/hello"), peer());
        router.dispatch(handle.clone()).await.unwrap();
        assert!(Rc::try_unwrap(handle).ok().unwrap().into_response().is_some());
    }

    #[monoio::test(enable_timer = false)]
    async fn dispatches_dynamic_segment_and_coerces_arg() {
        let mut router = Router::new();
        router.add_route::<(String,), _>("/hello/{name}", &[Method::GET], hello1).unwrap();

        let handle = handle_for(req("/hello/Ember"), peer());
        router.dispatch(handle).await.unwrap();
    }

    #[monoio::test(enable_timer = false)]
    async fn unknown_path_is_not_found() {
        let router = Router::new();
        let handle = handle_for(req("/nope"), peer());
        assert!(matches!(router.dispatch(handle).await, Err(RouterError::NotFound)));
    }

    #[monoio::test(enable_timer = false)]
    async fn wrong_method_is_method_not_allowed() {
        let mut router = Router::new();
        router.add_route::<(), _>("/hello", &[Method::GET], hello0).unwrap();
        let raw = "POST /hello HTTP/1.1\r\nHost: localhost\r\n\r\n";
        let request = match emberhttp_core::wire::try_parse_head(raw.as_bytes(), 8192).unwrap() {
            emberhttp_core::wire::ParseOutcome::Head { request, .. } => Rc::new(request),
            _ => panic!(),
        };
        let handle = handle_for(request, peer());
        assert!(matches!(router.dispatch(handle).await, Err(RouterError::MethodNotAllowed)));
    }

    #[test]
    fn mismatched_arity_is_rejected_at_registration() {
        let mut router = Router::new();
        let err = router.add_route::<(), _>("/hello/{name}", &[Method::GET], hello0).unwrap_err();
        assert!(matches!(err, RouterError::ParamCount));
    }

    async fn hello2(name: String, _nick_name: Option<String>, age: i64, handle: Rc<RequestHandle>) {
        handle.respond(Response::new(StatusCode::OK).with_body("text/plain", format!("{name}:{age}")));
    }

    fn req_with_query(target: &str) -> Rc<Request> {
        req(target)
    }

    /// A bare binder with no declared query parameters is vacuously
    /// satisfied by any query string; the more specific overload must still
    /// win whenever the request actually carries its declared parameters.
    #[monoio::test(enable_timer = false)]
    async fn more_specific_query_binder_wins_over_bare_overload() {
        let mut router = Router::new();
        router.add_route::<(), _>("/hello", &[Method::GET], hello0).unwrap();
        router
            .add_route::<(String, Option<String>, i64), _>("/hello?name&nick_name&age", &[Method::GET], hello2)
            .unwrap();

        let handle = handle_for(req_with_query("/hello?name=xxx&age=34"), peer());
        router.dispatch(handle.clone()).await.unwrap();
        let response = Rc::try_unwrap(handle).ok().unwrap().into_response().unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    /// With no query string at all, the overload requiring `name`/`age` does
    /// not qualify, so the bare binder is the only candidate.
    #[monoio::test(enable_timer = false)]
    async fn bare_overload_wins_when_query_is_absent() {
        let mut router = Router::new();
        router.add_route::<(), _>("/hello", &[Method::GET], hello0).unwrap();
        router
            .add_route::<(String, Option<String>, i64), _>("/hello?name&nick_name&age", &[Method::GET], hello2)
            .unwrap();

        let handle = handle_for(req_with_query("/hello"), peer());
        router.dispatch(handle).await.unwrap();
    }

    #[monoio::test(enable_timer = false)]
    async fn coercion_failure_surfaces_without_invoking_handler() {
        let mut router = Router::new();
        router
            .add_route::<(String, Option<String>, i64), _>("/hello?name&nick_name&age", &[Method::GET], hello2)
            .unwrap();

        let handle = handle_for(req_with_query("/hello?name=yyy&age=bad"), peer());
        let err = router.dispatch(handle).await.unwrap_err();
        assert!(matches!(err, RouterError::Coercion(_)));
    }
}
