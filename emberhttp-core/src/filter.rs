//! The filter chain abstraction.
//!
//! A [`Filter`] interposes on every request/response pair that flows through
//! a connection. It is intentionally narrow: a pre-request hook that may
//! short-circuit by producing a response itself (the reference use case is
//! CORS preflight), and a post-response hook that only gets to amend
//! headers, since by the time it runs the body has already been decided.
//!
//! Filters are shared (`Arc`) rather than owned per-connection: they are
//! registered once, up front, and only ever read afterwards.

use std::sync::Arc;

use crate::wire::{Request, Response};

/// Scratch space threaded through one connection's filter chain, letting a
/// pre-request hook leave something for its own post-response hook to pick
/// back up (e.g. the CORS filter stashes the echoed `Origin` here).
#[derive(Debug, Default)]
pub struct FilterScratch {
    pub allow_origin: Option<String>,
}

/// The outcome of a filter's pre-request hook.
pub enum FilterOutcome {
    /// Continue to the next filter (or routing, if this was the last one).
    Passed,
    /// The filter produced a response itself; the chain stops here and
    /// routing is skipped entirely.
    Responded(Response),
}

/// A single stage of the filter chain.
///
/// Implementations must be `Send + Sync` since the filter list is handed off
/// once from the configuring thread to the connection-serving thread; at
/// runtime a `Filter` is only ever invoked from that one thread.
pub trait Filter: Send + Sync {
    fn name(&self) -> &str;

    fn pre_request(&self, request: &Request, scratch: &mut FilterScratch) -> FilterOutcome;

    /// Called after a response has been produced (whether by a handler or by
    /// an earlier filter's `Responded`), in registration order.
    fn post_response(&self, headers: &mut http::HeaderMap, scratch: &FilterScratch);
}

pub type SharedFilter = Arc<dyn Filter>;
