//! Router, filter chain, connection engine and server for `emberhttp`.
//!
//! This crate builds the two "interesting" subsystems described by the
//! workspace on top of the plumbing in `emberhttp-core`: a typed [`router`]
//! and the [`connection`]/[`server`] state machines that drive it over a
//! socket. The reference [`cors`] filter lives here too, as an ordinary
//! consumer of [`emberhttp_core::Filter`].

pub mod connection;
pub mod cors;
pub mod router;
pub mod server;

pub use cors::{CorsFilter, OriginPolicy};
pub use router::{Router, RouterError};
pub use server::{Server, ServerError};
