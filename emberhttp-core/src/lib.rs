//! Fundamental, reusable building blocks for `emberhttp`: the wire codec,
//! server-wide settings, the filter abstraction, the listener wrapper, and
//! error plumbing.
//!
//! Everything with actual routing/connection-engine behavior lives one
//! layer up, in `emberhttp-services`.

pub mod context;
pub mod error;
pub mod filter;
pub mod listener;
pub mod setting;
pub mod util;
pub mod wire;

pub use error::{AnyError, AnyResult};
pub use filter::{Filter, FilterOutcome, FilterScratch, SharedFilter};
pub use setting::Setting;
pub use wire::{Request, Response, Version};
