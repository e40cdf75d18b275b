//! Per-server tunables.

use std::time::Duration;

use crate::filter::SharedFilter;

/// Knobs that apply uniformly to every connection a [`crate`] server accepts.
///
/// Defaults mirror common production-proxy defaults: an 8 KiB header budget,
/// a 1 MiB body cap, and a 60 second idle-read timeout.
#[derive(Clone)]
pub struct Setting {
    pub header_limit: usize,
    pub body_limit: Option<usize>,
    pub read_timeout: Duration,
    pub filters: Vec<SharedFilter>,
}

impl Default for Setting {
    fn default() -> Self {
        Setting {
            header_limit: 8 * 1024,
            body_limit: Some(1024 * 1024),
            read_timeout: Duration::from_secs(60),
            filters: Vec::new(),
        }
    }
}

impl Setting {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_header_limit(mut self, limit: usize) -> Self {
        self.header_limit = limit;
        self
    }

    pub fn with_body_limit(mut self, limit: Option<usize>) -> Self {
        self.body_limit = limit;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn add_filter(mut self, filter: SharedFilter) -> Self {
        self.filters.push(filter);
        self
    }
}
