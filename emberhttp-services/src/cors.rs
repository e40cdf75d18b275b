//! A reference CORS filter, demonstrating the [`Filter`] trait against the
//! chain's two most common needs: short-circuiting preflight requests, and
//! echoing an allowed origin back onto the real response.

use std::time::Duration;

use emberhttp_core::util::{eq_ignore_case, strip_exact_suffix};
use emberhttp_core::{Filter, FilterOutcome, FilterScratch, Request, Response};
use http::{HeaderValue, Method, StatusCode};

/// Which origins a [`CorsFilter`] will allow.
#[derive(Debug, Clone)]
pub enum OriginPolicy {
    Any,
    List(Vec<String>),
}

impl OriginPolicy {
    fn allows(&self, origin: &str) -> bool {
        match self {
            OriginPolicy::Any => true,
            OriginPolicy::List(allowed) => allowed.iter().any(|a| origins_match(a, origin)),
        }
    }
}

/// Two origins are considered equal if they're identical, or if one of them
/// is the other with an *exact* trailing `:80` or `:443` removed — not a
/// substring match, which would also (wrongly) equate
/// `https://evil.example.com:8080` with `https://evil.example.com`.
fn origins_match(a: &str, b: &str) -> bool {
    if eq_ignore_case(a, b) {
        return true;
    }
    let norm = |s: &str| {
        let s = strip_exact_suffix(s, ":80");
        strip_exact_suffix(s, ":443").to_string()
    };
    eq_ignore_case(&norm(a), &norm(b))
}

pub struct CorsFilter {
    allow_origin: OriginPolicy,
    allow_methods: Vec<Method>,
    max_age: Duration,
}

impl CorsFilter {
    pub fn new(allow_origin: OriginPolicy, allow_methods: Vec<Method>) -> Self {
        CorsFilter {
            allow_origin,
            allow_methods,
            max_age: Duration::from_secs(3600),
        }
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    fn is_preflight(request: &Request) -> bool {
        request.method() == Method::OPTIONS
            && request.header("access-control-request-method").is_some()
    }
}

impl Filter for CorsFilter {
    fn name(&self) -> &str {
        "cors"
    }

    fn pre_request(&self, request: &Request, scratch: &mut FilterScratch) -> FilterOutcome {
        let Some(origin) = request.header("origin") else {
            return FilterOutcome::Passed;
        };

        if !self.allow_origin.allows(origin) {
            return FilterOutcome::Passed;
        }

        if Self::is_preflight(request) {
            let methods = self
                .allow_methods
                .iter()
                .map(|m| m.as_str())
                .collect::<Vec<_>>()
                .join(",");

            let mut response = Response::new(StatusCode::OK);
            if let Ok(v) = HeaderValue::from_str(origin) {
                response.headers_mut().insert("access-control-allow-origin", v);
            }
            if let Ok(v) = HeaderValue::from_str(&methods) {
                response.headers_mut().insert("access-control-allow-methods", v);
            }
            response
                .headers_mut()
                .insert("access-control-max-age", HeaderValue::from(self.max_age.as_secs()));
            return FilterOutcome::Responded(response);
        }

        scratch.allow_origin = Some(origin.to_string());
        FilterOutcome::Passed
    }

    fn post_response(&self, headers: &mut http::HeaderMap, scratch: &FilterScratch) {
        if let Some(origin) = &scratch.allow_origin {
            if let Ok(v) = HeaderValue::from_str(origin) {
                headers.insert("access-control-allow-origin", v);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_port_suffix_is_stripped() {
        assert!(origins_match("https://example.com", "https://example.com:443"));
        assert!(origins_match("https://example.com", "https://example.com:80"));
    }

    #[test]
    fn substring_port_is_not_stripped() {
        assert!(!origins_match("https://example.com", "https://evil.example.com:8080"));
    }

    #[test]
    fn any_policy_allows_everything() {
        assert!(OriginPolicy::Any.allows("https://anything.example"));
    }

    fn parse(raw: &str) -> Request {
        match emberhttp_core::wire::try_parse_head(raw.as_bytes(), 8192).unwrap() {
            emberhttp_core::wire::ParseOutcome::Head { request, .. } => request,
            emberhttp_core::wire::ParseOutcome::Incomplete => panic!("test request must parse"),
        }
    }

    #[test]
    fn preflight_short_circuits_with_echoed_origin_and_allowed_methods() {
        let filter = CorsFilter::new(OriginPolicy::Any, vec![Method::GET, Method::POST, Method::OPTIONS]);
        let request = parse(
            "OPTIONS /anything HTTP/1.1\r\nOrigin: https://a.example\r\nAccess-Control-Request-Method: POST\r\n\r\n",
        );
        let mut scratch = FilterScratch::default();

        let response = match filter.pre_request(&request, &mut scratch) {
            FilterOutcome::Responded(response) => response,
            FilterOutcome::Passed => panic!("preflight request should short-circuit"),
        };

        assert_eq!(response.status(), StatusCode::OK);
        let encoded = response.encode();
        let text = String::from_utf8_lossy(&encoded);
        assert!(text.contains("access-control-allow-origin: https://a.example\r\n"));
        assert!(text.contains("access-control-allow-methods: GET,POST,OPTIONS\r\n"));
        assert!(text.contains("access-control-max-age: 3600\r\n"));
    }

    #[test]
    fn non_preflight_request_stashes_origin_for_post_response() {
        let filter = CorsFilter::new(OriginPolicy::Any, vec![Method::GET]);
        let request = parse("GET /hello HTTP/1.1\r\nOrigin: https://a.example\r\n\r\n");
        let mut scratch = FilterScratch::default();

        assert!(matches!(filter.pre_request(&request, &mut scratch), FilterOutcome::Passed));
        assert_eq!(scratch.allow_origin.as_deref(), Some("https://a.example"));

        let mut headers = http::HeaderMap::new();
        filter.post_response(&mut headers, &scratch);
        assert_eq!(headers.get("access-control-allow-origin").unwrap(), "https://a.example");
    }
}
