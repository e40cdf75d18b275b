//! Small string primitives shared by the router and the reference filters.
//!
//! Nothing here is specific to HTTP; it exists so that case-folding and
//! whitespace handling stay consistent (and exhaustively tested) in one place
//! instead of being reimplemented ad hoc at each call site.

/// Case-insensitive ASCII equality, without allocating.
pub fn eq_ignore_case(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

/// Lowercases `s`, treating only the ASCII range.
///
/// HTTP header and method tokens are ASCII, so there's no reason to pull in
/// full Unicode case folding.
pub fn lower_ascii(s: &str) -> String {
    s.to_ascii_lowercase()
}

/// Trims ASCII whitespace from both ends, matching the set `httparse` treats
/// as optional whitespace (space and horizontal tab).
pub fn trim_ows(s: &str) -> &str {
    s.trim_matches(|c: char| c == ' ' || c == '\t')
}

/// Strips an exact `:port` suffix from a host/origin string, leaving the
/// input untouched if the suffix isn't present verbatim at the end.
///
/// This is intentionally a whole-suffix match rather than `contains`: an
/// origin like `https://evil.example.com:8080` must not be treated as if it
/// carried a stripped default port just because the digits `80` appear
/// somewhere inside it.
pub fn strip_exact_suffix<'a>(s: &'a str, suffix: &str) -> &'a str {
    s.strip_suffix(suffix).unwrap_or(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_exact_port_suffix_only() {
        assert_eq!(strip_exact_suffix("https://example.com:443", ":443"), "https://example.com");
        assert_eq!(strip_exact_suffix("https://example.com:80", ":80"), "https://example.com");
    }

    #[test]
    fn does_not_strip_substring_matches() {
        // the historical bug this guards against: ":80" appearing inside a
        // longer port number must not be treated as a default-port suffix.
        assert_eq!(
            strip_exact_suffix("https://evil.example.com:8080", ":80"),
            "https://evil.example.com:8080"
        );
    }

    #[test]
    fn lower_ascii_is_ascii_only() {
        assert_eq!(lower_ascii("Content-Type"), "content-type");
    }

    #[test]
    fn trim_ows_strips_space_and_tab() {
        assert_eq!(trim_ows("  \t value \t"), "value");
    }
}
