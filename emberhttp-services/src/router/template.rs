//! Route template compilation: turning `"/hello/{name}?nick_name&age"` into
//! either a literal path (fast-pathed through a `HashMap`) or a compiled,
//! case-insensitive regex plus the declared query parameter names.

use emberhttp_core::util::lower_ascii;
use regex::RegexBuilder;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unmatched '{{' in route template")]
    UnmatchedBrace,
    #[error("empty route template")]
    Empty,
}

#[derive(Debug, Clone)]
pub enum Pattern {
    Literal(String),
    Regex(regex::Regex),
}

#[derive(Debug, Clone)]
pub struct CompiledTemplate {
    /// The template text as registered, used to detect two registrations
    /// that compile to the same pattern.
    pub source: String,
    pub pattern: Pattern,
    pub path_arg_num: usize,
    pub query_names: Vec<String>,
}

pub fn compile(template: &str) -> Result<CompiledTemplate, TemplateError> {
    if template.is_empty() {
        return Err(TemplateError::Empty);
    }

    let (path_part, query_part) = match template.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (template, None),
    };

    let query_names: Vec<String> = match query_part {
        Some(q) if !q.is_empty() => q.split('&').map(lower_ascii).collect(),
        _ => Vec::new(),
    };

    let mut path_arg_num = 0usize;
    let mut regex_source = String::from("^");
    let mut literal = String::new();
    let mut is_dynamic = false;
    let mut chars = path_part.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '{' {
            is_dynamic = true;
            path_arg_num += 1;
            regex_source.push_str("([^/]*)");
            let mut closed = false;
            for inner in chars.by_ref() {
                if inner == '}' {
                    closed = true;
                    break;
                }
            }
            if !closed {
                return Err(TemplateError::UnmatchedBrace);
            }
        } else {
            // Every literal character, whether it precedes, follows, or sits
            // between placeholders, must survive into the compiled regex —
            // only `literal` (used solely to classify a placeholder-free
            // template) can afford to drop the distinction once `{...}` is seen.
            regex_source.push_str(&regex::escape(&c.to_string()));
            if !is_dynamic {
                literal.push(c);
            }
        }
    }

    if !is_dynamic {
        return Ok(CompiledTemplate {
            source: template.to_string(),
            pattern: Pattern::Literal(literal),
            path_arg_num: 0,
            query_names,
        });
    }

    regex_source.push('$');
    let regex = RegexBuilder::new(&regex_source)
        .case_insensitive(true)
        .build()
        .expect("generated pattern is always valid regex syntax");

    Ok(CompiledTemplate {
        source: template.to_string(),
        pattern: Pattern::Regex(regex),
        path_arg_num,
        query_names,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_template_has_no_captures() {
        let compiled = compile("/hello").unwrap();
        assert!(matches!(compiled.pattern, Pattern::Literal(ref s) if s == "/hello"));
        assert_eq!(compiled.path_arg_num, 0);
    }

    #[test]
    fn dynamic_template_compiles_regex_with_one_capture_per_placeholder() {
        let compiled = compile("/hello/{name}").unwrap();
        match &compiled.pattern {
            Pattern::Regex(re) => {
                let caps = re.captures("/hello/Ember").unwrap();
                assert_eq!(&caps[1], "Ember");
            }
            Pattern::Literal(_) => panic!("expected a regex pattern"),
        }
        assert_eq!(compiled.path_arg_num, 1);
    }

    #[test]
    fn query_names_are_lowercased_and_ordered() {
        let compiled = compile("/hello?Name&Nick_Name&Age").unwrap();
        assert_eq!(compiled.query_names, vec!["name", "nick_name", "age"]);
    }

    #[test]
    fn unmatched_brace_is_rejected() {
        assert_eq!(compile("/hello/{name").unwrap_err(), TemplateError::UnmatchedBrace);
    }

    #[test]
    fn literal_prefix_before_a_placeholder_constrains_the_match() {
        let compiled = compile("/hello/{name}").unwrap();
        match &compiled.pattern {
            Pattern::Regex(re) => {
                assert!(re.is_match("/hello/Ember"));
                assert!(!re.is_match("/other/Ember"));
                assert!(!re.is_match("Ember"));
            }
            Pattern::Literal(_) => panic!("expected a regex pattern"),
        }
    }

    #[test]
    fn literal_tail_after_a_placeholder_is_preserved() {
        let compiled = compile("/v{n}/x").unwrap();
        match &compiled.pattern {
            Pattern::Regex(re) => {
                let caps = re.captures("/v2/x").unwrap();
                assert_eq!(&caps[1], "2");
                assert!(!re.is_match("/v2/y"));
            }
            Pattern::Literal(_) => panic!("expected a regex pattern"),
        }
    }

    #[test]
    fn matching_is_case_insensitive() {
        let compiled = compile("/Hello/{name}").unwrap();
        match &compiled.pattern {
            Pattern::Regex(re) => assert!(re.is_match("/hello/ember")),
            Pattern::Literal(_) => panic!("expected a regex pattern"),
        }
    }
}
