//! RFC 6570 URI Template expansion, level 3.
//!
//! Web of Things forms occasionally carry templated `href`s such as
//! `http://thing/props/{propName}` or `http://thing/search{?q,limit}`.
//! This crate expands those templates against the `uriVariables` supplied
//! through `InteractionOptions` at dispatch time.
//!
//! Only the operators WoT forms actually use are implemented: unadorned
//! simple expansion (`{var}`), the query-string forms (`{?var}` and
//! `{&var}`), the path-segment form (`{/var}`) and the path-style
//! parameter form (`{;var}`). Reserved (`+`) and fragment (`#`) expansion
//! and level-4 prefix/explode modifiers are not needed by any known
//! binding and are not implemented; an expression using them falls back
//! to simple expansion rather than failing the whole dispatch.

use std::collections::HashMap;
use std::fmt::Write as _;

/// Outcome of expanding a template against a variable map.
///
/// Dispatch reuses the original form verbatim whenever expansion leaves
/// the href unchanged, so "did anything change" is part of the return
/// value instead of requiring a separate string comparison at call sites.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expansion {
    /// The template had no variables, or none of them were present in the
    /// variable map: the output equals the input template.
    Unchanged(String),
    /// At least one variable was substituted.
    Expanded(String),
}

impl Expansion {
    /// Unwraps the expanded string, discarding whether it changed.
    pub fn into_string(self) -> String {
        match self {
            Expansion::Unchanged(s) | Expansion::Expanded(s) => s,
        }
    }

    /// Borrows the expanded string.
    pub fn as_str(&self) -> &str {
        match self {
            Expansion::Unchanged(s) | Expansion::Expanded(s) => s,
        }
    }

    /// True if expansion substituted at least one variable.
    pub fn was_changed(&self) -> bool {
        matches!(self, Expansion::Expanded(_))
    }
}

/// Expands `template` against `vars`.
///
/// An empty `vars` map, or a template with no `{...}` expressions, always
/// yields `Expansion::Unchanged` with the template copied verbatim.
pub fn expand(template: &str, vars: &HashMap<String, String>) -> Expansion {
    if !template.contains('{') {
        return Expansion::Unchanged(template.to_string());
    }

    let mut out = String::with_capacity(template.len());
    let mut changed = false;
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        match after.find('}') {
            Some(end) => {
                let expr = &after[..end];
                changed |= expand_expression(expr, vars, &mut out);
                rest = &after[end + 1..];
            }
            None => {
                // Unterminated expression: nothing sane to do but pass it through.
                out.push_str(&rest[start..]);
                rest = "";
                break;
            }
        }
    }
    out.push_str(rest);

    if changed {
        Expansion::Expanded(out)
    } else {
        Expansion::Unchanged(out)
    }
}

enum Operator {
    Simple,
    Query,
    QueryContinuation,
    PathSegment,
    PathParameter,
}

/// Expands one `{...}` body into `out`, returning whether any variable in
/// it actually resolved (an expression whose variables are all absent
/// contributes nothing, per RFC 6570 §3.2.1).
fn expand_expression(expr: &str, vars: &HashMap<String, String>, out: &mut String) -> bool {
    let (op, names) = split_operator(expr);
    let resolved: Vec<(&str, &str)> = names
        .iter()
        .filter_map(|name| vars.get(*name).map(|v| (*name, v.as_str())))
        .collect();

    if resolved.is_empty() {
        return false;
    }

    match op {
        Operator::Query => {
            for (i, (name, value)) in resolved.iter().enumerate() {
                out.push(if i == 0 { '?' } else { '&' });
                out.push_str(name);
                out.push('=');
                out.push_str(&percent_encode(value));
            }
        }
        Operator::QueryContinuation => {
            for (name, value) in &resolved {
                out.push('&');
                out.push_str(name);
                out.push('=');
                out.push_str(&percent_encode(value));
            }
        }
        Operator::PathSegment => {
            for (_, value) in &resolved {
                out.push('/');
                out.push_str(&percent_encode(value));
            }
        }
        Operator::PathParameter => {
            for (name, value) in &resolved {
                out.push(';');
                out.push_str(name);
                if !value.is_empty() {
                    out.push('=');
                    out.push_str(&percent_encode(value));
                }
            }
        }
        Operator::Simple => {
            for (i, (_, value)) in resolved.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&percent_encode(value));
            }
        }
    }
    true
}

fn split_operator(expr: &str) -> (Operator, Vec<&str>) {
    let (op, body) = match expr.chars().next() {
        Some('?') => (Operator::Query, &expr[1..]),
        Some('&') => (Operator::QueryContinuation, &expr[1..]),
        Some('/') => (Operator::PathSegment, &expr[1..]),
        Some(';') => (Operator::PathParameter, &expr[1..]),
        _ => (Operator::Simple, expr),
    };
    let names = body
        .split(',')
        .map(|raw| raw.split([':', '*']).next().unwrap_or(raw).trim())
        .filter(|s| !s.is_empty())
        .collect();
    (op, names)
}

/// Percent-encodes everything outside RFC 3986 `unreserved`.
fn percent_encode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char)
            }
            _ => {
                let _ = write!(out, "%{byte:02X}");
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn identity_on_templates_without_variables() {
        let empty = HashMap::new();
        let result = expand("http://thing/props/temp", &empty);
        assert_eq!(result, Expansion::Unchanged("http://thing/props/temp".into()));
    }

    #[test]
    fn empty_variable_map_is_identity_even_with_expressions() {
        let empty = HashMap::new();
        let result = expand("http://thing/props/{name}", &empty);
        assert!(!result.was_changed());
        assert_eq!(result.as_str(), "http://thing/props/{name}");
    }

    #[test]
    fn simple_expansion() {
        let v = vars(&[("name", "temperature")]);
        let result = expand("http://thing/props/{name}", &v);
        assert_eq!(result.as_str(), "http://thing/props/temperature");
        assert!(result.was_changed());
    }

    #[test]
    fn query_expansion_joins_with_ampersand() {
        let v = vars(&[("q", "a b"), ("limit", "10")]);
        let result = expand("http://thing/search{?q,limit}", &v);
        assert_eq!(result.as_str(), "http://thing/search?q=a%20b&limit=10");
    }

    #[test]
    fn query_continuation_always_prefixes_ampersand() {
        let v = vars(&[("limit", "10")]);
        let result = expand("http://thing/search?q=x{&limit}", &v);
        assert_eq!(result.as_str(), "http://thing/search?q=x&limit=10");
    }

    #[test]
    fn path_segment_expansion() {
        let v = vars(&[("id", "42")]);
        let result = expand("http://thing/items{/id}", &v);
        assert_eq!(result.as_str(), "http://thing/items/42");
    }

    #[test]
    fn path_parameter_expansion_omits_equals_for_empty_value() {
        let v = vars(&[("flag", "")]);
        let result = expand("http://thing/x{;flag}", &v);
        assert_eq!(result.as_str(), "http://thing/x;flag");
    }

    #[test]
    fn missing_variables_drop_the_expression() {
        let v = vars(&[("other", "x")]);
        let result = expand("http://thing/search{?q}", &v);
        assert!(!result.was_changed());
        assert_eq!(result.as_str(), "http://thing/search");
    }
}

#[cfg(test)]
mod proptests {
    use std::collections::HashMap;

    use proptest::prelude::*;

    use super::{expand, Expansion};

    /// Templates built from path-safe literal characters only — excludes
    /// `{`/`}` so every generated string is guaranteed to contain no
    /// expressions at all.
    fn template_without_variables() -> impl Strategy<Value = String> {
        "[a-zA-Z0-9/:._-]{0,40}".prop_map(|s| format!("http://thing/{s}"))
    }

    proptest! {
        #[test]
        fn empty_variable_map_is_identity_on_variable_free_templates(template in template_without_variables()) {
            let result = expand(&template, &HashMap::new());
            prop_assert_eq!(result, Expansion::Unchanged(template));
        }
    }
}
