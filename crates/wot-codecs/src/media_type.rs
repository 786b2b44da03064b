/// Strips parameters (anything from the first `;` onward) and lowercases,
/// giving the canonical form used as the registry's lookup key and as the
/// comparison basis for `MediaTypeMismatch` checks.
///
/// `"application/json; charset=utf-8"` and `"Application/JSON"` both
/// canonicalize to `"application/json"`.
pub fn canonical_media_type(type_header: &str) -> String {
    type_header
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::canonical_media_type;

    #[test]
    fn strips_parameters_and_lowercases() {
        assert_eq!(
            canonical_media_type("Application/JSON; charset=utf-8"),
            "application/json"
        );
    }

    #[test]
    fn passes_through_bare_media_type() {
        assert_eq!(canonical_media_type("text/plain"), "text/plain");
    }
}
