/// Replace `${ENV_VAR}` and `${ENV_VAR:-fallback}` placeholders.
///
/// A variable that is unset and has no fallback is left as-is.
pub fn substitute_env(input: &str) -> String {
    substitute_env_with(input, |name| std::env::var(name).ok())
}

/// Same as [`substitute_env`] with an injectable lookup, so tests never touch
/// the process environment.
pub fn substitute_env_with(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            // Unterminated: keep the remainder verbatim.
            out.push_str(&rest[start..]);
            return out;
        };

        let body = &after[..end];
        let (name, fallback) = match body.split_once(":-") {
            Some((name, fallback)) => (name, Some(fallback)),
            None => (body, None),
        };

        match (valid_name(name).then(|| lookup(name)).flatten(), fallback) {
            (Some(value), _) => out.push_str(&value),
            (None, Some(fallback)) if valid_name(name) => out.push_str(fallback),
            _ => out.push_str(&rest[start..start + 2 + end + 1]),
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}

fn valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(name: &str) -> Option<String> {
        match name {
            "WAYFINDER_TEST_KEY" => Some("sk-test".to_string()),
            "WAYFINDER_PORT" => Some("4000".to_string()),
            _ => None,
        }
    }

    #[test]
    fn substitutes_known_var() {
        assert_eq!(
            substitute_env_with("api_key = \"${WAYFINDER_TEST_KEY}\"", lookup),
            "api_key = \"sk-test\""
        );
    }

    #[test]
    fn leaves_unknown_var() {
        assert_eq!(
            substitute_env_with("${WAYFINDER_MISSING}", lookup),
            "${WAYFINDER_MISSING}"
        );
    }

    #[test]
    fn uses_fallback_when_unset() {
        assert_eq!(
            substitute_env_with("port = ${WAYFINDER_MISSING:-3000}", lookup),
            "port = 3000"
        );
        assert_eq!(
            substitute_env_with("port = ${WAYFINDER_PORT:-3000}", lookup),
            "port = 4000"
        );
    }

    #[test]
    fn multiple_placeholders_on_one_line() {
        assert_eq!(
            substitute_env_with("${WAYFINDER_PORT}/${WAYFINDER_TEST_KEY}", lookup),
            "4000/sk-test"
        );
    }

    #[test]
    fn unterminated_placeholder_is_literal() {
        assert_eq!(substitute_env_with("a ${OPEN", lookup), "a ${OPEN");
    }

    #[test]
    fn no_placeholders() {
        assert_eq!(substitute_env("plain text"), "plain text");
    }
}
