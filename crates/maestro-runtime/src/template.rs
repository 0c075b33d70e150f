//! `{key}` placeholder substitution for payload templates.

use std::collections::HashMap;

/// Replace every `{key}` placeholder with its value from `vars`.
///
/// Unknown placeholders are left intact, so a payload that legitimately
/// contains braces survives substitution unchanged. An unterminated
/// brace is treated as literal text.
pub fn substitute(template: &str, vars: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) => {
                let key = &after[..close];
                match vars.get(key) {
                    Some(value) => out.push_str(value),
                    None => {
                        out.push('{');
                        out.push_str(key);
                        out.push('}');
                    }
                }
                rest = &after[close + 1..];
            }
            None => {
                out.push_str(&rest[open..]);
                return out;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn replaces_known_placeholders() {
        let ctx = vars(&[("name", "maestro"), ("mode", "fast")]);
        assert_eq!(
            substitute("run {name} in {mode} mode", &ctx),
            "run maestro in fast mode"
        );
    }

    #[test]
    fn unknown_placeholders_are_left_intact() {
        let ctx = vars(&[("known", "yes")]);
        assert_eq!(
            substitute("{known} and {unknown}", &ctx),
            "yes and {unknown}"
        );
    }

    #[test]
    fn unterminated_brace_is_literal() {
        let ctx = vars(&[("x", "1")]);
        assert_eq!(substitute("broken {x and done", &ctx), "broken {x and done");
    }

    #[test]
    fn adjacent_placeholders_and_empty_template() {
        let ctx = vars(&[("a", "1"), ("b", "2")]);
        assert_eq!(substitute("{a}{b}", &ctx), "12");
        assert_eq!(substitute("", &ctx), "");
    }

    #[test]
    fn substituted_values_are_not_rescanned() {
        let ctx = vars(&[("a", "{b}"), ("b", "2")]);
        assert_eq!(substitute("{a}", &ctx), "{b}");
    }
}
