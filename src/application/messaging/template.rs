//! `$name` message templates

use once_cell::sync::Lazy;
use regex_lite::{Captures, Regex};

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\$(?:(?P<escaped>\$)|(?P<named>[_a-zA-Z][_a-zA-Z0-9]*)|\{(?P<braced>[_a-zA-Z][_a-zA-Z0-9]*)\}|(?P<invalid>))",
    )
    .expect("placeholder pattern is valid")
});

/// Message template with `$name` / `${name}` placeholders and `$$` escapes
#[derive(Debug, Clone, Copy)]
pub struct Template<'a> {
    template: &'a str,
}

impl<'a> Template<'a> {
    pub fn new(template: &'a str) -> Self {
        Self { template }
    }

    /// Replaces known placeholders; unknown ones and stray `$` stay as written.
    pub fn safe_substitute(&self, values: &[(&str, String)]) -> String {
        PLACEHOLDER
            .replace_all(self.template, |caps: &Captures| {
                if caps.name("escaped").is_some() {
                    return "$".to_string();
                }
                let name = caps.name("named").or_else(|| caps.name("braced"));
                match name {
                    Some(name) => values
                        .iter()
                        .find(|(key, _)| *key == name.as_str())
                        .map(|(_, value)| value.clone())
                        .unwrap_or_else(|| caps[0].to_string()),
                    None => caps[0].to_string(),
                }
            })
            .into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values() -> Vec<(&'static str, String)> {
        vec![
            ("username", "jack#1142".to_string()),
            ("server", "Red".to_string()),
        ]
    }

    #[test]
    fn test_substitutes_named_and_braced() {
        let out = Template::new("$username got banned from ${server}!").safe_substitute(&values());
        assert_eq!(out, "jack#1142 got banned from Red!");
    }

    #[test]
    fn test_unknown_placeholders_pass_through() {
        let out = Template::new("$username $nope ${nope} $ 5$").safe_substitute(&values());
        assert_eq!(out, "jack#1142 $nope ${nope} $ 5$");
    }

    #[test]
    fn test_escape() {
        let out = Template::new("costs $$5 on $server").safe_substitute(&values());
        assert_eq!(out, "costs $5 on Red");
    }

    #[test]
    fn test_identifier_is_greedy() {
        // `$servers` is a different placeholder than `$server`
        let out = Template::new("$servers / ${server}s").safe_substitute(&values());
        assert_eq!(out, "$servers / Reds");
    }

    #[test]
    fn test_idempotent_without_dollar_in_values() {
        for template in ["$username was banned", "$mention $count boost$plural", "plain", "${x} $"] {
            let once = Template::new(template).safe_substitute(&values());
            let twice = Template::new(&once).safe_substitute(&values());
            assert_eq!(once, twice);
        }
    }
}
