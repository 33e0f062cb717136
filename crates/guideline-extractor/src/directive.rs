/// Requirement directive normalization.
///
/// Guideline paragraphs open with Jekyll includes such as
/// `{% include requirement/MUST id="general-auth" %}`. These are rewritten to plain modal
/// phrases, the stable id is lifted out, and a leading `:icon:` marker is dropped.
use regex::Regex;

use crate::markdown::Paragraph;

const ID_CHARS: &str = r"[a-zA-Z0-9_-]+";

/// Negated directives. Applied before `POSITIVE` so a `MUST` pattern can never eat the
/// front of a `MUSTNOT` token.
const NEGATIVE: &[(&str, &str)] = &[
    ("MUSTNOT", "DO NOT"),
    ("SHOULDNOT", "YOU SHOULD NOT"),
];

/// `(kind, replacement, id optional)`
const POSITIVE: &[(&str, &str, bool)] = &[
    ("MAY", "YOU MAY", false),
    ("MUST", "DO", true),
    ("SHOULD", "YOU SHOULD", true),
];

/// Compiled substitution table, built once and shared by every paragraph of a run.
#[derive(Debug)]
pub struct Directives {
    id: Regex,
    icon: Regex,
    substitutions: Vec<(Regex, String)>,
}

impl Directives {
    pub fn new() -> Self {
        let mut substitutions = Vec::new();
        for (kind, replacement) in NEGATIVE {
            substitutions.push((with_id(kind), format!("{replacement} ")));
        }
        for (kind, replacement, bare_allowed) in POSITIVE {
            substitutions.push((with_id(kind), format!("{replacement} ")));
            if *bare_allowed {
                substitutions.push((without_id(kind), format!("{replacement} ")));
            }
        }

        Self {
            id: Regex::new(&format!(r#"id="({ID_CHARS})""#)).expect("valid regex"),
            icon: Regex::new(r"^:[a-z_]+: ").expect("valid regex"),
            substitutions,
        }
    }

    /// Returns the normalized text and the paragraph's id, if any.
    ///
    /// `raw` is the paragraph text after include expansion. The id comes from the first
    /// inline `id="..."` attribute of `raw`, then of the paragraph's own text, then from the
    /// `name` of a leading `<a name="...">` anchor.
    pub fn normalize(&self, raw: &str, paragraph: &Paragraph) -> (String, Option<String>) {
        let id = self
            .extract_inline_id(raw)
            .or_else(|| self.extract_inline_id(&paragraph.text))
            .or_else(|| paragraph.first_name.clone());
        (self.replace(raw), id)
    }

    pub fn extract_inline_id(&self, raw: &str) -> Option<String> {
        self.id.captures(raw).map(|caps| caps[1].to_string())
    }

    /// Rewrite every directive to its modal phrase and strip a leading icon marker.
    ///
    /// A directive swallows the whitespace after it and its phrase is always followed by
    /// exactly one space, so `%}Do` and `%} Do` both read `DO Do`.
    pub fn replace(&self, raw: &str) -> String {
        let mut text = raw.to_string();
        for (pattern, replacement) in &self.substitutions {
            if pattern.is_match(&text) {
                text = pattern
                    .replace_all(&text, regex::NoExpand(replacement.as_str()))
                    .into_owned();
            }
        }
        self.icon.replace(&text, "").into_owned()
    }
}

impl Default for Directives {
    fn default() -> Self {
        Self::new()
    }
}

fn with_id(kind: &str) -> Regex {
    Regex::new(&format!(
        r#"\{{% include requirement/{kind} id="{ID_CHARS}" %\}}\s*"#
    ))
    .expect("valid regex")
}

fn without_id(kind: &str) -> Regex {
    Regex::new(&format!(r"\{{% include requirement/{kind} %\}}\s*")).expect("valid regex")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalize(raw: &str) -> (String, Option<String>) {
        Directives::new().normalize(raw, &Paragraph::default())
    }

    #[test]
    fn must_with_id() {
        assert_eq!(
            normalize(r#"{% include requirement/MUST id="x" %}Do the thing."#),
            ("DO Do the thing.".to_string(), Some("x".to_string()))
        );
    }

    #[test]
    fn should_not_with_id() {
        assert_eq!(
            normalize(r#"{% include requirement/SHOULDNOT id="y" %}Do not do this."#),
            (
                "YOU SHOULD NOT Do not do this.".to_string(),
                Some("y".to_string())
            )
        );
    }

    #[test]
    fn every_directive_kind() {
        let d = Directives::new();
        assert_eq!(d.replace(r#"{% include requirement/MAY id="a" %} x"#), "YOU MAY x");
        assert_eq!(d.replace(r#"{% include requirement/MUSTNOT id="a" %} x"#), "DO NOT x");
        assert_eq!(d.replace(r#"{% include requirement/SHOULD id="a" %} x"#), "YOU SHOULD x");
        assert_eq!(d.replace("{% include requirement/MUST %} x"), "DO x");
        assert_eq!(d.replace("{% include requirement/SHOULD %} x"), "YOU SHOULD x");
    }

    #[test]
    fn bare_negative_and_may_directives_are_left_alone() {
        let d = Directives::new();
        assert_eq!(
            d.replace("{% include requirement/MUSTNOT %} x"),
            "{% include requirement/MUSTNOT %} x"
        );
        assert_eq!(
            d.replace("{% include requirement/MAY %} x"),
            "{% include requirement/MAY %} x"
        );
    }

    #[test]
    fn bare_directive_has_no_id() {
        assert_eq!(
            normalize("{% include requirement/MUST %} Use HTTPS."),
            ("DO Use HTTPS.".to_string(), None)
        );
    }

    #[test]
    fn id_falls_back_to_leading_anchor_name() {
        let paragraph = Paragraph {
            first_name: Some("ios-naming".to_string()),
            ..Paragraph::default()
        };
        let (text, id) = Directives::new().normalize("Prefix names.", &paragraph);
        assert_eq!(text, "Prefix names.");
        assert_eq!(id.as_deref(), Some("ios-naming"));
    }

    #[test]
    fn inline_id_wins_over_anchor_name() {
        let paragraph = Paragraph {
            first_name: Some("anchor".to_string()),
            ..Paragraph::default()
        };
        let (_, id) = Directives::new()
            .normalize(r#"{% include requirement/MAY id="inline" %} x"#, &paragraph);
        assert_eq!(id.as_deref(), Some("inline"));
    }

    #[test]
    fn id_survives_include_expansion() {
        let paragraph = Paragraph {
            text: r#"{% include requirement/MUST id="kept" %}{% include_relative x.md %}"#
                .to_string(),
            ..Paragraph::default()
        };
        let (text, id) = Directives::new().normalize("Included body.", &paragraph);
        assert_eq!(text, "Included body.");
        assert_eq!(id.as_deref(), Some("kept"));
    }

    #[test]
    fn leading_icon_is_stripped_once() {
        let d = Directives::new();
        assert_eq!(d.replace(":warning: Careful :x: here"), "Careful :x: here");
        assert_eq!(d.replace("No :icon: here"), "No :icon: here");
    }

    #[test]
    fn multiple_directives_in_one_paragraph() {
        let d = Directives::new();
        let raw = r#"{% include requirement/MUST id="a" %} this and {% include requirement/MUSTNOT id="b" %} that."#;
        assert_eq!(d.replace(raw), "DO this and DO NOT that.");
        assert_eq!(d.extract_inline_id(raw).as_deref(), Some("a"));
    }
}
