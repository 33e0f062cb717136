/// Inline URL annotation for hyperlinks whose target is on the web.
use std::ops::Range;

use crate::markdown::Link;

const WEB_SCHEMES: &[&str] = &["http://", "https://"];

/// Append `(url)` right after the anchor text of every web link.
///
/// Each link annotates the first occurrence of its anchor text in `text` that no earlier link
/// has claimed. Matches are taken from the paragraph text only, never from URLs inserted by
/// other links. Links whose target is not an absolute http(s) URL are left as plain text.
pub fn annotate_links(text: &str, links: &[Link]) -> String {
    let mut edits: Vec<(Range<usize>, String)> = Vec::new();
    for link in links {
        if link.text.is_empty() || !is_web_url(&link.url) {
            continue;
        }
        let len = link.text.len();
        let Some(start) = text
            .match_indices(link.text.as_str())
            .map(|(start, _)| start)
            .find(|&start| !overlaps(&edits, &(start..start + len)))
        else {
            continue;
        };
        edits.push((start..start + len, format!("{}({})", link.text, link.url)));
    }
    edits.sort_by_key(|(range, _)| range.start);

    let mut out = String::with_capacity(text.len());
    let mut pos = 0;
    for (range, annotated) in edits {
        out.push_str(&text[pos..range.start]);
        out.push_str(&annotated);
        pos = range.end;
    }
    out.push_str(&text[pos..]);
    out
}

fn overlaps(edits: &[(Range<usize>, String)], span: &Range<usize>) -> bool {
    edits
        .iter()
        .any(|(range, _)| range.start < span.end && span.start < range.end)
}

fn is_web_url(url: &str) -> bool {
    WEB_SCHEMES.iter().any(|scheme| url.starts_with(scheme))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(text: &str, url: &str) -> Link {
        Link {
            text: text.to_string(),
            url: url.to_string(),
        }
    }

    #[test]
    fn web_link_is_annotated() {
        let out = annotate_links(
            "Read the guide first.",
            &[link("the guide", "https://example.com/guide")],
        );
        assert_eq!(out, "Read the guide(https://example.com/guide) first.");
    }

    #[test]
    fn repeated_anchor_text_annotated_once() {
        let out = annotate_links(
            "Use retries. See retries.",
            &[link("retries", "http://example.com/r")],
        );
        assert_eq!(out, "Use retries(http://example.com/r). See retries.");
    }

    #[test]
    fn relative_and_fragment_links_untouched() {
        let text = "See naming and below.";
        let out = annotate_links(
            text,
            &[
                link("naming", "general_naming.html"),
                link("below", "#details"),
                link("mail", "mailto:a@b.c"),
            ],
        );
        assert_eq!(out, text);
    }

    #[test]
    fn anchor_inside_an_earlier_url_is_not_matched() {
        let out = annotate_links(
            "See docs and example.",
            &[
                link("docs", "https://docs.example.com"),
                link("example", "https://example.com"),
            ],
        );
        assert_eq!(
            out,
            "See docs(https://docs.example.com) and example(https://example.com)."
        );
    }

    #[test]
    fn links_sharing_anchor_text_annotate_successive_occurrences() {
        let out = annotate_links(
            "Read more, then read more.",
            &[
                link("more", "https://a.example.com"),
                link("more", "https://b.example.com"),
            ],
        );
        assert_eq!(
            out,
            "Read more(https://a.example.com), then read more(https://b.example.com)."
        );
    }

    #[test]
    fn empty_anchor_text_is_skipped() {
        assert_eq!(annotate_links("x", &[link("", "https://e.com")]), "x");
    }
}
