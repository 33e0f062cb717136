/// CommonMark rendering into the small set of block kinds the extractor understands.
///
/// The document is parsed with `pulldown-cmark` (no extensions, so pipe tables stay plain
/// paragraphs) and the event stream is folded into `Block`s in document order:
/// - headings (levels 1-6) carry their plain text
/// - paragraphs carry plain text, their hyperlinks and the `name` attribute of a leading
///   inline HTML element such as `<a name="..."></a>`
/// - lists carry one text per top-level item; nested lists and item paragraphs are
///   flattened into the item text, except item paragraphs carrying a guideline tag (an
///   `id="..."` attribute or a leading named anchor), which follow the list as paragraphs
/// - code blocks are rendered to HTML (`<pre><code class="language-x">`)
/// - anything else is `Block::Other`
use pulldown_cmark::{html, Event, Options, Parser, Tag, TagEnd};
use regex::Regex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Heading { level: u8, text: String },
    Paragraph(Paragraph),
    List { items: Vec<String> },
    Preformatted { html: String },
    Other,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Paragraph {
    pub text: String,
    pub links: Vec<Link>,
    /// `name` attribute of the paragraph's first child, when that child is inline HTML.
    pub first_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub text: String,
    pub url: String,
}

#[derive(Debug)]
pub struct BlockParser {
    name_re: Regex,
    tag_re: Regex,
}

impl BlockParser {
    pub fn new() -> Self {
        Self {
            name_re: Regex::new(r#"\bname\s*=\s*["']([^"']+)["']"#).expect("valid regex"),
            tag_re: Regex::new(r#"id="[a-zA-Z0-9_-]+""#).expect("valid regex"),
        }
    }

    /// Parse `markdown` and return its blocks in document order.
    pub fn read_blocks(&self, markdown: &str) -> Vec<Block> {
        let mut reader = BlockReader::new(&self.name_re, &self.tag_re);
        for event in Parser::new_ext(markdown, Options::empty()) {
            reader.push(event);
        }
        reader.blocks
    }
}

impl Default for BlockParser {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Default)]
struct ParagraphBuilder {
    paragraph: Paragraph,
    seen_child: bool,
    open_link: Option<Link>,
}

impl ParagraphBuilder {
    fn push(&mut self, event: Event<'_>, image_depth: &mut usize, name_re: &Regex) {
        let first_child = !self.seen_child;
        self.seen_child = true;

        match event {
            Event::InlineHtml(raw) => {
                if first_child {
                    self.paragraph.first_name =
                        name_re.captures(&raw).map(|caps| caps[1].to_string());
                }
            }
            Event::Start(Tag::Image { .. }) => *image_depth += 1,
            Event::End(TagEnd::Image) => *image_depth = image_depth.saturating_sub(1),
            _ if *image_depth > 0 => {}
            Event::Start(Tag::Link { dest_url, .. }) => {
                self.open_link = Some(Link {
                    text: String::new(),
                    url: dest_url.to_string(),
                });
            }
            Event::End(TagEnd::Link) => {
                if let Some(link) = self.open_link.take() {
                    self.paragraph.links.push(link);
                }
            }
            Event::Text(t) | Event::Code(t) => {
                self.paragraph.text.push_str(&t);
                if let Some(link) = self.open_link.as_mut() {
                    link.text.push_str(&t);
                }
            }
            Event::SoftBreak | Event::HardBreak => self.paragraph.text.push('\n'),
            _ => {}
        }
    }
}

struct BlockReader<'a, 're> {
    name_re: &'re Regex,
    tag_re: &'re Regex,
    blocks: Vec<Block>,
    heading: Option<(u8, String)>,
    paragraph: Option<ParagraphBuilder>,
    code: Option<Vec<Event<'a>>>,
    list_depth: usize,
    items: Vec<String>,
    /// Inline run of the list item being read.
    segment: Option<ParagraphBuilder>,
    /// Tagged item paragraphs, emitted once the outermost list closes.
    deferred: Vec<Paragraph>,
    image_depth: usize,
}

impl<'a, 're> BlockReader<'a, 're> {
    fn new(name_re: &'re Regex, tag_re: &'re Regex) -> Self {
        Self {
            name_re,
            tag_re,
            blocks: Vec::new(),
            heading: None,
            paragraph: None,
            code: None,
            list_depth: 0,
            items: Vec::new(),
            segment: None,
            deferred: Vec::new(),
            image_depth: 0,
        }
    }

    fn push(&mut self, event: Event<'a>) {
        if let Some(code) = self.code.as_mut() {
            let done = matches!(event, Event::End(TagEnd::CodeBlock));
            code.push(event);
            if done {
                let events = self.code.take().unwrap_or_default();
                let mut rendered = String::new();
                html::push_html(&mut rendered, events.into_iter());
                self.blocks.push(Block::Preformatted { html: rendered });
            }
            return;
        }

        match event {
            Event::Start(Tag::List(_)) => {
                self.close_segment();
                self.list_depth += 1;
                if self.list_depth == 1 {
                    self.items.clear();
                    self.deferred.clear();
                }
            }
            Event::End(TagEnd::List(_)) => {
                self.close_segment();
                self.list_depth = self.list_depth.saturating_sub(1);
                if self.list_depth == 0 {
                    let mut items = std::mem::take(&mut self.items);
                    items.retain(|item| !item.is_empty());
                    if !items.is_empty() {
                        self.blocks.push(Block::List { items });
                    }
                    let deferred = std::mem::take(&mut self.deferred);
                    self.blocks.extend(deferred.into_iter().map(Block::Paragraph));
                }
            }
            Event::Start(Tag::Item) => {
                self.close_segment();
                if self.list_depth == 1 {
                    self.items.push(String::new());
                }
            }
            Event::End(TagEnd::Item)
            | Event::Start(Tag::Paragraph)
            | Event::End(TagEnd::Paragraph)
            | Event::Start(Tag::CodeBlock(_))
            | Event::End(TagEnd::CodeBlock)
                if self.list_depth > 0 =>
            {
                self.close_segment()
            }
            _ if self.list_depth > 0 => {
                let builder = self.segment.get_or_insert_with(ParagraphBuilder::default);
                builder.push(event, &mut self.image_depth, self.name_re);
            }

            Event::Start(Tag::Heading { level, .. }) => {
                self.heading = Some((level as u8, String::new()));
            }
            Event::End(TagEnd::Heading(_)) => {
                if let Some((level, text)) = self.heading.take() {
                    self.blocks.push(Block::Heading { level, text });
                }
            }
            Event::Start(Tag::Paragraph) => {
                self.paragraph = Some(ParagraphBuilder::default());
            }
            Event::End(TagEnd::Paragraph) => {
                if let Some(builder) = self.paragraph.take() {
                    self.blocks.push(Block::Paragraph(builder.paragraph));
                }
            }
            Event::Start(Tag::CodeBlock(kind)) => {
                self.code = Some(vec![Event::Start(Tag::CodeBlock(kind))]);
            }
            Event::Start(Tag::HtmlBlock) | Event::Rule => self.blocks.push(Block::Other),
            event => self.push_inline_event(event),
        }
    }

    fn push_inline_event(&mut self, event: Event<'a>) {
        if let Some((_, text)) = self.heading.as_mut() {
            match event {
                Event::Text(t) | Event::Code(t) => text.push_str(&t),
                Event::SoftBreak | Event::HardBreak => text.push('\n'),
                _ => {}
            }
            return;
        }

        if let Some(builder) = self.paragraph.as_mut() {
            builder.push(event, &mut self.image_depth, self.name_re);
        }
    }

    /// Finish the current item run. A tagged run becomes a standalone paragraph; anything
    /// else is folded into the text of the enclosing top-level item.
    fn close_segment(&mut self) {
        let Some(builder) = self.segment.take() else {
            return;
        };
        let paragraph = builder.paragraph;
        if paragraph.first_name.is_some() || self.tag_re.is_match(&paragraph.text) {
            self.deferred.push(paragraph);
            return;
        }
        if paragraph.text.is_empty() {
            return;
        }
        if let Some(item) = self.items.last_mut() {
            if !item.is_empty() && !item.ends_with('\n') {
                item.push('\n');
            }
            item.push_str(&paragraph.text);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_blocks(markdown: &str) -> Vec<Block> {
        BlockParser::new().read_blocks(markdown)
    }

    fn paragraph(block: &Block) -> &Paragraph {
        match block {
            Block::Paragraph(p) => p,
            other => panic!("expected paragraph, got {other:?}"),
        }
    }

    #[test]
    fn headings_and_paragraphs_in_order() {
        let blocks = read_blocks("# Naming\n\nFirst.\n\n## Casing\n\nSecond\nline.\n");
        assert_eq!(blocks.len(), 4);
        assert_eq!(
            blocks[0],
            Block::Heading {
                level: 1,
                text: "Naming".to_string()
            }
        );
        assert_eq!(paragraph(&blocks[1]).text, "First.");
        assert!(matches!(&blocks[2], Block::Heading { level: 2, text } if text == "Casing"));
        assert_eq!(paragraph(&blocks[3]).text, "Second\nline.");
    }

    #[test]
    fn heading_text_includes_inline_code() {
        let blocks = read_blocks("### The `Client` type\n");
        assert_eq!(
            blocks[0],
            Block::Heading {
                level: 3,
                text: "The Client type".to_string()
            }
        );
    }

    #[test]
    fn directive_text_is_preserved_verbatim() {
        let blocks = read_blocks("{% include requirement/MUST id=\"x\" %} Do the thing.\n");
        assert_eq!(
            paragraph(&blocks[0]).text,
            "{% include requirement/MUST id=\"x\" %} Do the thing."
        );
    }

    #[test]
    fn links_are_collected_with_anchor_text() {
        let blocks = read_blocks("See [the docs](https://example.com/docs) and [local](./x.md).\n");
        let p = paragraph(&blocks[0]);
        assert_eq!(p.text, "See the docs and local.");
        assert_eq!(
            p.links,
            vec![
                Link {
                    text: "the docs".to_string(),
                    url: "https://example.com/docs".to_string()
                },
                Link {
                    text: "local".to_string(),
                    url: "./x.md".to_string()
                },
            ]
        );
    }

    #[test]
    fn leading_anchor_name_is_captured_and_hidden() {
        let blocks = read_blocks("<a name=\"dotnet-client\"></a>Use the client.\n");
        let p = paragraph(&blocks[0]);
        assert_eq!(p.first_name.as_deref(), Some("dotnet-client"));
        assert_eq!(p.text, "Use the client.");
    }

    #[test]
    fn anchor_name_after_text_is_not_first_child() {
        let blocks = read_blocks("Use <a name=\"late\"></a>the client.\n");
        assert_eq!(paragraph(&blocks[0]).first_name, None);
    }

    #[test]
    fn image_alt_text_is_dropped() {
        let blocks = read_blocks("Look ![diagram](d.png) here.\n");
        assert_eq!(paragraph(&blocks[0]).text, "Look  here.");
    }

    #[test]
    fn list_items_flatten_nested_content() {
        let blocks = read_blocks("- one\n- two\n  - inner\n- `three`\n");
        assert_eq!(blocks.len(), 1);
        assert_eq!(
            blocks[0],
            Block::List {
                items: vec!["one".to_string(), "two\ninner".to_string(), "three".to_string()]
            }
        );
    }

    #[test]
    fn loose_list_paragraphs_stay_in_items() {
        let blocks = read_blocks("1. first\n\n2. second\n");
        assert_eq!(
            blocks,
            vec![Block::List {
                items: vec!["first".to_string(), "second".to_string()]
            }]
        );
    }

    #[test]
    fn tagged_item_paragraph_follows_the_list() {
        let blocks = read_blocks(
            "- {% include requirement/MUST id=\"b\" %} In [docs](https://e.com).\n\n- other\n",
        );
        assert_eq!(
            blocks[0],
            Block::List {
                items: vec!["other".to_string()]
            }
        );
        let p = paragraph(&blocks[1]);
        assert_eq!(p.text, "{% include requirement/MUST id=\"b\" %} In docs.");
        assert_eq!(p.links[0].url, "https://e.com");
        assert_eq!(blocks.len(), 2);
    }

    #[test]
    fn named_anchor_item_in_nested_list_is_lifted() {
        let blocks = read_blocks("- outer\n  - <a name=\"n1\"></a>Inner rule.\n");
        assert_eq!(
            blocks[0],
            Block::List {
                items: vec!["outer".to_string()]
            }
        );
        let p = paragraph(&blocks[1]);
        assert_eq!(p.first_name.as_deref(), Some("n1"));
        assert_eq!(p.text, "Inner rule.");
    }

    #[test]
    fn fenced_code_renders_to_html() {
        let blocks = read_blocks("```python\nprint(1 < 2)\n```\n");
        assert_eq!(
            blocks[0],
            Block::Preformatted {
                html: "<pre><code class=\"language-python\">print(1 &lt; 2)\n</code></pre>\n"
                    .to_string()
            }
        );
    }

    #[test]
    fn blockquote_paragraphs_are_walked_and_rules_are_other() {
        let blocks = read_blocks("> quoted\n\n---\n");
        assert_eq!(paragraph(&blocks[0]).text, "quoted");
        assert_eq!(blocks[1], Block::Other);
    }
}
