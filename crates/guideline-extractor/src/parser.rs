/// Guideline extraction from Jekyll-flavoured Markdown.
///
/// The document is walked once, block by block:
/// - a heading (any level) becomes the current category
/// - blocks under a reserved section (e.g. "Prescriptive Guidance") are skipped
/// - a paragraph carrying an id starts a new record; one without an id continues the
///   previous record
/// - lists and code blocks always continue the previous record; a tagged paragraph inside a
///   list item is read after the list as a paragraph of its own
///
/// Continuation content that arrives before the first record is dropped.
use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::{debug, trace};

use crate::directive::Directives;
use crate::error::AppError;
use crate::include::IncludeResolver;
use crate::links::annotate_links;
use crate::markdown::{Block, BlockParser};
use crate::model::GuidelineRecord;

pub const DEFAULT_RESERVED_SECTIONS: &[&str] = &["Prescriptive Guidance"];

const PARAGRAPH_SEPARATOR: &str = "\n\n";
const LIST_SEPARATOR: &str = "\n";

#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Section headings whose content is explanatory and never yields guidelines.
    pub reserved_sections: Vec<String>,
    /// Jekyll site root holding `_includes`; defaults to the parsed file's directory.
    pub site_root: Option<PathBuf>,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            reserved_sections: DEFAULT_RESERVED_SECTIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            site_root: None,
        }
    }
}

pub struct GuidelineExtractor {
    blocks: BlockParser,
    directives: Directives,
    includes: IncludeResolver,
    code_tag_re: Regex,
    reserved_sections: Vec<String>,
}

impl GuidelineExtractor {
    pub fn new(options: ExtractOptions) -> Self {
        Self {
            blocks: BlockParser::new(),
            directives: Directives::new(),
            includes: IncludeResolver::new(options.site_root),
            code_tag_re: Regex::new(r#"<code class="language-([^"]+)">((?s:.*?))</code>"#)
                .expect("valid regex"),
            reserved_sections: options.reserved_sections,
        }
    }

    pub fn parse_file(&self, path: &Path) -> Result<Vec<GuidelineRecord>, AppError> {
        let markdown = std::fs::read_to_string(path).map_err(|source| AppError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let current_dir = path.parent().unwrap_or_else(|| Path::new("."));
        self.parse_markdown(&markdown, current_dir)
    }

    /// Extract records from `markdown`; `current_dir` anchors relative includes.
    pub fn parse_markdown(
        &self,
        markdown: &str,
        current_dir: &Path,
    ) -> Result<Vec<GuidelineRecord>, AppError> {
        let mut records: Vec<GuidelineRecord> = Vec::new();
        let mut category = String::new();

        for block in self.blocks.read_blocks(markdown) {
            if let Block::Heading { level, text } = &block {
                trace!(level, heading = %text, "category changed");
                category = text.clone();
            }
            if self.is_reserved(&category) {
                continue;
            }

            match block {
                Block::Paragraph(paragraph) => {
                    let expanded = self.includes.expand(&paragraph.text, current_dir)?;
                    let (text, id) = self.directives.normalize(&expanded, &paragraph);
                    let text = annotate_links(&text, &paragraph.links);
                    match id {
                        Some(id) => {
                            debug!(id = %id, category = %category, "guideline found");
                            records.push(GuidelineRecord {
                                id: Some(id),
                                category: category.clone(),
                                text,
                            });
                        }
                        None => append_to_last(&mut records, PARAGRAPH_SEPARATOR, &text),
                    }
                }
                Block::List { items } => {
                    let items: Vec<String> =
                        items.iter().map(|item| self.directives.replace(item)).collect();
                    append_to_last(&mut records, LIST_SEPARATOR, &items.join("\n"));
                }
                Block::Preformatted { html } => {
                    let code = self.convert_code_tag_to_markdown(&html);
                    append_to_last(&mut records, PARAGRAPH_SEPARATOR, &code);
                }
                Block::Heading { .. } | Block::Other => {}
            }
        }

        Ok(records)
    }

    fn is_reserved(&self, category: &str) -> bool {
        self.reserved_sections.iter().any(|s| s == category)
    }

    /// `<code class="language-x">body</code>` becomes a fenced block. Markup without a
    /// language-tagged code element is returned as-is.
    pub fn convert_code_tag_to_markdown(&self, html: &str) -> String {
        let Some(caps) = self.code_tag_re.captures(html) else {
            return html.to_string();
        };
        let language = &caps[1];
        let code = unescape_html(&caps[2]);
        let code = code.strip_suffix('\n').unwrap_or(&code);
        format!("```{language}\n{code}\n```")
    }
}

fn append_to_last(records: &mut [GuidelineRecord], separator: &str, text: &str) {
    match records.last_mut() {
        Some(last) => {
            last.text.push_str(separator);
            last.text.push_str(text);
        }
        None => trace!(chars = text.len(), "no guideline to continue, fragment dropped"),
    }
}

fn unescape_html(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
