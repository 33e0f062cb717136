/// Jekyll include resolution.
///
/// Two directive forms are expanded from disk:
/// - `{% include_relative PATH %}` resolves against the directory of the file being parsed
/// - `{% include PATH %}` resolves against `<site root>/_includes`
///
/// `{% include requirement/... %}` is a requirement directive, not a content include, and is
/// left for the directive normalizer.
use std::ops::Range;
use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::debug;

use crate::error::AppError;

const INCLUDES_DIR: &str = "_includes";
const REQUIREMENT_PREFIX: &str = "requirement/";

#[derive(Debug)]
pub struct IncludeResolver {
    relative_re: Regex,
    root_re: Regex,
    site_root: Option<PathBuf>,
}

#[derive(Debug, PartialEq, Eq)]
struct IncludeDirective {
    span: Range<usize>,
    path: PathBuf,
}

impl IncludeResolver {
    /// `site_root` holds the `_includes` folder; when `None` the parsed file's own directory
    /// is used as the site root.
    pub fn new(site_root: Option<PathBuf>) -> Self {
        Self {
            relative_re: Regex::new(r"\{%-?\s*include_relative\s+([^\s%]+)[^%]*-?%\}")
                .expect("valid regex"),
            root_re: Regex::new(r"\{%-?\s*include\s+([^\s%]+)[^%]*-?%\}").expect("valid regex"),
            site_root,
        }
    }

    /// Expand the first include directive in `text`.
    ///
    /// Text without a directive is returned unchanged. A directive pointing at a file that
    /// cannot be read is an error.
    pub fn expand(&self, text: &str, current_dir: &Path) -> Result<String, AppError> {
        let Some(directive) = self.find(text, current_dir) else {
            return Ok(text.to_string());
        };

        let content =
            std::fs::read_to_string(&directive.path).map_err(|source| AppError::Include {
                directive: text[directive.span.clone()].to_string(),
                path: directive.path.clone(),
                source,
            })?;
        debug!(path = %directive.path.display(), bytes = content.len(), "include resolved");

        let content = if content.trim_start().starts_with('<') {
            htmd::convert(&content).map_err(|e| AppError::Html(e.to_string()))?
        } else {
            content
        };

        Ok(replace_whole_text(text, directive.span, content))
    }

    fn find(&self, text: &str, current_dir: &Path) -> Option<IncludeDirective> {
        let relative = self.relative_re.captures(text).and_then(|caps| {
            let whole = caps.get(0)?;
            Some(IncludeDirective {
                span: whole.range(),
                path: current_dir.join(&caps[1]),
            })
        });

        let includes_dir = self
            .site_root
            .as_deref()
            .unwrap_or(current_dir)
            .join(INCLUDES_DIR);
        let rooted = self
            .root_re
            .captures_iter(text)
            .filter(|caps| !caps[1].starts_with(REQUIREMENT_PREFIX))
            .find_map(|caps| {
                let whole = caps.get(0)?;
                Some(IncludeDirective {
                    span: whole.range(),
                    path: includes_dir.join(&caps[1]),
                })
            });

        match (relative, rooted) {
            (Some(a), Some(b)) => Some(if a.span.start <= b.span.start { a } else { b }),
            (a, b) => a.or(b),
        }
    }
}

/// The included content stands in for the entire paragraph, not only the directive span.
fn replace_whole_text(_text: &str, _span: Range<usize>, content: String) -> String {
    content
}
