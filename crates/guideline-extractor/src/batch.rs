/// Extract every guideline document under a docs tree into a mirrored JSON tree.
use std::path::{Path, PathBuf};

use tracing::info;
use walkdir::{DirEntry, WalkDir};

use crate::emit::{clean_records, mirrored_json_path, write_json};
use crate::error::AppError;
use crate::parser::GuidelineExtractor;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOutput {
    pub output: PathBuf,
    pub records: usize,
}

/// Markdown files under `docs_root`, sorted by path. Hidden entries and Jekyll
/// `_`-prefixed directories are skipped. With a non-empty `folders`, only files whose parent
/// directory name is listed are returned.
pub fn find_documents(docs_root: &Path, folders: &[String]) -> Result<Vec<PathBuf>, AppError> {
    let mut documents = Vec::new();
    let walker = WalkDir::new(docs_root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_skipped(e));

    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("md") {
            continue;
        }
        if !folders.is_empty() {
            let parent = path
                .parent()
                .and_then(|p| p.file_name())
                .and_then(|n| n.to_str())
                .unwrap_or_default();
            if !folders.iter().any(|f| f == parent) {
                continue;
            }
        }
        documents.push(path.to_path_buf());
    }
    Ok(documents)
}

fn is_skipped(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.') || name.starts_with('_'))
        .unwrap_or(false)
}

/// Extract each document and write it to `out_root`, mirroring its path under `docs_root`.
/// Stops at the first failure.
pub fn extract_tree(
    extractor: &GuidelineExtractor,
    docs_root: &Path,
    out_root: &Path,
    folders: &[String],
    clean: bool,
) -> Result<Vec<BatchOutput>, AppError> {
    let documents = find_documents(docs_root, folders)?;
    let mut outputs = Vec::with_capacity(documents.len());

    for source in documents {
        let mut records = extractor.parse_file(&source)?;
        if clean {
            clean_records(&mut records);
        }
        let output = mirrored_json_path(docs_root, &source, out_root);
        write_json(&output, &records)?;
        info!(
            source = %source.display(),
            output = %output.display(),
            records = records.len(),
            "document extracted"
        );
        outputs.push(BatchOutput {
            output,
            records: records.len(),
        });
    }

    Ok(outputs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emit::read_json;
    use crate::parser::ExtractOptions;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn docs_tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(
            root,
            "python/design.md",
            "# Design\n\n{% include requirement/MUST id=\"py-1\" %} Use snake_case.\nTODO later\n",
        );
        write(
            root,
            "java/introduction.md",
            "# Intro\n\n{% include requirement/SHOULD id=\"java-1\" %} Use builders.\n",
        );
        write(root, "java/notes.txt", "not markdown");
        write(root, "_includes/note.md", "# Ignored\n");
        write(root, ".git/HEAD.md", "# Ignored\n");
        dir
    }

    #[test]
    fn finds_markdown_sorted_and_skips_hidden_and_includes() {
        let dir = docs_tree();
        let docs = find_documents(dir.path(), &[]).unwrap();
        let rel: Vec<PathBuf> = docs
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            rel,
            vec![
                PathBuf::from("java/introduction.md"),
                PathBuf::from("python/design.md")
            ]
        );
    }

    #[test]
    fn folder_filter_limits_documents() {
        let dir = docs_tree();
        let docs = find_documents(dir.path(), &["python".to_string()]).unwrap();
        assert_eq!(docs.len(), 1);
        assert!(docs[0].ends_with("python/design.md"));
    }

    #[test]
    fn extract_tree_mirrors_into_output_root() {
        let dir = docs_tree();
        let out = tempfile::tempdir().unwrap();
        let extractor = GuidelineExtractor::new(ExtractOptions::default());

        let outputs = extract_tree(&extractor, dir.path(), out.path(), &[], true).unwrap();
        assert_eq!(outputs.len(), 2);
        assert!(outputs.iter().all(|o| o.records == 1));

        let python = read_json(&out.path().join("python/design.json")).unwrap();
        assert_eq!(python[0].id.as_deref(), Some("py-1"));
        assert_eq!(python[0].text, "DO Use snake_case. later");
        assert!(out.path().join("java/introduction.json").exists());
    }
}
