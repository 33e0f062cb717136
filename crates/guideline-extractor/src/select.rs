use std::path::Path;

use crate::emit::read_json;
use crate::error::AppError;
use crate::model::{GuidelineRecord, SelectedGuideline};

const GENERAL_DIR: &str = "general";

/// Load extracted guideline JSON for review.
///
/// Returns `(general, language)`: every `*.json` file directly under
/// `<docs_root>/general` and `<docs_root>/<language>`, concatenated in file name order.
pub fn load_guidelines(
    docs_root: &Path,
    language: &str,
) -> Result<(Vec<GuidelineRecord>, Vec<GuidelineRecord>), AppError> {
    let general = load_dir(&docs_root.join(GENERAL_DIR))?;
    let language = load_dir(&docs_root.join(language))?;
    Ok((general, language))
}

fn load_dir(dir: &Path) -> Result<Vec<GuidelineRecord>, AppError> {
    let read_err = |source| AppError::Read {
        path: dir.to_path_buf(),
        source,
    };
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(read_err)? {
        let path = entry.map_err(read_err)?.path();
        if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some("json") {
            files.push(path);
        }
    }
    files.sort();

    let mut records = Vec::new();
    for file in files {
        records.extend(read_json(&file)?);
    }
    Ok(records)
}

/// Pick guidelines by id and by category, numbered in selection order.
///
/// Id matches come first in input order, then category matches. A guideline matched twice
/// keeps its first position and takes the later content. Records without an id cannot be
/// selected.
pub fn select_guidelines(
    all: &[GuidelineRecord],
    ids: &[String],
    categories: &[String],
) -> Vec<SelectedGuideline> {
    let mut selected: Vec<(String, &GuidelineRecord)> = Vec::new();

    if !ids.is_empty() {
        for record in all {
            if let Some(id) = record.id.as_deref().filter(|id| ids.iter().any(|w| w == id)) {
                upsert(&mut selected, id, record);
            }
        }
    }
    if !categories.is_empty() {
        for record in all {
            let Some(id) = record.id.as_deref() else {
                continue;
            };
            if categories.iter().any(|c| *c == record.category) {
                upsert(&mut selected, id, record);
            }
        }
    }

    selected
        .into_iter()
        .enumerate()
        .map(|(number, (_, record))| SelectedGuideline {
            id: record.id.clone(),
            category: record.category.clone(),
            text: record.text.clone(),
            number,
        })
        .collect()
}

fn upsert<'a>(
    selected: &mut Vec<(String, &'a GuidelineRecord)>,
    id: &str,
    record: &'a GuidelineRecord,
) {
    match selected.iter_mut().find(|(key, _)| key == id) {
        Some(slot) => slot.1 = record,
        None => selected.push((id.to_string(), record)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emit::write_json;

    fn record(id: Option<&str>, category: &str, text: &str) -> GuidelineRecord {
        GuidelineRecord {
            id: id.map(str::to_string),
            category: category.to_string(),
            text: text.to_string(),
        }
    }

    #[test]
    fn selects_ids_then_categories_with_numbers() {
        let all = vec![
            record(Some("a"), "Service client", "A"),
            record(Some("b"), "Naming", "B"),
            record(Some("c"), "Client configuration", "C"),
            record(None, "Service client", "orphan"),
        ];
        let selected = select_guidelines(
            &all,
            &["b".to_string()],
            &["Service client".to_string(), "Client configuration".to_string()],
        );
        let ids: Vec<&str> = selected.iter().filter_map(|s| s.id.as_deref()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
        let numbers: Vec<usize> = selected.iter().map(|s| s.number).collect();
        assert_eq!(numbers, vec![0, 1, 2]);
    }

    #[test]
    fn duplicate_ids_keep_first_position_and_last_content() {
        let all = vec![
            record(Some("x"), "Naming", "old"),
            record(Some("y"), "Naming", "y"),
            record(Some("x"), "Naming", "new"),
        ];
        let selected = select_guidelines(&all, &[], &["Naming".to_string()]);
        assert_eq!(selected.len(), 2);
        assert_eq!(selected[0].id.as_deref(), Some("x"));
        assert_eq!(selected[0].text, "new");
    }

    #[test]
    fn nothing_requested_selects_nothing() {
        let all = vec![record(Some("a"), "Naming", "A")];
        assert!(select_guidelines(&all, &[], &[]).is_empty());
    }

    #[test]
    fn loads_general_and_language_json() {
        let docs = tempfile::tempdir().unwrap();
        write_json(
            &docs.path().join("general/b.json"),
            &[record(Some("g2"), "Design", "two")],
        )
        .unwrap();
        write_json(
            &docs.path().join("general/a.json"),
            &[record(Some("g1"), "Design", "one")],
        )
        .unwrap();
        write_json(
            &docs.path().join("python/design.json"),
            &[record(Some("p1"), "Naming", "py")],
        )
        .unwrap();
        std::fs::write(docs.path().join("python/design.md"), "# not json").unwrap();

        let (general, language) = load_guidelines(docs.path(), "python").unwrap();
        let general_ids: Vec<&str> = general.iter().filter_map(|r| r.id.as_deref()).collect();
        assert_eq!(general_ids, vec!["g1", "g2"]);
        assert_eq!(language.len(), 1);
    }

    #[test]
    fn missing_language_dir_is_error() {
        let docs = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(docs.path().join("general")).unwrap();
        assert!(load_guidelines(docs.path(), "cobol").is_err());
    }
}
