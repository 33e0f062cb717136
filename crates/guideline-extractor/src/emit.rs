use std::path::{Path, PathBuf};

use crate::error::AppError;
use crate::model::GuidelineRecord;

/// Flatten record text for prompt use: newlines become spaces, `TODO` markers are removed
/// and doubled spaces are collapsed.
pub fn clean_text(text: &str) -> String {
    let mut out = text.replace('\n', " ").replace("TODO", "");
    while out.contains("  ") {
        out = out.replace("  ", " ");
    }
    out.trim().to_string()
}

pub fn clean_records(records: &mut [GuidelineRecord]) {
    for record in records.iter_mut() {
        record.text = clean_text(&record.text);
    }
}

/// Pretty JSON array (two-space indent) with a trailing newline.
pub fn to_json(records: &[GuidelineRecord]) -> Result<String, serde_json::Error> {
    let mut json = serde_json::to_string_pretty(records)?;
    json.push('\n');
    Ok(json)
}

pub fn write_json(path: &Path, records: &[GuidelineRecord]) -> Result<(), AppError> {
    let json = to_json(records).map_err(|source| AppError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| AppError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    std::fs::write(path, json).map_err(|source| AppError::Write {
        path: path.to_path_buf(),
        source,
    })
}

pub fn read_json(path: &Path) -> Result<Vec<GuidelineRecord>, AppError> {
    let raw = std::fs::read_to_string(path).map_err(|source| AppError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| AppError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// `docs/python/design.md` -> `docs/python/design.json`
pub fn json_path_for(markdown_path: &Path) -> PathBuf {
    markdown_path.with_extension("json")
}

/// Mirror `source` (somewhere under `source_root`) into `out_root` with a `.json` extension.
pub fn mirrored_json_path(source_root: &Path, source: &Path, out_root: &Path) -> PathBuf {
    let relative = source.strip_prefix(source_root).unwrap_or(source);
    out_root.join(relative).with_extension("json")
}
