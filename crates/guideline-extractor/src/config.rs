use std::path::PathBuf;

use crate::error::AppError;
use crate::parser::ExtractOptions;

const DEFAULT_MODEL: &str = "gpt-4";

/// Application configuration loaded explicitly from environment variables.
///
/// Nothing here is required: extraction runs with defaults, and the completion client
/// validates its own credentials only when a subcommand needs the network.
#[derive(Debug, Clone)]
pub struct Config {
    /// Section headings skipped by the extractor.
    pub reserved_sections: Vec<String>,
    /// Jekyll site root containing `_includes`.
    pub site_root: Option<PathBuf>,
    /// Chat model, or Azure deployment name.
    pub model: String,
}

impl Config {
    /// Optional:
    /// - `GUIDELINES_RESERVED_SECTIONS`: comma-separated headings (default: "Prescriptive Guidance")
    /// - `GUIDELINES_SITE_ROOT`: directory containing `_includes`
    /// - `OPENAI_MODEL`: chat model or deployment (default: "gpt-4")
    pub fn from_env() -> Result<Self, AppError> {
        let defaults = ExtractOptions::default();

        let reserved_sections = match std::env::var("GUIDELINES_RESERVED_SECTIONS") {
            Ok(raw) => parse_list(&raw),
            Err(_) => defaults.reserved_sections,
        };

        let site_root = match std::env::var("GUIDELINES_SITE_ROOT") {
            Ok(raw) => {
                let path = PathBuf::from(raw);
                if !path.is_dir() {
                    return Err(AppError::Config(format!(
                        "GUIDELINES_SITE_ROOT is not a directory: {}",
                        path.display()
                    )));
                }
                Some(path)
            }
            Err(_) => None,
        };

        let model = std::env::var("OPENAI_MODEL")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        Ok(Self {
            reserved_sections,
            site_root,
            model,
        })
    }

    /// Extraction options, with a command-line site root taking precedence.
    pub fn extract_options(&self, site_root: Option<PathBuf>) -> ExtractOptions {
        ExtractOptions {
            reserved_sections: self.reserved_sections.clone(),
            site_root: site_root.or_else(|| self.site_root.clone()),
        }
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
