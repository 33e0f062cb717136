use serde::{Deserialize, Serialize};

/// One normative statement extracted from a guideline document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuidelineRecord {
    /// Stable identifier from the requirement directive, e.g. "general-client-naming".
    pub id: Option<String>,
    /// Text of the nearest preceding heading.
    pub category: String,
    /// Normalized prose, including any continuation paragraphs, lists and code blocks.
    pub text: String,
}

/// A record chosen as review context, numbered in selection order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectedGuideline {
    pub id: Option<String>,
    pub category: String,
    pub text: String,
    pub number: usize,
}

/// A single guideline violation reported by the review model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    /// Unique rule id or ids that were violated.
    pub rule_ids: Vec<String>,
    /// The original code that was bad.
    pub bad_code: String,
    /// The suggested fix for the bad code.
    pub suggestion: String,
    /// What was wrong with the code and how the suggestion fixes it.
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewResult {
    /// "Succeeded" if the request completed, "Error" otherwise.
    pub status: String,
    #[serde(default)]
    pub violations: Vec<Violation>,
}
