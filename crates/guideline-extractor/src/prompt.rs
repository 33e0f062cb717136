/// Prompt assembly for the completion-backed subcommands.
use llm_common::completion::Message;

use crate::error::AppError;
use crate::model::{ReviewResult, SelectedGuideline};

const SITE: &str = "https://azure.github.io/azure-sdk";

const GENERAL_PAGES: &[&str] = &[
    "general_introduction",
    "general_terminology",
    "general_design",
    "general_implementation",
    "general_documentation",
    "general_azurecore",
    "policies_opensource",
];

const LANGUAGE_PAGES: &[(&str, &[&str])] = &[
    ("dotnet", &["dotnet_introduction", "dotnet_implementation"]),
    (
        "java",
        &["java_introduction", "java_implementation", "java_spring"],
    ),
    (
        "python",
        &["python_design", "python_implementation", "python_documentation"],
    ),
    (
        "typescript",
        &[
            "typescript_introduction",
            "typescript_design",
            "typescript_implementation",
            "typescript_documentation",
        ],
    ),
    ("android", &["android_design", "android_implementation"]),
    ("ios", &["ios_design", "ios_implementation"]),
    ("c", &["clang_design", "clang_implementation"]),
    ("cpp", &["cpp_introduction", "cpp_implementation"]),
    ("go", &["golang_introduction", "golang_implementation"]),
];

pub const LANGUAGES: &[&str] = &[
    "dotnet",
    "java",
    "python",
    "typescript",
    "android",
    "ios",
    "c",
    "cpp",
    "go",
];

pub fn page_url(page: &str) -> String {
    format!("{SITE}/{page}.html")
}

/// Guideline page URLs for `language`; empty for an unknown language.
pub fn language_urls(language: &str) -> Vec<String> {
    LANGUAGE_PAGES
        .iter()
        .find(|(lang, _)| *lang == language)
        .map(|(_, pages)| pages.iter().map(|p| page_url(p)).collect())
        .unwrap_or_default()
}

/// System prompt for guideline Q&A.
pub fn qa_system_prompt(language: &str) -> String {
    let mut lines = vec![
        "You are an assistant that attempts to answer questions related to the Azure SDK Guidelines.".to_string(),
        "You will attempt to find the answer to general questions in the following documents:".to_string(),
    ];
    lines.extend(GENERAL_PAGES.iter().map(|p| format!("- {}", page_url(p))));

    let lang_urls = language_urls(language);
    if !lang_urls.is_empty() {
        lines.push(format!(
            "You will attempt to find the answer to {language}-specific questions in the following documents:"
        ));
        lines.extend(lang_urls.iter().map(|u| format!("- {u}")));
    }

    lines.extend(
        [
            "Don't use 'According to the Azure SDK guidelines' in your answer.",
            "If you are unsure of the answer, recommend the user contact the Azure SDK team.",
            "If the user asks for an exception to the guidelines, firmly insist that they contact the Azure SDK team for approval.",
            "Do not quote the guidelines in your answer.",
            "When reading the guidelines, interpret DO as a requirement and SHOULD as a recommendation.",
        ]
        .map(str::to_string),
    );
    lines.join("\n")
}

pub fn qa_messages(language: &str, question: &str) -> Vec<Message> {
    vec![
        Message::system(qa_system_prompt(language)),
        Message::user(question),
    ]
}

const REVIEW_FORMAT_INSTRUCTIONS: &str = r#"Respond with a single JSON object and nothing else, matching this shape:
{
  "status": "Succeeded if the request completed, or Error if it did not",
  "violations": [
    {
      "rule_ids": ["unique rule ID or IDs that were violated"],
      "bad_code": "the original code that was bad",
      "suggestion": "the suggested fix for the bad code",
      "comment": "a description of what was wrong with the code and how the suggestion fixes it"
    }
  ]
}"#;

/// API review prompt: numbered guidelines as JSON, the code under review, and the expected
/// response shape.
pub fn review_prompt(
    guidelines: &[SelectedGuideline],
    apiview: &str,
    language: &str,
) -> Result<String, AppError> {
    let formatted = serde_json::to_string_pretty(guidelines).map_err(AppError::Prompt)?;
    Ok(format!(
        "# GUIDELINES\n{formatted}\n\n\
         # CODE\n```\n{apiview}\n```\n\n\
         # INSTRUCTIONS\n\
         - The language you are evaluating is {language}.\n\
         - Ensure that your code suggestions do not conflict with one another.\n\n\
         # FORMAT INSTRUCTIONS\n{REVIEW_FORMAT_INSTRUCTIONS}\n"
    ))
}

/// Parse the review model's reply, tolerating prose or code fences around the JSON object.
pub fn parse_review_response(reply: &str) -> Result<ReviewResult, AppError> {
    let start = reply.find('{');
    let end = reply.rfind('}');
    let json = match (start, end) {
        (Some(start), Some(end)) if start < end => &reply[start..=end],
        _ => {
            return Err(AppError::InvalidResponse(
                "no JSON object in review response".to_string(),
            ))
        }
    };
    serde_json::from_str(json).map_err(|e| AppError::InvalidResponse(e.to_string()))
}

/// One-shot code prompts, each with the sampling temperature it is sent with.
#[derive(Debug, Clone, PartialEq)]
pub enum CodePrompt {
    /// Does `code` violate the guidelines published at `url`?
    GuidelineViolation {
        language: String,
        code: String,
        url: String,
    },
    /// Does `code` break the signature of `previous`?
    BreakingChange { code: String, previous: String },
    /// Explain what changed between `previous` and `code`.
    ExplainDelta { code: String, previous: String },
    Summary { language: String, code: String },
}

impl CodePrompt {
    pub fn text(&self) -> String {
        match self {
            CodePrompt::GuidelineViolation {
                language,
                code,
                url,
            } => format!(
                "Given the {language} design guidelines at this URL: {url}\n\n\
                 Does the following code violate any of the rules and which one?  \
                 Keep the response under 1,000 characters.\n\n{code}\n"
            ),
            CodePrompt::BreakingChange { code, previous } => format!(
                "Given the following code:\n{code}\n\n\
                 Does the signature break from the previous version of the code here:\n{previous}\n\n\
                 Please keep the response under 1,000 characters.\n"
            ),
            CodePrompt::ExplainDelta { code, previous } => format!(
                "Given the following code:\n{code}\n\n\
                 Explain the differences between this code and the previous version of the code here:\n{previous}\n"
            ),
            CodePrompt::Summary { language, code } => format!(
                "Summarize the following code snippet in {language}:\n\n```\n{code}\n```\n"
            ),
        }
    }

    pub fn temperature(&self) -> f32 {
        match self {
            CodePrompt::BreakingChange { .. } => 1.0,
            _ => 0.1,
        }
    }

    pub fn messages(&self) -> Vec<Message> {
        vec![Message::user(self.text())]
    }
}
