mod batch;
mod config;
mod directive;
mod emit;
mod error;
mod include;
mod links;
mod markdown;
mod model;
mod parser;
mod prompt;
mod select;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::Config;
use error::AppError;
use llm_common::completion::{
    ChatCompletionRequest, CompletionClient, CompletionClientConfig, Message,
};
use parser::GuidelineExtractor;
use prompt::CodePrompt;

#[derive(Parser)]
#[command(
    name = "guideline-extractor",
    about = "Extract SDK guideline records from Jekyll markdown and use them as LLM context"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Extract one markdown file into a JSON array next to it (or at --out)
    Extract {
        file: PathBuf,
        #[arg(long)]
        out: Option<PathBuf>,
        /// Directory containing the Jekyll `_includes` folder
        #[arg(long)]
        site_root: Option<PathBuf>,
        /// Keep newlines and TODO markers in record text
        #[arg(long)]
        keep_formatting: bool,
    },
    /// Extract every markdown file under DOCS_ROOT into a mirrored tree under OUT_ROOT
    Batch {
        docs_root: PathBuf,
        out_root: PathBuf,
        /// Only documents whose parent folder has this name (repeatable)
        #[arg(long = "folder")]
        folders: Vec<String>,
        #[arg(long)]
        site_root: Option<PathBuf>,
        #[arg(long)]
        keep_formatting: bool,
    },
    /// Review an API listing against extracted guidelines
    Review {
        code_file: PathBuf,
        #[arg(long)]
        language: String,
        /// Root holding `general/` and `<language>/` guideline JSON
        #[arg(long)]
        docs: PathBuf,
        #[arg(long = "category", default_values_t = default_review_categories())]
        categories: Vec<String>,
        #[arg(long = "id")]
        ids: Vec<String>,
        /// Where to write the parsed review result
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Ask a question about the guidelines of a language
    Ask {
        question: String,
        #[arg(
            long,
            default_value = "python",
            value_parser = clap::builder::PossibleValuesParser::new(prompt::LANGUAGES.iter().copied())
        )]
        language: String,
    },
    /// One-shot code checks
    Check {
        #[command(subcommand)]
        kind: CheckKind,
    },
}

#[derive(Subcommand)]
enum CheckKind {
    /// Check code against the guideline page at a URL
    Guideline {
        code_file: PathBuf,
        #[arg(long)]
        language: String,
        #[arg(long)]
        url: String,
    },
    /// Ask whether CODE_FILE breaks the signature of PREVIOUS_FILE
    Breaking {
        code_file: PathBuf,
        previous_file: PathBuf,
    },
    /// Explain the differences between PREVIOUS_FILE and CODE_FILE
    Explain {
        code_file: PathBuf,
        previous_file: PathBuf,
    },
    /// Summarize a code snippet
    Summary {
        code_file: PathBuf,
        #[arg(long)]
        language: String,
    },
}

fn default_review_categories() -> Vec<String> {
    ["Service client", "General guidelines", "Client configuration"]
        .map(str::to_string)
        .to_vec()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command {
        Command::Extract {
            file,
            out,
            site_root,
            keep_formatting,
        } => {
            let extractor = GuidelineExtractor::new(config.extract_options(site_root));
            let mut records = extractor.parse_file(&file)?;
            if !keep_formatting {
                emit::clean_records(&mut records);
            }
            let out = out.unwrap_or_else(|| emit::json_path_for(&file));
            emit::write_json(&out, &records)?;
            info!(
                source = %file.display(),
                output = %out.display(),
                records = records.len(),
                "extraction complete"
            );
        }
        Command::Batch {
            docs_root,
            out_root,
            folders,
            site_root,
            keep_formatting,
        } => {
            let extractor = GuidelineExtractor::new(config.extract_options(site_root));
            let outputs =
                batch::extract_tree(&extractor, &docs_root, &out_root, &folders, !keep_formatting)?;
            for output in &outputs {
                println!("{}", output.output.display());
            }
            let records: usize = outputs.iter().map(|o| o.records).sum();
            info!(documents = outputs.len(), records, "batch extraction complete");
        }
        Command::Review {
            code_file,
            language,
            docs,
            categories,
            ids,
            out,
        } => {
            let apiview = read_input(&code_file)?;
            let (general, language_guidelines) = select::load_guidelines(&docs, &language)?;
            let all: Vec<_> = general.into_iter().chain(language_guidelines).collect();
            let selected = select::select_guidelines(&all, &ids, &categories);
            info!(
                loaded = all.len(),
                selected = selected.len(),
                language = %language,
                "guidelines selected for review"
            );

            let review_text = prompt::review_prompt(&selected, &apiview, &language)?;
            let client = completion_client()?;
            let reply =
                complete(&client, &config, vec![Message::user(review_text)], 0.0).await?;
            let result = prompt::parse_review_response(&reply)?;
            let json = serde_json::to_string_pretty(&result)?;
            match out {
                Some(path) => {
                    std::fs::write(&path, format!("{json}\n")).map_err(|source| {
                        AppError::Write {
                            path: path.clone(),
                            source,
                        }
                    })?;
                    info!(
                        output = %path.display(),
                        violations = result.violations.len(),
                        "review written"
                    );
                }
                None => println!("{json}"),
            }
        }
        Command::Ask { question, language } => {
            let client = completion_client()?;
            let request = ChatCompletionRequest {
                model: config.model.clone(),
                messages: prompt::qa_messages(&language, &question),
                temperature: None,
                max_tokens: None,
                stream: None,
            };
            let answer = client
                .chat_completions_streaming_aggregate(request, None)
                .await
                .map_err(AppError::from)?;
            println!("{}", answer.trim());
        }
        Command::Check { kind } => {
            let code_prompt = match kind {
                CheckKind::Guideline {
                    code_file,
                    language,
                    url,
                } => CodePrompt::GuidelineViolation {
                    language,
                    code: read_input(&code_file)?,
                    url,
                },
                CheckKind::Breaking {
                    code_file,
                    previous_file,
                } => CodePrompt::BreakingChange {
                    code: read_input(&code_file)?,
                    previous: read_input(&previous_file)?,
                },
                CheckKind::Explain {
                    code_file,
                    previous_file,
                } => CodePrompt::ExplainDelta {
                    code: read_input(&code_file)?,
                    previous: read_input(&previous_file)?,
                },
                CheckKind::Summary {
                    code_file,
                    language,
                } => CodePrompt::Summary {
                    language,
                    code: read_input(&code_file)?,
                },
            };
            let client = completion_client()?;
            let reply = complete(
                &client,
                &config,
                code_prompt.messages(),
                code_prompt.temperature(),
            )
            .await?;
            println!("{}", reply.trim());
        }
    }
    Ok(())
}

fn read_input(path: &Path) -> Result<String, AppError> {
    std::fs::read_to_string(path).map_err(|source| AppError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn completion_client() -> Result<CompletionClient, AppError> {
    let client_config = CompletionClientConfig::from_env()?;
    info!(
        base_url = %client_config.base_url,
        azure = client_config.api_version.is_some(),
        "completion client configured"
    );
    Ok(CompletionClient::new(client_config)?)
}

async fn complete(
    client: &CompletionClient,
    config: &Config,
    messages: Vec<Message>,
    temperature: f32,
) -> Result<String, AppError> {
    let request = ChatCompletionRequest {
        model: config.model.clone(),
        messages,
        temperature: Some(temperature),
        max_tokens: Some(1000),
        stream: None,
    };
    let response = client.chat_completions(request, None).await?;
    if let Some(usage) = &response.usage {
        info!(
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            "completion received"
        );
    }
    response
        .first_content()
        .map(str::to_string)
        .ok_or_else(|| {
            AppError::InvalidResponse("missing choices[0].message.content".to_string())
        })
}
