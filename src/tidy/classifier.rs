use crate::tidy::config::TidyClassifierConfig;
use crate::tidy::folders::FolderOverview;
use crate::tidy::plan_config::{RawPlanConfig, parse_classifier_response};
use crate::tidy::tags::{TagInput, TagVocabulary};
use crate::tidy::util::truncate_with_ellipsis;
use anyhow::{Context, Result, anyhow};
use reqwest::blocking::Client;
use serde_json::Value;
use std::env;
use std::time::Duration;

const DEFAULT_OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
const ANTHROPIC_MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const MAX_TREE_CHARS: usize = 24_000;

const PROMPT_PREAMBLE: &str = "\
You are helping organize a large legacy folder of CAD drawings, photos and documents.

Goal: from a lightweight representation of the folder tree, find canonical project labels and their noisy aliases.

Inputs:
1. A tag list JSON: {\"tags\": [\"keyword1\", \"keyword2\", ...]}. Each keyword is a folder name taken from the tree.
2. A folder overview JSON with total file and folder counts plus a compact ascii tree where every node carries its file count, so heavier branches stand out.

What to do:
1. Map each tag to a canonical project name, merging similar keywords into one label.
2. Places, people and objects can be project names too.
3. For each canonical project, list every alias tag that belongs under it.
4. Cover as many tags as possible. Start with obvious project names, then the subtler keywords. Keep an unclear tag as its own project rather than dropping it.
5. If you still cannot tell whether a tag is a project, especially when it contains Chinese characters, treat it as one unless it is meaningless alphanumeric noise.

Output format: return STRICTLY one JSON object:
{
  \"projects\": [
    {\"canonical_name\": \"龙湖\", \"aliases\": [\"龙湖固定家具(定稿07-04-25)\", \"龙湖图片\"]}
  ]
}

Only output valid JSON without comments.";

pub trait Classifier {
    fn label(&self) -> String;
    fn classify(&self, prompt: &str) -> Result<String>;
}

pub struct OpenAiCompatClassifier {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub timeout: Duration,
}

pub struct AnthropicClassifier {
    pub api_key: String,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifierProvider {
    OpenRouter,
    OpenAiCompatible,
    Anthropic,
}

impl ClassifierProvider {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "openrouter" => Some(Self::OpenRouter),
            "openai" | "openai-compatible" | "openai_compatible" | "compatible" => {
                Some(Self::OpenAiCompatible)
            }
            "anthropic" | "claude" => Some(Self::Anthropic),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::OpenRouter => "openrouter",
            Self::OpenAiCompatible => "openai-compatible",
            Self::Anthropic => "anthropic",
        }
    }
}

fn env_non_empty(var: &str) -> Option<String> {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => None,
    }
}

fn resolve_api_key(provider: ClassifierProvider) -> Option<String> {
    match provider {
        ClassifierProvider::OpenRouter => env_non_empty("OPENROUTER_API_KEY")
            .or_else(|| env_non_empty("TIDY_API_KEY"))
            .or_else(|| env_non_empty("AI_API_KEY")),
        ClassifierProvider::OpenAiCompatible => env_non_empty("TIDY_API_KEY")
            .or_else(|| env_non_empty("AI_API_KEY"))
            .or_else(|| env_non_empty("OPENAI_API_KEY")),
        ClassifierProvider::Anthropic => env_non_empty("ANTHROPIC_API_KEY")
            .or_else(|| env_non_empty("TIDY_API_KEY"))
            .or_else(|| env_non_empty("AI_API_KEY")),
    }
}

fn api_key_hint(provider: ClassifierProvider) -> &'static str {
    match provider {
        ClassifierProvider::OpenRouter => "OPENROUTER_API_KEY (or TIDY_API_KEY / AI_API_KEY)",
        ClassifierProvider::OpenAiCompatible => "TIDY_API_KEY (or AI_API_KEY / OPENAI_API_KEY)",
        ClassifierProvider::Anthropic => "ANTHROPIC_API_KEY (or TIDY_API_KEY / AI_API_KEY)",
    }
}

/// Build the configured classifier client. Fails when the provider is unknown
/// or no API key is available.
pub fn resolve_classifier(cfg: &TidyClassifierConfig) -> Result<Box<dyn Classifier>> {
    let provider = ClassifierProvider::parse(&cfg.provider).ok_or_else(|| {
        anyhow!(
            "unknown classifier provider `{}`; use openrouter, openai-compatible or anthropic",
            cfg.provider
        )
    })?;
    let api_key = resolve_api_key(provider).ok_or_else(|| {
        anyhow!(
            "{} must be set to contact the {} classifier",
            api_key_hint(provider),
            provider.label()
        )
    })?;
    let timeout = Duration::from_secs(cfg.timeout_secs);

    Ok(match provider {
        ClassifierProvider::Anthropic => Box::new(AnthropicClassifier {
            api_key,
            model: cfg.model.clone(),
            temperature: cfg.temperature,
            max_tokens: cfg.max_tokens,
            timeout,
        }),
        ClassifierProvider::OpenRouter | ClassifierProvider::OpenAiCompatible => {
            let base_url = cfg
                .base_url
                .clone()
                .or_else(|| env_non_empty("AI_BASE_URL"))
                .unwrap_or_else(|| DEFAULT_OPENROUTER_BASE_URL.to_string());
            Box::new(OpenAiCompatClassifier {
                api_key,
                model: cfg.model.clone(),
                base_url,
                temperature: cfg.temperature,
                max_tokens: cfg.max_tokens,
                timeout,
            })
        }
    })
}

/// Keep the `limit` tags seen in the most folder chains, returned in name order.
pub fn select_tags(input: &TagInput, limit: usize) -> TagVocabulary {
    if input.tags.len() <= limit {
        return input.vocabulary();
    }
    let mut ranked: Vec<(&String, usize)> = input
        .tags
        .iter()
        .map(|(tag, chains)| (tag, chains.len()))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    let mut tags: Vec<String> = ranked
        .into_iter()
        .take(limit)
        .map(|(tag, _)| tag.clone())
        .collect();
    tags.sort();
    TagVocabulary { tags }
}

pub fn build_prompt(tags: &TagVocabulary, overview: &FolderOverview) -> Result<String> {
    let mut overview = overview.clone();
    overview.tree = truncate_with_ellipsis(&overview.tree, MAX_TREE_CHARS);
    let tags_json = serde_json::to_string_pretty(tags)?;
    let overview_json = serde_json::to_string_pretty(&overview)?;
    Ok(format!(
        "{PROMPT_PREAMBLE}\n\nTag list JSON:\n{tags_json}\n\nFolder overview JSON:\n{overview_json}\n"
    ))
}

fn extract_openai_compatible_text(json: &Value) -> Option<String> {
    let choices = json.get("choices").and_then(Value::as_array)?;
    let first = choices.first()?;
    let content = first.get("message")?.get("content")?;
    match content {
        Value::String(s) => Some(s.to_string()),
        Value::Array(parts) => {
            let chunks: Vec<&str> = parts
                .iter()
                .filter_map(|part| part.get("text").and_then(Value::as_str))
                .collect();
            if chunks.is_empty() {
                None
            } else {
                Some(chunks.join("\n"))
            }
        }
        _ => None,
    }
}

fn extract_anthropic_text(json: &Value) -> Option<String> {
    let content = json.get("content").and_then(Value::as_array)?;
    let chunks: Vec<&str> = content
        .iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect();
    if chunks.is_empty() {
        None
    } else {
        Some(chunks.join("\n"))
    }
}

impl Classifier for OpenAiCompatClassifier {
    fn label(&self) -> String {
        format!("openai-compatible:{}", self.model)
    }

    fn classify(&self, prompt: &str) -> Result<String> {
        let base = self.base_url.trim_end_matches('/');
        let url = format!("{base}/chat/completions");
        let payload = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "user", "content": prompt}
            ],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens
        });

        let client = Client::builder().timeout(self.timeout).build()?;
        let response = client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .with_context(|| format!("classifier request to {url} failed"))?;
        if !response.status().is_success() {
            anyhow::bail!(
                "openai-compatible call failed with status {}",
                response.status()
            );
        }

        let json: Value = response.json()?;
        extract_openai_compatible_text(&json)
            .filter(|text| !text.trim().is_empty())
            .context("classifier did not return any content")
    }
}

impl Classifier for AnthropicClassifier {
    fn label(&self) -> String {
        format!("anthropic:{}", self.model)
    }

    fn classify(&self, prompt: &str) -> Result<String> {
        let payload = serde_json::json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
            "messages": [
                {"role": "user", "content": prompt}
            ]
        });

        let client = Client::builder().timeout(self.timeout).build()?;
        let response = client
            .post(ANTHROPIC_MESSAGES_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&payload)
            .send()
            .context("anthropic classifier request failed")?;
        if !response.status().is_success() {
            anyhow::bail!("anthropic call failed with status {}", response.status());
        }

        let json: Value = response.json()?;
        extract_anthropic_text(&json)
            .filter(|text| !text.trim().is_empty())
            .context("classifier did not return any content")
    }
}

/// Ask the classifier for projects and turn its reply into a complete plan
/// configuration (default categories and target pattern filled in).
pub fn classify_tags(
    classifier: &dyn Classifier,
    tags: &TagVocabulary,
    overview: &FolderOverview,
) -> Result<RawPlanConfig> {
    let prompt = build_prompt(tags, overview)?;
    let reply = classifier.classify(&prompt)?;
    Ok(parse_classifier_response(&reply)?.with_defaults())
}
