use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::ExtractConfig;
use larder_core::extract::{ExtractError, ExtractedRecipe, parse_payload};

const PAGE_USER_AGENT: &str = "Mozilla/5.0 (compatible; RecipeBot/1.0)";
/// Page text beyond this many characters is not sent to the model.
pub const MAX_PAGE_CHARS: usize = 12_000;

const PROMPT_HEADER: &str = "Extract the recipe from this web page. Return a single JSON object \
(no markdown, no code fence) with:
- title: string
- instructions: string (full instructions, can be multi-line)
- ingredients: array of { \"name\": string, \"qty\": number or null, \"unit\": string or null, \"is_essential\": boolean }
  Use is_essential: true for core ingredients, false for garnishes, optional toppings, or vanity items.";

/// Fetches recipe pages and asks an OpenAI-compatible chat model to structure them.
pub struct OpenAiExtractor {
    config: ExtractConfig,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

impl OpenAiExtractor {
    pub fn new(config: ExtractConfig) -> Result<Self, ExtractError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| ExtractError::Provider(e.to_string()))?;
        Ok(Self { config, client })
    }

    /// Fetch `url` and extract the recipe it contains.
    ///
    /// The API key is checked before any network traffic.
    pub async fn extract_url(&self, url: &str) -> Result<ExtractedRecipe, ExtractError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(ExtractError::MissingApiKey)?;
        let page = self.fetch_page(url).await?;
        let content = self.complete(api_key, &build_prompt(&page)).await?;
        parse_payload(&content)
    }

    async fn fetch_page(&self, url: &str) -> Result<String, ExtractError> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, PAGE_USER_AGENT)
            .send()
            .await
            .map_err(|e| ExtractError::Fetch(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ExtractError::Fetch(status.to_string()));
        }
        response
            .text()
            .await
            .map_err(|e| ExtractError::Fetch(e.to_string()))
    }

    async fn complete(&self, api_key: &str, prompt: &str) -> Result<String, ExtractError> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt.to_string(),
            }],
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };
        tracing::debug!(model = %self.config.model, "requesting recipe extraction");

        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ExtractError::Provider(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ExtractError::Provider(e.to_string()))?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .map_or(body, |b| b.error.message);
            return Err(ExtractError::Provider(format!("{status}: {message}")));
        }
        completion_content(&body)
    }
}

/// The extraction prompt, with the page cut to [`MAX_PAGE_CHARS`] characters.
pub fn build_prompt(page: &str) -> String {
    let end = page
        .char_indices()
        .nth(MAX_PAGE_CHARS)
        .map_or(page.len(), |(i, _)| i);
    format!(
        "{PROMPT_HEADER}\n\nPage content (first {MAX_PAGE_CHARS} chars):\n{}",
        &page[..end]
    )
}

/// Pull the first choice's message text out of a chat completion body.
fn completion_content(body: &str) -> Result<String, ExtractError> {
    let response: ChatResponse = serde_json::from_str(body)?;
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|c| !c.trim().is_empty())
        .ok_or(ExtractError::EmptyResponse)
}
