use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::reply::{CompletionError, Reply};
use crate::state::{ChatMessage, FALLBACK_REPLY};

pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

const SYSTEM_PROMPT: &str = "You are a friendly, knowledgeable assistant for decentralized finance (DeFi). \
Help users understand protocols, lending and borrowing, liquidity pools, yield farming, staking, \
wallets and on-chain risks. Explain terms plainly, point out risks such as impermanent loss, \
smart-contract bugs and scams, and never present anything as financial advice.";

// Decoding parameters sent with every request
const MAX_TOKENS: u32 = 256;
const TEMPERATURE: f32 = 0.7;
const TOP_P: f32 = 1.0;
const FREQUENCY_PENALTY: f32 = 0.0;
const PRESENCE_PENALTY: f32 = 0.6;

// Longest slice of an error body kept in the log
const ERROR_BODY_LOG_LIMIT: usize = 512;

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
    frequency_penalty: f32,
    presence_penalty: f32,
}

#[derive(Debug, Default, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Talks to an OpenAI-compatible chat completions endpoint.
///
/// One attempt per call, no retries, no timeout beyond the transport default.
#[derive(Clone)]
pub struct CompletionClient {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl CompletionClient {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Inject the HTTP transport.
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    /// Send the whole conversation and normalize whatever comes back.
    pub async fn complete(&self, history: &[ChatMessage]) -> Reply {
        match self.try_complete(history).await {
            Ok(text) => Reply::Text(text),
            Err(err) => Reply::Failed(err),
        }
    }

    async fn try_complete(&self, history: &[ChatMessage]) -> Result<String, CompletionError> {
        let api_key = self.api_key.as_deref().ok_or(CompletionError::MissingCredential)?;
        let request = self.build_request(history);

        debug!(
            model = %self.model,
            messages = request.messages.len(),
            "sending completion request"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| CompletionError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                status = status.as_u16(),
                body = %truncate(&body, ERROR_BODY_LOG_LIMIT),
                "completion endpoint returned an error status"
            );
            return Err(CompletionError::Service { status: status.as_u16() });
        }

        let body = response
            .text()
            .await
            .map_err(|e| CompletionError::Network(e.to_string()))?;

        Ok(extract_content(&body).unwrap_or_else(|| FALLBACK_REPLY.to_string()))
    }

    fn build_request<'a>(&'a self, history: &'a [ChatMessage]) -> ChatCompletionRequest<'a> {
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(WireMessage {
            role: "system",
            content: SYSTEM_PROMPT,
        });
        messages.extend(history.iter().map(|msg| WireMessage {
            role: msg.role.as_str(),
            content: &msg.content,
        }));

        ChatCompletionRequest {
            model: &self.model,
            messages,
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
            top_p: TOP_P,
            frequency_penalty: FREQUENCY_PENALTY,
            presence_penalty: PRESENCE_PENALTY,
        }
    }
}

/// First choice's content, if the body has a non-blank one.
fn extract_content(body: &str) -> Option<String> {
    let parsed: ChatCompletionResponse = match serde_json::from_str(body) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!("completion response is not the expected JSON: {e}");
            ChatCompletionResponse::default()
        }
    };

    let content = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message)
        .and_then(|message| message.content)
        .filter(|content| !content.trim().is_empty());

    if content.is_none() {
        debug!("completion response had no usable content");
    }
    content
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
