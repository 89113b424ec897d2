//! OpenAI-compatible chat-completions client (Groq by default).
use std::io::BufReader;
use std::time::Duration;

use reqwest::blocking::{Client, Response};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use ragdb_core::config::GeneratorSettings;
use ragdb_core::error::{Error, Result};
use ragdb_core::traits::{AnswerGenerator, AnswerStream};
use ragdb_core::types::AnswerRequest;

use crate::sse::SseFragments;

pub struct RemoteGenerator {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u64,
    completion_tokens: u64,
    total_tokens: u64,
}

impl RemoteGenerator {
    pub fn new(settings: &GeneratorSettings) -> Result<Self> {
        if !settings.has_api_key() {
            return Err(Error::InvalidConfig("generator.api_key is required for the remote generator".to_string()));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| Error::Generator(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", settings.base_url.trim_end_matches('/')),
            api_key: settings.api_key.trim().to_string(),
            model: settings.model.clone(),
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
            top_p: settings.top_p,
        })
    }

    pub fn endpoint(&self) -> &str { &self.endpoint }
    pub fn model(&self) -> &str { &self.model }

    fn chat_request(&self, request: &AnswerRequest, stream: bool) -> ChatRequest<'_> {
        ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage { role: "system", content: request.system_prompt.clone() },
                ChatMessage { role: "user", content: user_message(request) },
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            top_p: self.top_p,
            stream,
        }
    }

    fn post(&self, body: &ChatRequest<'_>) -> Result<Response> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .map_err(|e| Error::Generator(format!("request to {} failed: {e}", self.endpoint)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().unwrap_or_default();
            error!(%status, detail = %detail, "chat completion rejected");
            return Err(Error::Generator(format!("HTTP {status}: {detail}")));
        }
        Ok(response)
    }
}

impl AnswerGenerator for RemoteGenerator {
    fn name(&self) -> &'static str { "remote" }

    fn is_ready(&self) -> bool { !self.api_key.is_empty() }

    #[instrument(skip_all, fields(model = %self.model))]
    fn generate(&self, request: &AnswerRequest) -> Result<String> {
        let response: ChatResponse = self
            .post(&self.chat_request(request, false))?
            .json()
            .map_err(|e| Error::Generator(format!("invalid completion response: {e}")))?;

        if let Some(usage) = &response.usage {
            info!(
                input_tokens = usage.prompt_tokens,
                output_tokens = usage.completion_tokens,
                total_tokens = usage.total_tokens,
                "chat completion usage"
            );
        }

        let answer = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|content| content.trim().to_string())
            .unwrap_or_default();
        if answer.is_empty() {
            return Err(Error::Generator("no answer content in completion".to_string()));
        }
        info!(chars = answer.chars().count(), "generated answer");
        Ok(answer)
    }

    #[instrument(skip_all, fields(model = %self.model))]
    fn generate_stream(&self, request: &AnswerRequest) -> Result<AnswerStream> {
        let response = self.post(&self.chat_request(request, true))?;
        Ok(Box::new(SseFragments::new(BufReader::new(response))))
    }
}

pub(crate) fn user_message(request: &AnswerRequest) -> String {
    format!(
        "Context:\n{}\n\nQuestion: {}\n\nPlease provide a comprehensive answer based on the context provided.",
        request.context, request.question
    )
}
