use async_trait::async_trait;
use std::sync::Arc;
use serde::{ Deserialize, Serialize };
use log::{ info, debug };

use super::{ ChatClient, Chunk, ChunkStream, CompletionResponse, http_stream_generate };
use crate::error::ChatError;
use crate::llm::{ LlmConfig, DEFAULT_CHAT_MODEL, DEFAULT_GEMINI_BASE_URL };
use crate::models::chat::{ HistoryItem, Part, Role };

const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    system_instruction: SystemInstruction,
    contents: Vec<HistoryItem>,
}

#[derive(Serialize, Debug)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GoogleResponse {
    #[serde(default)]
    candidates: Vec<GoogleCandidate>,
    prompt_feedback: Option<GooglePromptFeedback>,
    error: Option<GoogleError>,
}

#[derive(Deserialize, Debug)]
struct GoogleCandidate {
    content: Option<GoogleContent>,
}

#[derive(Deserialize, Debug)]
struct GoogleContent {
    #[serde(default)]
    parts: Vec<GooglePart>,
}

#[derive(Deserialize, Debug)]
struct GooglePart {
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GooglePromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct GoogleError {
    #[serde(default)]
    code: Option<i64>,
    message: String,
}

impl GoogleResponse {
    fn into_result(mut self) -> Result<Self, ChatError> {
        if let Some(err) = self.error.take() {
            return Err(
                ChatError::Provider(match err.code {
                    Some(code) => format!("{} ({})", err.message, code),
                    None => err.message,
                })
            );
        }
        if self.candidates.is_empty() {
            if let Some(reason) = self.prompt_feedback.as_ref().and_then(|f| f.block_reason.clone()) {
                return Err(ChatError::Provider(format!("prompt blocked: {}", reason)));
            }
        }
        Ok(self)
    }

    /// Text of the first candidate, skipping thought-summary parts.
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content.parts
                    .iter()
                    .filter(|p| !p.thought)
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

fn parse_gemini_line(line: &str) -> Option<Result<Chunk, ChatError>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with(':') {
        return None;
    }
    let data = line.strip_prefix("data:")?.trim_start();
    if data == "[DONE]" {
        return None;
    }

    let parsed = serde_json::from_str::<GoogleResponse>(data)
        .map_err(ChatError::from)
        .and_then(GoogleResponse::into_result);
    Some(parsed.map(|resp| Chunk::new(resp.text())))
}

pub struct GeminiChatClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    system_instruction: Arc<str>,
}

impl GeminiChatClient {
    pub fn new(
        api_key: String,
        model: Option<String>,
        base_url: Option<String>,
        system_instruction: Arc<str>
    ) -> Result<Self, ChatError> {
        if api_key.trim().is_empty() {
            return Err(ChatError::MissingApiKey);
        }
        let chat_model = model
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string());
        let base_url = base_url
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string());

        Ok(Self {
            http: reqwest::Client::new(),
            api_key,
            model: chat_model,
            base_url: base_url.trim_end_matches('/').to_string(),
            system_instruction,
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, ChatError> {
        let api_key = config.api_key.clone().ok_or(ChatError::MissingApiKey)?;
        Self::new(
            api_key,
            config.completion_model.clone(),
            config.base_url.clone(),
            config.system_instruction.clone()
        )
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/models/{}:{}", self.base_url, self.model, method)
    }

    fn build_request(&self, prompt: &str, history: &[HistoryItem]) -> GenerateContentRequest {
        let mut contents = history.to_vec();
        contents.push(HistoryItem {
            role: Role::User,
            parts: vec![Part { text: prompt.to_string() }],
        });
        GenerateContentRequest {
            system_instruction: SystemInstruction {
                parts: vec![Part { text: self.system_instruction.to_string() }],
            },
            contents,
        }
    }
}

#[async_trait]
impl ChatClient for GeminiChatClient {
    async fn send(
        &self,
        prompt: &str,
        history: &[HistoryItem]
    ) -> Result<CompletionResponse, ChatError> {
        info!(
            "GeminiChatClient::send() → model={} base_url={} history_len={}",
            self.model,
            self.base_url,
            history.len()
        );
        let payload = self.build_request(prompt, history);
        let resp = self.http
            .post(self.endpoint("generateContent"))
            .header(API_KEY_HEADER, &self.api_key)
            .json(&payload)
            .send().await?;

        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(ChatError::Status { status, body });
        }

        let parsed = serde_json::from_str::<GoogleResponse>(&body)?.into_result()?;
        if parsed.candidates.is_empty() {
            return Err(ChatError::EmptyResponse);
        }
        Ok(CompletionResponse { response: parsed.text() })
    }

    async fn stream_send(
        &self,
        prompt: &str,
        history: &[HistoryItem]
    ) -> Result<ChunkStream, ChatError> {
        info!(
            "GeminiChatClient::stream_send() → model={} base_url={} history_len={}",
            self.model,
            self.base_url,
            history.len()
        );
        let payload = self.build_request(prompt, history);
        let url = format!("{}?alt=sse", self.endpoint("streamGenerateContent"));
        debug!("Attempting to stream from URL: {}", url);

        // `.json()` in http_stream_generate already sets Content-Type.
        let headers = vec![(API_KEY_HEADER.to_string(), self.api_key.clone())];

        Ok(http_stream_generate(self.http.clone(), url, payload, parse_gemini_line, Some(headers)))
    }

    fn get_model(&self) -> String {
        self.model.clone()
    }

    fn get_base_url(&self) -> Option<String> {
        Some(self.base_url.clone())
    }
}
