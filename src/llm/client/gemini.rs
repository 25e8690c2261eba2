//! Gemini Provider支持模块

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::ModelClient;
use super::types::{GenerateResponse, GenerationConfig, GroundingChunk, GroundingMetadata, ModelTool};
use crate::config::LLMConfig;
use crate::error::ModelError;

/// Gemini generateContent REST 客户端
#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    api_base_url: String,
    model: String,
}

impl GeminiClient {
    /// 根据配置创建客户端
    pub fn new(config: &LLMConfig) -> Result<Self, ModelError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            api_key: config.api_key.clone(),
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.api_base_url, self.model)
    }

    async fn send(&self, body: &GenerateContentRequest) -> Result<GenerateResponse, ModelError> {
        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = truncate(&text, 500);
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                return Err(ModelError::RateLimited(message));
            }
            return Err(ModelError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let payload: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| ModelError::Decode(e.to_string()))?;
        payload.into_response()
    }
}

#[async_trait]
impl ModelClient for GeminiClient {
    async fn generate(
        &self,
        prompt: &str,
        config: &GenerationConfig,
    ) -> Result<GenerateResponse, ModelError> {
        if config.is_cancelled() {
            return Err(ModelError::Cancelled);
        }

        let body = GenerateContentRequest::build(prompt, config);
        debug!(model = %self.model, tools = body.tools.len(), "calling generateContent");

        match &config.cancellation {
            Some(token) => {
                tokio::select! {
                    _ = token.cancelled() => Err(ModelError::Cancelled),
                    result = self.send(&body) => result,
                }
            }
            None => self.send(&body).await,
        }
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let head: String = text.chars().take(max_chars).collect();
    format!("{}...", head)
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    thought: Option<bool>,
}

impl Content {
    fn from_text(role: Option<&str>, text: &str) -> Self {
        Self {
            role: role.map(str::to_string),
            parts: vec![Part {
                text: Some(text.to_string()),
                thought: None,
            }],
        }
    }
}

#[derive(Debug, Serialize, Default)]
#[serde(rename_all = "camelCase")]
struct WireGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireTool {
    google_search: serde_json::Map<String, Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    generation_config: WireGenerationConfig,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool>,
}

impl GenerateContentRequest {
    fn build(prompt: &str, config: &GenerationConfig) -> Self {
        let tools = config
            .tools
            .iter()
            .map(|tool| match tool {
                ModelTool::GoogleSearch => WireTool {
                    google_search: serde_json::Map::new(),
                },
            })
            .collect();

        Self {
            contents: vec![Content::from_text(Some("user"), prompt)],
            system_instruction: config
                .system_instruction
                .as_deref()
                .map(|text| Content::from_text(None, text)),
            generation_config: WireGenerationConfig {
                temperature: config.temperature,
                top_p: config.top_p,
                max_output_tokens: config.max_output_tokens,
                response_mime_type: config
                    .wants_json()
                    .then(|| "application/json".to_string()),
                response_schema: config.response_schema.clone(),
            },
            tools,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    grounding_metadata: Option<WireGroundingMetadata>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct WireGroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<WireGroundingChunk>,
    #[serde(default)]
    web_search_queries: Vec<String>,
    #[serde(default)]
    retrieval_queries: Vec<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct WireGroundingChunk {
    web: Option<WebChunk>,
    retrieved_context: Option<RetrievedContextChunk>,
}

#[derive(Debug, Deserialize, Default)]
struct WebChunk {
    uri: Option<String>,
    title: Option<String>,
    domain: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct RetrievedContextChunk {
    uri: Option<String>,
    title: Option<String>,
}

impl WireGroundingChunk {
    fn normalize(self, index: usize) -> Option<GroundingChunk> {
        if let Some(web) = self.web
            && let Some(uri) = web.uri.filter(|uri| !uri.trim().is_empty())
        {
            return Some(GroundingChunk {
                index,
                url: uri,
                title: web.title,
                domain: web.domain,
            });
        }

        if let Some(context) = self.retrieved_context
            && let Some(uri) = context.uri.filter(|uri| !uri.trim().is_empty())
        {
            return Some(GroundingChunk {
                index,
                url: uri,
                title: context.title,
                domain: None,
            });
        }

        None
    }
}

impl GenerateContentResponse {
    fn into_response(self) -> Result<GenerateResponse, ModelError> {
        let Some(candidate) = self.candidates.into_iter().next() else {
            if let Some(reason) = self.prompt_feedback.and_then(|f| f.block_reason) {
                return Err(ModelError::Blocked(reason));
            }
            return Ok(GenerateResponse::default());
        };

        let text = candidate
            .content
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter(|part| part.thought != Some(true))
                    .filter_map(|part| part.text)
                    .collect::<String>()
            })
            .unwrap_or_default();

        let grounding = candidate.grounding_metadata.map(|metadata| {
            let mut web_search_queries = metadata.web_search_queries;
            if web_search_queries.is_empty() {
                web_search_queries = metadata.retrieval_queries;
            }
            GroundingMetadata {
                chunks: metadata
                    .grounding_chunks
                    .into_iter()
                    .enumerate()
                    .filter_map(|(index, chunk)| chunk.normalize(index))
                    .collect(),
                web_search_queries,
            }
        });

        Ok(GenerateResponse { text, grounding })
    }
}
