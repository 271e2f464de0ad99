//! Text generation backends.
//!
//! Every stage talks to a [`Generator`]: one request in, one text out. When a
//! request carries a JSON schema the backend is asked for schema-constrained
//! output, but callers still parse and validate what comes back.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

use lazypack_shared::{
    AppConfig, BackendKind, GenerationConfig, LazyPackError, Result, resolve_api_key,
};

/// Maximum characters of an error body quoted in a `Generation` error.
const ERROR_BODY_PREVIEW: usize = 300;

/// One generation call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub system_instruction: String,
    /// JSON schema the response must follow; `None` for free-form text.
    pub schema: Option<Value>,
}

/// A text generation backend.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Send one request and return the raw response text.
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;
}

/// Build the backend selected in `[generation]`.
pub fn build_generator(config: &AppConfig) -> Result<Arc<dyn Generator>> {
    let generation = &config.generation;
    match generation.backend {
        BackendKind::Openrouter => {
            let api_key = resolve_api_key(config)?;
            Ok(Arc::new(OpenRouterGenerator::new(generation, api_key)?))
        }
        BackendKind::Proxy => Ok(Arc::new(ProxyGenerator::new(generation)?)),
    }
}

fn http_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| LazyPackError::Generation(format!("failed to build HTTP client: {e}")))
}

/// Turn a non-2xx response into a `Generation` error quoting the body.
async fn status_error(backend: &str, response: reqwest::Response) -> LazyPackError {
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<body unavailable>".to_string());
    let preview: String = body.chars().take(ERROR_BODY_PREVIEW).collect();
    LazyPackError::Generation(format!("{backend} returned {status}: {preview}"))
}

// ---------------------------------------------------------------------------
// OpenRouter (OpenAI-compatible chat completions)
// ---------------------------------------------------------------------------

/// Chat-completions backend for OpenRouter or any OpenAI-compatible endpoint.
pub struct OpenRouterGenerator {
    client: Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl OpenRouterGenerator {
    pub fn new(config: &GenerationConfig, api_key: String) -> Result<Self> {
        Ok(Self {
            client: http_client(config.timeout_secs)?,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key,
        })
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    json_schema: JsonSchemaSpec<'a>,
}

#[derive(Serialize)]
struct JsonSchemaSpec<'a> {
    name: &'static str,
    schema: &'a Value,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl Generator for OpenRouterGenerator {
    #[instrument(skip_all, fields(model = %self.model, schema = request.schema.is_some()))]
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system_instruction,
                },
                ChatMessage {
                    role: "user",
                    content: &request.prompt,
                },
            ],
            response_format: request.schema.as_ref().map(|schema| ResponseFormat {
                kind: "json_schema",
                json_schema: JsonSchemaSpec {
                    name: "response",
                    schema,
                },
            }),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.api_key.trim())
            .json(&body)
            .send()
            .await
            .map_err(|e| LazyPackError::Generation(format!("chat completions request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(status_error("chat completions", response).await);
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| LazyPackError::Generation(format!("malformed chat completions response: {e}")))?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LazyPackError::Generation("response contained no choices".into()))?
            .message
            .content
            .unwrap_or_default();

        debug!(chars = text.chars().count(), "generation completed");
        Ok(text)
    }
}

// ---------------------------------------------------------------------------
// Curation proxy
// ---------------------------------------------------------------------------

/// Backend for a curation proxy that holds the vendor key server-side.
///
/// Contract: `POST {endpoint}` with `{prompt, systemInstruction, responseSchema?}`.
/// With a schema the proxy answers with the parsed JSON document itself;
/// without one it answers `{"text": "..."}`.
pub struct ProxyGenerator {
    client: Client,
    endpoint: String,
}

impl ProxyGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        Ok(Self {
            client: http_client(config.timeout_secs)?,
            endpoint: config.endpoint.clone(),
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProxyRequest<'a> {
    prompt: &'a str,
    system_instruction: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<&'a Value>,
}

#[derive(Debug, Deserialize)]
struct ProxyText {
    #[serde(default)]
    text: String,
}

#[async_trait]
impl Generator for ProxyGenerator {
    #[instrument(skip_all, fields(endpoint = %self.endpoint, schema = request.schema.is_some()))]
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let body = ProxyRequest {
            prompt: &request.prompt,
            system_instruction: &request.system_instruction,
            response_schema: request.schema.as_ref(),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| LazyPackError::Generation(format!("proxy request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(status_error("proxy", response).await);
        }

        let text = if request.schema.is_some() {
            let value: Value = response
                .json()
                .await
                .map_err(|e| LazyPackError::Generation(format!("malformed proxy response: {e}")))?;
            serde_json::to_string(&value)
                .map_err(|e| LazyPackError::Generation(format!("re-encoding proxy response: {e}")))?
        } else {
            response
                .json::<ProxyText>()
                .await
                .map_err(|e| LazyPackError::Generation(format!("malformed proxy response: {e}")))?
                .text
        };

        debug!(chars = text.chars().count(), "generation completed");
        Ok(text)
    }
}
