//! Answer generation over retrieved context.
//!
//! Defines the [`LlmClient`] trait with two chat-completions backends:
//! - **[`AzureOpenAiClient`]**: an Azure OpenAI deployment, `api-key` auth.
//! - **[`OpenAiClient`]**: the OpenAI API (or a compatible endpoint), bearer auth.
//!
//! [`Generator`] sits on top. It builds the RAG prompt, bounds concurrent
//! LLM calls with a semaphore, and turns every failure into answer text so a
//! query that found context always gets a response. Without a configured
//! client it produces deterministic mock answers.
//!
//! Requests are sent once; there is no retry.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

use crate::config::LlmConfig;
use crate::models::SearchResult;

/// Returned without calling the LLM when retrieval found nothing usable.
pub const NO_CONTEXT_ANSWER: &str = "Based on your uploaded documents, I cannot find relevant information to answer your question. Please ensure the relevant content has been uploaded to the knowledge base.";

const SYSTEM_MESSAGE: &str = "You are a Virtual Mentor, a knowledge base assistant. Please answer questions in English only, based on the provided context. Be helpful, clear, and professional.";

/// Characters of document text sent for summarization.
const SUMMARY_INPUT_CHARS: usize = 2000;

const DEFAULT_OPENAI_ENDPOINT: &str = "https://api.openai.com/v1";

/// A chat-completions backend.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Model or deployment identifier, for logging.
    fn model_name(&self) -> &str;

    /// Send one system + user exchange and return the assistant's reply.
    async fn chat(&self, system: &str, user: &str, max_tokens: u32) -> Result<String>;
}

pub struct AzureOpenAiClient {
    http: reqwest::Client,
    url: String,
    api_key: String,
    deployment: String,
    temperature: f32,
}

impl AzureOpenAiClient {
    pub fn new(config: &LlmConfig, api_key: String) -> Result<Self> {
        let endpoint = config
            .endpoint
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("llm.endpoint required for azure provider"))?;
        let deployment = config
            .deployment
            .clone()
            .ok_or_else(|| anyhow::anyhow!("llm.deployment required for azure provider"))?;
        let url = format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            endpoint.trim_end_matches('/'),
            deployment,
            config.api_version
        );
        Ok(Self {
            http: build_http(config)?,
            url,
            api_key,
            deployment,
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl LlmClient for AzureOpenAiClient {
    fn model_name(&self) -> &str {
        &self.deployment
    }

    async fn chat(&self, system: &str, user: &str, max_tokens: u32) -> Result<String> {
        let body = chat_body(None, system, user, max_tokens, self.temperature);
        let request = self
            .http
            .post(&self.url)
            .header("api-key", &self.api_key)
            .json(&body);
        send_chat(request, "Azure OpenAI").await
    }
}

pub struct OpenAiClient {
    http: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl OpenAiClient {
    pub fn new(config: &LlmConfig, api_key: String) -> Result<Self> {
        let endpoint = config
            .endpoint
            .as_deref()
            .unwrap_or(DEFAULT_OPENAI_ENDPOINT)
            .trim_end_matches('/');
        Ok(Self {
            http: build_http(config)?,
            url: format!("{}/chat/completions", endpoint),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn chat(&self, system: &str, user: &str, max_tokens: u32) -> Result<String> {
        let body = chat_body(Some(&self.model), system, user, max_tokens, self.temperature);
        let request = self
            .http
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&body);
        send_chat(request, "OpenAI").await
    }
}

fn build_http(config: &LlmConfig) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?)
}

fn chat_body(
    model: Option<&str>,
    system: &str,
    user: &str,
    max_tokens: u32,
    temperature: f32,
) -> serde_json::Value {
    let mut body = serde_json::json!({
        "messages": [
            {"role": "system", "content": system},
            {"role": "user", "content": user},
        ],
        "max_tokens": max_tokens,
        "temperature": temperature,
    });
    if let Some(model) = model {
        body["model"] = serde_json::Value::from(model);
    }
    body
}

async fn send_chat(request: reqwest::RequestBuilder, provider: &str) -> Result<String> {
    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        let body_text = response.text().await.unwrap_or_default();
        bail!("{} API error {}: {}", provider, status, body_text);
    }
    let json: serde_json::Value = response.json().await?;
    parse_chat_response(&json)
}

/// Pull `choices[0].message.content` out of a chat-completions response.
fn parse_chat_response(json: &serde_json::Value) -> Result<String> {
    json.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("Invalid chat response: missing choices[0].message.content"))
}

/// Build the configured client, or `None` for mock mode.
///
/// A remote provider without an API key degrades to mock mode with a warning.
pub fn create_client(config: &LlmConfig) -> Result<Option<Arc<dyn LlmClient>>> {
    let provider = config.provider.as_str();
    if provider == "mock" {
        return Ok(None);
    }
    let Some(api_key) = config.resolve_api_key() else {
        tracing::warn!(provider, "no API key configured, using mock responses");
        return Ok(None);
    };
    let client: Arc<dyn LlmClient> = match provider {
        "azure" => Arc::new(AzureOpenAiClient::new(config, api_key)?),
        "openai" => Arc::new(OpenAiClient::new(config, api_key)?),
        other => bail!("Unknown llm provider: {}", other),
    };
    Ok(Some(client))
}

pub struct Generator {
    client: Option<Arc<dyn LlmClient>>,
    permits: Semaphore,
    max_tokens: u32,
}

impl Generator {
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let client = create_client(config)?;
        if let Some(c) = &client {
            tracing::info!(model = c.model_name(), "LLM client ready");
        }
        Ok(Self::with_client(client, config.max_concurrent, config.max_tokens))
    }

    pub fn with_client(
        client: Option<Arc<dyn LlmClient>>,
        max_concurrent: usize,
        max_tokens: u32,
    ) -> Self {
        Self {
            client,
            permits: Semaphore::new(max_concurrent.max(1)),
            max_tokens,
        }
    }

    /// A generator with no client; every answer is a mock.
    pub fn mock() -> Self {
        Self::with_client(None, 1, 1000)
    }

    pub fn is_mock(&self) -> bool {
        self.client.is_none()
    }

    /// Answer `query` from the retrieved `results`.
    pub async fn generate_answer(&self, query: &str, results: &[SearchResult]) -> String {
        let context = build_context(results);
        if context.trim().is_empty() {
            return NO_CONTEXT_ANSWER.to_string();
        }

        let Some(client) = &self.client else {
            return mock_answer(query, &context);
        };

        let prompt = rag_prompt(query, &context);
        match self.call(client.as_ref(), &prompt, self.max_tokens).await {
            Ok(answer) => answer,
            Err(e) => {
                tracing::warn!("error generating response: {:#}", e);
                format!(
                    "Sorry, an error occurred while generating the response: {}",
                    e
                )
            }
        }
    }

    /// Short summary of `text` in at most `max_words` words.
    pub async fn summarize_document(&self, text: &str, max_words: u32) -> String {
        let Some(client) = &self.client else {
            return format!(
                "Document summary (mock): This document contains approximately {} words.",
                text.split_whitespace().count()
            );
        };

        let excerpt: String = text.chars().take(SUMMARY_INPUT_CHARS).collect();
        let prompt = format!(
            "Please provide a concise summary of the following text in no more than {} words:\n\n{}\n\nSummary:",
            max_words, excerpt
        );
        match self.call(client.as_ref(), &prompt, max_words).await {
            Ok(summary) => summary,
            Err(e) => {
                tracing::warn!("error generating summary: {:#}", e);
                format!(
                    "Summary unavailable. Document length: {} characters.",
                    text.chars().count()
                )
            }
        }
    }

    async fn call(&self, client: &dyn LlmClient, prompt: &str, max_tokens: u32) -> Result<String> {
        let _permit = self.permits.acquire().await?;
        tracing::debug!(model = client.model_name(), "calling LLM");
        client.chat(SYSTEM_MESSAGE, prompt, max_tokens).await
    }
}

/// `[Source i: name]` blocks for every result with non-empty content.
fn build_context(results: &[SearchResult]) -> String {
    results
        .iter()
        .enumerate()
        .filter_map(|(i, r)| {
            let content = r.content.trim();
            if content.is_empty() {
                return None;
            }
            Some(format!("[Source {}: {}]\n{}", i + 1, r.metadata.source, content))
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn rag_prompt(query: &str, context: &str) -> String {
    format!(
        "You are Virtual Mentor, a knowledge base assistant. Please answer the user's question strictly based on the provided context information.

Important rules:
1. Only use the provided context information to answer questions
2. Do not use your pre-trained knowledge to answer
3. If there is no relevant information in the context, clearly state \"Based on the provided documents, I cannot find relevant information to answer this question\"
4. When answering, please indicate which source the information comes from
5. Answer in English only
6. Be helpful, clear, and professional in your responses
7. You may quote code examples or technical content exactly as it appears in the documents

Context information:
{context}

User question: {query}

Please answer based on the above context information:"
    )
}

fn mock_answer(query: &str, context: &str) -> String {
    format!(
        "Virtual Mentor - Mock Response for development:

Query: {}

Based on the available context, this is a simulated response. With an LLM provider configured, this answer would be generated from the retrieved documents.

Context summary: {} characters of context were provided.

To enable real AI responses, set [llm] provider and credentials in the config file.",
        query,
        context.chars().count()
    )
}
