//! Grounded single-turn chat.
//!
//! A request always has the same three messages:
//!
//! | # | Role | Content |
//! |---|------|---------|
//! | 1 | system | the configured instruction |
//! | 2 | system | the assembled context block |
//! | 3 | user | the raw query |
//!
//! Exactly one request is sent per invocation. Transport failures,
//! non-success statuses and responses without a string answer all surface
//! as [`Error::ChatService`]; nothing is retried and nothing streams.

use anyhow::{bail, Result as AnyResult};
use async_trait::async_trait;
use std::io::{BufRead, Write};
use std::time::Duration;

use crate::config::{ChatConfig, Config};
use crate::error::{Error, Result};
use crate::index;
use crate::models::ChatMessage;
use crate::retrieve::{build_context, ContextBlock};
use crate::sync;

#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Send `messages` to `model` and return the answer text verbatim.
    async fn chat(&self, model: &str, messages: &[ChatMessage]) -> Result<String>;
}

pub fn build_messages(system_prompt: &str, context: &ContextBlock, query: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(system_prompt),
        ChatMessage::system(context.text.clone()),
        ChatMessage::user(query),
    ]
}

/// Issue the one chat request for `query` grounded on `context`.
pub async fn answer(
    client: &dyn ChatClient,
    config: &ChatConfig,
    context: &ContextBlock,
    query: &str,
) -> Result<String> {
    let messages = build_messages(&config.system_prompt, context, query);
    client.chat(&config.model, &messages).await
}

pub fn create_chat_client(config: &ChatConfig) -> Result<Box<dyn ChatClient>> {
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .map_err(Error::chat)?;

    match config.provider.as_str() {
        "openai" => {
            let api_key = std::env::var("OPENAI_API_KEY")
                .map_err(|_| Error::chat("OPENAI_API_KEY environment variable not set"))?;
            Ok(Box::new(OpenAiChat {
                http,
                url: config.base_url().to_string(),
                api_key,
            }))
        }
        _ => Ok(Box::new(OllamaChat {
            http,
            url: config.base_url().to_string(),
        })),
    }
}

async fn send(
    request: reqwest::RequestBuilder,
    body: &serde_json::Value,
    label: &str,
) -> Result<serde_json::Value> {
    let response = request
        .json(body)
        .send()
        .await
        .map_err(|e| Error::chat(format!("{} request failed: {}", label, e)))?;

    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        return Err(Error::chat(format!("{} returned {}: {}", label, status, text)));
    }

    response
        .json()
        .await
        .map_err(|e| Error::chat(format!("{} sent a non-JSON body: {}", label, e)))
}

// ============ Ollama ============

pub struct OllamaChat {
    http: reqwest::Client,
    url: String,
}

#[async_trait]
impl ChatClient for OllamaChat {
    async fn chat(&self, model: &str, messages: &[ChatMessage]) -> Result<String> {
        let body = serde_json::json!({
            "model": model,
            "messages": messages,
            "stream": false,
        });
        let request = self.http.post(format!("{}/api/chat", self.url));
        let json = send(request, &body, "Ollama").await?;
        parse_ollama_answer(&json)
    }
}

fn parse_ollama_answer(json: &serde_json::Value) -> Result<String> {
    json.pointer("/message/content")
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| Error::chat("Ollama response has no message.content"))
}

// ============ OpenAI ============

pub struct OpenAiChat {
    http: reqwest::Client,
    url: String,
    api_key: String,
}

#[async_trait]
impl ChatClient for OpenAiChat {
    async fn chat(&self, model: &str, messages: &[ChatMessage]) -> Result<String> {
        let body = serde_json::json!({
            "model": model,
            "messages": messages,
        });
        let request = self
            .http
            .post(format!("{}/v1/chat/completions", self.url))
            .header("Authorization", format!("Bearer {}", self.api_key));
        let json = send(request, &body, "OpenAI").await?;
        parse_openai_answer(&json)
    }
}

fn parse_openai_answer(json: &serde_json::Value) -> Result<String> {
    json.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| Error::chat("OpenAI response has no choices[0].message.content"))
}

// ============ CLI ============

/// `pdfctx ask`: sync (unless skipped), retrieve, ask, print.
pub async fn run_ask(config: &Config, query: Option<String>, skip_sync: bool) -> AnyResult<()> {
    let index = index::open_index(config).await?;

    if !skip_sync {
        let report = sync::sync_with(config, index.as_ref()).await?;
        if !report.failed.is_empty() {
            eprintln!(
                "Warning: {} document(s) could not be indexed this run",
                report.failed.len()
            );
        }
    }

    let query = match query {
        Some(q) => q,
        None => read_query()?,
    };
    if query.trim().is_empty() {
        bail!("query is empty");
    }

    let context = build_context(index.as_ref(), &query, config.retrieval.top_k).await?;
    let client = create_chat_client(&config.chat)?;
    let reply = answer(client.as_ref(), &config.chat, &context, &query).await?;

    println!("\nModel Response:");
    println!("{}", reply);
    Ok(())
}

/// One line from stdin, with a prompt when a person is typing.
fn read_query() -> AnyResult<String> {
    if atty::is(atty::Stream::Stdin) {
        print!(">>> ");
        std::io::stdout().flush()?;
    }
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
