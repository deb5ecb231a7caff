//! Anthropic Messages API.
//!
//! Request: `{ model, max_tokens, system, messages: [{ role: "user", content }] }`
//! Response: `{ content: [{ type: "text", text }], stop_reason }`

use serde_json::{Value, json};

use crate::GenerationRequest;

pub const API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

pub(crate) fn build_body(model: &str, request: &GenerationRequest<'_>) -> Value {
    json!({
        "model": model,
        "max_tokens": request.max_output_tokens,
        "stream": false,
        "system": request.system_prompt,
        "messages": [
            { "role": "user", "content": request.user_prompt }
        ]
    })
}

pub(crate) fn build_request(
    client: &reqwest::Client,
    url: &str,
    api_key: &str,
    body: &Value,
) -> reqwest::RequestBuilder {
    client
        .post(url)
        .header("x-api-key", api_key)
        .header("anthropic-version", ANTHROPIC_VERSION)
        .header("content-type", "application/json")
        .json(body)
}

/// Concatenated text blocks; `None` when the response carries none.
pub(crate) fn extract_text(json: &Value) -> Option<String> {
    if json["stop_reason"].as_str() == Some("max_tokens") {
        tracing::warn!("Claude response hit max_tokens; output is truncated");
    }
    let blocks = json["content"].as_array()?;
    let texts: Vec<&str> = blocks
        .iter()
        .filter(|block| block["type"].as_str() == Some("text"))
        .filter_map(|block| block["text"].as_str())
        .collect();
    if texts.is_empty() {
        None
    } else {
        Some(texts.concat())
    }
}
