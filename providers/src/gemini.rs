//! Gemini generateContent API.
//!
//! Request: `{ systemInstruction: { parts }, contents: [{ role: "user", parts }], generationConfig }`
//! Response: `{ candidates: [{ content: { parts: [{ text }] }, finishReason }] }`

use serde_json::{Value, json};

use crate::GenerationRequest;

pub const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

pub(crate) fn endpoint(base: &str, model: &str) -> String {
    format!("{}/models/{model}:generateContent", base.trim_end_matches('/'))
}

pub(crate) fn build_body(request: &GenerationRequest<'_>) -> Value {
    json!({
        "systemInstruction": {
            "parts": [{ "text": request.system_prompt }]
        },
        "contents": [
            { "role": "user", "parts": [{ "text": request.user_prompt }] }
        ],
        "generationConfig": {
            "maxOutputTokens": request.max_output_tokens
        }
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
        .header("x-goog-api-key", api_key)
        .header("content-type", "application/json")
        .json(body)
}

/// Text parts of the first candidate, skipping thought summaries.
pub(crate) fn extract_text(json: &Value) -> Option<String> {
    let candidate = json["candidates"].as_array()?.first()?;
    if candidate["finishReason"].as_str() == Some("MAX_TOKENS") {
        tracing::warn!("Gemini response hit MAX_TOKENS; output is truncated");
    }
    let parts = candidate["content"]["parts"].as_array()?;
    let texts: Vec<&str> = parts
        .iter()
        .filter(|part| !part["thought"].as_bool().unwrap_or(false))
        .filter_map(|part| part["text"].as_str())
        .collect();
    if texts.is_empty() {
        None
    } else {
        Some(texts.concat())
    }
}
