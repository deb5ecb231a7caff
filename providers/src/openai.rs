//! OpenAI Responses API.
//!
//! Request: `{ model, instructions, input: [{ role: "user", content }], max_output_tokens }`
//! Response: `{ output: [{ type: "message", content: [{ type: "output_text", text }] }] }`

use serde_json::{Value, json};

use crate::GenerationRequest;

pub const API_URL: &str = "https://api.openai.com/v1/responses";

pub(crate) fn build_body(model: &str, request: &GenerationRequest<'_>) -> Value {
    json!({
        "model": model,
        "stream": false,
        "max_output_tokens": request.max_output_tokens,
        "instructions": request.system_prompt,
        "input": [
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
        .bearer_auth(api_key)
        .header("content-type", "application/json")
        .json(body)
}

/// Concatenated `output_text` parts of every message item.
pub(crate) fn extract_text(json: &Value) -> Option<String> {
    if json["status"].as_str() == Some("incomplete") {
        tracing::warn!(
            reason = json["incomplete_details"]["reason"].as_str().unwrap_or("unknown"),
            "OpenAI response incomplete; output may be truncated"
        );
    }
    let items = json["output"].as_array()?;
    let texts: Vec<&str> = items
        .iter()
        .filter(|item| item["type"].as_str() == Some("message"))
        .filter_map(|item| item["content"].as_array())
        .flatten()
        .filter(|part| part["type"].as_str() == Some("output_text"))
        .filter_map(|part| part["text"].as_str())
        .collect();
    if texts.is_empty() {
        None
    } else {
        Some(texts.concat())
    }
}
