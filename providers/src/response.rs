//! Response unwrapping shared by every collaborator call.
//!
//! Models wrap output in markdown fences and surround JSON with prose often
//! enough that each call site would otherwise grow its own string surgery.
//! Everything funnels through [`unwrap_text`] or [`unwrap_json`].

use serde::de::DeserializeOwned;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResponseError {
    #[error("response was empty")]
    Empty,
    #[error("response contained no JSON object")]
    NoJsonObject,
    #[error("response JSON did not parse: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("response JSON had an unexpected shape: {0}")]
    Shape(String),
}

/// Strip one surrounding markdown code fence (with or without a language tag).
///
/// Text that is not fenced is returned trimmed.
#[must_use]
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // Drop the info string ("json", "markdown", ...) on the opening line.
    match body.split_once('\n') {
        Some((info, content)) if !info.trim().contains(char::is_whitespace) => content.trim(),
        _ => body.trim(),
    }
}

/// Fence-stripped, non-empty plain text.
pub fn unwrap_text(raw: &str) -> Result<String, ResponseError> {
    let text = strip_code_fence(raw);
    if text.is_empty() {
        return Err(ResponseError::Empty);
    }
    Ok(text.to_string())
}

/// The first balanced `{...}` object in `text`, skipping braces inside strings.
#[must_use]
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Fence-stripped JSON object embedded in `raw`, deserialized into `T`.
pub fn unwrap_json<T: DeserializeOwned>(raw: &str) -> Result<T, ResponseError> {
    let text = strip_code_fence(raw);
    if text.is_empty() {
        return Err(ResponseError::Empty);
    }
    let object = extract_json_object(text).ok_or(ResponseError::NoJsonObject)?;
    Ok(serde_json::from_str(object)?)
}
