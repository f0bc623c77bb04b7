// Classification of a successful (HTTP 200) chat-completion body.

use serde::Serialize;
use serde_json::Value;

use crate::FailureKind;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ClassifiedResult {
    /// The reply is a link to a report.
    Url(String),
    /// The reply is plain text.
    Text(String),
    /// The body did not have `choices[0].message.content`; `raw` is what came back.
    Malformed { raw: String },
}

impl ClassifiedResult {
    /// Malformed bodies are reported as warnings, but they still carry a failure tag.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            ClassifiedResult::Malformed { .. } => Some(FailureKind::Malformed),
            _ => None,
        }
    }
}

/// Classify a parsed response body.
pub fn classify_response(body: &Value) -> ClassifiedResult {
    let content = body
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(Value::as_str);

    match content {
        Some(s) if s.starts_with("http://") || s.starts_with("https://") => {
            ClassifiedResult::Url(s.to_string())
        }
        Some(s) => ClassifiedResult::Text(s.to_string()),
        None => ClassifiedResult::Malformed {
            raw: body.to_string(),
        },
    }
}

/// Classify a raw response body. Text that is not JSON is malformed.
pub fn classify_body(body: &str) -> ClassifiedResult {
    match serde_json::from_str::<Value>(body) {
        Ok(value) => classify_response(&value),
        Err(e) => {
            tracing::debug!(error = %e, "Chat response body is not JSON");
            ClassifiedResult::Malformed {
                raw: body.to_string(),
            }
        }
    }
}
