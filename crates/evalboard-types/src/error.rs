use serde::{Deserialize, Serialize};

/// Error envelope returned by the backend.
///
/// FastAPI-style servers answer `{"detail": "..."}` or, for validation
/// failures, `{"detail": [{"loc": [...], "msg": "..."}]}`. Older endpoints
/// wrap errors as `{"error": {"code", "message", "type"}}` or `{"message"}`.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ErrorBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<ErrorDetail>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorEnvelope>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ErrorDetail {
    Message(String),
    Validation(Vec<ValidationIssue>),
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ValidationIssue {
    #[serde(default)]
    pub loc: Vec<serde_json::Value>,
    pub msg: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ErrorEnvelope {
    pub code: u16,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl ErrorBody {
    pub fn detail(message: impl Into<String>) -> Self {
        Self {
            detail: Some(ErrorDetail::Message(message.into())),
            ..Default::default()
        }
    }

    /// First human-readable message carried by the body, if any.
    pub fn message(&self) -> Option<String> {
        match &self.detail {
            Some(ErrorDetail::Message(msg)) => return Some(msg.clone()),
            Some(ErrorDetail::Validation(issues)) => {
                if let Some(issue) = issues.first() {
                    return Some(issue.msg.clone());
                }
            }
            None => {}
        }
        if let Some(envelope) = &self.error {
            return Some(envelope.message.clone());
        }
        self.message.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_string_is_the_message() {
        let body: ErrorBody =
            serde_json::from_str(r#"{"detail":"Incorrect email or password"}"#).unwrap();
        assert_eq!(body.message().as_deref(), Some("Incorrect email or password"));
    }

    #[test]
    fn validation_detail_uses_first_issue() {
        let body: ErrorBody = serde_json::from_str(
            r#"{"detail":[{"loc":["query","page_size"],"msg":"must be at most 100"},{"loc":[],"msg":"other"}]}"#,
        )
        .unwrap();
        assert_eq!(body.message().as_deref(), Some("must be at most 100"));
    }

    #[test]
    fn error_envelope_and_plain_message() {
        let body: ErrorBody = serde_json::from_str(
            r#"{"error":{"code":404,"message":"Dataset not found","type":"not_found"}}"#,
        )
        .unwrap();
        assert_eq!(body.message().as_deref(), Some("Dataset not found"));

        let body: ErrorBody = serde_json::from_str(r#"{"message":"nope"}"#).unwrap();
        assert_eq!(body.message().as_deref(), Some("nope"));

        let body: ErrorBody = serde_json::from_str("{}").unwrap();
        assert_eq!(body.message(), None);
    }
}
