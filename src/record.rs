//! Wire shapes for one compose request and the records streamed back.

use serde::{Deserialize, Serialize};

use crate::error::ComposeError;

/// Body of one human turn: `{content, artifact?, selectedText?, isDocumentEditor?}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComposeRequest {
    pub content: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub artifact: String,
    #[serde(default, rename = "selectedText")]
    pub selected_text: String,
    #[serde(default, rename = "isDocumentEditor")]
    pub is_document_editor: bool,
}

impl ComposeRequest {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn with_artifact(mut self, artifact: impl Into<String>) -> Self {
        self.artifact = artifact.into();
        self
    }

    pub fn with_selected_text(mut self, selected_text: impl Into<String>) -> Self {
        self.selected_text = selected_text.into();
        self
    }

    pub fn document_editor(mut self, enabled: bool) -> Self {
        self.is_document_editor = enabled;
        self
    }

    /// Decodes and validates a JSON request body.
    pub fn from_json(body: &str) -> Result<Self, ComposeError> {
        let request: Self = serde_json::from_str(body)
            .map_err(|error| ComposeError::Validation(format!("malformed request body: {error}")))?;
        request.validate()?;
        Ok(request)
    }

    pub fn validate(&self) -> Result<(), ComposeError> {
        if self.content.trim().is_empty() {
            return Err(ComposeError::Validation(
                "'content' must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Cumulative `(message, artifact)` view pushed to the client after each change.
///
/// `artifact` is omitted from the JSON form while empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamRecord {
    pub message: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub artifact: String,
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn request_accepts_camel_case_fields_and_defaults() {
        let request = ComposeRequest::from_json(
            r#"{"content":"tighten the intro","selectedText":"Intro","isDocumentEditor":true}"#,
        )
        .expect("valid body");

        assert_eq!(
            request,
            ComposeRequest::new("tighten the intro")
                .with_selected_text("Intro")
                .document_editor(true)
        );
    }

    #[test]
    fn request_rejects_malformed_and_blank_bodies() {
        assert_matches!(
            ComposeRequest::from_json("{\"content\":"),
            Err(ComposeError::Validation(message)) if message.starts_with("malformed request body")
        );
        assert_matches!(
            ComposeRequest::from_json(r#"{"content":"   "}"#),
            Err(ComposeError::Validation(_))
        );
        assert_matches!(
            ComposeRequest::from_json(r#"{"artifact":"x"}"#),
            Err(ComposeError::Validation(_))
        );
    }

    #[test]
    fn record_omits_empty_artifact() {
        let record = StreamRecord {
            message: "Done".to_string(),
            artifact: String::new(),
        };
        assert_eq!(
            serde_json::to_value(&record).expect("serialize"),
            json!({"message": "Done"})
        );

        let record = StreamRecord {
            message: String::new(),
            artifact: "# Title".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&record).expect("serialize"),
            json!({"message": "", "artifact": "# Title"})
        );
    }
}
