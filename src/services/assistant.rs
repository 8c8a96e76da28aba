use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::Config;
use crate::error::{excerpt, ProviderError};

/// Client for the generative-language provider. Text-only prompts and
/// image-plus-prompt requests go through the same generateContent call.
#[derive(Clone)]
pub struct AssistantClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

#[derive(Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

#[derive(Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    parts: Option<Vec<CandidatePart>>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl AssistantClient {
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: config.assistant_api_key.clone(),
            base_url: config.assistant_base_url.trim_end_matches('/').to_string(),
            model: config.assistant_model.clone(),
        }
    }

    pub async fn generate_text(&self, prompt: &str) -> Result<String, ProviderError> {
        let parts = vec![Part {
            text: Some(prompt.to_string()),
            inline_data: None,
        }];
        self.generate(parts).await
    }

    /// Sends a prompt plus an inline image to the model's vision path.
    pub async fn analyze_image(
        &self,
        prompt: &str,
        image: &[u8],
        mime_type: &str,
    ) -> Result<String, ProviderError> {
        let parts = vec![
            Part {
                text: Some(prompt.to_string()),
                inline_data: None,
            },
            Part {
                text: None,
                inline_data: Some(InlineData {
                    mime_type: mime_type.to_string(),
                    data: BASE64.encode(image),
                }),
            },
        ];
        self.generate(parts).await
    }

    async fn generate(&self, parts: Vec<Part>) -> Result<String, ProviderError> {
        let payload = GenerateContentRequest {
            contents: vec![Content { parts }],
        };

        let response = self
            .http
            .post(format!(
                "{}/models/{}:generateContent",
                self.base_url, self.model
            ))
            .header("x-goog-api-key", &self.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ProviderError::Rejected(format!(
                "model call returned {}: {}",
                status,
                excerpt(&body)
            )));
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&body)
            .map_err(|e| ProviderError::protocol(format!("malformed model response: {e}"), &body))?;

        let text: String = parsed
            .candidates
            .unwrap_or_default()
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|p| p.text)
            .collect();

        if text.is_empty() {
            return Err(ProviderError::protocol("model response carried no text", &body));
        }

        Ok(text)
    }
}

/// Structured payload extracted from free-form model output.
///
/// `confident` is false when the text did not parse as JSON and `value` is
/// the raw text wrapped as a string, so callers can still hand something
/// back instead of failing the request.
#[derive(Debug, Clone)]
pub struct ModelPayload {
    pub value: Value,
    pub confident: bool,
}

/// Extracts embedded structured data from model output.
///
/// Models routinely wrap JSON answers in Markdown code fences; this strips a
/// leading ```json or ``` fence and the trailing fence before parsing, and
/// falls back to the raw text with a low-confidence marker when nothing
/// parses.
pub fn extract_structured(text: &str) -> ModelPayload {
    let trimmed = text.trim();
    let candidate = strip_code_fence(trimmed);

    match serde_json::from_str::<Value>(candidate) {
        Ok(value) => ModelPayload {
            value,
            confident: true,
        },
        Err(_) => ModelPayload {
            value: Value::String(trimmed.to_string()),
            confident: false,
        },
    }
}

fn strip_code_fence(text: &str) -> &str {
    let rest = if let Some(rest) = text.strip_prefix("```json") {
        rest
    } else if let Some(rest) = text.strip_prefix("```") {
        rest
    } else {
        return text;
    };

    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_plain_json() {
        let payload = extract_structured(r#"{"medications": []}"#);
        assert!(payload.confident);
        assert_eq!(payload.value, json!({"medications": []}));
    }

    #[test]
    fn extracts_json_from_tagged_fence() {
        let payload = extract_structured("```json\n{\"dosage\": \"5mg\"}\n```");
        assert!(payload.confident);
        assert_eq!(payload.value, json!({"dosage": "5mg"}));
    }

    #[test]
    fn extracts_json_from_bare_fence() {
        let payload = extract_structured("```\n[1, 2, 3]\n```");
        assert!(payload.confident);
        assert_eq!(payload.value, json!([1, 2, 3]));
    }

    #[test]
    fn falls_back_to_raw_text_with_low_confidence() {
        let payload = extract_structured("The prescription is illegible.");
        assert!(!payload.confident);
        assert_eq!(
            payload.value,
            Value::String("The prescription is illegible.".to_string())
        );
    }

    #[test]
    fn fenced_prose_still_falls_back() {
        let payload = extract_structured("```\nnot json at all\n```");
        assert!(!payload.confident);
    }

    #[test]
    fn model_response_text_parses() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"hello"},{"text":" world"}]}}]}"#;
        let parsed: GenerateContentResponse = serde_json::from_str(body).unwrap();
        let text: String = parsed
            .candidates
            .unwrap()
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts)
            .unwrap()
            .into_iter()
            .filter_map(|p| p.text)
            .collect();
        assert_eq!(text, "hello world");
    }
}
