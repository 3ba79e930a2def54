use serde::{Deserialize, Serialize};

use super::prompt::NarrativePrompt;
use crate::config::NarrativeConfig;
use crate::error::{ConfigError, NarrativeError};

/// Anything that can turn a prompt into prose.
pub trait CompletionService: Send {
    fn complete(&self, prompt: &NarrativePrompt) -> Result<String, NarrativeError>;
}

// ---------------------------------------------------------------------------
// Wire format (chat completions)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

fn unavailable(reason: impl Into<String>) -> NarrativeError {
    NarrativeError::ServiceUnavailable(reason.into())
}

/// First completion text of a successful response body.
fn parse_completion(body: &str) -> Result<String, NarrativeError> {
    let response: ChatResponse =
        serde_json::from_str(body).map_err(|e| unavailable(format!("unexpected response: {e}")))?;
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|text| !text.trim().is_empty())
        .ok_or_else(|| unavailable("response contained no completion"))
}

/// Human-readable reason for a non-2xx response.
fn describe_failure(status: reqwest::StatusCode, body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => format!("HTTP {status}: {}", envelope.error.message),
        Err(_) => {
            let snippet: String = body.chars().take(300).collect();
            format!("HTTP {status}: {snippet}")
        }
    }
}

// ---------------------------------------------------------------------------
// HTTP client
// ---------------------------------------------------------------------------

/// Blocking chat-completion client. One request per call, no retries.
#[derive(Debug, Clone)]
pub struct CompletionClient {
    config: NarrativeConfig,
    api_key: String,
}

impl CompletionClient {
    /// Fails with `NoCredential` when no key is configured.
    pub fn new(config: &NarrativeConfig) -> Result<Self, ConfigError> {
        let api_key = config.credential()?.to_string();
        Ok(Self {
            config: config.clone(),
            api_key,
        })
    }
}

impl CompletionService for CompletionClient {
    fn complete(&self, prompt: &NarrativePrompt) -> Result<String, NarrativeError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(self.config.timeout)
            .build()
            .map_err(|e: reqwest::Error| unavailable(e.to_string()))?;

        let request = ChatRequest {
            model: &self.config.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
        };

        log::debug!("requesting completion from {} ({})", self.config.endpoint, self.config.model);
        let response = http
            .post(&self.config.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .map_err(|e: reqwest::Error| unavailable(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|e: reqwest::Error| unavailable(format!("reading response: {e}")))?;
        if !status.is_success() {
            return Err(unavailable(describe_failure(status, &body)));
        }
        parse_completion(&body)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn request_body_has_system_then_user_message() {
        let request = ChatRequest {
            model: "gpt-3.5-turbo",
            messages: [
                ChatMessage {
                    role: "system",
                    content: "persona",
                },
                ChatMessage {
                    role: "user",
                    content: "prompt",
                },
            ],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "gpt-3.5-turbo");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "prompt");
        assert!(json.get("stream").is_none());
    }

    #[test]
    fn first_choice_is_returned() {
        let body = r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"Hay una relación fuerte."}}]}"#;
        assert_eq!(parse_completion(body).unwrap(), "Hay una relación fuerte.");
    }

    #[test]
    fn empty_or_garbled_responses_are_unavailable() {
        assert!(matches!(
            parse_completion(r#"{"choices":[]}"#),
            Err(NarrativeError::ServiceUnavailable(_))
        ));
        assert!(matches!(parse_completion("<html>"), Err(NarrativeError::ServiceUnavailable(_))));
    }

    #[test]
    fn api_error_message_is_surfaced() {
        let body = r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error"}}"#;
        let reason = describe_failure(reqwest::StatusCode::UNAUTHORIZED, body);
        assert_eq!(reason, "HTTP 401 Unauthorized: Incorrect API key provided");
    }

    #[test]
    fn client_requires_credential() {
        assert_eq!(
            CompletionClient::new(&NarrativeConfig::default()).unwrap_err(),
            ConfigError::NoCredential
        );
    }

    #[test]
    fn unreachable_endpoint_is_service_unavailable() {
        let config = NarrativeConfig {
            api_key: Some("sk-test".into()),
            endpoint: "http://127.0.0.1:9/v1/chat/completions".into(),
            timeout: Duration::from_secs(2),
            ..NarrativeConfig::default()
        };
        let client = CompletionClient::new(&config).unwrap();
        let prompt = NarrativePrompt {
            system: "s".into(),
            user: "u".into(),
        };
        assert!(matches!(
            client.complete(&prompt),
            Err(NarrativeError::ServiceUnavailable(_))
        ));
    }
}
