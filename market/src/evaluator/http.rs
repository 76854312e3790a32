// market/src/evaluator/http.rs

//! HTTP evaluator client.
//!
//! This implementation of [`Evaluator`] talks to an OpenRouter-style chat
//! completions endpoint. It assumes the service exposes a JSON API of the
//! form:
//!
//! ```json
//! POST /chat/completions
//! {
//!   "model": "google/gemini-2.0-flash-exp:free",
//!   "messages": [
//!     { "role": "system", "content": "…" },
//!     { "role": "user", "content": "…" }
//!   ],
//!   "temperature": 0.2
//! }
//!
//! Response:
//! {
//!   "choices": [ { "message": { "content": "…model text…" } } ]
//! }
//! ```
//!
//! The model's content is free text that should contain a JSON object; the
//! tolerant decode goes through [`extract_json_object`]. Vision requests
//! use the multi-part content format with an embedded image data URI.
//!
//! Every failure mode (missing credential, transport error, non-success
//! status, unparseable content) falls back to the deterministic mock
//! results rather than surfacing an error to the ledger.

use std::fmt;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::EvaluatorConfig;

use super::{
    Evaluator, ParsedTask, VerificationResult, extract_json_object, mock_parse, mock_verification,
    truncate,
};

/// Errors that can occur while contacting the evaluator service.
///
/// These never escape the adapter; they exist for logging and for tests.
#[derive(Debug)]
pub enum EvaluatorError {
    /// Transport-level error (e.g. HTTP failure, timeout).
    Transport(String),
    /// The service returned a non-success status.
    Service(String),
    /// The response was malformed or contained no parseable JSON object.
    Protocol(String),
}

impl fmt::Display for EvaluatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvaluatorError::Transport(msg) => write!(f, "evaluator transport error: {msg}"),
            EvaluatorError::Service(msg) => write!(f, "evaluator service error: {msg}"),
            EvaluatorError::Protocol(msg) => write!(f, "evaluator protocol error: {msg}"),
        }
    }
}

impl std::error::Error for EvaluatorError {}

/// HTTP-backed [`Evaluator`].
///
/// Thread-safe (`Send + Sync`); a single instance can be shared across the
/// gateway's request handlers.
pub struct EvaluatorClient {
    cfg: EvaluatorConfig,
    client: Client,
}

impl EvaluatorClient {
    /// Constructs a new evaluator client from its configuration.
    pub fn new(cfg: EvaluatorConfig) -> Result<Self, EvaluatorError> {
        let client = Client::builder()
            .timeout(cfg.timeout)
            .build()
            .map_err(|e| EvaluatorError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { cfg, client })
    }

    fn endpoint(&self) -> String {
        // Avoid accidental double slashes.
        format!(
            "{}/chat/completions",
            self.cfg.base_url.trim_end_matches('/')
        )
    }

    /// Sends a chat request and returns the first JSON object found in the
    /// model's reply.
    async fn call_model(
        &self,
        api_key: &str,
        messages: Vec<ChatMessage>,
    ) -> Result<serde_json::Value, EvaluatorError> {
        let url = self.endpoint();
        let body = ChatRequest {
            model: &self.cfg.model,
            messages: &messages,
            temperature: 0.2,
        };

        let resp = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .header("HTTP-Referer", &self.cfg.referer)
            .header("X-Title", &self.cfg.app_title)
            .json(&body)
            .send()
            .await
            .map_err(|e| EvaluatorError::Transport(format!("HTTP POST {url} failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(EvaluatorError::Service(format!(
                "evaluator returned HTTP status {status}"
            )));
        }

        let chat: ChatResponse = resp
            .json()
            .await
            .map_err(|e| EvaluatorError::Protocol(format!("failed to parse response: {e}")))?;

        let content = chat
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or_else(|| EvaluatorError::Protocol("response carried no choices".to_string()))?;

        let span = extract_json_object(content).ok_or_else(|| {
            EvaluatorError::Protocol("no JSON object found in model output".to_string())
        })?;

        serde_json::from_str(span)
            .map_err(|e| EvaluatorError::Protocol(format!("extracted span is not JSON: {e}")))
    }
}

/// Request payload for the chat completions endpoint.
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f64,
}

/// A single chat message; content is either plain text or, for vision
/// requests, a list of typed parts.
#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: MessageContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

/// Response payload from the chat completions endpoint.
#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: String,
}

fn verification_prompt(description: &str, submission: &str, has_image: bool) -> String {
    let image_note = if has_image {
        "NOTE: An image proof has been provided."
    } else {
        "NOTE: No image proof provided."
    };

    format!(
        "Task Requirements: {description}\n\n\
         Worker Submission Notes: {submission}\n\n\
         {image_note}\n\n\
         Evaluate if this task is completed satisfactorily.\n\
         Respond with ONLY valid JSON:\n\
         {{ \"score\": number (0-100), \"feedback\": \"short explanation\" }}"
    )
}

fn parse_prompt(input: &str) -> String {
    format!(
        "You are a task extractor. Extract task data from the user input.\n\n\
         User Input: \"{input}\"\n\n\
         Respond with ONLY valid JSON using this schema:\n\
         {{ \"title\": \"string (max 50 chars)\", \"description\": \"string\", \
         \"reward\": number (default 0.5 if not found), \
         \"estimatedTime\": \"string\", \"requirements\": [\"string\"] }}"
    )
}

impl Evaluator for EvaluatorClient {
    async fn verify(
        &self,
        description: &str,
        submission: &str,
        image: Option<&str>,
    ) -> VerificationResult {
        let Some(api_key) = self.cfg.api_key.as_deref() else {
            tracing::debug!("no evaluator credential configured, using mock verification");
            return mock_verification();
        };

        let prompt = verification_prompt(description, submission, image.is_some());

        // Vision requests carry the image data URI through unmodified.
        let user_content = match image {
            Some(data_uri) => MessageContent::Parts(vec![
                ContentPart::Text { text: prompt },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: data_uri.to_string(),
                    },
                },
            ]),
            None => MessageContent::Text(prompt),
        };

        let messages = vec![
            ChatMessage {
                role: "system",
                content: MessageContent::Text(
                    "You are a strict QA auditor. Analyze text and images.".to_string(),
                ),
            },
            ChatMessage {
                role: "user",
                content: user_content,
            },
        ];

        match self.call_model(api_key, messages).await {
            Ok(value) => {
                let score = value["score"].as_f64().unwrap_or(0.0).clamp(0.0, 100.0);
                let feedback = value["feedback"]
                    .as_str()
                    .unwrap_or("Verification processed")
                    .to_string();
                VerificationResult::from_score(score, feedback)
            }
            Err(e) => {
                tracing::warn!("verification call failed, using mock result: {e}");
                mock_verification()
            }
        }
    }

    async fn parse(&self, input: &str) -> ParsedTask {
        let Some(api_key) = self.cfg.api_key.as_deref() else {
            tracing::debug!("no evaluator credential configured, using mock parse");
            return mock_parse(input);
        };

        let messages = vec![
            ChatMessage {
                role: "system",
                content: MessageContent::Text(
                    "You are a helpful assistant that outputs raw JSON.".to_string(),
                ),
            },
            ChatMessage {
                role: "user",
                content: MessageContent::Text(parse_prompt(input)),
            },
        ];

        match self.call_model(api_key, messages).await {
            Ok(value) => ParsedTask {
                title: value["title"]
                    .as_str()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| truncate(input, 50)),
                description: value["description"]
                    .as_str()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| input.to_string()),
                reward: value["reward"].as_f64().unwrap_or(super::DEFAULT_REWARD),
                estimated_time: Some(
                    value["estimatedTime"]
                        .as_str()
                        .unwrap_or("5-10 min")
                        .to_string(),
                ),
                requirements: value["requirements"]
                    .as_array()
                    .map(|items| {
                        items
                            .iter()
                            .filter_map(|v| v.as_str().map(|s| s.to_string()))
                            .collect()
                    })
                    .unwrap_or_default(),
            },
            Err(e) => {
                tracing::warn!("task parse call failed, using mock result: {e}");
                mock_parse(input)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_message_serializes_as_plain_content() {
        let msg = ChatMessage {
            role: "user",
            content: MessageContent::Text("hello".to_string()),
        };
        let json = serde_json::to_value(&msg).expect("message serializes");
        assert_eq!(json["content"], "hello");
    }

    #[test]
    fn vision_message_serializes_as_typed_parts() {
        let msg = ChatMessage {
            role: "user",
            content: MessageContent::Parts(vec![
                ContentPart::Text {
                    text: "check this".to_string(),
                },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: "data:image/png;base64,AAAA".to_string(),
                    },
                },
            ]),
        };
        let json = serde_json::to_value(&msg).expect("message serializes");
        assert_eq!(json["content"][0]["type"], "text");
        assert_eq!(json["content"][1]["type"], "image_url");
        assert_eq!(
            json["content"][1]["image_url"]["url"],
            "data:image/png;base64,AAAA"
        );
    }

    #[test]
    fn chat_response_decodes() {
        let json = r#"{
            "choices": [
                { "message": { "content": "```json\n{\"score\": 92, \"feedback\": \"good\"}\n```" } }
            ]
        }"#;

        let resp: ChatResponse = serde_json::from_str(json).expect("response parses");
        let content = &resp.choices[0].message.content;
        let span = extract_json_object(content).expect("json span found");
        let value: serde_json::Value = serde_json::from_str(span).expect("span parses");
        assert_eq!(value["score"], 92);
    }

    #[test]
    fn prompts_state_image_presence_explicitly() {
        assert!(verification_prompt("d", "s", true).contains("An image proof has been provided"));
        assert!(verification_prompt("d", "s", false).contains("No image proof provided"));
    }

    #[tokio::test]
    async fn verify_without_credential_uses_mock() {
        let cfg = EvaluatorConfig {
            api_key: None,
            ..EvaluatorConfig::default()
        };
        let client = EvaluatorClient::new(cfg).expect("client builds");

        let result = client.verify("desc", "done", None).await;
        assert!(result.approved);
        assert_eq!(result.score, 95.0);
    }

    #[tokio::test]
    async fn parse_without_credential_uses_mock() {
        let cfg = EvaluatorConfig {
            api_key: None,
            ..EvaluatorConfig::default()
        };
        let client = EvaluatorClient::new(cfg).expect("client builds");

        let parsed = client.parse("Review my site for 1.5 KAS").await;
        assert_eq!(parsed.reward, 1.5);
    }
}
