//! Optional category classifier over an OpenAI-compatible chat API.
//!
//! A suggestion is only returned when its `category_id` belongs to the list
//! the model was given and its probability lies in `[0, 1]`.

use api_types::{TransactionType, category::Category};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

const SYSTEM_PROMPT: &str = "You are a transaction category classifier. Return strict JSON only: \
{\"category_id\":\"...\",\"probability\":0..1,\"reason\":\"...\"}. \
If uncertain, keep probability low.";

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("network error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("classifier returned {0}")]
    Status(StatusCode),
    #[error("classifier returned no content")]
    EmptyResponse,
    #[error("malformed suggestion: {0}")]
    Malformed(String),
    #[error("suggested category {0} is not in the list")]
    UnknownCategory(String),
    #[error("probability {0} out of range")]
    ProbabilityOutOfRange(f64),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Suggestion {
    pub category_id: String,
    pub probability: f64,
    pub reason: String,
}

#[derive(Debug, Deserialize)]
struct RawSuggestion {
    category_id: String,
    probability: f64,
    #[serde(default)]
    reason: String,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: String,
}

#[derive(Serialize)]
struct CategoryOption<'a> {
    id: &'a str,
    name: &'a str,
}

#[derive(Serialize)]
struct PromptInput<'a> {
    description: &'a str,
    transaction_type: &'a str,
    locale: &'a str,
    categories: Vec<CategoryOption<'a>>,
}

#[derive(Clone, Debug)]
pub struct LlmClassifier {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl LlmClassifier {
    /// `client` should carry the per-call timeout.
    pub fn new(client: Client, base_url: &str, api_key: &str, model: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }

    pub async fn classify(
        &self,
        description: &str,
        kind: TransactionType,
        locale: &str,
        categories: &[Category],
    ) -> Result<Suggestion, LlmError> {
        let input = PromptInput {
            description,
            transaction_type: kind.as_str(),
            locale,
            categories: categories
                .iter()
                .map(|c| CategoryOption {
                    id: &c.id,
                    name: &c.name,
                })
                .collect(),
        };
        let input =
            serde_json::to_string(&input).map_err(|err| LlmError::Malformed(err.to_string()))?;
        let user = format!("Select best category from provided list. Input: {input}");

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&ChatRequest {
                model: &self.model,
                temperature: 0.0,
                messages: vec![
                    ChatMessage {
                        role: "system",
                        content: SYSTEM_PROMPT,
                    },
                    ChatMessage {
                        role: "user",
                        content: &user,
                    },
                ],
            })
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(LlmError::Status(status));
        }

        let body: ChatResponse = resp.json().await?;
        let content = body
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(LlmError::EmptyResponse)?;
        validate(&content, categories)
    }
}

/// Text between the first `{` and the last `}`; tolerates code fences.
fn extract_json(content: &str) -> Option<&str> {
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    (start < end).then(|| &content[start..=end])
}

fn validate(content: &str, categories: &[Category]) -> Result<Suggestion, LlmError> {
    let json = extract_json(content).ok_or_else(|| LlmError::Malformed(content.to_string()))?;
    let raw: RawSuggestion =
        serde_json::from_str(json).map_err(|err| LlmError::Malformed(err.to_string()))?;

    if !categories.iter().any(|c| c.id == raw.category_id) {
        return Err(LlmError::UnknownCategory(raw.category_id));
    }
    if !(0.0..=1.0).contains(&raw.probability) {
        return Err(LlmError::ProbabilityOutOfRange(raw.probability));
    }
    Ok(Suggestion {
        category_id: raw.category_id,
        probability: raw.probability,
        reason: raw.reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn categories() -> Vec<Category> {
        ["food", "transport"]
            .into_iter()
            .map(|id| Category {
                id: id.to_string(),
                code: id.to_string(),
                name: id.to_string(),
                emoji: String::new(),
                kind: Some(TransactionType::Expense),
                active: true,
            })
            .collect()
    }

    fn reply(content: &str) -> serde_json::Value {
        serde_json::json!({"choices": [{"message": {"role": "assistant", "content": content}}]})
    }

    #[test]
    fn fenced_json_is_accepted() {
        let s = validate(
            "```json\n{\"category_id\":\"food\",\"probability\":0.8,\"reason\":\"lunch\"}\n```",
            &categories(),
        )
        .unwrap();
        assert_eq!(s.category_id, "food");
        assert_eq!(s.reason, "lunch");
    }

    #[test]
    fn suggestions_outside_the_list_or_range_are_rejected() {
        assert!(matches!(
            validate(r#"{"category_id":"rent","probability":0.9}"#, &categories()),
            Err(LlmError::UnknownCategory(id)) if id == "rent"
        ));
        assert!(matches!(
            validate(r#"{"category_id":"food","probability":1.5}"#, &categories()),
            Err(LlmError::ProbabilityOutOfRange(_))
        ));
        assert!(matches!(
            validate("no json here", &categories()),
            Err(LlmError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn classify_calls_chat_completions() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer key"))
            .and(body_partial_json(serde_json::json!({"model": "m", "temperature": 0.0})))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply(
                r#"{"category_id":"transport","probability":0.7,"reason":"taxi"}"#,
            )))
            .mount(&server)
            .await;

        let llm = LlmClassifier::new(Client::new(), &server.uri(), "key", "m");
        let s = llm
            .classify("такси", TransactionType::Expense, "ru", &categories())
            .await
            .unwrap();
        assert_eq!(s.category_id, "transport");
        assert!((s.probability - 0.7).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn http_errors_surface_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let llm = LlmClassifier::new(Client::new(), &server.uri(), "key", "m");
        let err = llm
            .classify("такси", TransactionType::Expense, "ru", &categories())
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Status(StatusCode::TOO_MANY_REQUESTS)));
    }
}
