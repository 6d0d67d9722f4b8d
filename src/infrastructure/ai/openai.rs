use crate::domain::error::ReviewError;
use crate::domain::ports::ai_provider::{AiCandidate, AiJudgment, AiProvider, CandidateKind};
use crate::infrastructure::http::{classify_status, classify_transport};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const SYSTEM_PROMPT: &str = "You review crypto trade candidates for a risk-aware advisory service. \
Reply with a JSON object {\"accept\": bool, \"confidence\": number between 0 and 1, \"reasoning\": string}. \
Reject anything you are not confident about.";

pub struct OpenAiJudge {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    response_format: ResponseFormat,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatContent,
}

#[derive(Deserialize)]
struct ChatContent {
    content: Option<String>,
}

impl OpenAiJudge {
    pub fn new(api_key: String, model: Option<String>, base_url: Option<String>) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model: model.unwrap_or_else(|| "gpt-4o-mini".to_string()),
            base_url: base_url
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string())
                .trim_end_matches('/')
                .to_string(),
        }
    }

    fn user_prompt(candidate: &AiCandidate) -> String {
        let action = match candidate.kind {
            CandidateKind::Buy => "open a new long position in",
            CandidateKind::Sell => "sell an existing position in",
        };
        let features = candidate
            .features
            .iter()
            .map(|(k, v)| format!("{k}={v:.4}"))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "Should a user {action} {}?\nLocal score: {:.3}\nContext: {}\nFeatures: {features}",
            candidate.symbol, candidate.score, candidate.summary
        )
    }
}

/// Parse the model's JSON reply, tolerating a fenced code block around it.
pub(crate) fn parse_judgment(content: &str) -> Result<AiJudgment, ReviewError> {
    let trimmed = content
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();
    let judgment: AiJudgment = serde_json::from_str(trimmed)
        .map_err(|e| ReviewError::Validation(format!("Unparseable AI judgment: {e}")))?;
    judgment.validate()?;
    Ok(judgment)
}

#[async_trait]
impl AiProvider for OpenAiJudge {
    fn name(&self) -> &str {
        "openai"
    }

    async fn judge(&self, candidate: &AiCandidate) -> Result<AiJudgment, ReviewError> {
        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&ChatRequest {
                model: &self.model,
                messages: vec![
                    ChatMessage {
                        role: "system",
                        content: SYSTEM_PROMPT.to_string(),
                    },
                    ChatMessage {
                        role: "user",
                        content: Self::user_prompt(candidate),
                    },
                ],
                response_format: ResponseFormat { kind: "json_object" },
                temperature: 0.0,
            })
            .send()
            .await
            .map_err(|e| classify_transport("OpenAI", e))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(classify_status("OpenAI", status, &body));
        }

        let result: ChatResponse = resp.json().await.map_err(|e| classify_transport("OpenAI", e))?;
        let content = result
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ReviewError::Validation("OpenAI returned no content".into()))?;
        parse_judgment(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fenced_judgment() {
        let j = parse_judgment("```json\n{\"accept\": true, \"confidence\": 0.8, \"reasoning\": \"ok\"}\n```").unwrap();
        assert!(j.accept);
        assert!((j.confidence - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_out_of_range_confidence_is_rejected() {
        let err = parse_judgment("{\"accept\": true, \"confidence\": 1.4, \"reasoning\": \"\"}").unwrap_err();
        assert!(matches!(err, ReviewError::Validation(_)));
    }
}
