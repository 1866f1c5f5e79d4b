//! OpenAI chat completions client for the synthesis stage.
//!
//! The model is asked for a JSON object in a fixed shape. The reply is decoded strictly:
//! a missing field or a wrong type is a malformed response, never a partial insight set.

use super::{bearer_headers, build_client, decode_error, error_for_status, send_error};
use async_trait::async_trait;
use log::*;
use meeting_ai::pricing;
use meeting_ai::traits::analysis::Extractor;
use meeting_ai::types::insights::{ActionItem, Extraction, ExtractionRequest, Insights, Usage};
use meeting_ai::Error;
use serde::{Deserialize, Serialize};

pub const PROVIDER_ID: &str = "openai";

const TEMPERATURE: f32 = 0.3;
const MAX_TOKENS: u32 = 2000;

/// Placeholder the model is told to use for unknown owners and due dates.
const NOT_SPECIFIED: &str = "Not specified";

const SYSTEM_PROMPT: &str = r#"You analyze meeting transcripts and extract structured insights.

From the transcript, extract:

1. summary: a concise three-sentence summary of the meeting's purpose, main discussion and outcome.
2. key_decisions: every decision explicitly made in the meeting, each as a clear statement.
3. action_items: every task that was assigned. Each item has:
   - task: what needs to be done
   - owner: who is responsible, if mentioned
   - due_date: when it is due, if mentioned
4. open_questions: questions raised in the meeting that were not answered.
5. key_topics: the 3-5 main topics or themes of the meeting.

Respond with a JSON object of exactly this shape:
{
  "summary": "string",
  "key_decisions": ["string"],
  "action_items": [{"task": "string", "owner": "string", "due_date": "string"}],
  "open_questions": ["string"],
  "key_topics": ["string"]
}

Rules:
- Only include what was actually said.
- Use an empty array for a category with no items.
- Use "Not specified" for an unknown owner or due date.
- Keep every item short but complete and skip small talk."#;

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    response_format: ResponseFormat,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<TokenUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenUsage {
    total_tokens: u32,
}

/// The JSON object the model is instructed to produce.
#[derive(Debug, Deserialize)]
struct InsightsPayload {
    summary: String,
    key_decisions: Vec<String>,
    action_items: Vec<ActionItemPayload>,
    open_questions: Vec<String>,
    key_topics: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ActionItemPayload {
    task: String,
    #[serde(default)]
    owner: Option<String>,
    #[serde(default)]
    due_date: Option<String>,
}

/// Maps blank values and the "Not specified" placeholder to `None`.
fn specified(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case(NOT_SPECIFIED))
}

fn non_blank(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

impl From<InsightsPayload> for Insights {
    fn from(payload: InsightsPayload) -> Self {
        Insights {
            summary: payload.summary.trim().to_string(),
            decisions: non_blank(payload.key_decisions),
            action_items: payload
                .action_items
                .into_iter()
                .map(|item| ActionItem {
                    task: item.task.trim().to_string(),
                    owner: specified(item.owner),
                    due_date: specified(item.due_date),
                })
                .collect(),
            open_questions: non_blank(payload.open_questions),
            topics: non_blank(payload.key_topics),
        }
    }
}

fn user_prompt(request: &ExtractionRequest) -> String {
    let title = request
        .title
        .as_deref()
        .map(|title| format!("Meeting Title: {title}\n\n"))
        .unwrap_or_default();
    format!(
        "{title}Analyze the following meeting transcript and extract structured insights.\n\n\
         ---TRANSCRIPT START---\n{}\n---TRANSCRIPT END---\n\n\
         Answer with JSON in the required shape.",
        request.transcript
    )
}

/// Decodes the assistant message into validated insights.
fn parse_insights(content: &str) -> Result<Insights, Error> {
    let payload: InsightsPayload = serde_json::from_str(content).map_err(|e| {
        warn!("OpenAI returned insights in an unexpected shape: {e}");
        Error::MalformedResponse(format!("insights JSON does not match the schema: {e}"))
    })?;
    let insights = Insights::from(payload);
    insights.validate()?;
    Ok(insights)
}

pub struct OpenAiExtractor {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl OpenAiExtractor {
    pub fn new(api_key: &str, base_url: &str, model: &str) -> Result<Self, Error> {
        Ok(Self {
            client: build_client(bearer_headers(api_key)?)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl Extractor for OpenAiExtractor {
    async fn extract(&self, request: ExtractionRequest) -> Result<Extraction, Error> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt(&request),
                },
            ],
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        debug!(
            "Requesting insights from {} for a {} character transcript",
            self.model,
            request.transcript.len()
        );

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| send_error(PROVIDER_ID, e))?;
        let response = error_for_status(PROVIDER_ID, response).await?;

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| decode_error(PROVIDER_ID, e))?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| Error::MalformedResponse("completion has no message content".into()))?;

        let insights = parse_insights(&content)?;
        let usage = Usage {
            model: completion.model.unwrap_or_else(|| self.model.clone()),
            tokens_used: completion.usage.map_or(0, |usage| usage.total_tokens),
        };
        info!(
            "Extracted {} decisions and {} action items using {} tokens",
            insights.decisions.len(),
            insights.action_items.len(),
            usage.tokens_used
        );

        Ok(Extraction { insights, usage })
    }

    fn provider_id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn model(&self) -> String {
        self.model.clone()
    }

    async fn health_check(&self) -> Result<bool, Error> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| send_error(PROVIDER_ID, e))?;
        Ok(response.status().is_success())
    }

    fn estimate_cost(&self, word_count: u64) -> f64 {
        pricing::synthesis_cost(word_count, &self.model)
    }
}
