//! Generative Language REST client.
//!
//! Both calls use the non-streaming `models/{model}:generateContent`
//! endpoint. Task generation constrains the reply to a JSON list of strings;
//! chat sends the stored history as alternating `user`/`model` turns and puts
//! the project context in `systemInstruction`.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use taskdeck_core::{AssistantConfig, Project, Task};

use crate::prompt::{self, EMPTY_REPLY_TEXT, SYSTEM_INSTRUCTION};
use crate::{AssistantGateway, GatewayError, GatewayResult, HistoryTurn};

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Google error response format.
#[derive(Debug, Deserialize)]
struct GoogleError {
    code: Option<u16>,
    message: String,
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: GoogleError,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

impl GenerateResponse {
    /// Concatenated text of the first candidate.
    fn into_text(self) -> GatewayResult<String> {
        if let Some(reason) = self.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(GatewayError::Blocked(format!("Prompt blocked: {reason}")));
        }
        let Some(candidate) = self.candidates.into_iter().next() else {
            return Ok(String::new());
        };
        if candidate.finish_reason.as_deref() == Some("SAFETY") {
            return Err(GatewayError::Blocked(
                "Response blocked due to safety concerns".to_string(),
            ));
        }
        Ok(candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default())
    }
}

/// [`AssistantGateway`] backed by the Generative Language API.
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: Option<String>,
    api_base: String,
    model: String,
    max_output_tokens: u32,
    temperature: Option<f32>,
    system_instruction: String,
}

impl GeminiClient {
    pub fn new(config: &AssistantConfig) -> GatewayResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("taskdeck/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_client(client, config))
    }

    /// Creates a client with a custom HTTP client.
    pub fn with_client(client: reqwest::Client, config: &AssistantConfig) -> Self {
        Self {
            client,
            api_key: config.api_key.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            max_output_tokens: config.max_output_tokens,
            temperature: config.temperature,
            system_instruction: config
                .system_instruction
                .clone()
                .unwrap_or_else(|| SYSTEM_INSTRUCTION.to_string()),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.api_base, self.model)
    }

    fn generation_config(&self) -> Value {
        let mut gen_config = json!({
            "maxOutputTokens": self.max_output_tokens
        });
        if let Some(temp) = self.temperature {
            gen_config["temperature"] = json!(temp);
        }
        gen_config
    }

    async fn generate(&self, body: &Value) -> GatewayResult<String> {
        let key = self
            .api_key
            .as_deref()
            .ok_or(GatewayError::MissingCredential)?;

        let response = self
            .client
            .post(self.endpoint())
            .header(API_KEY_HEADER, key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            if let Ok(error_response) = serde_json::from_str::<ErrorResponse>(&text) {
                return Err(GatewayError::ApiResponse {
                    status: error_response.error.code.unwrap_or(status.as_u16()),
                    message: error_response.error.message,
                    error_type: error_response.error.status,
                });
            }
            return Err(GatewayError::ApiResponse {
                status: status.as_u16(),
                message: text,
                error_type: None,
            });
        }

        let parsed: GenerateResponse = serde_json::from_str(&text)
            .map_err(|e| GatewayError::Parse(format!("Invalid generateContent response: {e}")))?;
        parsed.into_text()
    }
}

#[async_trait]
impl AssistantGateway for GeminiClient {
    fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    async fn generate_project_tasks(
        &self,
        name: &str,
        description: &str,
    ) -> GatewayResult<Vec<String>> {
        let mut gen_config = self.generation_config();
        gen_config["responseMimeType"] = json!("application/json");
        gen_config["responseSchema"] = json!({
            "type": "ARRAY",
            "items": { "type": "STRING" }
        });

        let body = json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": prompt::task_generation_prompt(name, description) }]
            }],
            "systemInstruction": { "parts": [{ "text": self.system_instruction }] },
            "generationConfig": gen_config,
        });

        let text = self.generate(&body).await?;
        let raw = if text.trim().is_empty() { "[]" } else { text.trim() };
        let titles: Vec<String> = serde_json::from_str(raw)
            .map_err(|e| GatewayError::Parse(format!("Expected a JSON list of strings: {e}")))?;

        let titles: Vec<String> = titles
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        tracing::debug!("Generated {} task titles for {name:?}", titles.len());
        Ok(titles)
    }

    async fn chat_with_project(
        &self,
        history: &[HistoryTurn],
        message: &str,
        project: &Project,
        tasks: &[Task],
    ) -> GatewayResult<String> {
        let mut contents: Vec<Value> = history
            .iter()
            .map(|turn| {
                json!({
                    "role": turn.role.as_str(),
                    "parts": [{ "text": turn.text }]
                })
            })
            .collect();
        contents.push(json!({
            "role": "user",
            "parts": [{ "text": message }]
        }));

        let system = prompt::chat_system_text(&self.system_instruction, project, tasks);
        let body = json!({
            "contents": contents,
            "systemInstruction": { "parts": [{ "text": system }] },
            "generationConfig": self.generation_config(),
        });

        let reply = self.generate(&body).await?;
        if reply.trim().is_empty() {
            tracing::debug!("Empty chat reply for project {}", project.id);
            return Ok(EMPTY_REPLY_TEXT.to_string());
        }
        Ok(reply)
    }
}
