//! `taskdeck-assistant` — the generative-language side of taskdeck.
//!
//! The controller only sees [`AssistantGateway`]. [`GeminiClient`] talks to
//! the Generative Language REST API; [`DisabledGateway`] stands in when no
//! credential is configured.

mod gemini;
pub mod prompt;

pub use gemini::GeminiClient;

use async_trait::async_trait;
use taskdeck_core::{ChatMessage, Project, Role, Task};
use thiserror::Error;

/// Errors from assistant calls.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// No API key configured.
    #[error("API key missing")]
    MissingCredential,

    /// Network request failed.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error ({status}): {message}")]
    ApiResponse {
        status: u16,
        message: String,
        error_type: Option<String>,
    },

    /// Failed to parse API response.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Prompt or response withheld by the provider's safety filters.
    #[error("Blocked: {0}")]
    Blocked(String),
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// One prior conversation turn sent as chat history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryTurn {
    pub role: Role,
    pub text: String,
}

impl From<&ChatMessage> for HistoryTurn {
    fn from(message: &ChatMessage) -> Self {
        Self {
            role: message.role,
            text: message.text.clone(),
        }
    }
}

/// Seam between the application controller and the language model.
#[async_trait]
pub trait AssistantGateway: Send + Sync {
    /// Whether a credential is configured. Surfaced as a status indicator.
    fn has_credential(&self) -> bool;

    /// Ask for 3–5 concrete task titles for a project.
    async fn generate_project_tasks(
        &self,
        name: &str,
        description: &str,
    ) -> GatewayResult<Vec<String>>;

    /// Reply to `message` given the prior `history` and the project context.
    ///
    /// `history` excludes `message` itself.
    async fn chat_with_project(
        &self,
        history: &[HistoryTurn],
        message: &str,
        project: &Project,
        tasks: &[Task],
    ) -> GatewayResult<String>;
}

/// Collapse a generation failure into "nothing to add".
pub fn titles_or_empty(result: GatewayResult<Vec<String>>) -> Vec<String> {
    match result {
        Ok(titles) => titles,
        Err(e) => {
            tracing::warn!("Task generation failed, continuing without tasks: {e}");
            Vec::new()
        }
    }
}

/// Gateway used when no API key is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledGateway;

#[async_trait]
impl AssistantGateway for DisabledGateway {
    fn has_credential(&self) -> bool {
        false
    }

    async fn generate_project_tasks(&self, _: &str, _: &str) -> GatewayResult<Vec<String>> {
        Err(GatewayError::MissingCredential)
    }

    async fn chat_with_project(
        &self,
        _: &[HistoryTurn],
        _: &str,
        _: &Project,
        _: &[Task],
    ) -> GatewayResult<String> {
        Err(GatewayError::MissingCredential)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_gateway_refuses_every_call() {
        let gateway = DisabledGateway;
        assert!(!gateway.has_credential());
        assert!(matches!(
            gateway.generate_project_tasks("Launch", "desc").await,
            Err(GatewayError::MissingCredential)
        ));
        let project = Project::new("Launch", "");
        assert!(matches!(
            gateway.chat_with_project(&[], "hi", &project, &[]).await,
            Err(GatewayError::MissingCredential)
        ));
    }

    #[test]
    fn failures_become_empty_title_lists() {
        assert!(titles_or_empty(Err(GatewayError::Parse("nope".to_string()))).is_empty());
        assert_eq!(
            titles_or_empty(Ok(vec!["a".to_string()])),
            vec!["a".to_string()]
        );
    }
}
