use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ProjectId, document_id};

document_id!(
    /// Identity of a [`ChatMessage`].
    MessageId
);

/// Author of a chat turn.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Model,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }
}

/// One turn of a project-scoped conversation. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: MessageId,
    pub creation_time: DateTime<Utc>,
    pub project_id: ProjectId,
    pub role: Role,
    pub text: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl ChatMessage {
    pub fn new(project_id: ProjectId, role: Role, text: impl Into<String>, is_error: bool) -> Self {
        Self {
            id: MessageId::new(),
            creation_time: Utc::now(),
            project_id,
            role,
            text: text.into(),
            is_error,
        }
    }
}
