use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::document_id;

document_id!(
    /// Identity of a [`Project`].
    ProjectId
);

/// Top-level unit of work grouping tasks and chat history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub creation_time: DateTime<Utc>,
    pub name: String,
    /// May be empty.
    #[serde(default)]
    pub description: String,
}

impl Project {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: ProjectId::new(),
            creation_time: Utc::now(),
            name: name.into(),
            description: description.into(),
        }
    }
}
