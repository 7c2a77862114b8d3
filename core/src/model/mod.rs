//! Persisted entities.
//!
//! `Project` is the root. `Task` and `ChatMessage` are owned by exactly one
//! project through an immutable `project_id` and are removed with it.

/// Declares an opaque string identifier backed by a UUID v4.
macro_rules! document_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Allocate a fresh identifier.
            pub fn new() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

pub(crate) use document_id;

mod message;
mod project;
mod task;

pub use message::{ChatMessage, MessageId, Role};
pub use project::{Project, ProjectId};
pub use task::{Task, TaskId, TaskProgress, TaskStatus};
