//! `taskdeck-core` — data model, live document store and domain operations.
//!
//! Layering (leaf first):
//! - [`model`]: projects, tasks, chat messages and their identifiers
//! - [`store`]: in-memory document collections with live queries and optional
//!   on-disk snapshots ([`persistence`])
//! - [`ops`]: the domain operations the controller calls (validation,
//!   referential checks, cascading delete)
//! - [`config_loader`]: layered configuration (defaults, file, environment)

pub mod config_loader;
pub mod config_types;
pub mod error;
pub mod live_query;
pub mod model;
pub mod ops;
pub mod persistence;
pub mod store;

pub use config_loader::{ConfigError, ConfigLoader};
pub use config_types::{AssistantConfig, Config, ServiceConfig, StoreConfig};
pub use error::{DomainError, DomainResult};
pub use live_query::LiveQuery;
pub use model::{
    ChatMessage, MessageId, Project, ProjectId, Role, Task, TaskId, TaskProgress, TaskStatus,
};
pub use ops::Domain;
pub use store::Store;
