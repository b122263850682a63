use crate::structs::EntityId;

/// Integration failures. Everything that can happen during normal play is
/// resolved by policy inside the planner and never shows up here.
#[derive(Debug, thiserror::Error)]
pub enum NavError {
    /// A command or goal referenced an entity missing from the tick snapshot.
    #[error("entity {0} is not part of this tick's snapshot")]
    UnknownEntity(EntityId),

    /// The decision layer issued more than one command for the same agent.
    #[error("entity {0} received more than one command")]
    DuplicateCommand(EntityId),

    #[error("invalid navigation config: {0}")]
    InvalidConfig(String),

    #[error("failed to parse navigation config: {0}")]
    ConfigParse(#[from] serde_json::Error),
}
