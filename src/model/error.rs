use thiserror::Error;

/// Errors raised while describing or registering models.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("Invalid namespace '{input}': {reason}")]
    InvalidNamespace { input: String, reason: String },

    #[error("Namespace '{namespace}' overlaps registered namespace '{existing}'")]
    NamespaceConflict { namespace: String, existing: String },

    #[error("No model registered under '{namespace}'")]
    UnknownModel { namespace: String },

    #[error("Unknown operation '{name}' in namespace '{namespace}'")]
    UnknownOperation { namespace: String, name: String },
}
