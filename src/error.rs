// Error taxonomy shared by the sync engine and the remote service bindings.
use thiserror::Error;

/// Failure of a single call against the remote task service.
///
/// Cloneable so the per-pass cache can hand the same failure to every
/// reference that points at the identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("task {0} not found")]
    NotFound(String),
    #[error("authentication rejected: {0}")]
    Auth(String),
    #[error("network error: {0}")]
    Network(String),
}

impl ServiceError {
    /// Whether the failure should be surfaced to the user.
    /// A vanished task is an expected state and only gets logged.
    pub fn is_user_visible(&self) -> bool {
        !matches!(self, Self::NotFound(_))
    }
}

/// Configuration problems. Always fatal for a pass, and always raised
/// before anything is mutated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("API token is missing. Please set api_token in the configuration")]
    MissingToken,
    #[error("no To-Do database configured")]
    MissingDatabase,
    #[error("invalid link pattern: {0}")]
    InvalidPattern(String),
    #[error("link pattern must capture the task identifier in exactly one group")]
    PatternWithoutCapture,
    #[error("status '{status}' is listed in both the {first} and {second} buckets")]
    DuplicateStatus {
        status: String,
        first: &'static str,
        second: &'static str,
    },
    #[error("the {0} bucket has no canonical status")]
    EmptyCanonical(&'static str),
}

/// Errors that abort a whole sync pass.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Configuration(#[from] ConfigError),
    #[error("could not initialize the HTTP client: {0}")]
    Client(String),
    #[error("could not list recent documents: {0}")]
    Documents(#[source] anyhow::Error),
}
