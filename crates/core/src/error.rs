use thiserror::Error;

/// Failure of a pipeline run or one of its stages.
///
/// Only `InputValidation` is a client error; everything else is fatal for
/// the run that produced it.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid input: {0}")]
    InputValidation(String),

    #[error("Checkout failed: {0}")]
    Checkout(String),

    #[error("Build failed: {0}")]
    Build(String),

    #[error("Preview server failed to start: {0}")]
    ServerStart(String),

    #[error("Rendering route '{route}' failed: {cause}")]
    Render { route: String, cause: String },

    #[error("Asset materialization failed: {0}")]
    Materialization(String),

    #[error("Formatting failed: {0}")]
    Formatting(String),

    #[error("Run cancelled during {0}")]
    Cancelled(String),

    #[error("Configuration parse error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the caller sent something unusable, as opposed to the run failing.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::InputValidation(_))
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
