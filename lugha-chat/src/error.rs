use lugha_lml::{LmlError, NodeId};
use thiserror::Error;

pub type ChatResult<T> = Result<T, ChatError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChatError {
    #[error(transparent)]
    Lml(#[from] LmlError),

    /// The backend could not be reached or answered with a transport failure.
    #[error("Network error: {0}")]
    Network(String),

    /// The backend ran the code and reported a failure.
    #[error("Execution failed: {0}")]
    Execution(String),

    #[error("Chat host error: {0}")]
    Host(String),

    /// The user cancelled an in-flight stream.
    #[error("Stream aborted")]
    Aborted,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No {expected} element with id {id}")]
    UnknownNode { id: NodeId, expected: &'static str },

    /// No side-table entry for the block; it was pruned or never rendered.
    #[error("Unknown code block {0}")]
    UnknownBlock(String),
}

impl ChatError {
    /// Aborts are a cooperative signal and must stay out of error logs.
    pub fn is_abort(&self) -> bool {
        matches!(self, ChatError::Aborted)
    }

    pub fn is_parse(&self) -> bool {
        matches!(self, ChatError::Lml(e) if e.is_parse())
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        ChatError::Network(err.to_string())
    }
}
