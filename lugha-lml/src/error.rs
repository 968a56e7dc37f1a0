use thiserror::Error;

pub type LmlResult<T> = Result<T, LmlError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LmlError {
    #[error("Parse error at line {line}, column {column}: {message}")]
    Parse {
        line: usize,
        column: usize,
        message: String,
    },

    /// A `code` element whose body is not a block holding one string leaf.
    #[error("Expected a string in element 'code' but got {found}")]
    SerializationShape { found: String },

    #[error("Maximum nesting depth ({max_depth}) exceeded")]
    MaxNestingDepthExceeded { max_depth: usize },

    #[error("Markup error: {0}")]
    Dom(String),

    #[error("Unsupported node: {0}")]
    UnsupportedNode(String),
}

impl LmlError {
    pub fn parse(line: usize, column: usize, message: impl Into<String>) -> Self {
        LmlError::Parse {
            line,
            column,
            message: message.into(),
        }
    }

    /// True for errors raised while reading LML source.
    pub fn is_parse(&self) -> bool {
        matches!(
            self,
            LmlError::Parse { .. } | LmlError::MaxNestingDepthExceeded { .. }
        )
    }
}

impl From<roxmltree::Error> for LmlError {
    fn from(err: roxmltree::Error) -> Self {
        LmlError::Dom(err.to_string())
    }
}
