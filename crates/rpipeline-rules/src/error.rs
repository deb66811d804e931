use thiserror::Error;

/// Errors that can occur while reading rule documents or rule sources.
#[derive(Debug, Error)]
pub enum RuleParseError {
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Missing required field '{0}'")]
    MissingField(String),

    #[error("Invalid rule: {0}")]
    InvalidRule(String),

    #[error("Invalid expression: {0}")]
    InvalidExpression(String),

    #[error("No rule with id '{0}'")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RuleParseError>;
