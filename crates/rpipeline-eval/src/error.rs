//! Compile-time and evaluation-time error types.

use thiserror::Error;

use crate::expression::Expression;
use crate::value::TypeTag;

/// Errors raised while binding a rule document to registered functions.
///
/// A rule that fails to compile is never evaluated.
#[derive(Debug, Error)]
pub enum CompileError {
    /// A call names a function that is not registered.
    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    /// A required parameter has no argument bound to it.
    #[error("function '{function}' is missing required argument '{parameter}'")]
    MissingArgument { function: String, parameter: String },

    /// A call binds an argument the function does not declare.
    #[error("function '{function}' has no parameter '{argument}'")]
    UnknownArgument { function: String, argument: String },

    /// The static type of an argument can never satisfy the parameter.
    #[error(
        "argument '{parameter}' of function '{function}' expects {expected}, found {found}"
    )]
    ArgumentType {
        function: String,
        parameter: String,
        expected: TypeTag,
        found: TypeTag,
    },

    /// A variable is read before any `let` defines it.
    #[error("variable '{0}' is used before it is defined")]
    UndefinedVariable(String),

    /// Two functions were registered under the same name.
    #[error("function '{0}' is already registered")]
    DuplicateFunction(String),

    /// A function descriptor declares the same parameter twice.
    #[error("function '{function}' declares parameter '{parameter}' more than once")]
    DuplicateParameter { function: String, parameter: String },

    /// The rule is structurally invalid (e.g. a non-boolean condition).
    #[error("invalid rule: {0}")]
    InvalidRule(String),

    /// A rule document could not be read.
    #[error("rule document error: {0}")]
    Rules(#[from] rpipeline_rules::RuleParseError),
}

/// Errors raised while evaluating a compiled rule against a message.
///
/// These never escape an evaluation; they are recorded on the
/// [`EvaluationContext`](crate::context::EvaluationContext).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    /// A value could not be narrowed to the type required where it is used.
    #[error("cannot coerce {found} to {expected} for {context}")]
    Coercion {
        expected: TypeTag,
        found: TypeTag,
        context: String,
    },

    /// A function produced a value outside its declared return type. This
    /// is a bug in the function, not in the rule.
    #[error("function '{function}' declares {declared} but returned {actual}")]
    ReturnType {
        function: String,
        declared: TypeTag,
        actual: TypeTag,
    },

    /// A function body needed an argument that was not supplied.
    #[error("missing argument '{parameter}' of function '{function}'")]
    MissingArgument { function: String, parameter: String },

    /// A message-dependent expression was evaluated without a message,
    /// e.g. while folding constants.
    #[error("'{0}' cannot be evaluated without a message")]
    ContextRequired(String),

    #[error("undefined variable '{0}'")]
    UndefinedVariable(String),

    /// A message handle does not belong to this evaluation.
    #[error("unknown message handle #{0}")]
    UnknownMessage(usize),

    /// The message was dropped; no further mutation is allowed.
    #[error("message has been dropped")]
    MessageDropped,

    /// Input could not be turned into a message.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// A function-specific failure.
    #[error("{function}: {message}")]
    Function { function: String, message: String },
}

impl EvalError {
    pub fn coercion(expected: TypeTag, found: TypeTag, context: impl Into<String>) -> Self {
        EvalError::Coercion {
            expected,
            found,
            context: context.into(),
        }
    }

    pub fn function(function: impl Into<String>, message: impl Into<String>) -> Self {
        EvalError::Function {
            function: function.into(),
            message: message.into(),
        }
    }

    /// Whether the error points at a broken function implementation rather
    /// than at the rule being evaluated.
    pub fn is_defect(&self) -> bool {
        matches!(self, EvalError::ReturnType { .. })
    }
}

/// An [`EvalError`] tagged with the expression it came from.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{expression}: {error}")]
pub struct EvaluationError {
    /// Rendering of the statement or condition that failed.
    pub expression: String,
    pub error: EvalError,
}

impl EvaluationError {
    pub fn new(expression: &Expression, error: EvalError) -> Self {
        EvaluationError {
            expression: expression.to_string(),
            error,
        }
    }
}

/// Result of compiling rules.
pub type Result<T> = std::result::Result<T, CompileError>;

/// Result of evaluating an expression.
pub type EvalResult<T> = std::result::Result<T, EvalError>;
