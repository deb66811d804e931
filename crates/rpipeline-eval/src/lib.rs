//! # rpipeline-eval
//!
//! Interpreter for message transformation rules.
//!
//! This crate compiles the rule documents produced by [`rpipeline_rules`]
//! into typed expression trees and evaluates them against structured log
//! messages, one fresh [`EvaluationContext`] per (rule, message) pair.
//!
//! ## Architecture
//!
//! - **Compile time**: function names are resolved against a
//!   [`FunctionRegistry`], arguments are bound to each function's typed
//!   [`ParameterDescriptor`]s, and constant arguments are folded exactly once
//!   when the [`FunctionExpression`] is built.
//! - **Evaluation time**: the tree is walked once per message. Folded
//!   arguments are read from the call's cache; everything else is evaluated
//!   against the context. Errors are recorded on the context, never thrown.
//!
//! ## Quick Start
//!
//! ```rust
//! use chrono::Utc;
//! use rpipeline_eval::{FunctionRegistry, Message, Value, compile_rule, evaluate_rule};
//! use rpipeline_rules::parse_rule_yaml;
//!
//! let yaml = r#"
//! title: Derive
//! then:
//!   - let: copy
//!     value: {call: create_message, args: {message: derived}}
//!   - call: set_field
//!     args: {field: only_in, value: new message, message: {var: copy}}
//! "#;
//!
//! let collection = parse_rule_yaml(yaml).unwrap();
//! let rule = compile_rule(&collection.rules[0], &FunctionRegistry::builtin()).unwrap();
//!
//! let ctx = evaluate_rule(&rule, Message::new("original", "web-01", Utc::now()));
//! assert!(!ctx.has_evaluation_errors());
//! assert!(!ctx.current_message().has_field("only_in"));
//! assert_eq!(
//!     ctx.created_messages()[0].get_field("only_in"),
//!     Some(Value::from("new message"))
//! );
//! ```

pub mod builtins;
pub mod compiler;
pub mod context;
pub mod engine;
pub mod error;
pub mod expression;
pub mod function;
pub mod message;
pub mod rule;
pub mod value;

// Re-export the most commonly used types and functions at crate root
pub use compiler::{compile_expr, compile_rule};
pub use context::{ConditionOutcome, EvaluationContext, EvaluationState};
pub use engine::{ConditionErrorPolicy, Engine, EngineConfig, ProcessResult, RuleError};
pub use error::{CompileError, EvalError, EvalResult, EvaluationError, Result};
pub use expression::{ComparisonOp, Expression, FunctionExpression};
pub use function::{
    Function, FunctionArgs, FunctionDescriptor, FunctionRegistry, ParameterDescriptor,
    fold_constant_args,
};
pub use message::{Message, MessageConfig};
pub use rule::{Rule, evaluate_rule};
pub use value::{FromValue, MessageHandle, TypeTag, Value};
