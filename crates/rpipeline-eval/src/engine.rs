//! Multi-rule evaluation engine.
//!
//! The `Engine` holds an ordered list of compiled rules and runs them over
//! one message at a time. Each rule sees the message as left by the rule
//! before it.

use rpipeline_rules::RuleCollection;
use serde::Serialize;

use crate::compiler::compile_rule;
use crate::context::ConditionOutcome;
use crate::error::{EvalResult, EvaluationError, Result};
use crate::function::FunctionRegistry;
use crate::message::{Message, MessageConfig};
use crate::rule::{Rule, evaluate_rule};

/// What happens to the rest of a message's pass when a rule's condition
/// fails to evaluate. The failing rule itself never runs its statements.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConditionErrorPolicy {
    /// Keep applying the remaining rules.
    #[default]
    Continue,
    /// Stop the pass for this message.
    Halt,
}

/// Configuration for the engine.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub condition_error_policy: ConditionErrorPolicy,
    /// How JSON input is turned into messages.
    pub message: MessageConfig,
}

/// An evaluation error tagged with the rule it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleError {
    pub rule: String,
    pub expression: String,
    pub error: String,
}

impl RuleError {
    fn new(rule: &str, error: EvaluationError) -> Self {
        RuleError {
            rule: rule.to_string(),
            expression: error.expression,
            error: error.error.to_string(),
        }
    }
}

/// Outcome of running every rule over one message.
#[derive(Debug, Clone)]
pub struct ProcessResult {
    pub message: Message,
    /// Messages created by any rule, in creation order.
    pub created: Vec<Message>,
    pub dropped: bool,
    /// Names of rules whose condition held.
    pub matched_rules: Vec<String>,
    pub errors: Vec<RuleError>,
}

impl ProcessResult {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "message": self.message.to_json(),
            "created": self.created.iter().map(Message::to_json).collect::<Vec<_>>(),
            "dropped": self.dropped,
            "matched_rules": self.matched_rules,
            "errors": self.errors,
        })
    }
}

/// The main rule evaluation engine.
///
/// # Example
///
/// ```rust
/// use rpipeline_eval::{Engine, FunctionRegistry};
/// use rpipeline_rules::parse_rule_yaml;
/// use serde_json::json;
///
/// let yaml = r#"
/// title: Tag Year
/// when: {eq: [{field: source}, "web-01"]}
/// then:
///   - call: set_field
///     args: {field: year, value: 2010}
/// "#;
///
/// let collection = parse_rule_yaml(yaml).unwrap();
/// let mut engine = Engine::default();
/// engine.add_collection(&collection, &FunctionRegistry::builtin()).unwrap();
///
/// let result = engine
///     .process_json(&json!({"message": "hi", "source": "web-01"}))
///     .unwrap();
/// assert_eq!(result.matched_rules, vec!["Tag Year"]);
/// assert_eq!(result.message.to_json()["year"], json!(2010));
/// ```
#[derive(Debug, Default)]
pub struct Engine {
    config: EngineConfig,
    rules: Vec<Rule>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Engine {
            config,
            rules: Vec::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Append a compiled rule.
    pub fn add_rule(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    /// Compile and append every rule of a parsed collection. Stops at the
    /// first rule that fails to compile.
    pub fn add_collection(
        &mut self,
        collection: &RuleCollection,
        registry: &FunctionRegistry,
    ) -> Result<()> {
        for doc in &collection.rules {
            self.add_rule(compile_rule(doc, registry)?);
        }
        Ok(())
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Run every rule over `message` in insertion order.
    pub fn process(&self, mut message: Message) -> ProcessResult {
        let mut created = Vec::new();
        let mut matched_rules = Vec::new();
        let mut errors = Vec::new();
        let mut dropped = false;

        for rule in &self.rules {
            let ctx = evaluate_rule(rule, message);
            let outcome = ctx.condition_outcome();
            dropped = ctx.is_dropped();
            if ctx.matched() {
                matched_rules.push(rule.name.clone());
            }

            let (current, new_messages, rule_errors) = ctx.into_parts();
            message = current;
            created.extend(new_messages);
            errors.extend(rule_errors.into_iter().map(|e| RuleError::new(&rule.name, e)));

            if dropped {
                log::debug!("Message dropped by rule '{}'", rule.name);
                break;
            }
            if outcome == ConditionOutcome::Failed
                && self.config.condition_error_policy == ConditionErrorPolicy::Halt
            {
                log::debug!("Halting after condition error in rule '{}'", rule.name);
                break;
            }
        }

        ProcessResult {
            message,
            created,
            dropped,
            matched_rules,
            errors,
        }
    }

    /// Build a message from JSON using the engine's message configuration,
    /// then process it.
    pub fn process_json(&self, value: &serde_json::Value) -> EvalResult<ProcessResult> {
        let message = Message::from_json(value, &self.config.message)?;
        Ok(self.process(message))
    }
}
