//! Compiled rules and the single-rule evaluation entry point.

use crate::context::{ConditionOutcome, EvaluationContext};
use crate::error::{EvalError, EvaluationError};
use crate::expression::Expression;
use crate::message::Message;
use crate::value::{TypeTag, Value};

/// A compiled rule: a condition and the statements run when it holds.
///
/// Rules are read-only after compilation and can be evaluated from many
/// threads at once.
#[derive(Debug, Clone)]
pub struct Rule {
    pub name: String,
    pub condition: Expression,
    pub statements: Vec<Expression>,
}

impl Rule {
    pub fn new(name: impl Into<String>, condition: Expression, statements: Vec<Expression>) -> Self {
        Rule {
            name: name.into(),
            condition,
            statements,
        }
    }
}

/// Evaluate `rule` against `message` in a fresh context.
///
/// Never fails: errors are recorded on the returned context. A condition
/// that errors or is not a boolean counts as not matched. Statement errors
/// are recorded and the next statement runs. A dropped message stops the
/// remaining statements.
pub fn evaluate_rule(rule: &Rule, message: Message) -> EvaluationContext {
    let mut ctx = EvaluationContext::new(message);

    let outcome = match rule.condition.evaluate(&mut ctx) {
        Ok(Value::Bool(true)) => ConditionOutcome::Matched,
        Ok(Value::Bool(false) | Value::Null) => ConditionOutcome::NotMatched,
        Ok(other) => {
            let error = EvalError::coercion(TypeTag::Bool, other.type_tag(), "rule condition");
            ctx.add_evaluation_error(EvaluationError::new(&rule.condition, error));
            ConditionOutcome::Failed
        }
        Err(e) => {
            ctx.add_evaluation_error(EvaluationError::new(&rule.condition, e));
            ConditionOutcome::Failed
        }
    };
    ctx.set_condition_outcome(outcome);
    log::debug!("Rule '{}' condition: {outcome:?}", rule.name);

    if outcome == ConditionOutcome::Matched {
        for statement in &rule.statements {
            if ctx.is_dropped() {
                break;
            }
            if let Err(e) = statement.evaluate(&mut ctx) {
                log::debug!("Rule '{}' statement '{statement}' failed: {e}", rule.name);
                ctx.add_evaluation_error(EvaluationError::new(statement, e));
            }
        }
    }

    ctx.complete();
    ctx
}
