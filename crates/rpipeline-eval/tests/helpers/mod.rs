#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rpipeline_eval::{
    Engine, EngineConfig, Expression, Function, FunctionArgs, FunctionExpression,
    FunctionRegistry, Message, Rule, compile_rule,
};
use rpipeline_rules::parse_rule_yaml;

pub fn epoch() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2010-07-30T16:03:25Z")
        .unwrap()
        .with_timezone(&Utc)
}

pub fn message() -> Message {
    Message::new("test", "test", epoch())
}

pub fn compile(yaml: &str) -> Rule {
    compile_with(yaml, &FunctionRegistry::builtin())
}

pub fn compile_with(yaml: &str, registry: &FunctionRegistry) -> Rule {
    let collection = parse_rule_yaml(yaml).unwrap();
    assert!(collection.errors.is_empty(), "{:?}", collection.errors);
    compile_rule(&collection.rules[0], registry).unwrap()
}

pub fn engine_from_yaml(yaml: &str, config: EngineConfig) -> Engine {
    let collection = parse_rule_yaml(yaml).unwrap();
    let mut engine = Engine::new(config);
    engine
        .add_collection(&collection, &FunctionRegistry::builtin())
        .unwrap();
    engine
}

/// Build a call node directly, bypassing the compiler's checks.
pub fn call(function: Arc<dyn Function>, args: Vec<(&str, Expression)>) -> Expression {
    let args: BTreeMap<String, Expression> =
        args.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
    Expression::Function(FunctionExpression::new(FunctionArgs::new(function, args)))
}

pub fn builtin(name: &str) -> Arc<dyn Function> {
    FunctionRegistry::builtin().resolve(name).unwrap()
}
