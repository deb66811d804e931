//! Compile rule documents into evaluable rules.
//!
//! The compiler resolves function names against a [`FunctionRegistry`],
//! binds call arguments to the function's parameters and rejects bindings
//! that can never succeed: unknown functions or arguments, missing required
//! arguments, and arguments whose static type the parameter cannot accept.
//! Building each call node folds its constant arguments.

use std::collections::{BTreeMap, HashMap};

use rpipeline_rules::{ExprNode, Literal, RuleDocument};

use crate::error::{CompileError, Result};
use crate::expression::{Expression, FunctionExpression};
use crate::function::{FunctionArgs, FunctionRegistry};
use crate::rule::Rule;
use crate::value::{TypeTag, Value};

/// Compile a parsed rule document.
pub fn compile_rule(doc: &RuleDocument, registry: &FunctionRegistry) -> Result<Rule> {
    let mut scope = Scope::default();

    let condition = compile_expr(&doc.condition, registry, &mut scope)?;
    let ty = condition.static_type();
    if !matches!(ty, TypeTag::Bool | TypeTag::Any) {
        return Err(CompileError::InvalidRule(format!(
            "condition of rule '{}' is {ty}, expected bool",
            doc.name()
        )));
    }

    let statements = doc
        .statements
        .iter()
        .map(|node| compile_expr(node, registry, &mut scope))
        .collect::<Result<Vec<_>>>()?;

    log::debug!(
        "Compiled rule '{}' with {} statement(s)",
        doc.name(),
        statements.len()
    );
    Ok(Rule::new(doc.name(), condition, statements))
}

/// Variables defined so far, with the static type of their definition.
#[derive(Debug, Default)]
pub struct Scope {
    variables: HashMap<String, TypeTag>,
}

impl Scope {
    pub fn define(&mut self, name: impl Into<String>, ty: TypeTag) {
        self.variables.insert(name.into(), ty);
    }

    pub fn lookup(&self, name: &str) -> Option<TypeTag> {
        self.variables.get(name).copied()
    }
}

/// Compile one expression node. `let` nodes extend `scope` for everything
/// compiled after them.
pub fn compile_expr(
    node: &ExprNode,
    registry: &FunctionRegistry,
    scope: &mut Scope,
) -> Result<Expression> {
    Ok(match node {
        ExprNode::Literal(lit) => Expression::Literal(literal_value(lit)),
        ExprNode::Field(name) => Expression::Field(name.clone()),
        ExprNode::Variable(name) => {
            let ty = scope
                .lookup(name)
                .ok_or_else(|| CompileError::UndefinedVariable(name.clone()))?;
            Expression::variable(name.as_str(), ty)
        }
        ExprNode::Let { name, value } => {
            let value = compile_expr(value, registry, scope)?;
            scope.define(name.as_str(), value.static_type());
            Expression::let_binding(name.as_str(), value)
        }
        ExprNode::Call { function, args } => compile_call(function, args, registry, scope)?,
        ExprNode::Not(inner) => Expression::Not(Box::new(compile_expr(inner, registry, scope)?)),
        ExprNode::And(items) => Expression::And(compile_all(items, registry, scope)?),
        ExprNode::Or(items) => Expression::Or(compile_all(items, registry, scope)?),
        ExprNode::Compare { op, lhs, rhs } => Expression::compare(
            *op,
            compile_expr(lhs, registry, scope)?,
            compile_expr(rhs, registry, scope)?,
        ),
        ExprNode::Map(entries) => {
            let mut compiled = BTreeMap::new();
            for (key, value) in entries {
                compiled.insert(key.clone(), compile_expr(value, registry, scope)?);
            }
            Expression::Map(compiled)
        }
    })
}

fn compile_all(
    items: &[ExprNode],
    registry: &FunctionRegistry,
    scope: &mut Scope,
) -> Result<Vec<Expression>> {
    items
        .iter()
        .map(|item| compile_expr(item, registry, scope))
        .collect()
}

fn compile_call(
    name: &str,
    args: &BTreeMap<String, ExprNode>,
    registry: &FunctionRegistry,
    scope: &mut Scope,
) -> Result<Expression> {
    let function = registry
        .resolve(name)
        .ok_or_else(|| CompileError::UnknownFunction(name.to_string()))?;
    let descriptor = function.descriptor();

    if let Some(unknown) = args.keys().find(|arg| descriptor.param(arg).is_none()) {
        return Err(CompileError::UnknownArgument {
            function: name.to_string(),
            argument: unknown.clone(),
        });
    }

    let mut bound = BTreeMap::new();
    for param in descriptor.params() {
        let Some(node) = args.get(param.name()) else {
            if !param.is_optional() {
                return Err(CompileError::MissingArgument {
                    function: name.to_string(),
                    parameter: param.name().to_string(),
                });
            }
            continue;
        };
        let expr = compile_expr(node, registry, scope)?;
        let found = expr.static_type();
        if found != TypeTag::Any && !param.source_type().accepts(found) {
            return Err(CompileError::ArgumentType {
                function: name.to_string(),
                parameter: param.name().to_string(),
                expected: param.source_type(),
                found,
            });
        }
        bound.insert(param.name().to_string(), expr);
    }

    let args = FunctionArgs::new(function, bound);
    Ok(Expression::Function(FunctionExpression::new(args)))
}

fn literal_value(lit: &Literal) -> Value {
    match lit {
        Literal::Null => Value::Null,
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Integer(i) => Value::Integer(*i),
        Literal::Float(f) => Value::Float(*f),
        Literal::String(s) => Value::String(s.clone()),
    }
}
