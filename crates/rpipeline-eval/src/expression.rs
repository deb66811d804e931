//! Compiled expression tree.
//!
//! [`Expression`] is the node type every compiled rule is made of. Nodes
//! evaluate against an [`EvaluationContext`], report whether they are
//! constant, and carry a static type used by the compiler to reject
//! argument bindings that can never succeed.
//!
//! Constant nodes can also be evaluated without any context
//! ([`Expression::evaluate_constant`]); that is how function arguments are
//! folded when a call site is built.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

pub use rpipeline_rules::ComparisonOp;

use crate::context::EvaluationContext;
use crate::error::{EvalError, EvalResult};
use crate::function::{Function, FunctionArgs};
use crate::value::{TypeTag, Value};

#[derive(Debug, Clone)]
pub enum Expression {
    Literal(Value),
    /// A field of the current message; `null` when absent.
    Field(String),
    /// A variable defined by an earlier `Let`, with the static type of its
    /// definition.
    Variable { name: String, ty: TypeTag },
    /// Define a variable; evaluates to the bound value.
    Let { name: String, value: Box<Expression> },
    Function(FunctionExpression),
    Not(Box<Expression>),
    /// Short-circuiting conjunction.
    And(Vec<Expression>),
    /// Short-circuiting disjunction.
    Or(Vec<Expression>),
    Comparison {
        op: ComparisonOp,
        lhs: Box<Expression>,
        rhs: Box<Expression>,
    },
    /// Object literal; evaluates to a JSON object.
    Map(BTreeMap<String, Expression>),
}

impl Expression {
    pub fn literal(value: impl Into<Value>) -> Self {
        Expression::Literal(value.into())
    }

    pub fn field(name: impl Into<String>) -> Self {
        Expression::Field(name.into())
    }

    pub fn variable(name: impl Into<String>, ty: TypeTag) -> Self {
        Expression::Variable {
            name: name.into(),
            ty,
        }
    }

    pub fn let_binding(name: impl Into<String>, value: Expression) -> Self {
        Expression::Let {
            name: name.into(),
            value: Box::new(value),
        }
    }

    pub fn compare(op: ComparisonOp, lhs: Expression, rhs: Expression) -> Self {
        Expression::Comparison {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    /// Whether the node evaluates to the same value for every message.
    ///
    /// Function calls are never constant; a function may read the context
    /// or have effects.
    pub fn is_constant(&self) -> bool {
        match self {
            Expression::Literal(_) => true,
            Expression::Field(_)
            | Expression::Variable { .. }
            | Expression::Let { .. }
            | Expression::Function(_) => false,
            Expression::Not(inner) => inner.is_constant(),
            Expression::And(items) | Expression::Or(items) => {
                items.iter().all(Expression::is_constant)
            }
            Expression::Comparison { lhs, rhs, .. } => lhs.is_constant() && rhs.is_constant(),
            Expression::Map(entries) => entries.values().all(Expression::is_constant),
        }
    }

    /// The type every value of this node is known to have.
    pub fn static_type(&self) -> TypeTag {
        match self {
            Expression::Literal(v) => v.type_tag(),
            Expression::Field(_) => TypeTag::Any,
            Expression::Variable { ty, .. } => *ty,
            Expression::Let { value, .. } => value.static_type(),
            Expression::Function(f) => f.static_type(),
            Expression::Not(_)
            | Expression::And(_)
            | Expression::Or(_)
            | Expression::Comparison { .. } => TypeTag::Bool,
            Expression::Map(_) => TypeTag::Object,
        }
    }

    pub fn evaluate(&self, ctx: &mut EvaluationContext) -> EvalResult<Value> {
        self.eval(Some(ctx))
    }

    /// Evaluate without a message. Nodes that need one fail with
    /// [`EvalError::ContextRequired`].
    pub fn evaluate_constant(&self) -> EvalResult<Value> {
        self.eval(None)
    }

    fn eval(&self, mut ctx: Option<&mut EvaluationContext>) -> EvalResult<Value> {
        match self {
            Expression::Literal(v) => Ok(v.clone()),
            Expression::Field(name) => {
                let ctx = ctx.ok_or_else(|| self.context_required())?;
                Ok(ctx.current_message().get_field(name).unwrap_or(Value::Null))
            }
            Expression::Variable { name, .. } => {
                let ctx = ctx.ok_or_else(|| self.context_required())?;
                ctx.variable(name)
                    .cloned()
                    .ok_or_else(|| EvalError::UndefinedVariable(name.clone()))
            }
            Expression::Let { name, value } => {
                let ctx = ctx.ok_or_else(|| self.context_required())?;
                let value = value.evaluate(ctx)?;
                ctx.define(name.as_str(), value.clone());
                Ok(value)
            }
            Expression::Function(f) => {
                let ctx = ctx.ok_or_else(|| self.context_required())?;
                f.evaluate(ctx)
            }
            Expression::Not(inner) => {
                let b = truthy(inner.eval(ctx)?, inner)?;
                Ok(Value::Bool(!b))
            }
            Expression::And(items) => {
                for item in items {
                    if !truthy(item.eval(ctx.as_deref_mut())?, item)? {
                        return Ok(Value::Bool(false));
                    }
                }
                Ok(Value::Bool(true))
            }
            Expression::Or(items) => {
                for item in items {
                    if truthy(item.eval(ctx.as_deref_mut())?, item)? {
                        return Ok(Value::Bool(true));
                    }
                }
                Ok(Value::Bool(false))
            }
            Expression::Comparison { op, lhs, rhs } => {
                let l = lhs.eval(ctx.as_deref_mut())?;
                let r = rhs.eval(ctx)?;
                compare(*op, &l, &r).map(Value::Bool)
            }
            Expression::Map(entries) => {
                let mut obj = serde_json::Map::new();
                for (key, expr) in entries {
                    obj.insert(key.clone(), expr.eval(ctx.as_deref_mut())?.to_json());
                }
                Ok(Value::Object(serde_json::Value::Object(obj)))
            }
        }
    }

    fn context_required(&self) -> EvalError {
        EvalError::ContextRequired(self.to_string())
    }
}

/// Boolean view of an operand. `null` is false; non-booleans are a
/// coercion error.
fn truthy(value: Value, expr: &Expression) -> EvalResult<bool> {
    match value {
        Value::Bool(b) => Ok(b),
        Value::Null => Ok(false),
        other => Err(EvalError::coercion(
            TypeTag::Bool,
            other.type_tag(),
            format!("operand '{expr}'"),
        )),
    }
}

fn ordering(l: &Value, r: &Value) -> Option<Ordering> {
    match (l, r) {
        (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
        (Value::Integer(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
        (Value::Float(a), Value::Integer(b)) => a.partial_cmp(&(*b as f64)),
        (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),
        (Value::Ip(a), Value::Ip(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// Compare two values.
///
/// Integers and floats compare numerically. `null` equals only `null` and
/// is never ordered. Comparing values of unrelated types is an error.
fn compare(op: ComparisonOp, l: &Value, r: &Value) -> EvalResult<bool> {
    if l.is_null() || r.is_null() {
        let both = l.is_null() && r.is_null();
        return Ok(match op {
            ComparisonOp::Eq => both,
            ComparisonOp::Ne => !both,
            _ => false,
        });
    }

    let mismatch = || {
        EvalError::coercion(l.type_tag(), r.type_tag(), format!("comparison '{op}'"))
    };

    if let Some(ord) = ordering(l, r) {
        return Ok(match op {
            ComparisonOp::Eq => ord == Ordering::Equal,
            ComparisonOp::Ne => ord != Ordering::Equal,
            ComparisonOp::Lt => ord == Ordering::Less,
            ComparisonOp::Lte => ord != Ordering::Greater,
            ComparisonOp::Gt => ord == Ordering::Greater,
            ComparisonOp::Gte => ord != Ordering::Less,
        });
    }

    let numeric = |v: &Value| matches!(v, Value::Integer(_) | Value::Float(_));
    if numeric(l) && numeric(r) {
        // NaN on one side
        return Ok(op == ComparisonOp::Ne);
    }

    match op {
        ComparisonOp::Eq | ComparisonOp::Ne if l.type_tag() == r.type_tag() => {
            Ok((l == r) == (op == ComparisonOp::Eq))
        }
        _ => Err(mismatch()),
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Literal(Value::Null) => f.write_str("null"),
            Expression::Literal(Value::String(s)) => write!(f, "{s:?}"),
            Expression::Literal(v) => write!(f, "{v}"),
            Expression::Field(name) => write!(f, "$message.{name}"),
            Expression::Variable { name, .. } => f.write_str(name),
            Expression::Let { name, value } => write!(f, "let {name} = {value}"),
            Expression::Function(func) => write!(f, "{func}"),
            Expression::Not(inner) => write!(f, "!{inner}"),
            Expression::And(items) => write_joined(f, items, " && "),
            Expression::Or(items) => write_joined(f, items, " || "),
            Expression::Comparison { op, lhs, rhs } => write!(f, "{lhs} {op} {rhs}"),
            Expression::Map(entries) => {
                f.write_str("{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                f.write_str("}")
            }
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, items: &[Expression], sep: &str) -> fmt::Result {
    f.write_str("(")?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{item}")?;
    }
    f.write_str(")")
}

// =============================================================================
// Function calls
// =============================================================================

/// A call of a resolved function with its bound arguments.
#[derive(Debug, Clone)]
pub struct FunctionExpression {
    args: FunctionArgs,
    folding_error: Option<EvalError>,
}

impl FunctionExpression {
    /// Build a call node. The function's `preprocess_args` runs exactly
    /// once, here. If it fails, the error is kept and reported by every
    /// evaluation of the node.
    pub fn new(mut args: FunctionArgs) -> Self {
        let function = args.function().clone();
        let folding_error = match function.preprocess_args(&mut args) {
            Ok(()) => None,
            Err(e) => {
                log::warn!(
                    "Unable to precompute arguments of {}: {e}",
                    function.descriptor().name()
                );
                Some(e)
            }
        };
        FunctionExpression {
            args,
            folding_error,
        }
    }

    pub fn args(&self) -> &FunctionArgs {
        &self.args
    }

    pub fn function(&self) -> &dyn Function {
        self.args.function().as_ref()
    }

    pub fn folding_error(&self) -> Option<&EvalError> {
        self.folding_error.as_ref()
    }

    pub fn is_constant(&self) -> bool {
        false
    }

    pub fn static_type(&self) -> TypeTag {
        self.function().descriptor().return_type()
    }

    /// Run the function and check its result against the declared return
    /// type.
    pub fn evaluate(&self, ctx: &mut EvaluationContext) -> EvalResult<Value> {
        if let Some(e) = &self.folding_error {
            return Err(e.clone());
        }
        let descriptor = self.function().descriptor();
        let value = self.function().evaluate(&self.args, ctx)?;
        value.coerce(descriptor.return_type()).map_err(|actual| {
            log::error!(
                "Function {} declares {} but returned {actual}",
                descriptor.name(),
                descriptor.return_type()
            );
            EvalError::ReturnType {
                function: descriptor.name().to_string(),
                declared: descriptor.return_type(),
                actual,
            }
        })
    }
}

impl fmt::Display for FunctionExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.args.function_name())?;
        for (i, (name, expr)) in self.args.args().iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}: {expr}")?;
        }
        f.write_str(")")
    }
}
