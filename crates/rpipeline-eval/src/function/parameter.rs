//! Typed formal parameters.

use std::fmt;
use std::sync::Arc;

use crate::context::EvaluationContext;
use crate::error::{EvalError, EvalResult};
use crate::function::FunctionArgs;
use crate::value::{FromValue, TypeTag, Value};

/// Maps an argument of the parameter's source type to its transformed type.
pub type Transform = Arc<dyn Fn(Value) -> EvalResult<Value> + Send + Sync>;

/// A named, typed formal parameter of a function.
///
/// The argument is narrowed to `source_type`, passed through the optional
/// transform and narrowed to `transformed_type`. Without a transform both
/// types are equal and the value passes through unchanged.
#[derive(Clone)]
pub struct ParameterDescriptor {
    source_type: TypeTag,
    transformed_type: TypeTag,
    name: String,
    optional: bool,
    transform: Option<Transform>,
}

impl ParameterDescriptor {
    pub fn typed(name: impl Into<String>, ty: TypeTag) -> Self {
        ParameterDescriptor {
            source_type: ty,
            transformed_type: ty,
            name: name.into(),
            optional: false,
            transform: None,
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::typed(name, TypeTag::String)
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::typed(name, TypeTag::Integer)
    }

    pub fn floating(name: impl Into<String>) -> Self {
        Self::typed(name, TypeTag::Float)
    }

    pub fn bool(name: impl Into<String>) -> Self {
        Self::typed(name, TypeTag::Bool)
    }

    pub fn object(name: impl Into<String>) -> Self {
        Self::typed(name, TypeTag::Object)
    }

    pub fn any(name: impl Into<String>) -> Self {
        Self::typed(name, TypeTag::Any)
    }

    pub fn ip(name: impl Into<String>) -> Self {
        Self::typed(name, TypeTag::Ip)
    }

    pub fn timestamp(name: impl Into<String>) -> Self {
        Self::typed(name, TypeTag::Timestamp)
    }

    pub fn message(name: impl Into<String>) -> Self {
        Self::typed(name, TypeTag::Message)
    }

    /// Allow the call site to leave this parameter unbound.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Attach a transform producing values of `transformed_type`.
    pub fn transform<F>(mut self, transformed_type: TypeTag, f: F) -> Self
    where
        F: Fn(Value) -> EvalResult<Value> + Send + Sync + 'static,
    {
        self.transformed_type = transformed_type;
        self.transform = Some(Arc::new(f));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source_type(&self) -> TypeTag {
        self.source_type
    }

    pub fn transformed_type(&self) -> TypeTag {
        self.transformed_type
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    pub fn has_transform(&self) -> bool {
        self.transform.is_some()
    }

    /// Narrow a raw argument value to the source type, transform it and
    /// narrow the result to the transformed type. `Null` passes through.
    pub fn apply_transform(&self, value: Value) -> EvalResult<Value> {
        let value = self.narrow_to(value, self.source_type)?;
        if value.is_null() {
            return Ok(value);
        }
        let value = match &self.transform {
            Some(f) => f(value)?,
            None => value,
        };
        self.narrow_to(value, self.transformed_type)
    }

    fn narrow_to(&self, value: Value, ty: TypeTag) -> EvalResult<Value> {
        value
            .coerce(ty)
            .map_err(|found| EvalError::coercion(ty, found, self.context()))
    }

    fn narrow<X: FromValue>(&self, value: Value) -> EvalResult<Option<X>> {
        if value.is_null() {
            return Ok(None);
        }
        value
            .narrow::<X>()
            .map(Some)
            .map_err(|found| EvalError::coercion(X::TYPE, found, self.context()))
    }

    fn context(&self) -> String {
        format!("parameter '{}'", self.name)
    }

    /// Evaluate the argument bound to this parameter.
    ///
    /// A precomputed (folded) value is used when present. An unbound
    /// parameter and a `null` argument both yield `Ok(None)`.
    pub fn eval_required<X: FromValue>(
        &self,
        args: &FunctionArgs,
        ctx: &mut EvaluationContext,
    ) -> EvalResult<Option<X>> {
        if let Some(precomputed) = args.precomputed_value(&self.name) {
            let value = self.narrow_to(precomputed.clone(), self.transformed_type)?;
            return self.narrow(value);
        }
        let Some(expr) = args.expression(&self.name) else {
            return Ok(None);
        };
        let value = expr.evaluate(ctx)?;
        let value = self.apply_transform(value)?;
        self.narrow(value)
    }

    /// Like [`eval_required`](Self::eval_required), but absence is a
    /// [`EvalError::MissingArgument`].
    pub fn require<X: FromValue>(
        &self,
        args: &FunctionArgs,
        ctx: &mut EvaluationContext,
    ) -> EvalResult<X> {
        self.eval_required(args, ctx)?
            .ok_or_else(|| EvalError::MissingArgument {
                function: args.function_name().to_string(),
                parameter: self.name.clone(),
            })
    }

    /// Like [`eval_required`](Self::eval_required), with `default` for
    /// absence.
    pub fn eval_or<X: FromValue>(
        &self,
        args: &FunctionArgs,
        ctx: &mut EvaluationContext,
        default: X,
    ) -> EvalResult<X> {
        Ok(self.eval_required(args, ctx)?.unwrap_or(default))
    }
}

impl fmt::Debug for ParameterDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParameterDescriptor")
            .field("name", &self.name)
            .field("source_type", &self.source_type)
            .field("transformed_type", &self.transformed_type)
            .field("optional", &self.optional)
            .field("transform", &self.transform.is_some())
            .finish()
    }
}

/// `name: type`, `name?: type` for optional parameters, `name: a -> b`
/// when a transform changes the type.
impl fmt::Display for ParameterDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if self.optional {
            f.write_str("?")?;
        }
        write!(f, ": {}", self.source_type)?;
        if self.transformed_type != self.source_type {
            write!(f, " -> {}", self.transformed_type)?;
        }
        Ok(())
    }
}
