//! The function contract.
//!
//! Every callable in a rule implements [`Function`]: it publishes a
//! [`FunctionDescriptor`] (name, return type, typed parameters), evaluates
//! against bound [`FunctionArgs`], and may precompute constant arguments
//! once in [`Function::preprocess_args`].

pub mod args;
pub mod parameter;
pub mod registry;

use std::fmt;

use crate::context::EvaluationContext;
use crate::error::EvalResult;
use crate::value::{TypeTag, Value};

pub use args::FunctionArgs;
pub use parameter::{ParameterDescriptor, Transform};
pub use registry::FunctionRegistry;

/// A function callable from rules.
///
/// Implementations hold only immutable configuration and are shared across
/// threads. Everything that varies per message lives on the
/// [`EvaluationContext`].
pub trait Function: Send + Sync {
    fn descriptor(&self) -> &FunctionDescriptor;

    /// Compute the call's result. The value must fit the descriptor's
    /// return type.
    fn evaluate(&self, args: &FunctionArgs, ctx: &mut EvaluationContext) -> EvalResult<Value>;

    /// Called once per call site while the call is being built. The default
    /// folds every constant argument into the args' precomputed cache.
    fn preprocess_args(&self, args: &mut FunctionArgs) -> EvalResult<()> {
        fold_constant_args(self.descriptor(), args)
    }
}

impl fmt::Debug for dyn Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Function({})", self.descriptor().name())
    }
}

/// Evaluate each bound constant argument once, pass it through its
/// parameter's transform and cache the result.
///
/// Arguments that do not correspond to a declared parameter are left alone.
pub fn fold_constant_args(descriptor: &FunctionDescriptor, args: &mut FunctionArgs) -> EvalResult<()> {
    let mut folded = Vec::new();
    for (name, expr) in args.constant_args() {
        let Some(param) = descriptor.param(name) else {
            continue;
        };
        let value = expr.evaluate_constant()?;
        folded.push((name.to_string(), param.apply_transform(value)?));
    }
    for (name, value) in folded {
        log::debug!("Folded argument '{name}' of {}", descriptor.name());
        args.set_precomputed_value(name, value);
    }
    Ok(())
}

// =============================================================================
// Descriptors
// =============================================================================

/// Immutable metadata of a function.
#[derive(Debug, Clone)]
pub struct FunctionDescriptor {
    name: String,
    return_type: TypeTag,
    params: Vec<ParameterDescriptor>,
}

impl FunctionDescriptor {
    pub fn new(
        name: impl Into<String>,
        return_type: TypeTag,
        params: impl IntoIterator<Item = ParameterDescriptor>,
    ) -> Self {
        FunctionDescriptor {
            name: name.into(),
            return_type,
            params: params.into_iter().collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn return_type(&self) -> TypeTag {
        self.return_type
    }

    /// Parameters in declaration order.
    pub fn params(&self) -> &[ParameterDescriptor] {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&ParameterDescriptor> {
        self.params.iter().find(|p| p.name() == name)
    }

    /// The first parameter name declared more than once, if any.
    pub fn duplicate_param(&self) -> Option<&str> {
        self.params
            .iter()
            .enumerate()
            .find(|(i, p)| self.params[..*i].iter().any(|q| q.name() == p.name()))
            .map(|(_, p)| p.name())
    }

    /// `name(param: type, ...) -> return_type`.
    pub fn signature(&self) -> String {
        let params: Vec<String> = self.params.iter().map(|p| p.to_string()).collect();
        format!("{}({}) -> {}", self.name, params.join(", "), self.return_type)
    }
}
