//! Per-call-site argument bindings.

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::expression::Expression;
use crate::function::Function;
use crate::value::Value;

/// Binds parameter names to argument expressions for one call site and
/// caches the values of arguments folded at construction time.
///
/// The cache is filled while [`FunctionExpression::new`] owns the args;
/// afterwards the args are only reachable through shared references.
///
/// [`FunctionExpression::new`]: crate::expression::FunctionExpression::new
#[derive(Debug, Clone)]
pub struct FunctionArgs {
    function: Arc<dyn Function>,
    args: BTreeMap<String, Expression>,
    precomputed: HashMap<String, Value>,
}

impl FunctionArgs {
    pub fn new(function: Arc<dyn Function>, args: BTreeMap<String, Expression>) -> Self {
        FunctionArgs {
            function,
            args,
            precomputed: HashMap::new(),
        }
    }

    pub fn function(&self) -> &Arc<dyn Function> {
        &self.function
    }

    pub fn function_name(&self) -> &str {
        self.function.descriptor().name()
    }

    /// Bound arguments, name-sorted.
    pub fn args(&self) -> &BTreeMap<String, Expression> {
        &self.args
    }

    pub fn expression(&self, name: &str) -> Option<&Expression> {
        self.args.get(name)
    }

    pub fn is_present(&self, name: &str) -> bool {
        self.args.contains_key(name)
    }

    /// Bound arguments whose expressions are constant.
    pub fn constant_args(&self) -> impl Iterator<Item = (&str, &Expression)> {
        self.args
            .iter()
            .filter(|(_, expr)| expr.is_constant())
            .map(|(name, expr)| (name.as_str(), expr))
    }

    pub fn precomputed_value(&self, name: &str) -> Option<&Value> {
        self.precomputed.get(name)
    }

    pub fn precomputed_count(&self) -> usize {
        self.precomputed.len()
    }

    /// Cache a folded value. Each name is written at most once; returns
    /// `false` if a value was already cached.
    pub fn set_precomputed_value(&mut self, name: impl Into<String>, value: Value) -> bool {
        match self.precomputed.entry(name.into()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(value);
                true
            }
        }
    }
}
