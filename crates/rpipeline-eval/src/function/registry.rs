//! Name-to-function lookup used by the compiler.

use std::collections::HashMap;
use std::sync::Arc;

use crate::builtins;
use crate::error::{CompileError, Result};
use crate::function::{Function, FunctionDescriptor};

/// Functions available to rules, keyed by name.
///
/// Built once and read-only afterwards. Only the compiler consults it;
/// compiled rules hold their functions directly.
#[derive(Debug, Default, Clone)]
pub struct FunctionRegistry {
    functions: HashMap<String, Arc<dyn Function>>,
}

impl FunctionRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the message and conversion functions.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for function in builtins::all() {
            let name = function.descriptor().name().to_string();
            registry.functions.insert(name, function);
        }
        registry
    }

    /// Add a function. Rejects a name that is already taken and a
    /// descriptor that declares a parameter twice.
    pub fn register(&mut self, function: impl Function + 'static) -> Result<()> {
        self.register_arc(Arc::new(function))
    }

    pub fn register_arc(&mut self, function: Arc<dyn Function>) -> Result<()> {
        let descriptor = function.descriptor();
        if let Some(parameter) = descriptor.duplicate_param() {
            return Err(CompileError::DuplicateParameter {
                function: descriptor.name().to_string(),
                parameter: parameter.to_string(),
            });
        }
        let name = descriptor.name().to_string();
        if self.functions.contains_key(&name) {
            return Err(CompileError::DuplicateFunction(name));
        }
        self.functions.insert(name, function);
        Ok(())
    }

    pub fn resolve(&self, name: &str) -> Option<Arc<dyn Function>> {
        self.functions.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Descriptors of all functions, sorted by name.
    pub fn descriptors(&self) -> Vec<&FunctionDescriptor> {
        let mut all: Vec<_> = self.functions.values().map(|f| f.descriptor()).collect();
        all.sort_by(|a, b| a.name().cmp(b.name()));
        all
    }
}
