//! Function registry
//!
//! The explicit capability map of functions the assistant may invoke. Built
//! once at startup and shared read-only across turns.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use crate::agents::codec::{Arguments, DecodedArguments};
use crate::agents::domain::render_output;
use crate::agents::error::{AgentError, AgentResult};

/// A locally-callable function with a keyword-argument contract
#[async_trait]
pub trait HomeFunction: Send + Sync {
    /// Invoke the function with decoded keyword arguments
    async fn call(&self, args: Arguments) -> anyhow::Result<Value>;
}

/// Adapter turning an async closure into a [`HomeFunction`]
pub struct FnFunction<F>(F);

#[async_trait]
impl<F, Fut> HomeFunction for FnFunction<F>
where
    F: Fn(Arguments) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Value>> + Send,
{
    async fn call(&self, args: Arguments) -> anyhow::Result<Value> {
        (self.0)(args).await
    }
}

/// Registry mapping function names to callables
#[derive(Default, Clone)]
pub struct FunctionRegistry {
    functions: BTreeMap<String, Arc<dyn HomeFunction>>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function, replacing any previous entry of the same name
    pub fn register(&mut self, name: impl Into<String>, function: Arc<dyn HomeFunction>) -> &mut Self {
        let name = name.into();
        if self.functions.insert(name.clone(), function).is_some() {
            tracing::warn!("Function {} registered twice; keeping the latest", name);
        }
        self
    }

    /// Register an async closure
    pub fn register_fn<F, Fut>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(Arguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        self.register(name, Arc::new(FnFunction(f)))
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn HomeFunction>> {
        self.functions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Registered function names, sorted
    pub fn names(&self) -> Vec<String> {
        self.functions.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Invoke a function and render its result as tool output text.
    ///
    /// Errors raised by the function itself become an `"Error: ..."` output.
    /// Only an unknown name is reported as `Err`. A batch payload invokes the
    /// function once per entry and renders the list of results.
    pub async fn invoke(&self, name: &str, args: DecodedArguments) -> AgentResult<String> {
        let function = self
            .get(name)
            .ok_or_else(|| AgentError::FunctionNotFound(name.to_string()))?;

        match args {
            DecodedArguments::Single(args) => Ok(render_output(&call_guarded(name, function, args).await)),
            DecodedArguments::Batch(list) => {
                let mut results = Vec::with_capacity(list.len());
                for args in list {
                    results.push(call_guarded(name, function, args).await);
                }
                Ok(render_output(&Value::Array(results)))
            }
        }
    }
}

async fn call_guarded(name: &str, function: &Arc<dyn HomeFunction>, args: Arguments) -> Value {
    match function.call(args).await {
        Ok(value) => {
            tracing::debug!(function = name, "Command response: {}", value);
            value
        }
        Err(e) => {
            tracing::warn!(function = name, "Function failed: {:#}", e);
            Value::String(format!("Error: {}", e))
        }
    }
}

impl std::fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("functions", &self.names())
            .finish()
    }
}
