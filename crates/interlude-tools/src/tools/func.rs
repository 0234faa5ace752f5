//! Closure-backed tool for ad-hoc registration

use crate::registry::{Tool, ToolResult};
use futures::future::BoxFuture;
use interlude_core::Arguments;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

type Executor = Arc<dyn Fn(Arguments) -> BoxFuture<'static, ToolResult> + Send + Sync>;

pub struct FnTool {
    name: String,
    description: String,
    input_schema: Value,
    executor: Executor,
}

impl FnTool {
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
        executor: F,
    ) -> Self
    where
        F: Fn(Arguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ToolResult> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
            executor: Arc::new(move |args| Box::pin(executor(args))),
        }
    }
}

#[async_trait::async_trait]
impl Tool for FnTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn input_schema(&self) -> Value {
        self.input_schema.clone()
    }

    async fn execute(&self, args: Arguments) -> ToolResult {
        (self.executor)(args).await
    }
}
