// Tool abstraction and registry
// Every capability the agent can call is a `Tool` exposed via JSON schema.

pub mod crm;
pub mod retriever;
pub mod search;
pub mod sql;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::core::errors::ApiError;
use crate::llm::ToolDefinition;

pub use crm::crm_tools;
pub use retriever::RetrieverTool;
pub use search::{search_tools, ArxivSearch, DuckDuckGoSearch, WikipediaSearch};
pub use sql::MusicDatabaseTool;

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema of the arguments object.
    fn parameters(&self) -> Value;

    async fn call(&self, args: &Value) -> Result<String, ApiError>;
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolSummary {
    pub name: String,
    pub description: String,
}

/// Ordered set of tools. Order is preserved in the schemas sent to the model
/// and in `/tools`.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a tool. A later tool with an already registered name is ignored.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> &mut Self {
        if self.get(tool.name()).is_some() {
            tracing::warn!("Tool {} registered twice; keeping the first", tool.name());
        } else {
            self.tools.push(tool);
        }
        self
    }

    pub fn extend<I>(&mut self, tools: I) -> &mut Self
    where
        I: IntoIterator<Item = Arc<dyn Tool>>,
    {
        for tool in tools {
            self.register(tool);
        }
        self
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|tool| tool.name() == name)
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.iter().map(|tool| tool.name().to_string()).collect()
    }

    pub fn summaries(&self) -> Vec<ToolSummary> {
        self.tools
            .iter()
            .map(|tool| ToolSummary {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
            })
            .collect()
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .map(|tool| ToolDefinition::new(tool.name(), tool.description(), tool.parameters()))
            .collect()
    }

    pub async fn execute(&self, name: &str, args: &Value) -> Result<String, ApiError> {
        let tool = self
            .get(name)
            .ok_or_else(|| ApiError::BadRequest(format!("Unknown tool: {}", name)))?;
        tool.call(args).await
    }
}

/// Schema for a tool taking a single required string argument.
pub(crate) fn single_string_schema(field: &str, description: &str) -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            field: { "type": "string", "description": description }
        },
        "required": [field]
    })
}

pub(crate) fn empty_schema() -> Value {
    serde_json::json!({ "type": "object", "properties": {} })
}

/// Reads a required string argument. Models sometimes wrap a lone argument
/// as a bare string instead of an object, so that is accepted too.
pub(crate) fn string_arg(args: &Value, field: &str) -> Result<String, ApiError> {
    let value = match args {
        Value::String(raw) => Some(raw.as_str()),
        _ => args.get(field).and_then(|v| v.as_str()),
    };
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ApiError::BadRequest(format!("Missing required argument `{}`", field)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Echo(&'static str);

    #[async_trait]
    impl Tool for Echo {
        fn name(&self) -> &str {
            self.0
        }

        fn description(&self) -> &str {
            "Echoes its input"
        }

        fn parameters(&self) -> Value {
            single_string_schema("text", "Text to echo")
        }

        async fn call(&self, args: &Value) -> Result<String, ApiError> {
            string_arg(args, "text")
        }
    }

    #[tokio::test]
    async fn registry_keeps_order_and_dispatches() {
        let mut registry = ToolRegistry::new();
        registry
            .register(Arc::new(Echo("b")))
            .register(Arc::new(Echo("a")))
            .register(Arc::new(Echo("b")));

        assert_eq!(registry.names(), vec!["b", "a"]);
        let definitions = registry.definitions();
        assert_eq!(definitions[0].kind, "function");
        assert_eq!(definitions[1].function.name, "a");
        assert_eq!(definitions[1].function.parameters["required"], json!(["text"]));

        assert_eq!(registry.execute("a", &json!({"text": " hi "})).await.unwrap(), "hi");
        assert!(matches!(
            registry.execute("missing", &json!({})).await,
            Err(ApiError::BadRequest(_))
        ));
    }

    #[test]
    fn string_arg_accepts_bare_strings() {
        assert_eq!(string_arg(&json!("rust"), "query").unwrap(), "rust");
        assert!(string_arg(&json!({"query": "  "}), "query").is_err());
        assert!(string_arg(&json!({"other": "x"}), "query").is_err());
    }
}
