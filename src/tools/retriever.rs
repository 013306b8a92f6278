use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::{single_string_schema, string_arg, Tool};
use crate::core::errors::ApiError;
use crate::vector::VectorService;

/// Similarity search over the indexed documentation pages. Name and
/// description come from the vector settings.
pub struct RetrieverTool {
    vector: Arc<VectorService>,
    name: String,
    description: String,
}

impl RetrieverTool {
    pub fn new(vector: Arc<VectorService>) -> Self {
        Self {
            name: vector.tool_name().to_string(),
            description: vector.tool_description().to_string(),
            vector,
        }
    }
}

#[async_trait]
impl Tool for RetrieverTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> Value {
        single_string_schema("query", "query to look up in retriever")
    }

    async fn call(&self, args: &Value) -> Result<String, ApiError> {
        let query = string_arg(args, "query")?;
        self.vector.search(&query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::settings::VectorSettings;
    use crate::llm::scripted::ScriptedProvider;
    use crate::vector::loader::Document;
    use crate::vector::store::VectorStore;
    use serde_json::json;

    #[tokio::test]
    async fn searches_the_ready_index() {
        let dir = tempfile::tempdir().unwrap();
        let vector = Arc::new(VectorService::new(
            VectorSettings::default(),
            "test-embedding".to_string(),
            Arc::new(ScriptedProvider::new()),
            dir.path().to_path_buf(),
            Vec::new(),
        ));
        let tool = RetrieverTool::new(vector.clone());
        assert_eq!(tool.name(), "langsmith_search");
        assert!(tool.call(&json!({"query": "tracing"})).await.is_err());

        let store = VectorStore::in_memory().await.unwrap();
        vector
            .index_documents(
                &store,
                &[Document {
                    source: "https://docs.example.com".to_string(),
                    title: None,
                    content: "LangSmith traces every run.".to_string(),
                }],
            )
            .await
            .unwrap();
        vector.install_index(store, 1).await.unwrap();

        let output = tool.call(&json!({"query": "traces"})).await.unwrap();
        assert_eq!(output, "LangSmith traces every run.");
    }
}
