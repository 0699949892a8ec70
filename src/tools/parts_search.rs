//! search_pc_parts 工具：查询内部零件库（规格、价格、社区装机讨论）

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::retrieval::PartsRetriever;
use crate::tools::Tool;

pub const SEARCH_PC_PARTS: &str = "search_pc_parts";

pub struct PartsSearchTool {
    retriever: Option<Arc<dyn PartsRetriever>>,
}

impl PartsSearchTool {
    /// retriever 为 None 表示检索服务未配置
    pub fn new(retriever: Option<Arc<dyn PartsRetriever>>) -> Self {
        Self { retriever }
    }
}

#[async_trait]
impl Tool for PartsSearchTool {
    fn name(&self) -> &str {
        SEARCH_PC_PARTS
    }

    fn description(&self) -> &str {
        "Search the internal knowledge base of PC parts: specs, prices and community build discussions. Prefer this before web_search. Args: {\"query\": \"AM5 motherboards under $200\"}."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "Parts or build question"}
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let Some(retriever) = &self.retriever else {
            return Ok("Error: Database credentials not configured.".to_string());
        };
        let query = args
            .get("query")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .trim();
        if query.is_empty() {
            return Err("Missing query".to_string());
        }

        let docs = retriever
            .retrieve(query)
            .await
            .map_err(|e| format!("Error searching database: {}", e))?;
        if docs.is_empty() {
            return Ok("No results found".to_string());
        }
        Ok(docs
            .iter()
            .map(|d| {
                format!(
                    "Source: {}\nContent: {}\n---",
                    d.source.as_deref().unwrap_or("Internal DB"),
                    d.content
                )
            })
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::{PartDocument, StaticRetriever};
    use serde_json::json;

    #[tokio::test]
    async fn test_not_configured() {
        let tool = PartsSearchTool::new(None);
        let out = tool.execute(json!({"query": "cpu"})).await.unwrap();
        assert_eq!(out, "Error: Database credentials not configured.");
    }

    #[tokio::test]
    async fn test_formats_sources() {
        let retriever = StaticRetriever::new(vec![
            PartDocument::new("Ryzen 5 7600, $199").with_source("parts.csv"),
            PartDocument::new("B650 boards are fine for 7600"),
        ]);
        let tool = PartsSearchTool::new(Some(Arc::new(retriever)));
        let out = tool.execute(json!({"query": "ryzen"})).await.unwrap();
        assert_eq!(
            out,
            "Source: parts.csv\nContent: Ryzen 5 7600, $199\n---\nSource: Internal DB\nContent: B650 boards are fine for 7600\n---"
        );
    }

    #[tokio::test]
    async fn test_empty_results() {
        let tool = PartsSearchTool::new(Some(Arc::new(StaticRetriever::default())));
        let out = tool.execute(json!({"query": "x"})).await.unwrap();
        assert_eq!(out, "No results found");
    }
}
