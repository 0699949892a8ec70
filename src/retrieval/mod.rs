//! 零件检索（外部向量 / 文档搜索服务的边界）
//!
//! PartsRetriever 只负责「查询 → 文档列表」；服务本身不在本 crate 内。
//! - HttpRetriever：POST JSON 到配置的端点
//! - StaticRetriever：固定文档，离线演示与测试用

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::RetrievalSection;

/// format_retrieved_docs 最多拼入提示词的文档数
const MAX_FORMATTED_DOCS: usize = 10;

pub const NO_PARTS_DATA: &str = "No parts data available";

/// 单个检索结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartDocument {
    pub content: String,
    pub source: Option<String>,
}

impl PartDocument {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// 兼容两种字段命名：content/source 与 page_content/metadata.source
    fn from_value(v: &Value) -> Option<Self> {
        if let Some(s) = v.as_str() {
            return Some(Self::new(s));
        }
        let content = v
            .get("content")
            .or_else(|| v.get("page_content"))
            .and_then(|c| c.as_str())?;
        let source = v
            .get("source")
            .or_else(|| v.get("metadata").and_then(|m| m.get("source")))
            .and_then(|s| s.as_str())
            .map(String::from);
        Some(Self {
            content: content.to_string(),
            source,
        })
    }
}

/// 检索器 trait
#[async_trait]
pub trait PartsRetriever: Send + Sync {
    async fn retrieve(&self, query: &str) -> Result<Vec<PartDocument>, String>;
}

/// 将检索结果格式化为提示词文本：最多 10 条，按行拼接
pub fn format_retrieved_docs(docs: &[PartDocument]) -> String {
    if docs.is_empty() {
        return NO_PARTS_DATA.to_string();
    }
    docs.iter()
        .take(MAX_FORMATTED_DOCS)
        .map(|d| d.content.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// HTTP 检索器：POST {"query", "max_documents", "data_store_id"}，响应为 {"documents": [...]} 或数组
pub struct HttpRetriever {
    client: Client,
    endpoint: String,
    data_store_id: Option<String>,
    max_documents: usize,
}

impl HttpRetriever {
    pub fn new(endpoint: impl Into<String>, max_documents: usize, timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            client,
            endpoint: endpoint.into(),
            data_store_id: None,
            max_documents,
        }
    }

    /// 从 [retrieval] 配置创建；未配置 endpoint 时返回 None
    pub fn from_config(cfg: &RetrievalSection) -> Option<Self> {
        let endpoint = cfg.endpoint.as_deref()?.trim();
        if endpoint.is_empty() {
            return None;
        }
        let mut r = Self::new(endpoint, cfg.max_documents, cfg.timeout_secs);
        r.data_store_id = cfg.data_store_id.clone();
        Some(r)
    }
}

/// 解析检索服务响应体
pub(crate) fn parse_documents(body: &Value, max_documents: usize) -> Vec<PartDocument> {
    let items = body
        .get("documents")
        .or_else(|| body.get("results"))
        .unwrap_or(body);
    items
        .as_array()
        .map(|arr| {
            arr.iter()
                .filter_map(PartDocument::from_value)
                .take(max_documents)
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl PartsRetriever for HttpRetriever {
    async fn retrieve(&self, query: &str) -> Result<Vec<PartDocument>, String> {
        let payload = serde_json::json!({
            "query": query,
            "max_documents": self.max_documents,
            "data_store_id": self.data_store_id,
        });
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|e| format!("Request failed: {}", e))?;
        if !resp.status().is_success() {
            return Err(format!("HTTP {}", resp.status()));
        }
        let body: Value = resp
            .json()
            .await
            .map_err(|e| format!("Read body: {}", e))?;
        let docs = parse_documents(&body, self.max_documents);
        tracing::debug!(query = %query, count = docs.len(), "parts retrieved");
        Ok(docs)
    }
}

/// 固定文档检索器：忽略查询，返回全部文档
#[derive(Debug, Clone, Default)]
pub struct StaticRetriever {
    docs: Vec<PartDocument>,
}

impl StaticRetriever {
    pub fn new(docs: Vec<PartDocument>) -> Self {
        Self { docs }
    }
}

#[async_trait]
impl PartsRetriever for StaticRetriever {
    async fn retrieve(&self, _query: &str) -> Result<Vec<PartDocument>, String> {
        Ok(self.docs.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_format_empty() {
        assert_eq!(format_retrieved_docs(&[]), NO_PARTS_DATA);
    }

    #[test]
    fn test_format_caps_at_ten() {
        let docs: Vec<_> = (0..12).map(|i| PartDocument::new(format!("doc{i}"))).collect();
        let out = format_retrieved_docs(&docs);
        assert_eq!(out.lines().count(), 10);
        assert!(out.starts_with("doc0\n"));
        assert!(!out.contains("doc10"));
    }

    #[test]
    fn test_parse_documents_shapes() {
        let wrapped = json!({"documents": [
            {"content": "Ryzen 5 7600 $199", "source": "parts.csv"},
            {"page_content": "RTX 4070 $549", "metadata": {"source": "reddit"}},
            {"unrelated": true}
        ]});
        let docs = parse_documents(&wrapped, 5);
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].source.as_deref(), Some("parts.csv"));
        assert_eq!(docs[1].content, "RTX 4070 $549");
        assert_eq!(docs[1].source.as_deref(), Some("reddit"));

        let bare = json!(["a", "b", "c"]);
        assert_eq!(parse_documents(&bare, 2).len(), 2);
        assert!(parse_documents(&json!({"error": "x"}), 5).is_empty());
    }

    #[test]
    fn test_from_config_requires_endpoint() {
        let mut cfg = RetrievalSection::default();
        assert!(HttpRetriever::from_config(&cfg).is_none());
        cfg.endpoint = Some("  ".into());
        assert!(HttpRetriever::from_config(&cfg).is_none());
        cfg.endpoint = Some("http://localhost:7700/search".into());
        assert!(HttpRetriever::from_config(&cfg).is_some());
    }

    #[tokio::test]
    async fn test_static_retriever() {
        let r = StaticRetriever::new(vec![PartDocument::new("CPU").with_source("db")]);
        let docs = r.retrieve("anything").await.unwrap();
        assert_eq!(docs.len(), 1);
    }
}
