//! web_search 工具：查询实时价格、评测、驱动问题
//!
//! 配置了 [tools.web_search].endpoint 时发 GET `<endpoint>?q=<query>`（带超时与 User-Agent）；
//! HTML 响应用 html2text 提取可读文本，超过 max_result_chars 时截断并追加 ...[truncated]。
//! 未配置端点时返回模拟结果，流水线仍可离线跑通。

use async_trait::async_trait;
use html2text::from_read;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::Client;
use serde_json::Value;

use crate::config::WebSearchSection;
use crate::tools::Tool;

pub const WEB_SEARCH: &str = "web_search";

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

pub struct WebSearchTool {
    client: Client,
    endpoint: Option<String>,
    max_result_chars: usize,
}

/// 简易去除 HTML 标签（html2text 失败时的回退）
fn strip_html_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => {
                in_tag = false;
                out.push(' ');
            }
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 判断内容是否像 HTML
fn looks_like_html(s: &str) -> bool {
    let s = s.trim_start();
    s.starts_with("<!")
        || s.to_ascii_lowercase().starts_with("<html")
        || (s.contains("</") && (s.contains("<body") || s.contains("<head") || s.contains("<div")))
}

/// 按字符截断并追加标记
fn truncate_chars(body: String, max_chars: usize) -> String {
    if body.chars().count() > max_chars {
        body.chars().take(max_chars).collect::<String>() + "\n...[truncated]"
    } else {
        body
    }
}

/// 未配置搜索端点时的模拟结果
pub fn simulated_result(query: &str) -> String {
    format!(
        "Simulated web search results for: {}. (Web Search integration pending)",
        query
    )
}

impl WebSearchTool {
    pub fn new(endpoint: Option<String>, timeout_secs: u64, max_result_chars: usize) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/json;q=0.9,*/*;q=0.8"),
        );
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()
            .unwrap_or_default();
        Self {
            client,
            endpoint: endpoint.filter(|e| !e.trim().is_empty()),
            max_result_chars,
        }
    }

    pub fn from_config(cfg: &WebSearchSection) -> Self {
        Self::new(cfg.endpoint.clone(), cfg.timeout_secs, cfg.max_result_chars)
    }

    fn html_to_text(&self, html: &str) -> String {
        match from_read(html.as_bytes(), 120) {
            Ok(text) if !text.trim().is_empty() => text,
            _ => strip_html_tags(html),
        }
    }

    async fn search(&self, endpoint: &str, query: &str) -> Result<String, String> {
        let resp = self
            .client
            .get(endpoint)
            .query(&[("q", query)])
            .send()
            .await
            .map_err(|e| format!("Request failed: {}", e))?;
        if !resp.status().is_success() {
            return Err(format!("HTTP {}", resp.status()));
        }
        let mut body = resp
            .text()
            .await
            .map_err(|e| format!("Read body: {}", e))?;

        if let Some(stripped) = body.strip_prefix('\u{FEFF}') {
            body = stripped.to_string();
        }
        let body = if looks_like_html(&body) {
            self.html_to_text(&body)
        } else {
            body
        };
        Ok(truncate_chars(body, self.max_result_chars))
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        WEB_SEARCH
    }

    fn description(&self) -> &str {
        "Search the public web for current prices, recent reviews, benchmarks, recalls or driver problems. Args: {\"query\": \"price of RTX 4070 Super\"}."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "Search query"}
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let query = args
            .get("query")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .trim();
        if query.is_empty() {
            return Err("Missing query".to_string());
        }
        match &self.endpoint {
            Some(endpoint) => {
                tracing::info!(query = %query, "web search");
                self.search(endpoint, query).await
            }
            None => Ok(simulated_result(query)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_simulated_without_endpoint() {
        let tool = WebSearchTool::new(None, 5, 100);
        let out = tool
            .execute(json!({"query": "RTX 4070 Super price"}))
            .await
            .unwrap();
        assert_eq!(
            out,
            "Simulated web search results for: RTX 4070 Super price. (Web Search integration pending)"
        );
    }

    #[tokio::test]
    async fn test_missing_query() {
        let tool = WebSearchTool::new(Some("  ".into()), 5, 100);
        assert!(tool.endpoint.is_none());
        assert_eq!(tool.execute(json!({})).await.unwrap_err(), "Missing query");
    }

    #[test]
    fn test_truncate_and_html_helpers() {
        assert_eq!(truncate_chars("abcdef".into(), 3), "abc\n...[truncated]");
        assert_eq!(truncate_chars("abc".into(), 3), "abc");
        assert!(looks_like_html("<!DOCTYPE html><html></html>"));
        assert!(!looks_like_html("{\"price\": 599}"));
        assert_eq!(strip_html_tags("<p>RTX</p><b>4070</b>"), "RTX 4070");
    }
}
