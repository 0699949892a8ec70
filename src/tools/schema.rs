//! 工具调用 JSON Schema 生成（schemars）
//!
//! 拼入允许用工具的阶段提示词，告诉模型如何以 `{"tool": "...", "args": {...}}` 请求一次工具。

use std::collections::HashMap;

use schemars::{schema_for, JsonSchema};

// 仅用于 Schema 生成；doc 注释会作为 description 进入提示词，故用英文。
// 运行时解析见 pipeline::json::detect_tool_call
/// A single tool request.
#[allow(dead_code)]
#[derive(JsonSchema)]
struct ToolCallFormat {
    /// Name of one of the available tools listed below.
    pub tool: String,
    /// Tool arguments, e.g. {"query": "..."}.
    pub args: HashMap<String, String>,
}

/// 返回工具调用的 JSON Schema 字符串
pub fn tool_call_schema_json() -> String {
    let schema = schema_for!(ToolCallFormat);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_mentions_fields() {
        let schema: serde_json::Value = serde_json::from_str(&tool_call_schema_json()).unwrap();
        let props = &schema["properties"];
        assert!(props.get("tool").is_some());
        assert!(props.get("args").is_some());
    }
}
