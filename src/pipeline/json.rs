//! 从模型自由文本中恢复 JSON 对象，并识别工具调用
//!
//! parse_json_safely 的尝试顺序：
//! 1. 整段严格解析
//! 2. 去掉一对 ``` 围栏（优先 ```json）后解析
//! 3. 围栏内容若是 `"key": ...` 片段，补上外层花括号再解析
//! 4. 截取第一个 `{` 到最后一个 `}` 再解析（先围栏内，再整段）
//!
//! 结果必须是 JSON 对象；字符串、数组等均视为失败，由调用方替换为阶段默认结构。

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum JsonRecoveryError {
    #[error("Empty response text")]
    Empty,

    #[error("JSON Error: {0}")]
    Invalid(String),

    #[error("Model returned a string, expected JSON object. Content: {0}")]
    StringValue(String),

    #[error("Model returned {0}, expected JSON object")]
    NotAnObject(&'static str),
}

/// 模型请求的工具调用：{"tool": "web_search", "args": {"query": "..."}}
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub tool: String,
    pub args: Value,
}

/// 去掉一对 Markdown 围栏；没有围栏时返回 None。只有开头围栏时取其后全部内容。
pub fn strip_fences(text: &str) -> Option<&str> {
    if let Some(start) = text.find("```json") {
        let rest = &text[start + "```json".len()..];
        let end = rest.find("```").unwrap_or(rest.len());
        return Some(rest[..end].trim());
    }
    let start = text.find("```")?;
    let mut rest = &text[start + 3..];
    // ```JSON / ```javascript 之类的语言标记
    if let Some(nl) = rest.find('\n') {
        let tag = rest[..nl].trim();
        if !tag.is_empty() && tag.chars().all(|c| c.is_ascii_alphanumeric()) {
            rest = &rest[nl + 1..];
        }
    }
    let end = rest.find("```").unwrap_or(rest.len());
    Some(rest[..end].trim())
}

fn brace_slice(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

fn wrap_fragment(text: &str) -> Option<Value> {
    serde_json::from_str::<Value>(&format!("{{{}}}", text))
        .ok()
        .filter(Value::is_object)
}

fn kind_of(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn into_object(value: Value, cleaned: &str) -> Result<Map<String, Value>, JsonRecoveryError> {
    match value {
        Value::Object(map) => Ok(map),
        Value::String(s) => {
            if cleaned.contains(':') || cleaned.contains("reasoning") {
                if let Some(Value::Object(map)) = wrap_fragment(cleaned) {
                    return Ok(map);
                }
            }
            Err(JsonRecoveryError::StringValue(s))
        }
        other => Err(JsonRecoveryError::NotAnObject(kind_of(&other))),
    }
}

/// 尽力从模型回复中解析出 JSON 对象
pub fn parse_json_safely(text: &str) -> Result<Map<String, Value>, JsonRecoveryError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(JsonRecoveryError::Empty);
    }

    let strict_err = match serde_json::from_str::<Value>(trimmed) {
        Ok(v) => return into_object(v, trimmed),
        Err(e) => e,
    };

    let cleaned = strip_fences(trimmed).unwrap_or(trimmed);
    let mut last_err = strict_err.to_string();
    if cleaned != trimmed {
        match serde_json::from_str::<Value>(cleaned) {
            Ok(v) => return into_object(v, cleaned),
            Err(e) => last_err = e.to_string(),
        }
    }

    if cleaned.starts_with('"') && cleaned.contains(':') {
        if let Some(Value::Object(map)) = wrap_fragment(cleaned) {
            return Ok(map);
        }
    }

    // 字符串值里也可能出现 ```，围栏截断失败时再对整段回复截取
    let mut candidates = vec![cleaned];
    if cleaned != trimmed {
        candidates.push(trimmed);
    }
    for text in candidates {
        if let Some(slice) = brace_slice(text) {
            match serde_json::from_str::<Value>(slice) {
                Ok(v) => return into_object(v, slice),
                Err(e) => last_err = e.to_string(),
            }
        }
    }

    Err(JsonRecoveryError::Invalid(last_err))
}

/// 回复恢复为对象且 "tool" 为非空字符串时视为工具调用；字符串形式的 args 视为 {"query": args}
pub fn detect_tool_call(text: &str) -> Option<ToolCall> {
    let obj = parse_json_safely(text).ok()?;
    let tool = obj.get("tool")?.as_str()?.trim();
    if tool.is_empty() {
        return None;
    }
    let args = match obj.get("args") {
        Some(Value::Object(m)) => Value::Object(m.clone()),
        Some(Value::String(s)) => serde_json::json!({ "query": s }),
        _ => serde_json::json!({}),
    };
    Some(ToolCall {
        tool: tool.to_string(),
        args,
    })
}
