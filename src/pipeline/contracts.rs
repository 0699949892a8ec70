//! 阶段间数据契约：从上一阶段输出中取出下一阶段需要的部分

use serde_json::{json, Value};

fn section(v: &Value, key: &str) -> Value {
    v.get(key).cloned().unwrap_or_else(|| json!({}))
}

/// Build 输出中的 "build" 段（Critique / Improve 的输入）
pub fn build_section(build: &Value) -> Value {
    section(build, "build")
}

/// Critique 输出中的 "critique" 段（Improve 的输入）
pub fn critique_section(critique: &Value) -> Value {
    section(critique, "critique")
}

/// 最终配置：优先 improve.revisions.revised_build，否则 build.build，都没有时为 {}
pub fn final_build(build: &Value, improve: &Value) -> Value {
    improve
        .get("revisions")
        .and_then(|r| r.get("revised_build"))
        .filter(|b| b.is_object())
        .cloned()
        .unwrap_or_else(|| build_section(build))
}

/// Narrate 输出拆为 (narrative, ui_data)
pub fn narrative_parts(narrate: &Value) -> (Value, Value) {
    (section(narrate, "narrative"), section(narrate, "ui_data"))
}

/// 用于拼进提示词的紧凑 JSON
pub fn to_prompt_json(v: &Value) -> String {
    serde_json::to_string(v).unwrap_or_else(|_| "{}".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sections_default_to_empty_object() {
        let build = json!({"reasoning": {}, "build": {"total_budget": 1200}});
        assert_eq!(build_section(&build), json!({"total_budget": 1200}));
        assert_eq!(build_section(&json!({"error": "x"})), json!({}));
        assert_eq!(critique_section(&json!({"critique": {"severity": "minor"}}))["severity"], "minor");
        assert_eq!(critique_section(&json!({})), json!({}));
    }

    #[test]
    fn test_final_build_prefers_revision() {
        let build = json!({"build": {"parts": ["old"]}});
        let improve = json!({"revisions": {"revised_build": {"parts": ["new"]}}});
        assert_eq!(final_build(&build, &improve), json!({"parts": ["new"]}));
        assert_eq!(final_build(&build, &json!({"revisions": {}})), json!({"parts": ["old"]}));
        assert_eq!(
            final_build(&build, &json!({"revisions": {"revised_build": "see above"}})),
            json!({"parts": ["old"]})
        );
        assert_eq!(final_build(&json!({}), &json!({})), json!({}));
    }

    #[test]
    fn test_narrative_parts() {
        let (n, ui) = narrative_parts(&json!({"narrative": {"title": "t"}}));
        assert_eq!(n["title"], "t");
        assert_eq!(ui, json!({}));
    }
}
