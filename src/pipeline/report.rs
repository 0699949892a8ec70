//! 流水线最终输出与零件清单摘要

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::pipeline::ToolRoundTrip;

/// 各阶段完整输出（供 UI 展示推理过程）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reasoning {
    pub stage_1_build: Value,
    pub stage_2_critique: Value,
    pub stage_3_improvements: Value,
    pub narrative: Value,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenCounts {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl From<(u64, u64, u64)> for TokenCounts {
    fn from((prompt, completion, total): (u64, u64, u64)) -> Self {
        Self {
            prompt_tokens: prompt,
            completion_tokens: completion,
            total_tokens: total,
        }
    }
}

/// 一次完整运行的结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    pub run_id: String,
    pub status: String,
    /// 最终配置（修订后优先）
    pub build: Value,
    pub reasoning: Reasoning,
    pub ui_data: Value,
    pub tool_calls: Vec<ToolRoundTrip>,
    /// 落入默认结构的阶段及原因（非严格模式或 Narrate）
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub degraded_stages: Vec<String>,
    pub token_usage: TokenCounts,
    pub generated_at: String,
}

/// 清单中的一行（字段缺失时宽松处理）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartLine {
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_price")]
    pub price: Option<f64>,
}

/// 价格可能是数字或 "$599" 这样的字符串
fn lenient_price<'de, D>(d: D) -> Result<Option<f64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let v = Value::deserialize(d)?;
    Ok(match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s
            .trim()
            .trim_start_matches('$')
            .replace(',', "")
            .parse()
            .ok(),
        _ => None,
    })
}

impl PipelineReport {
    /// 最终配置的零件列表；无法解析的条目跳过
    pub fn parts(&self) -> Vec<PartLine> {
        self.build
            .get("parts")
            .and_then(|p| p.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|p| serde_json::from_value::<PartLine>(p.clone()).ok())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// 已知价格之和
    pub fn estimated_cost(&self) -> f64 {
        self.parts().iter().filter_map(|p| p.price).sum()
    }

    pub fn total_budget(&self) -> Option<f64> {
        self.build.get("total_budget").and_then(|b| b.as_f64())
    }
}
