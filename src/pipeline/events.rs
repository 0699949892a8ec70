//! 流水线过程事件：用于日志 / 前端展示阶段推进、工具调用与降级

use serde::Serialize;

use crate::pipeline::Stage;

/// 单步过程事件（可序列化为 JSON）
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// 进入某阶段（index 从 1 开始）
    StageStarted {
        stage: Stage,
        index: usize,
        total: usize,
    },
    /// 模型请求了工具
    ToolCall {
        stage: Stage,
        tool: String,
        args: serde_json::Value,
    },
    /// 工具返回（预览）
    Observation {
        stage: Stage,
        tool: String,
        ok: bool,
        preview: String,
    },
    /// 阶段输出替换为默认结构
    Fallback { stage: Stage, reason: String },
    StageCompleted {
        stage: Stage,
        duration_ms: u64,
        fallback: bool,
    },
    Done { run_id: String },
    Error { text: String },
}
