//! 流水线错误类型
//!
//! 阶段内的可恢复问题（JSON 解析失败、工具失败）由 StageRunner 就地处理并降级为默认结构；
//! 只有无法继续的情况才以 PipelineError 形式向上传播。

use thiserror::Error;

/// 流水线运行过程中可能出现的错误
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Tool execution failed: {0}")]
    ToolExecutionFailed(String),

    #[error("Tool timeout: {0}")]
    ToolTimeout(String),

    #[error("Hallucinated tool: {0}")]
    HallucinatedTool(String),

    /// 严格模式下 Build / Critique / Improve 任一阶段降级即终止
    #[error("{stage} stage failed: {reason}")]
    StageFailed { stage: String, reason: String },
}

impl PipelineError {
    /// 是否为工具侧错误（跟进提示中以 "Tool error" 形式交给模型，而不是终止阶段）
    pub fn is_tool_failure(&self) -> bool {
        matches!(
            self,
            PipelineError::ToolExecutionFailed(_) | PipelineError::ToolTimeout(_)
        )
    }
}
