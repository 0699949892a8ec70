//! LLM 客户端抽象
//!
//! 所有后端（OpenAI 兼容 / Gemini / Mock）实现 LlmClient：complete（非流式）、complete_with（带采样参数）。

use async_trait::async_trait;

use crate::llm::Message;

/// 单次补全的采样参数（各阶段温度不同）
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CompletionOptions {
    pub temperature: Option<f32>,
}

impl CompletionOptions {
    pub fn with_temperature(temperature: f32) -> Self {
        Self {
            temperature: Some(temperature),
        }
    }
}

/// LLM 客户端 trait
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 非流式完成（使用后端默认采样参数）
    async fn complete(&self, messages: &[Message]) -> Result<String, String> {
        self.complete_with(messages, &CompletionOptions::default())
            .await
    }

    /// 非流式完成，指定温度等参数
    async fn complete_with(
        &self,
        messages: &[Message],
        options: &CompletionOptions,
    ) -> Result<String, String>;

    /// 获取累计 token 使用统计：(prompt_tokens, completion_tokens, total_tokens)
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}
