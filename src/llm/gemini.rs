//! Gemini 客户端（走 Google 的 OpenAI 兼容端点）
//!
//! - Base URL: https://generativelanguage.googleapis.com/v1beta/openai/
//! - 模型: gemini-2.0-flash-exp（默认）、gemini-1.5-pro 等

use crate::llm::OpenAiClient;

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai/";
pub const GEMINI_FLASH: &str = "gemini-2.0-flash-exp";

/// 创建 Gemini 客户端
///
/// - 优先使用环境变量 `GEMINI_API_KEY`，其次 `GOOGLE_API_KEY`
/// - 模型优先级：`model` 参数 > `GEMINI_MODEL` 环境变量 > gemini-2.0-flash-exp
pub fn create_gemini_client(model: Option<&str>, request_timeout_secs: u64) -> OpenAiClient {
    let api_key = std::env::var("GEMINI_API_KEY")
        .ok()
        .or_else(|| std::env::var("GOOGLE_API_KEY").ok())
        .unwrap_or_else(|| "sk-placeholder".to_string());

    let model = model
        .map(String::from)
        .or_else(|| std::env::var("GEMINI_MODEL").ok())
        .unwrap_or_else(|| GEMINI_FLASH.to_string());

    OpenAiClient::new(Some(GEMINI_BASE_URL), &model, Some(api_key.as_str()))
        .with_request_timeout(request_timeout_secs)
}
