//! Mock LLM 客户端（离线演示与测试用，无需 API）
//!
//! 按顺序回放预设回复；脚本耗尽后返回 `{}`。同时记录每次收到的消息与采样参数，便于断言提示词内容。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{CompletionOptions, LlmClient, Message};

/// 一次被记录的请求
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub messages: Vec<Message>,
    pub options: CompletionOptions,
}

impl RecordedRequest {
    /// 拼接所有消息内容，便于 contains 断言
    pub fn text(&self) -> String {
        self.messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Mock 客户端：回放脚本化回复
#[derive(Debug, Default)]
pub struct MockLlmClient {
    replies: Mutex<VecDeque<Result<String, String>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以给定回复序列创建
    pub fn with_replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mock = Self::new();
        for r in replies {
            mock.push_reply(r);
        }
        mock
    }

    pub fn push_reply(&self, reply: impl Into<String>) {
        if let Ok(mut q) = self.replies.lock() {
            q.push_back(Ok(reply.into()));
        }
    }

    /// 追加一次失败（模拟网络错误等）
    pub fn push_error(&self, err: impl Into<String>) {
        if let Ok(mut q) = self.replies.lock() {
            q.push_back(Err(err.into()));
        }
    }

    /// 已收到的全部请求（按时间顺序）
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete_with(
        &self,
        messages: &[Message],
        options: &CompletionOptions,
    ) -> Result<String, String> {
        if let Ok(mut r) = self.requests.lock() {
            r.push(RecordedRequest {
                messages: messages.to_vec(),
                options: *options,
            });
        }
        self.replies
            .lock()
            .map_err(|e| e.to_string())?
            .pop_front()
            .unwrap_or_else(|| Ok("{}".to_string()))
    }
}
