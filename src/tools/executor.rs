//! 工具执行器
//!
//! 持有 ToolRegistry 与全局超时，execute(tool_name, args) 在超时内调用工具，
//! 未注册返回 HallucinatedTool，超时或失败转为 ToolTimeout / ToolExecutionFailed；每次调用输出结构化审计日志（JSON）。

use std::time::{Duration, Instant};

use tokio::time::timeout;

use crate::core::PipelineError;
use crate::tools::ToolRegistry;

const ARGS_PREVIEW_CHARS: usize = 200;

/// 工具执行器：对每次调用施加超时，并将结果映射为 PipelineError
pub struct ToolExecutor {
    registry: ToolRegistry,
    timeout: Duration,
}

impl ToolExecutor {
    pub fn new(registry: ToolRegistry, timeout_secs: u64) -> Self {
        Self {
            registry,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    pub async fn execute(
        &self,
        tool_name: &str,
        args: serde_json::Value,
    ) -> Result<String, PipelineError> {
        let tool = self
            .registry
            .get(tool_name)
            .ok_or_else(|| PipelineError::HallucinatedTool(tool_name.to_string()))?;

        let start = Instant::now();
        let args_preview = args_preview(&args);
        let result = timeout(self.timeout, tool.execute(args)).await;

        let (ok, outcome): (bool, &str) = match &result {
            Ok(Ok(_)) => (true, "ok"),
            Ok(Err(_)) => (false, "error"),
            Err(_) => (false, "timeout"),
        };
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": tool_name,
            "ok": ok,
            "outcome": outcome,
            "duration_ms": start.elapsed().as_millis() as u64,
            "args_preview": args_preview,
        });
        tracing::info!(audit = %audit, "tool");

        match result {
            Ok(Ok(content)) => Ok(content),
            Ok(Err(e)) => Err(PipelineError::ToolExecutionFailed(e)),
            Err(_) => Err(PipelineError::ToolTimeout(tool_name.to_string())),
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }
}

fn args_preview(args: &serde_json::Value) -> String {
    let s = args.to_string();
    if s.chars().count() > ARGS_PREVIEW_CHARS {
        format!("{}...", s.chars().take(ARGS_PREVIEW_CHARS).collect::<String>())
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::Tool;
    use async_trait::async_trait;
    use serde_json::{json, Value};

    struct Slow;

    #[async_trait]
    impl Tool for Slow {
        fn name(&self) -> &str {
            "slow"
        }

        fn description(&self) -> &str {
            "sleeps"
        }

        async fn execute(&self, _args: Value) -> Result<String, String> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("late".into())
        }
    }

    struct Failing;

    #[async_trait]
    impl Tool for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn description(&self) -> &str {
            "always fails"
        }

        async fn execute(&self, _args: Value) -> Result<String, String> {
            Err("backend down".into())
        }
    }

    fn executor(timeout_secs: u64) -> ToolExecutor {
        let mut reg = ToolRegistry::new();
        reg.register(Slow);
        reg.register(Failing);
        ToolExecutor::new(reg, timeout_secs)
    }

    #[tokio::test]
    async fn test_unknown_tool_is_hallucinated() {
        let err = executor(1).execute("fetch_url", json!({})).await.unwrap_err();
        assert!(matches!(err, PipelineError::HallucinatedTool(name) if name == "fetch_url"));
    }

    #[tokio::test]
    async fn test_failure_maps_to_execution_failed() {
        let err = executor(1).execute("failing", json!({})).await.unwrap_err();
        assert!(matches!(err, PipelineError::ToolExecutionFailed(msg) if msg == "backend down"));
    }

    #[tokio::test]
    async fn test_timeout() {
        let err = executor(1).execute("slow", json!({})).await.unwrap_err();
        assert!(matches!(err, PipelineError::ToolTimeout(_)));
    }

    #[test]
    fn test_args_preview_truncates() {
        let long = json!({"query": "x".repeat(500)});
        let preview = args_preview(&long);
        assert!(preview.ends_with("..."));
        assert_eq!(preview.chars().count(), ARGS_PREVIEW_CHARS + 3);
    }
}
