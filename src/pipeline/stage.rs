//! 单阶段执行：提示词 → LLM →（可选）一次工具往返 → JSON 恢复 → 失败时默认结构
//!
//! StageRunner 不会向上返回错误：LLM 失败、解析失败、非法工具请求都会落到该阶段的默认结构，
//! 并在 StageOutcome.fallback 中记录原因，由流水线决定是否终止。

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::mpsc::UnboundedSender;

use crate::config::StageTemperatures;
use crate::core::PipelineError;
use crate::llm::{CompletionOptions, LlmClient, Message};
use crate::pipeline::json::{detect_tool_call, parse_json_safely};
use crate::pipeline::prompts::render;
use crate::pipeline::PipelineEvent;
use crate::tools::{tool_call_schema_json, ToolExecutor, SEARCH_PC_PARTS, WEB_SEARCH};

/// 默认结构中保留的原始回复字符数
const RAW_PREVIEW_CHARS: usize = 200;
const OBSERVATION_PREVIEW_CHARS: usize = 200;

/// 流水线的四个阶段（严格按此顺序执行）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Build,
    Critique,
    Improve,
    Narrate,
}

impl Stage {
    pub const ALL: [Stage; 4] = [Stage::Build, Stage::Critique, Stage::Improve, Stage::Narrate];

    pub fn name(&self) -> &'static str {
        match self {
            Stage::Build => "build",
            Stage::Critique => "critique",
            Stage::Improve => "improve",
            Stage::Narrate => "narrate",
        }
    }

    /// 在流水线中的序号（从 1 开始）
    pub fn index(&self) -> usize {
        match self {
            Stage::Build => 1,
            Stage::Critique => 2,
            Stage::Improve => 3,
            Stage::Narrate => 4,
        }
    }

    /// 本阶段允许模型请求的工具
    pub fn allowed_tools(&self) -> &'static [&'static str] {
        match self {
            Stage::Build => &[WEB_SEARCH, SEARCH_PC_PARTS],
            Stage::Critique => &[WEB_SEARCH],
            Stage::Improve | Stage::Narrate => &[],
        }
    }

    pub fn temperature(&self, t: &StageTemperatures) -> f32 {
        match self {
            Stage::Build => t.build,
            Stage::Critique => t.critique,
            Stage::Improve => t.improve,
            Stage::Narrate => t.narrate,
        }
    }

    /// 降级是否应终止流水线（Narrate 只是展示层，不终止）
    pub fn is_critical(&self) -> bool {
        !matches!(self, Stage::Narrate)
    }

    /// 解析失败时的固定默认结构
    pub fn fallback_value(&self, reason: &str, raw: &str) -> Value {
        let raw: String = raw.chars().take(RAW_PREVIEW_CHARS).collect();
        match self {
            Stage::Narrate => json!({
                "narrative": {
                    "title": "Expert PC Build",
                    "core_story": "",
                    "agents_pipeline": [],
                    "final_verdict": {}
                },
                "ui_data": {
                    "comparison_table": "",
                    "concern_badges": [],
                    "decision_tree": "",
                    "next_steps": []
                },
                "error": reason,
                "stage": self.name(),
            }),
            _ => json!({
                "error": reason,
                "stage": self.name(),
                "raw": raw,
            }),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 一次工具往返的记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRoundTrip {
    pub stage: Stage,
    pub tool: String,
    pub args: Value,
    pub ok: bool,
    pub output: String,
}

/// 阶段结果：value 总是 JSON 对象（解析结果或默认结构）
#[derive(Debug, Clone)]
pub struct StageOutcome {
    pub stage: Stage,
    pub value: Value,
    pub tool_round_trip: Option<ToolRoundTrip>,
    /// Some(原因) 表示 value 是默认结构
    pub fallback: Option<String>,
}

impl StageOutcome {
    pub fn is_fallback(&self) -> bool {
        self.fallback.is_some()
    }
}

/// 阶段执行器：共享 LLM、工具执行器与温度配置
pub struct StageRunner {
    llm: Arc<dyn LlmClient>,
    executor: Arc<ToolExecutor>,
    temperatures: StageTemperatures,
    tool_instructions: String,
    event_tx: Option<UnboundedSender<PipelineEvent>>,
}

impl StageRunner {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        executor: Arc<ToolExecutor>,
        temperatures: StageTemperatures,
        tool_instructions: impl Into<String>,
    ) -> Self {
        Self {
            llm,
            executor,
            temperatures,
            tool_instructions: tool_instructions.into(),
            event_tx: None,
        }
    }

    pub fn with_event_tx(mut self, tx: UnboundedSender<PipelineEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    pub fn llm(&self) -> &Arc<dyn LlmClient> {
        &self.llm
    }

    pub(crate) fn emit(&self, ev: PipelineEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(ev);
        }
    }

    fn tool_block(&self, tools: &[&str]) -> String {
        render(
            &self.tool_instructions,
            &[
                ("tool_call_schema", tool_call_schema_json().as_str()),
                ("tools", self.executor.registry().to_schema_json(tools).as_str()),
            ],
        )
    }

    async fn complete(&self, prompt: &str, options: &CompletionOptions) -> Result<String, PipelineError> {
        self.llm
            .complete_with(&[Message::user(prompt)], options)
            .await
            .map_err(PipelineError::Llm)
    }

    fn fall_back(
        &self,
        stage: Stage,
        reason: String,
        raw: &str,
        tool_round_trip: Option<ToolRoundTrip>,
    ) -> StageOutcome {
        tracing::warn!(stage = %stage, reason = %reason, "stage output replaced with default structure");
        self.emit(PipelineEvent::Fallback {
            stage,
            reason: reason.clone(),
        });
        StageOutcome {
            stage,
            value: stage.fallback_value(&reason, raw),
            tool_round_trip,
            fallback: Some(reason),
        }
    }

    /// 执行一个阶段。followup 接收工具输出，返回第二次请求的提示词。
    pub async fn run(
        &self,
        stage: Stage,
        prompt: String,
        followup: &(dyn Fn(&str) -> String + Send + Sync),
    ) -> StageOutcome {
        let start = Instant::now();
        self.emit(PipelineEvent::StageStarted {
            stage,
            index: stage.index(),
            total: Stage::ALL.len(),
        });
        let outcome = self.run_inner(stage, prompt, followup).await;
        let duration_ms = start.elapsed().as_millis() as u64;
        tracing::info!(
            stage = %stage,
            duration_ms,
            fallback = outcome.is_fallback(),
            tool = outcome.tool_round_trip.as_ref().map(|t| t.tool.as_str()).unwrap_or("-"),
            "stage completed"
        );
        self.emit(PipelineEvent::StageCompleted {
            stage,
            duration_ms,
            fallback: outcome.is_fallback(),
        });
        outcome
    }

    async fn run_inner(
        &self,
        stage: Stage,
        prompt: String,
        followup: &(dyn Fn(&str) -> String + Send + Sync),
    ) -> StageOutcome {
        let options = CompletionOptions::with_temperature(stage.temperature(&self.temperatures));
        let tools = stage.allowed_tools();
        let prompt = if tools.is_empty() {
            prompt
        } else {
            format!("{}\n\n{}", prompt, self.tool_block(tools))
        };

        let reply = match self.complete(&prompt, &options).await {
            Ok(r) => r,
            Err(e) => return self.fall_back(stage, e.to_string(), "", None),
        };

        let mut round_trip = None;
        let reply = match detect_tool_call(&reply) {
            None => reply,
            Some(call) if tools.is_empty() => {
                return self.fall_back(
                    stage,
                    format!("Tool calls are not available in the {} stage (requested '{}')", stage, call.tool),
                    &reply,
                    None,
                );
            }
            Some(call) if !tools.contains(&call.tool.as_str()) => {
                let err = PipelineError::HallucinatedTool(call.tool);
                return self.fall_back(stage, err.to_string(), &reply, None);
            }
            Some(call) => {
                tracing::info!(stage = %stage, tool = %call.tool, args = %call.args, "tool call requested");
                self.emit(PipelineEvent::ToolCall {
                    stage,
                    tool: call.tool.clone(),
                    args: call.args.clone(),
                });
                let (output, ok) = match self.executor.execute(&call.tool, call.args.clone()).await {
                    Ok(out) => (out, true),
                    Err(e) if e.is_tool_failure() => (format!("Tool error: {}", e), false),
                    Err(e) => return self.fall_back(stage, e.to_string(), &reply, None),
                };
                self.emit(PipelineEvent::Observation {
                    stage,
                    tool: call.tool.clone(),
                    ok,
                    preview: output.chars().take(OBSERVATION_PREVIEW_CHARS).collect(),
                });
                let trip = ToolRoundTrip {
                    stage,
                    tool: call.tool,
                    args: call.args,
                    ok,
                    output,
                };

                let second = match self.complete(&followup(&trip.output), &options).await {
                    Ok(r) => r,
                    Err(e) => return self.fall_back(stage, e.to_string(), "", Some(trip)),
                };
                if let Some(again) = detect_tool_call(&second) {
                    return self.fall_back(
                        stage,
                        format!(
                            "Model requested a second tool call ('{}'); only one tool round-trip per stage is allowed",
                            again.tool
                        ),
                        &second,
                        Some(trip),
                    );
                }
                round_trip = Some(trip);
                second
            }
        };

        match parse_json_safely(&reply) {
            Ok(obj) => StageOutcome {
                stage,
                value: Value::Object(obj),
                tool_round_trip: round_trip,
                fallback: None,
            },
            Err(e) => self.fall_back(stage, e.to_string(), &reply, round_trip),
        }
    }
}
