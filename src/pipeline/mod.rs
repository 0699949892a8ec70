//! 推理流水线：Build → Critique → Improve → Narrate
//!
//! 四个阶段严格顺序执行，每阶段把上一阶段的 JSON 拼进模板、调用一次 LLM、
//! 至多执行一次工具往返，再从回复文本中恢复 JSON；失败时使用该阶段的默认结构。
//! strict 模式下 Build / Critique / Improve 任一降级即返回 StageFailed。

pub mod contracts;
pub mod events;
pub mod json;
pub mod prompts;
pub mod query;
pub mod report;
pub mod stage;

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;
use tracing::Instrument;

use crate::config::AppConfig;
use crate::core::PipelineError;
use crate::llm::{create_llm_from_config, LlmClient};
use crate::retrieval::{format_retrieved_docs, HttpRetriever, PartsRetriever};
use crate::tools::{create_executor, ToolExecutor};

pub use contracts::{build_section, critique_section, final_build, narrative_parts};
pub use events::PipelineEvent;
pub use json::{detect_tool_call, parse_json_safely, JsonRecoveryError, ToolCall};
pub use prompts::{render, PromptSet};
pub use query::{extract_budget, extract_goal};
pub use report::{PartLine, PipelineReport, Reasoning, TokenCounts};
pub use stage::{Stage, StageOutcome, StageRunner, ToolRoundTrip};

use contracts::to_prompt_json;

/// 检索失败或未配置时拼入 Build 提示词的占位数据
pub const MOCK_PARTS_DATA: &str =
    "Mock parts data: CPU (AMD Ryzen), GPU (RTX 4070), RAM (32GB), etc.";

/// 流水线：持有阶段执行器、检索器与提示词
pub struct BuildPipeline {
    runner: StageRunner,
    retriever: Option<Arc<dyn PartsRetriever>>,
    prompts: PromptSet,
    strict: bool,
}

impl BuildPipeline {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        executor: Arc<ToolExecutor>,
        retriever: Option<Arc<dyn PartsRetriever>>,
        prompts: PromptSet,
    ) -> Self {
        let runner = StageRunner::new(
            llm,
            executor,
            Default::default(),
            prompts.tool_instructions.clone(),
        );
        Self {
            runner,
            retriever,
            prompts,
            strict: true,
        }
    }

    /// 按配置组装：LLM 后端、检索器、工具、提示词覆盖、温度与 strict
    pub fn from_config(cfg: &AppConfig) -> Self {
        let llm = create_llm_from_config(cfg);
        let retriever: Option<Arc<dyn PartsRetriever>> = HttpRetriever::from_config(&cfg.retrieval)
            .map(|r| Arc::new(r) as Arc<dyn PartsRetriever>);
        if retriever.is_none() {
            tracing::warn!("Retrieval endpoint not configured; build stage will use mock parts data");
        }
        let executor = Arc::new(create_executor(cfg, retriever.clone()));
        let prompts = PromptSet::load(cfg.app.prompts_dir.as_deref());
        let runner = StageRunner::new(
            llm,
            executor,
            cfg.llm.temperatures.clone(),
            prompts.tool_instructions.clone(),
        );
        Self {
            runner,
            retriever,
            prompts,
            strict: cfg.pipeline.strict,
        }
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn with_event_tx(mut self, tx: UnboundedSender<PipelineEvent>) -> Self {
        self.runner = self.runner.with_event_tx(tx);
        self
    }

    /// 运行完整流水线
    pub async fn run(&self, query: &str) -> Result<PipelineReport, PipelineError> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let span = tracing::info_span!("pipeline", run_id = %run_id);
        let result = self.run_stages(query, &run_id).instrument(span).await;
        match &result {
            Ok(_) => self.runner.emit(PipelineEvent::Done { run_id }),
            Err(e) => self.runner.emit(PipelineEvent::Error {
                text: e.to_string(),
            }),
        }
        result
    }

    async fn run_stages(&self, query: &str, run_id: &str) -> Result<PipelineReport, PipelineError> {
        tracing::info!(query = %query, budget = %extract_budget(query), "pipeline started");
        let mut degraded = Vec::new();
        let mut tool_calls = Vec::new();

        let build = self.run_build(query).await;
        let build = self.accept(build, &mut degraded, &mut tool_calls)?;

        let critique = self.run_critique(&build, query).await;
        let critique = self.accept(critique, &mut degraded, &mut tool_calls)?;

        let improve = self.run_improve(&build, &critique, query).await;
        let improve = self.accept(improve, &mut degraded, &mut tool_calls)?;

        let narrate = self.run_narrate(query, &build, &critique, &improve).await;
        let narrate = self.accept(narrate, &mut degraded, &mut tool_calls)?;

        let final_build = final_build(&build, &improve);
        let (narrative, ui_data) = narrative_parts(&narrate);
        let report = PipelineReport {
            run_id: run_id.to_string(),
            status: "success".to_string(),
            build: final_build,
            reasoning: Reasoning {
                stage_1_build: build,
                stage_2_critique: critique,
                stage_3_improvements: improve,
                narrative,
            },
            ui_data,
            tool_calls,
            degraded_stages: degraded,
            token_usage: self.runner.llm().token_usage().into(),
            generated_at: chrono::Utc::now().to_rfc3339(),
        };
        tracing::info!(
            parts = report.parts().len(),
            estimated_cost = report.estimated_cost(),
            "pipeline complete"
        );
        Ok(report)
    }

    /// 收下阶段结果；strict 模式下关键阶段降级，或模型自己返回了顶层 "error"，即失败
    fn accept(
        &self,
        outcome: StageOutcome,
        degraded: &mut Vec<String>,
        tool_calls: &mut Vec<ToolRoundTrip>,
    ) -> Result<Value, PipelineError> {
        if let Some(trip) = outcome.tool_round_trip {
            tool_calls.push(trip);
        }
        let reason = outcome
            .fallback
            .or_else(|| reported_error(&outcome.value));
        if let Some(reason) = reason {
            if self.strict && outcome.stage.is_critical() {
                return Err(PipelineError::StageFailed {
                    stage: outcome.stage.name().to_string(),
                    reason,
                });
            }
            degraded.push(format!("{}: {}", outcome.stage, reason));
        }
        Ok(outcome.value)
    }

    async fn retrieve_parts(&self, query: &str) -> String {
        let Some(retriever) = &self.retriever else {
            return MOCK_PARTS_DATA.to_string();
        };
        match retriever.retrieve(query).await {
            Ok(docs) => format_retrieved_docs(&docs),
            Err(e) => {
                tracing::warn!(error = %e, "parts retrieval failed, using mock parts data");
                MOCK_PARTS_DATA.to_string()
            }
        }
    }

    async fn run_build(&self, query: &str) -> StageOutcome {
        let parts = self.retrieve_parts(query).await;
        let prompt = render(
            &self.prompts.build,
            &[("user_requirements", query), ("retrieved_parts", parts.as_str())],
        );
        let followup_template = &self.prompts.build_followup;
        let followup = |results: &str| {
            render(
                followup_template,
                &[("user_request", query), ("search_results", results)],
            )
        };
        self.runner.run(Stage::Build, prompt, &followup).await
    }

    async fn run_critique(&self, build: &Value, query: &str) -> StageOutcome {
        let prompt = render(
            &self.prompts.critique,
            &[
                ("build", to_prompt_json(&build_section(build)).as_str()),
                ("user_requirements", query),
            ],
        );
        let suffix_template = &self.prompts.critique_followup;
        let base = prompt.clone();
        let followup = move |results: &str| {
            format!(
                "{}{}",
                base,
                render(suffix_template, &[("search_results", results)])
            )
        };
        self.runner.run(Stage::Critique, prompt, &followup).await
    }

    async fn run_improve(&self, build: &Value, critique: &Value, query: &str) -> StageOutcome {
        let prompt = render(
            &self.prompts.improve,
            &[
                ("build", to_prompt_json(&build_section(build)).as_str()),
                ("critique", to_prompt_json(&critique_section(critique)).as_str()),
                ("user_requirements", query),
            ],
        );
        self.runner.run(Stage::Improve, prompt, &no_followup).await
    }

    async fn run_narrate(
        &self,
        query: &str,
        build: &Value,
        critique: &Value,
        improve: &Value,
    ) -> StageOutcome {
        let prompt = render(
            &self.prompts.narrate,
            &[
                ("user_goal", extract_goal(query).as_str()),
                ("user_request", query),
                ("agent1_output", to_prompt_json(build).as_str()),
                ("agent2_output", to_prompt_json(critique).as_str()),
                ("agent3_output", to_prompt_json(improve).as_str()),
            ],
        );
        self.runner.run(Stage::Narrate, prompt, &no_followup).await
    }
}

/// 模型输出中的顶层 "error" 字段（如 {"error": "Budget too low"}）
fn reported_error(value: &Value) -> Option<String> {
    match value.get("error")? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// 无工具阶段不会走到跟进请求
fn no_followup(_: &str) -> String {
    String::new()
}
