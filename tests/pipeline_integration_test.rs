//! 流水线集成测试（脚本化 Mock LLM + 固定检索器）

use std::sync::Arc;

use buildbuddy::core::PipelineError;
use buildbuddy::llm::{LlmClient, MockLlmClient};
use buildbuddy::pipeline::{BuildPipeline, PipelineEvent, PromptSet, Stage, MOCK_PARTS_DATA};
use buildbuddy::retrieval::{PartDocument, PartsRetriever, StaticRetriever};
use buildbuddy::tools::{PartsSearchTool, ToolExecutor, ToolRegistry, WebSearchTool};
use serde_json::json;
use tokio::sync::mpsc;

const QUERY: &str = "Build me a $1200 gaming PC for 1440p";

const BUILD_REPLY: &str = r#"{"reasoning": {"approach": "GPU first"}, "build": {"total_budget": 1200, "parts": [{"category": "CPU", "name": "Ryzen 5 7600", "price": 199}, {"category": "GPU", "name": "RTX 4070 Super", "price": 599}]}}"#;
const CRITIQUE_REPLY: &str = "Here is my review:\n```json\n{\"critique\": {\"severity\": \"minor\", \"issues\": [\"PSU headroom is tight\"]}}\n```";
const IMPROVE_REPLY: &str = r#"{"revisions": {"changes_made": ["bigger PSU"], "revised_build": {"total_budget": 1200, "parts": [{"category": "CPU", "name": "Ryzen 5 7600", "price": 199}, {"category": "GPU", "name": "RTX 4070 Super", "price": 599}, {"category": "PSU", "name": "750W Gold", "price": "$99"}]}}}"#;
const NARRATE_REPLY: &str = r#"{"narrative": {"title": "1440p Sweet Spot", "core_story": "..."}, "ui_data": {"next_steps": ["Order parts"]}}"#;

fn catalog() -> Arc<dyn PartsRetriever> {
    Arc::new(StaticRetriever::new(vec![
        PartDocument::new("AMD Ryzen 5 7600, 6 cores, $199").with_source("catalog"),
        PartDocument::new("NVIDIA RTX 4070 Super, 12GB, $599"),
    ]))
}

fn pipeline(mock: Arc<MockLlmClient>, retriever: Option<Arc<dyn PartsRetriever>>) -> BuildPipeline {
    let mut reg = ToolRegistry::new();
    reg.register(WebSearchTool::new(None, 5, 2000));
    reg.register(PartsSearchTool::new(retriever.clone()));
    BuildPipeline::new(
        mock,
        Arc::new(ToolExecutor::new(reg, 5)),
        retriever,
        PromptSet::default(),
    )
}

#[tokio::test]
async fn test_full_run_prefers_revised_build() {
    let mock = Arc::new(MockLlmClient::with_replies([
        BUILD_REPLY,
        CRITIQUE_REPLY,
        IMPROVE_REPLY,
        NARRATE_REPLY,
    ]));
    let report = pipeline(mock.clone(), Some(catalog())).run(QUERY).await.unwrap();

    assert_eq!(report.status, "success");
    assert_eq!(mock.request_count(), 4);
    assert_eq!(report.build["parts"].as_array().unwrap().len(), 3);
    assert_eq!(report.reasoning.stage_1_build["reasoning"]["approach"], "GPU first");
    assert_eq!(report.reasoning.stage_2_critique["critique"]["severity"], "minor");
    assert!(report.reasoning.stage_3_improvements["revisions"].is_object());
    assert_eq!(report.reasoning.narrative["title"], "1440p Sweet Spot");
    assert_eq!(report.ui_data["next_steps"][0], "Order parts");
    assert!(report.tool_calls.is_empty());
    assert!(report.degraded_stages.is_empty());
    assert!((report.estimated_cost() - 897.0).abs() < f64::EPSILON);
    assert_eq!(report.total_budget(), Some(1200.0));
    assert!(!report.run_id.is_empty());
}

#[tokio::test]
async fn test_prompts_carry_previous_stage_output() {
    let mock = Arc::new(MockLlmClient::with_replies([
        BUILD_REPLY,
        CRITIQUE_REPLY,
        IMPROVE_REPLY,
        NARRATE_REPLY,
    ]));
    pipeline(mock.clone(), Some(catalog())).run(QUERY).await.unwrap();
    let reqs = mock.requests();

    let build_prompt = reqs[0].text();
    assert!(build_prompt.contains("AMD Ryzen 5 7600, 6 cores"));
    assert!(build_prompt.contains("1200"));
    assert!(build_prompt.contains(QUERY));
    assert!(build_prompt.contains("search_pc_parts"));

    // Critique 只拿到 build 段，不含 reasoning
    let critique_prompt = reqs[1].text();
    assert!(critique_prompt.contains(r#""total_budget":1200"#));
    assert!(!critique_prompt.contains("GPU first"));
    assert!(!critique_prompt.contains("search_pc_parts"));
    assert_eq!(reqs[1].options.temperature, Some(0.9));

    let improve_prompt = reqs[2].text();
    assert!(improve_prompt.contains("PSU headroom is tight"));
    assert!(improve_prompt.contains(r#""total_budget":1200"#));
    assert!(!improve_prompt.contains("**TOOLS**"));

    // Narrate 拿到三个阶段的完整输出
    let narrate_prompt = reqs[3].text();
    assert!(narrate_prompt.contains("GPU first"));
    assert!(narrate_prompt.contains("bigger PSU"));
}

#[tokio::test]
async fn test_mock_parts_data_without_retriever() {
    let mock = Arc::new(MockLlmClient::with_replies([
        BUILD_REPLY,
        CRITIQUE_REPLY,
        IMPROVE_REPLY,
        NARRATE_REPLY,
    ]));
    pipeline(mock.clone(), None).run(QUERY).await.unwrap();
    assert!(mock.requests()[0].text().contains(MOCK_PARTS_DATA));
}

#[tokio::test]
async fn test_build_prompt_has_no_invented_budget() {
    for query in [
        "Quiet office PC for spreadsheets",
        "1440p gaming rig, keep it under $1500",
    ] {
        let mock = Arc::new(MockLlmClient::with_replies([
            BUILD_REPLY,
            CRITIQUE_REPLY,
            IMPROVE_REPLY,
            NARRATE_REPLY,
        ]));
        pipeline(mock.clone(), Some(catalog())).run(query).await.unwrap();
        let build_prompt = mock.requests()[0].text();
        assert!(build_prompt.contains(query));
        assert!(!build_prompt.contains("Budget hint"));
        assert!(!build_prompt.contains("$1000"));
        assert!(!build_prompt.contains("$1440"));
    }
}

#[tokio::test]
async fn test_strict_mode_aborts_on_reported_error() {
    let mock = Arc::new(MockLlmClient::with_replies([
        r#"{"error": "Budget too low to build a PC"}"#,
        CRITIQUE_REPLY,
        IMPROVE_REPLY,
        NARRATE_REPLY,
    ]));
    let err = pipeline(mock.clone(), Some(catalog()))
        .run("Gaming PC for $150")
        .await
        .unwrap_err();

    match err {
        PipelineError::StageFailed { stage, reason } => {
            assert_eq!(stage, "build");
            assert_eq!(reason, "Budget too low to build a PC");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(mock.request_count(), 1);
}

#[tokio::test]
async fn test_lenient_mode_records_reported_error() {
    let mock = Arc::new(MockLlmClient::with_replies([
        r#"{"error": "Budget too low to build a PC"}"#,
        CRITIQUE_REPLY,
        IMPROVE_REPLY,
        NARRATE_REPLY,
    ]));
    let report = pipeline(mock.clone(), Some(catalog()))
        .with_strict(false)
        .run("Gaming PC for $150")
        .await
        .unwrap();

    assert_eq!(mock.request_count(), 4);
    assert_eq!(
        report.degraded_stages,
        vec!["build: Budget too low to build a PC".to_string()]
    );
}

#[tokio::test]
async fn test_build_tool_round_trip_is_reported() {
    let mock = Arc::new(MockLlmClient::with_replies([
        r#"{"tool": "search_pc_parts", "args": {"query": "ryzen 7600"}}"#,
        BUILD_REPLY,
        CRITIQUE_REPLY,
        IMPROVE_REPLY,
        NARRATE_REPLY,
    ]));
    let report = pipeline(mock.clone(), Some(catalog())).run(QUERY).await.unwrap();

    assert_eq!(mock.request_count(), 5);
    assert!(mock.requests()[1]
        .text()
        .contains("Source: catalog\nContent: AMD Ryzen 5 7600"));
    assert_eq!(report.tool_calls.len(), 1);
    let trip = &report.tool_calls[0];
    assert_eq!(trip.stage, Stage::Build);
    assert_eq!(trip.tool, "search_pc_parts");
    assert_eq!(trip.args, json!({"query": "ryzen 7600"}));
    assert!(trip.ok);
}

#[tokio::test]
async fn test_strict_mode_aborts_on_critique_failure() {
    let mock = Arc::new(MockLlmClient::with_replies([
        BUILD_REPLY,
        "I think the build is fine overall.",
    ]));
    let err = pipeline(mock.clone(), Some(catalog()))
        .run(QUERY)
        .await
        .unwrap_err();

    match err {
        PipelineError::StageFailed { stage, .. } => assert_eq!(stage, "critique"),
        other => panic!("unexpected error: {other}"),
    }
    // Improve / Narrate 不再执行
    assert_eq!(mock.request_count(), 2);
}

#[tokio::test]
async fn test_lenient_mode_records_degraded_stages() {
    let mock = Arc::new(MockLlmClient::new());
    mock.push_reply(BUILD_REPLY);
    mock.push_reply("no json here");
    mock.push_error("connection reset");
    mock.push_reply(NARRATE_REPLY);
    let report = pipeline(mock, Some(catalog()))
        .with_strict(false)
        .run(QUERY)
        .await
        .unwrap();

    assert_eq!(report.degraded_stages.len(), 2);
    assert!(report.degraded_stages[0].starts_with("critique: "));
    assert!(report.degraded_stages[1].starts_with("improve: "));
    assert_eq!(report.reasoning.stage_2_critique["stage"], "critique");
    assert_eq!(report.reasoning.stage_2_critique["raw"], "no json here");
    // 无修订时沿用 Build 的配置
    assert_eq!(report.build["parts"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_narrate_fallback_does_not_abort() {
    let mock = Arc::new(MockLlmClient::with_replies([
        BUILD_REPLY,
        CRITIQUE_REPLY,
        IMPROVE_REPLY,
        "Sorry, I cannot write a story today.",
    ]));
    let report = pipeline(mock, Some(catalog())).run(QUERY).await.unwrap();

    assert_eq!(report.status, "success");
    assert_eq!(report.reasoning.narrative["title"], "Expert PC Build");
    assert!(report.ui_data["concern_badges"].as_array().unwrap().is_empty());
    assert_eq!(report.degraded_stages.len(), 1);
    assert!(report.degraded_stages[0].starts_with("narrate: "));
}

#[tokio::test]
async fn test_event_sequence() {
    let mock = Arc::new(MockLlmClient::with_replies([
        r#"{"tool": "web_search", "args": "rtx 4070 super price"}"#,
        BUILD_REPLY,
        CRITIQUE_REPLY,
        IMPROVE_REPLY,
        "not json",
    ]));
    let (tx, mut rx) = mpsc::unbounded_channel();
    let p = pipeline(mock, Some(catalog())).with_event_tx(tx);
    p.run(QUERY).await.unwrap();
    drop(p);

    let mut kinds = Vec::new();
    while let Some(ev) = rx.recv().await {
        let v = serde_json::to_value(&ev).unwrap();
        kinds.push(v["type"].as_str().unwrap().to_string());
        if let PipelineEvent::ToolCall { tool, args, .. } = &ev {
            assert_eq!(tool, "web_search");
            assert_eq!(args["query"], "rtx 4070 super price");
        }
    }
    assert_eq!(
        kinds,
        vec![
            "stage_started",
            "tool_call",
            "observation",
            "stage_completed",
            "stage_started",
            "stage_completed",
            "stage_started",
            "stage_completed",
            "stage_started",
            "fallback",
            "stage_completed",
            "done",
        ]
    );
}

#[tokio::test]
async fn test_mock_client_reports_zero_usage() {
    let mock = Arc::new(MockLlmClient::with_replies([
        BUILD_REPLY,
        CRITIQUE_REPLY,
        IMPROVE_REPLY,
        NARRATE_REPLY,
    ]));
    let report = pipeline(mock.clone(), None).run(QUERY).await.unwrap();
    assert_eq!(mock.token_usage(), (0, 0, 0));
    assert_eq!(report.token_usage.total_tokens, 0);
}
