//! BuildBuddy CLI
//!
//! 用法：buildbuddy [--config <path>] [--verbose] [--lenient] <装机需求...>
//! 结果 JSON 输出到 stdout，阶段进度与日志输出到 stderr。

use std::path::PathBuf;

use anyhow::Context;
use buildbuddy::config::load_config;
use buildbuddy::observability;
use buildbuddy::pipeline::{BuildPipeline, PipelineEvent};
use clap::Parser;
use tokio::sync::mpsc;

#[derive(Parser, Debug)]
#[command(
    name = "buildbuddy",
    version,
    about = "Build → Critique → Improve → Narrate PC build assistant"
)]
struct Cli {
    /// 装机需求，例如 "Build me a $1200 gaming PC"
    #[arg(required = true, num_args = 1..)]
    query: Vec<String>,

    /// 配置文件（叠加在 config/default.toml 之上）
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// debug 级日志并输出零件摘要
    #[arg(short, long)]
    verbose: bool,

    /// 关闭 strict：关键阶段降级时继续运行
    #[arg(long)]
    lenient: bool,
}

impl Cli {
    fn query_text(&self) -> String {
        self.query.join(" ").trim().to_string()
    }
}

fn log_event(ev: &PipelineEvent) {
    match ev {
        PipelineEvent::StageStarted { stage, index, total } => {
            tracing::info!("[{}/{}] {} agent running...", index, total, stage)
        }
        PipelineEvent::ToolCall { stage, tool, args } => {
            tracing::info!("[{}] tool call: {} {}", stage, tool, args)
        }
        PipelineEvent::Fallback { stage, reason } => {
            tracing::warn!("[{}] using default output: {}", stage, reason)
        }
        other => {
            if let Ok(json) = serde_json::to_string(other) {
                tracing::debug!(event = %json, "pipeline event");
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    observability::init(args.verbose);
    let query = args.query_text();
    if query.is_empty() {
        anyhow::bail!("Query must not be empty");
    }

    let cfg = load_config(args.config.clone()).context("Failed to load config")?;

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let printer = tokio::spawn(async move {
        while let Some(ev) = event_rx.recv().await {
            log_event(&ev);
        }
    });

    let mut pipeline = BuildPipeline::from_config(&cfg).with_event_tx(event_tx);
    if args.lenient {
        pipeline = pipeline.with_strict(false);
    }

    let result = pipeline.run(&query).await;
    // 丢弃 pipeline 以关闭事件通道，等待打印任务结束
    drop(pipeline);
    let _ = printer.await;

    let report = result.context("Pipeline failed")?;

    if args.verbose {
        for p in report.parts() {
            let price = p
                .price
                .map(|v| format!("${v:.0}"))
                .unwrap_or_else(|| "?".to_string());
            tracing::info!("{:<10} {:<40} {}", p.category, p.name, price);
        }
        tracing::info!(
            "Estimated cost: ${:.0} (budget: {})",
            report.estimated_cost(),
            report
                .total_budget()
                .map(|b| format!("${b:.0}"))
                .unwrap_or_else(|| "N/A".to_string())
        );
    }

    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("Failed to serialize report")?
    );
    Ok(())
}
