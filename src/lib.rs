//! BuildBuddy - PC 装机推理流水线
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Gemini / Mock）
//! - **observability**: tracing 日志初始化
//! - **pipeline**: Build → Critique → Improve → Narrate 四阶段流水线、JSON 恢复、提示词
//! - **retrieval**: 零件检索服务边界
//! - **tools**: web_search、search_pc_parts 与执行器

pub mod config;
pub mod core;
pub mod llm;
pub mod observability;
pub mod pipeline;
pub mod retrieval;
pub mod tools;

pub use pipeline::{BuildPipeline, PipelineEvent, PipelineReport, Stage};
