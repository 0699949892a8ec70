//! 工具箱：web_search、search_pc_parts 与执行器

pub mod executor;
pub mod parts_search;
pub mod registry;
pub mod schema;
pub mod web_search;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::retrieval::PartsRetriever;

pub use executor::ToolExecutor;
pub use parts_search::{PartsSearchTool, SEARCH_PC_PARTS};
pub use registry::{Tool, ToolRegistry};
pub use schema::tool_call_schema_json;
pub use web_search::{simulated_result, WebSearchTool, WEB_SEARCH};

/// 按配置注册全部工具并返回带超时的执行器
pub fn create_executor(cfg: &AppConfig, retriever: Option<Arc<dyn PartsRetriever>>) -> ToolExecutor {
    let mut tools = ToolRegistry::new();
    tools.register(WebSearchTool::from_config(&cfg.tools.web_search));
    tools.register(PartsSearchTool::new(retriever));
    ToolExecutor::new(tools, cfg.tools.tool_timeout_secs)
}
