//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `BUILDBUDDY__*` 覆盖（双下划线表示嵌套，如 `BUILDBUDDY__LLM__PROVIDER=openai`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSection,
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub pipeline: PipelineSection,
    #[serde(default)]
    pub retrieval: RetrievalSection,
    #[serde(default)]
    pub tools: ToolsSection,
}

/// [app] 段
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppSection {
    pub name: Option<String>,
    /// Prompt 覆盖目录，未设置时依次查找 config/prompts、../config/prompts
    pub prompts_dir: Option<PathBuf>,
}

/// [llm] 段：后端选择、超时与各阶段温度
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    /// 后端：gemini / openai；有对应 API Key 时生效，否则退回 Mock
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    pub base_url: Option<String>,
    #[serde(default)]
    pub gemini: LlmModelSection,
    #[serde(default)]
    pub openai: LlmModelSection,
    #[serde(default)]
    pub timeouts: LlmTimeoutsSection,
    #[serde(default)]
    pub temperatures: StageTemperatures,
}

fn default_provider() -> String {
    "gemini".to_string()
}

fn default_model() -> String {
    "gemini-2.0-flash-exp".to_string()
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: None,
            gemini: LlmModelSection::default(),
            openai: LlmModelSection::default(),
            timeouts: LlmTimeoutsSection::default(),
            temperatures: StageTemperatures::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LlmModelSection {
    pub model: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmTimeoutsSection {
    /// 单次补全请求超时（秒）
    #[serde(default = "default_request_timeout")]
    pub request: u64,
}

fn default_request_timeout() -> u64 {
    60
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self {
            request: default_request_timeout(),
        }
    }
}

/// [llm.temperatures] 段：Critique 默认更高，鼓励挑刺
#[derive(Debug, Clone, Deserialize)]
pub struct StageTemperatures {
    #[serde(default = "default_temperature")]
    pub build: f32,
    #[serde(default = "default_critique_temperature")]
    pub critique: f32,
    #[serde(default = "default_temperature")]
    pub improve: f32,
    #[serde(default = "default_temperature")]
    pub narrate: f32,
}

fn default_temperature() -> f32 {
    0.7
}

fn default_critique_temperature() -> f32 {
    0.9
}

impl Default for StageTemperatures {
    fn default() -> Self {
        Self {
            build: default_temperature(),
            critique: default_critique_temperature(),
            improve: default_temperature(),
            narrate: default_temperature(),
        }
    }
}

/// [pipeline] 段
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineSection {
    /// Build / Critique / Improve 任一阶段落入默认结构时是否终止整条流水线
    #[serde(default = "default_strict")]
    pub strict: bool,
}

fn default_strict() -> bool {
    true
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            strict: default_strict(),
        }
    }
}

/// [retrieval] 段：零件检索服务（外部协作方，只定义边界）
#[derive(Debug, Clone, Deserialize)]
pub struct RetrievalSection {
    /// 检索服务 URL；未配置时 search_pc_parts 返回未配置提示
    pub endpoint: Option<String>,
    pub data_store_id: Option<String>,
    #[serde(default = "default_max_documents")]
    pub max_documents: usize,
    #[serde(default = "default_retrieval_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_max_documents() -> usize {
    5
}

fn default_retrieval_timeout_secs() -> u64 {
    15
}

impl Default for RetrievalSection {
    fn default() -> Self {
        Self {
            endpoint: None,
            data_store_id: None,
            max_documents: default_max_documents(),
            timeout_secs: default_retrieval_timeout_secs(),
        }
    }
}

/// [tools] 段：工具超时与 web_search
#[derive(Debug, Clone, Deserialize)]
pub struct ToolsSection {
    /// 单次工具调用超时（秒）
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
    #[serde(default)]
    pub web_search: WebSearchSection,
}

fn default_tool_timeout_secs() -> u64 {
    30
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            tool_timeout_secs: default_tool_timeout_secs(),
            web_search: WebSearchSection::default(),
        }
    }
}

/// [tools.web_search] 段：搜索端点、超时、最大字符数
#[derive(Debug, Clone, Deserialize)]
pub struct WebSearchSection {
    /// 形如 https://search.example.com/search，请求时追加 ?q=<query>；未设置时返回模拟结果
    pub endpoint: Option<String>,
    #[serde(default = "default_search_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_result_chars")]
    pub max_result_chars: usize,
}

fn default_search_timeout_secs() -> u64 {
    15
}

fn default_max_result_chars() -> usize {
    8000
}

impl Default for WebSearchSection {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_secs: default_search_timeout_secs(),
            max_result_chars: default_max_result_chars(),
        }
    }
}

/// 从 config 目录加载配置，环境变量 BUILDBUDDY__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）；不存在时记 warn 并忽略
/// 3. 最后叠加环境变量 BUILDBUDDY__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    for name in ["config/default", "../config/default"] {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        } else {
            tracing::warn!(path = %path.display(), "config file not found, using defaults");
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("BUILDBUDDY")
            .separator("__")
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}
