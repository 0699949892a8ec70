//! 阶段提示词模板
//!
//! 占位符形如 `{user_request}`，render 只替换给定的名字，模板里的 JSON 花括号原样保留。
//! 每个模板可由 `<prompts_dir>/<name>.txt` 覆盖（默认查找 config/prompts、../config/prompts）。

use std::path::{Path, PathBuf};

pub const BUILD_PROMPT: &str = r#"You are an expert PC architect. Create a build based on user requirements.

**CRITICAL INSTRUCTION: REAL-TIME PRICING & BUDGET**
1.  **Check Prices**: Use the 'web_search' tool to find the CURRENT price of key components (GPU, CPU). Do NOT rely on internal data if it's old.
2.  **Strict Budget**: If the user gives a budget (e.g., "$1200"), the TOTAL sum of your *found* prices must be under it. If parts are too expensive, swap them (e.g., 4070 -> 4060 Ti).
3.  **No Budget?**: If no budget is specified, maximize **Value/Performance** for their specific goal (e.g., "Gaming" -> 7800X3D + best GPU reasonable; "Office" -> Cheap but reliable). Do NOT just pick the most expensive parts unless they ask for "Best possible".

**OUTPUT FORMAT (JSON)**
{
  "reasoning": {
    "parsed_requirements": " User wants: Gaming PC, Budget: $1500 (or 'None')",
    "price_check_log": [
      {"part": "RTX 4070 Super", "search_query": "price of RTX 4070 Super", "found_price": 599, "source": "Web Search"},
      {"part": "Ryzen 5 7600", "search_query": "price of Ryzen 5 7600", "found_price": 199, "source": "Web Search"}
    ],
    "budget_analysis": "Total findings: $1450 vs Budget: $1500. Status: UNDER BUDGET.",
    "tool_decisions": [
      {"tool": "web_search", "query": "price of RTX 4070 Super", "why": "Need current market price"}
    ],
    "assumptions": ["assumption 1", "assumption 2"],
    "budget_allocation": {"CPU": {"percentage": 30, "reasoning": "..."}}
  },
  "build": {
    "total_budget": 1500,
    "estimated_cost": 1450,
    "parts": [
      {"category": "CPU", "name": "AMD Ryzen 5 7600", "price": 199, "rationale": "Best value gaming CPU, found at $199"},
      {"category": "GPU", "name": "NVIDIA RTX 4070 Super", "price": 599, "rationale": "Fits budget, great 1440p perf"}
    ],
    "performance_targets": {"resolution": "1440p", "fps_target": "100+"},
    "known_limitations": ["Stock cooler is loud"]
  }
}

User Requirements: {user_requirements}
Available Parts (Reference): {retrieved_parts}

Be specific. If you search for a price, USE THAT EXACT PRICE in your JSON.

IMPORTANT: Use the 'web_search' tool to verify the CURRENT PRICE and AVAILABILITY of key components (like GPU and CPU).
If the retrieved parts data seems outdated (e.g., old prices), prefer the web search results.
Mention in your reasoning if you checked live prices."#;

/// 工具返回后重新生成 Build：全新的聚焦提示词，不再附带原始长模板
pub const BUILD_FOLLOWUP_PROMPT: &str = r#"You are an expert PC architect.

USER REQUEST: {user_request}

SEARCH RESULTS (Current Market Data):
{search_results}

TASK:
1. Create a PC build that STRICTLY follows the user's budget using the search results.
2. If the user said "Strict checking" or gave a budget, you MUST ensure sum of parts < budget.
3. Update 'price_check_log' with the real prices you found.

OUTPUT:
Generate a VALID JSON object (and ONLY JSON) matching this structure:
{
  "reasoning": {
      "budget_analysis": "...",
      "price_check_log": [...]
  },
  "build": {
      "total_budget": 1000,
      "parts": [...]
  }
}

Do not request any more tools. Ensure the response starts with { and ends with }."#;

pub const CRITIQUE_PROMPT: &str = r#"You are a CRITICAL PC build reviewer. Find problems with this build.

**OUTPUT FORMAT (JSON)**
{
  "critique": {
    "overall_assessment": "verdict",
    "severity": "strong/moderate/minor",
    "concerns": [
      {
        "category": "Bottleneck",
        "issue": "clear problem",
        "evidence": "data/benchmarks supporting this",
        "impact": "what goes wrong",
        "severity": "high/medium/low"
      }
    ],
    "budget_inefficiencies": [
      {"item": "Thermal paste", "allocated": 50, "should_be": 15, "wasted": 35}
    ],
    "compatibility_flags": [],
    "missing_considerations": []
  }
}

Build to Review: {build}
User's Original Requirements: {user_requirements}

Be harsh. Look for bottlenecks, price risks, community disagreements. Quote evidence.

CRITICAL INSTRUCTION: Use 'web_search' to check for recent ISSUES, RECALLS, or DRIVER PROBLEMS with the chosen GPU or CPU.
Also check if there is a 'Super' or 'Ti' version available for a similar price."#;

/// 追加在 Critique 原提示词之后
pub const CRITIQUE_FOLLOWUP_SUFFIX: &str = r#"

Web Search Context: {search_results}

Do not request any more tools. Now generate the Critique JSON."#;

pub const IMPROVE_PROMPT: &str = r#"You are a PC build architect. Revise this build based on critique feedback.

**OUTPUT FORMAT (JSON)**
{
  "revisions": {
    "changes_made": [
      {
        "original_part": "...",
        "revised_part": "...",
        "reason": "why change",
        "tradeoff": "cost/perf impact",
        "confidence": "high/medium"
      }
    ],
    "critiques_rejected_and_why": [
      {"critique": "...", "response": "..."}
    ],
    "revised_build": {
      "total_budget": 1165,
      "parts": [...]
    },
    "improvements_summary": "what got better",
    "remaining_risks": [
      {"risk": "...", "mitigation": "...", "probability": "20%"}
    ],
    "user_decision_points": [
      {"decision": "...", "option_a": "...", "option_b": "...", "answer": "..."}
    ]
  }
}

Original Build: {build}
Critique: {critique}
User Requirements: {user_requirements}

Only change parts that have real problems. Keep total cost neutral or lower. Explain your reasoning."#;

pub const NARRATE_PROMPT: &str = r#"You are the PC Build Orchestrator. You coordinate three AI agents:
1. Builder -> Creates initial build with reasoning
2. Critic -> Finds flaws independently
3. Improver -> Patches build based on critique

Your job is to synthesize their outputs into a NARRATIVE that shows reasoning, not just a final answer.

**Output Format (JSON)**
{
  "narrative": {
    "title": "Expert PC Build: {user_goal}",
    "core_story": "1-2 sentences explaining the philosophy of this build",
    "agents_pipeline": [
      {"stage": "Build", "summary_for_user": "Initial build prioritized..., chose..., assumes..."},
      {"stage": "Critique", "summary_for_user": "But there are risks: ..."},
      {"stage": "Improve", "summary_for_user": "So we patched: ..."}
    ],
    "final_verdict": {
      "build": "revised build parts",
      "key_decisions": "Why we chose each component",
      "tradeoffs": "What we're NOT doing and why",
      "risks": "What could still go wrong",
      "confidence": "high/medium/low"
    }
  },
  "ui_data": {
    "comparison_table": "original vs revised build side-by-side",
    "concern_badges": ["bottleneck fixed", "cost optimized"],
    "decision_tree": "alternatives & tradeoffs",
    "next_steps": ["Buy now before price increase"]
  }
}

**Rules:**
- Use conversational language; explain like you would to a friend
- Highlight the moment of critique (the "aha" that improves the build)
- Show confidence levels (high/medium/low) for each change

User Request: {user_request}
Build Agent Output: {agent1_output}
Critique Agent Output: {agent2_output}
Improve Agent Output: {agent3_output}"#;

/// 追加在允许用工具的阶段提示词之后
pub const TOOL_INSTRUCTIONS: &str = r#"**TOOLS**
You may request AT MOST ONE tool call before answering. To call a tool, reply with ONLY a JSON object of this shape (no other text):
{"tool": "<tool name>", "args": {"query": "..."}}

Tool call schema:
{tool_call_schema}

Available tools:
{tools}

If you do not need a tool, reply directly with the JSON output described above."#;

/// 用具名变量替换模板中的 `{name}`；单遍扫描，代入的值里即使含 `{...}` 也不会被二次替换
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(pos) = rest.find('{') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos + 1..];
        let hit = vars.iter().find(|(name, _)| {
            tail.strip_prefix(*name)
                .is_some_and(|after| after.starts_with('}'))
        });
        match hit {
            Some((name, value)) => {
                out.push_str(value);
                rest = &tail[name.len() + 1..];
            }
            None => {
                out.push('{');
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    out
}

/// 一套阶段提示词
#[derive(Debug, Clone)]
pub struct PromptSet {
    pub build: String,
    pub build_followup: String,
    pub critique: String,
    pub critique_followup: String,
    pub improve: String,
    pub narrate: String,
    pub tool_instructions: String,
}

impl Default for PromptSet {
    fn default() -> Self {
        Self {
            build: BUILD_PROMPT.to_string(),
            build_followup: BUILD_FOLLOWUP_PROMPT.to_string(),
            critique: CRITIQUE_PROMPT.to_string(),
            critique_followup: CRITIQUE_FOLLOWUP_SUFFIX.to_string(),
            improve: IMPROVE_PROMPT.to_string(),
            narrate: NARRATE_PROMPT.to_string(),
            tool_instructions: TOOL_INSTRUCTIONS.to_string(),
        }
    }
}

impl PromptSet {
    /// 从目录加载覆盖；dir 为 None 时依次查找 config/prompts、../config/prompts
    pub fn load(dir: Option<&Path>) -> Self {
        let dirs: Vec<PathBuf> = match dir {
            Some(d) => vec![d.to_path_buf()],
            None => vec![
                PathBuf::from("config/prompts"),
                PathBuf::from("../config/prompts"),
            ],
        };
        Self::load_from(&dirs)
    }

    /// 按顺序在多个目录中查找覆盖；空白文件视为不存在，继续查找下一个目录
    fn load_from(dirs: &[PathBuf]) -> Self {
        let read = |name: &str, fallback: &str| -> String {
            dirs.iter()
                .find_map(|d| {
                    std::fs::read_to_string(d.join(format!("{name}.txt")))
                        .ok()
                        .filter(|s| !s.trim().is_empty())
                })
                .map(|s| {
                    tracing::debug!(prompt = %name, "prompt override loaded");
                    s
                })
                .unwrap_or_else(|| fallback.to_string())
        };
        Self {
            build: read("build", BUILD_PROMPT),
            build_followup: read("build_followup", BUILD_FOLLOWUP_PROMPT),
            critique: read("critique", CRITIQUE_PROMPT),
            critique_followup: read("critique_followup", CRITIQUE_FOLLOWUP_SUFFIX),
            improve: read("improve", IMPROVE_PROMPT),
            narrate: read("narrate", NARRATE_PROMPT),
            tool_instructions: read("tool_instructions", TOOL_INSTRUCTIONS),
        }
    }
}
