//! 用户请求的轻量提取：预算、标题

use std::sync::OnceLock;

use regex::Regex;

const DEFAULT_BUDGET: &str = "1000";
const GOAL_MAX_CHARS: usize = 60;

fn budget_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$?(\d{3,5})").expect("budget regex is valid"))
}

/// 提取预算数字，如 "$1200" / "1200 dollar" → "1200"；找不到时为 "1000"
pub fn extract_budget(query: &str) -> String {
    budget_re()
        .captures(query)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| DEFAULT_BUDGET.to_string())
}

/// 从请求生成简短标题：前 60 个字符，去掉结尾句点后加 "..."
pub fn extract_goal(query: &str) -> String {
    let head: String = query.chars().take(GOAL_MAX_CHARS).collect();
    format!("{}...", head.trim_end_matches('.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_budget() {
        assert_eq!(extract_budget("Build me a $1200 gaming PC"), "1200");
        assert_eq!(extract_budget("around 850 dollar for office work"), "850");
        assert_eq!(extract_budget("quiet workstation, no budget"), "1000");
        assert_eq!(extract_budget("$99 is too little"), "1000");
        // 第一个 3~5 位数字即为结果
        assert_eq!(extract_budget("1440p gaming under $1500"), "1440");
    }

    #[test]
    fn test_extract_goal() {
        assert_eq!(extract_goal("Gaming PC."), "Gaming PC...");
        let long = "I want a silent small form factor build for 4K video editing and some light gaming on weekends";
        let goal = extract_goal(long);
        assert_eq!(goal.chars().count(), 63);
        assert!(goal.ends_with("..."));
        assert!(goal.starts_with("I want a silent small form factor build"));
    }
}
