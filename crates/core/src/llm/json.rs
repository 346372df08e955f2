use crate::domain::contract::StageSchema;
use anyhow::Context;

/// Drops `<think>...</think>` preambles emitted by reasoning-capable search models.
fn strip_reasoning(text: &str) -> &str {
    match text.rfind("</think>") {
        Some(end) => &text[end + "</think>".len()..],
        None => text,
    }
}

pub fn extract_json(text: &str) -> Option<String> {
    let trimmed = strip_reasoning(text).trim();
    if trimmed.starts_with("```") {
        // Remove Markdown fences (```json ... ``` or ``` ... ```).
        let mut inner = trimmed;
        if let Some(after_first) = inner.splitn(2, '\n').nth(1) {
            inner = after_first;
        }
        if let Some(end) = inner.rfind("```") {
            inner = &inner[..end];
        }
        return Some(inner.trim().to_string());
    }

    // Best-effort extraction: first '{' to last '}'.
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(trimmed[start..=end].trim().to_string())
}

/// Decodes a stage reply into its schema and runs the schema's validation.
pub fn parse_stage_output<T: StageSchema>(text: &str) -> anyhow::Result<T> {
    let json_str = extract_json(text).unwrap_or_else(|| text.trim().to_string());
    let parsed = serde_json::from_str::<T>(&json_str)
        .with_context(|| format!("output is not valid JSON for {} schema: {json_str}", T::NAME))?;
    parsed
        .validate()
        .with_context(|| format!("output violates {} schema", T::NAME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::schema::{TrendingCompanyList, TrendingCompanyResearchList};
    use serde_json::json;

    fn companies_json() -> String {
        json!({
            "companies": [
                {"name": "Nvidia", "ticker": "NVDA", "reason": "record data center revenue"},
                {"name": "Palantir", "ticker": "PLTR", "reason": "new defense contracts"},
            ]
        })
        .to_string()
    }

    #[test]
    fn extract_json_handles_fenced_blocks() {
        let body = "{\"a\":1}";
        let fenced = format!("```json\n{body}\n```\n");
        assert_eq!(extract_json(&fenced), Some(body.to_string()));
    }

    #[test]
    fn extract_json_falls_back_to_braces() {
        let s = "prefix {\"a\":1} suffix";
        assert_eq!(extract_json(s), Some("{\"a\":1}".to_string()));
    }

    #[test]
    fn extract_json_skips_think_preamble() {
        let s = "<think>the user wants {json}</think>\n{\"a\":1}";
        assert_eq!(extract_json(s), Some("{\"a\":1}".to_string()));
    }

    #[test]
    fn parse_stage_output_accepts_valid_companies() {
        let text = format!("Here you go:\n{}", companies_json());
        let list = parse_stage_output::<TrendingCompanyList>(&text).unwrap();
        assert_eq!(list.companies.len(), 2);
        assert_eq!(list.companies[1].ticker, "PLTR");
    }

    #[test]
    fn parse_stage_output_rejects_wrong_schema() {
        let err = parse_stage_output::<TrendingCompanyResearchList>(&companies_json()).unwrap_err();
        assert!(err.to_string().contains("trending_company_research_list"));
    }

    #[test]
    fn parse_stage_output_rejects_prose() {
        assert!(parse_stage_output::<TrendingCompanyList>("I could not find anything.").is_err());
    }
}
