//! Prompts for the three document stages.
//!
//! Centralising every prompt here keeps prompt wording out of the stage
//! runner and lets unit tests inspect prompts directly without a model.
//!
//! Every builder takes text that has already been cut with
//! [`truncate_chars`]; the stage runner does this once per document.

use crate::request::{AnalysisType, ProcessingRequest};

/// Default system instruction sent with every completion.
///
/// Used when `PipelineConfig::system_prompt` is `None`.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a professional financial analysis assistant. \
Provide rigorous, well-structured, professional analysis reports. \
Preserve all figures exactly as they appear in the source document.";

/// Keep at most `max_chars` characters (Unicode scalar values) of `text`.
///
/// Never splits a multi-byte character.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// Translation prompt.
pub fn translate_prompt(text: &str, target_language: &str) -> String {
    format!(
        "Translate the following content accurately into {target_language}. \
Preserve professional terminology and the precision of every number.\n\n{text}"
    )
}

/// Structured-summary prompt at the given detail level (1–5).
pub fn summary_prompt(text: &str, detail_level: u8) -> String {
    format!(
        "Produce a structured summary (detail level {detail_level}/{max}):\n\
- Present it as a bulleted list\n\
- Mark key figures with 【】\n\
- Include the core conclusions and risk notes\n\n\
Document content:\n{text}",
        max = ProcessingRequest::MAX_DETAIL_LEVEL,
    )
}

/// Analysis prompt. The risk and recommendation sections are included only
/// when requested; sections are numbered consecutively either way.
pub fn analysis_prompt(
    text: &str,
    document_name: &str,
    analysis_type: AnalysisType,
    include_risk: bool,
    include_suggestion: bool,
) -> String {
    let mut sections = vec![
        "Core viewpoints (no more than 3)",
        "Key data breakdown (presented as a table)",
    ];
    if include_risk {
        sections.push("Risk assessment (rate from ★ to ★★★★★)");
    }
    if include_suggestion {
        sections.push("Investment recommendation (give an explicit buy/hold/sell rating)");
    }
    sections.push("Points to watch going forward");

    let numbered = sections
        .iter()
        .enumerate()
        .map(|(i, s)| format!("{}. {}", i + 1, s))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "As a {role} analyst, interpret the document along these dimensions:\n\
{numbered}\n\n\
Document name: 《{document_name}》\n\
Content:\n{text}",
        role = analysis_type.analyst_role(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_boundaries() {
        let text = "营收增长百分之十";
        assert_eq!(truncate_chars(text, 2), "营收");
        assert_eq!(truncate_chars(text, 100), text);
        assert_eq!(truncate_chars("", 5), "");
        assert_eq!(truncate_chars("abc", 0), "");
    }

    #[test]
    fn translate_prompt_names_language() {
        let p = translate_prompt("Revenue rose 10%.", "Japanese");
        assert!(p.contains("into Japanese"));
        assert!(p.ends_with("Revenue rose 10%."));
    }

    #[test]
    fn summary_prompt_embeds_detail_level() {
        let p = summary_prompt("body", 2);
        assert!(p.contains("detail level 2/5"));
        assert!(p.contains("【】"));
    }

    #[test]
    fn analysis_prompt_optional_sections() {
        let full = analysis_prompt("body", "q3.pdf", AnalysisType::MarketAnalysis, true, true);
        assert!(full.contains("market analysis analyst"));
        assert!(full.contains("3. Risk assessment"));
        assert!(full.contains("4. Investment recommendation"));
        assert!(full.contains("5. Points to watch"));
        assert!(full.contains("《q3.pdf》"));

        let bare = analysis_prompt("body", "q3.pdf", AnalysisType::IndustryReport, false, false);
        assert!(!bare.contains("Risk assessment"));
        assert!(!bare.contains("Investment recommendation"));
        assert!(bare.contains("3. Points to watch"));
    }

    #[test]
    fn analysis_prompt_risk_only() {
        let p = analysis_prompt("body", "a.pdf", AnalysisType::CompanyFinancials, true, false);
        assert!(p.contains("3. Risk assessment"));
        assert!(!p.contains("buy/hold/sell"));
        assert!(p.contains("4. Points to watch"));
    }
}
