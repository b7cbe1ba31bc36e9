//! What to do with every document of a batch.
//!
//! A [`ProcessingRequest`] is immutable once built and shared read-only by
//! all workers. It is `serde`-serialisable so drivers can load it from a JSON
//! file or store it next to a batch report.

use crate::error::DocStageError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which stages to run and how to parameterise their prompts.
///
/// # Example
/// ```rust
/// use edgequake_docstage::{AnalysisType, ProcessingRequest};
///
/// let request = ProcessingRequest::builder()
///     .translate("German")
///     .summarize(4)
///     .analyze(AnalysisType::CompanyFinancials)
///     .include_suggestion(false)
///     .build()
///     .unwrap();
/// assert!(request.include_risk);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProcessingRequest {
    pub translate: bool,
    pub summarize: bool,
    pub analyze: bool,
    /// Translation target, e.g. "English". Only read when `translate` is set.
    pub target_language: String,
    pub analysis_type: AnalysisType,
    /// Append a risk-assessment section to the analysis prompt.
    pub include_risk: bool,
    /// Append an investment-recommendation section to the analysis prompt.
    pub include_suggestion: bool,
    /// Summary detail level, 1 (terse) to 5 (exhaustive). Default: 3.
    pub detail_level: u8,
}

impl Default for ProcessingRequest {
    fn default() -> Self {
        Self {
            translate: false,
            summarize: false,
            analyze: false,
            target_language: "English".to_string(),
            analysis_type: AnalysisType::default(),
            include_risk: true,
            include_suggestion: true,
            detail_level: 3,
        }
    }
}

impl ProcessingRequest {
    pub const MIN_DETAIL_LEVEL: u8 = 1;
    pub const MAX_DETAIL_LEVEL: u8 = 5;

    pub fn builder() -> ProcessingRequestBuilder {
        ProcessingRequestBuilder {
            request: Self::default(),
        }
    }

    /// Number of enabled stages.
    pub fn enabled_stages(&self) -> usize {
        [self.translate, self.summarize, self.analyze]
            .iter()
            .filter(|on| **on)
            .count()
    }

    /// Check the request is runnable.
    ///
    /// Requests deserialised from JSON bypass the builder, so drivers should
    /// call this before submitting a batch.
    pub fn validate(&self) -> Result<(), DocStageError> {
        if self.enabled_stages() == 0 {
            return Err(DocStageError::InvalidRequest(
                "at least one of translate, summarize, analyze must be enabled".into(),
            ));
        }
        if self.translate && self.target_language.trim().is_empty() {
            return Err(DocStageError::InvalidRequest(
                "target language must not be empty when translation is enabled".into(),
            ));
        }
        if !(Self::MIN_DETAIL_LEVEL..=Self::MAX_DETAIL_LEVEL).contains(&self.detail_level) {
            return Err(DocStageError::InvalidRequest(format!(
                "detail level must be {}–{}, got {}",
                Self::MIN_DETAIL_LEVEL,
                Self::MAX_DETAIL_LEVEL,
                self.detail_level
            )));
        }
        Ok(())
    }
}

/// Builder for [`ProcessingRequest`].
#[derive(Debug)]
pub struct ProcessingRequestBuilder {
    request: ProcessingRequest,
}

impl ProcessingRequestBuilder {
    /// Enable translation into `language`.
    pub fn translate(mut self, language: impl Into<String>) -> Self {
        self.request.translate = true;
        self.request.target_language = language.into();
        self
    }

    /// Enable summarisation at the given detail level (clamped to 1–5).
    pub fn summarize(mut self, detail_level: u8) -> Self {
        self.request.summarize = true;
        self.request.detail_level = detail_level.clamp(
            ProcessingRequest::MIN_DETAIL_LEVEL,
            ProcessingRequest::MAX_DETAIL_LEVEL,
        );
        self
    }

    /// Enable structured analysis of the given kind.
    pub fn analyze(mut self, analysis_type: AnalysisType) -> Self {
        self.request.analyze = true;
        self.request.analysis_type = analysis_type;
        self
    }

    pub fn include_risk(mut self, v: bool) -> Self {
        self.request.include_risk = v;
        self
    }

    pub fn include_suggestion(mut self, v: bool) -> Self {
        self.request.include_suggestion = v;
        self
    }

    pub fn build(self) -> Result<ProcessingRequest, DocStageError> {
        self.request.validate()?;
        Ok(self.request)
    }
}

/// The kind of report the analysis stage should read the document as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnalysisType {
    /// Industry research report (default).
    #[default]
    IndustryReport,
    /// Company financial statements.
    CompanyFinancials,
    /// Market analysis.
    MarketAnalysis,
}

impl AnalysisType {
    /// Role description embedded in the analysis prompt.
    pub fn analyst_role(&self) -> &'static str {
        match self {
            AnalysisType::IndustryReport => "industry research",
            AnalysisType::CompanyFinancials => "company financial statements",
            AnalysisType::MarketAnalysis => "market analysis",
        }
    }
}

impl fmt::Display for AnalysisType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AnalysisType::IndustryReport => "industry-report",
            AnalysisType::CompanyFinancials => "company-financials",
            AnalysisType::MarketAnalysis => "market-analysis",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_requires_a_stage() {
        let err = ProcessingRequest::builder().build().unwrap_err();
        assert!(matches!(err, DocStageError::InvalidRequest(_)));
    }

    #[test]
    fn summarize_clamps_detail_level() {
        let r = ProcessingRequest::builder().summarize(9).build().unwrap();
        assert_eq!(r.detail_level, 5);
        let r = ProcessingRequest::builder().summarize(0).build().unwrap();
        assert_eq!(r.detail_level, 1);
    }

    #[test]
    fn validate_rejects_out_of_range_detail_from_json() {
        let r: ProcessingRequest =
            serde_json::from_str(r#"{"summarize": true, "detailLevel": 7}"#).unwrap();
        assert!(r.validate().is_err());
    }

    #[test]
    fn validate_rejects_blank_language() {
        let r = ProcessingRequest {
            translate: true,
            target_language: "  ".into(),
            ..Default::default()
        };
        assert!(r.validate().is_err());
    }

    #[test]
    fn json_defaults_fill_missing_fields() {
        let r: ProcessingRequest =
            serde_json::from_str(r#"{"analyze": true, "analysisType": "market-analysis"}"#)
                .unwrap();
        assert!(r.analyze);
        assert_eq!(r.analysis_type, AnalysisType::MarketAnalysis);
        assert!(r.include_risk);
        assert_eq!(r.detail_level, 3);
        assert_eq!(r.enabled_stages(), 1);
    }
}
