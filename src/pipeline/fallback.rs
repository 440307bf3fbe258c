//! Fallback policy: schema-valid empty results and injectable demo content.
//!
//! Unparseable completions never surface as errors. The pipeline hands back
//! `Analysis::Fallback` carrying the empty result and the reason, and the
//! presentation layer chooses between a "no data" state and demo content.

use std::path::Path;

use serde_json::Value;

use super::normalize::Normalize;
use super::repair::parse_completion;
use super::types::*;
use super::{ExtractionError, RemoteCallError};
use crate::config::ConfigError;

pub const NO_EXPLANATION: &str = "No explanation provided.";
pub const NO_SUMMARY: &str = "No summary provided.";

impl Default for PredictionResult {
    fn default() -> Self {
        Self {
            conditions: Vec::new(),
            explanation: NO_EXPLANATION.to_string(),
            recommendations: Vec::new(),
            triage: None,
            red_flags: Vec::new(),
            suggested_tests: Vec::new(),
            medications: Vec::new(),
            sources: Vec::new(),
        }
    }
}

impl Default for LabTrendResult {
    fn default() -> Self {
        Self {
            overall_risk: RiskLevel::Low,
            summary: NO_SUMMARY.to_string(),
            trends: Vec::new(),
            key_insights: Vec::new(),
            red_flags: Vec::new(),
            recommendations: Vec::new(),
            next_steps: Vec::new(),
            monitoring_schedule: Vec::new(),
        }
    }
}

impl Default for ReportDecodeResult {
    fn default() -> Self {
        Self {
            summary: NO_SUMMARY.to_string(),
            findings: Vec::new(),
            recommendations: Vec::new(),
            follow_up: Vec::new(),
        }
    }
}

impl Default for NutrientAnalysis {
    fn default() -> Self {
        Self {
            food_items: Vec::new(),
            calories: 0.0,
            macros: Macronutrients::default(),
            micronutrients: Vec::new(),
            health_score: 0,
            summary: NO_SUMMARY.to_string(),
            recommendations: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

/// Outcome of interpreting one completion.
#[derive(Debug, Clone, PartialEq)]
pub enum Analysis<T> {
    /// JSON was found and normalized.
    Parsed(T),
    /// No usable JSON; `result` is the empty result.
    Fallback { result: T, reason: ExtractionError },
}

impl<T> Analysis<T> {
    pub fn result(&self) -> &T {
        match self {
            Self::Parsed(result) | Self::Fallback { result, .. } => result,
        }
    }

    pub fn into_result(self) -> T {
        match self {
            Self::Parsed(result) | Self::Fallback { result, .. } => result,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }

    pub fn fallback_reason(&self) -> Option<&ExtractionError> {
        match self {
            Self::Parsed(_) => None,
            Self::Fallback { reason, .. } => Some(reason),
        }
    }
}

/// Parse, repair and normalize completion text. Total: never fails.
pub fn interpret<T: Normalize>(raw: &str) -> Analysis<T> {
    match parse_completion(raw) {
        Ok(value) => Analysis::Parsed(T::normalize(&value)),
        Err(reason) => {
            tracing::warn!(
                kind = T::KIND.as_str(),
                raw_len = raw.len(),
                error = %reason,
                "Completion unusable, returning empty result"
            );
            Analysis::Fallback {
                result: T::default(),
                reason,
            }
        }
    }
}

/// Illustrative results a caller may show instead of an error state.
///
/// Loaded from caller-supplied JSON with one optional section per analysis:
/// `prediction`, `labTrends`, `report`, `nutrients`. Each section passes
/// through the normalizer, so demo content obeys the same invariants as live
/// results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DemoContent {
    pub prediction: Option<PredictionResult>,
    pub lab_trends: Option<LabTrendResult>,
    pub report: Option<ReportDecodeResult>,
    pub nutrients: Option<NutrientAnalysis>,
}

impl DemoContent {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let root: Value =
            serde_json::from_str(json).map_err(|e| ConfigError::DemoContent(e.to_string()))?;
        let obj = root
            .as_object()
            .ok_or_else(|| ConfigError::DemoContent("root must be a JSON object".into()))?;

        Ok(Self {
            prediction: obj.get("prediction").map(PredictionResult::normalize),
            lab_trends: obj.get("labTrends").map(LabTrendResult::normalize),
            report: obj.get("report").map(ReportDecodeResult::normalize),
            nutrients: obj.get("nutrients").map(NutrientAnalysis::normalize),
        })
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::DemoContent(format!("{}: {e}", path.display())))?;
        Self::from_json(&json)
    }
}

/// What a panel should display after a pipeline call.
#[derive(Debug, Clone, PartialEq)]
pub enum PanelContent<T> {
    Live(Analysis<T>),
    /// Remote call failed; demo content substituted.
    Demo { result: T, quota_exhausted: bool },
    /// Remote call failed and no demo content was configured.
    Unavailable { message: String, quota_exhausted: bool },
}

/// Substitute `demo` when the remote call failed. Parse failures are already
/// represented inside `Analysis` and are passed through untouched.
pub fn resolve_with_demo<T: Clone>(
    outcome: Result<Analysis<T>, RemoteCallError>,
    demo: Option<&T>,
) -> PanelContent<T> {
    match outcome {
        Ok(analysis) => PanelContent::Live(analysis),
        Err(err) => {
            let quota_exhausted = err.is_quota_exhausted();
            match demo {
                Some(result) => {
                    tracing::info!(error = %err, "Remote call failed, showing demo content");
                    PanelContent::Demo {
                        result: result.clone(),
                        quota_exhausted,
                    }
                }
                None => PanelContent::Unavailable {
                    message: err.to_string(),
                    quota_exhausted,
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_prediction_is_schema_valid() {
        let empty = PredictionResult::default();
        assert_eq!(empty.explanation, "No explanation provided.");
        assert!(empty.conditions.is_empty());
        assert!(empty.triage.is_none());
    }

    #[test]
    fn empty_lab_result_has_low_risk() {
        let empty = LabTrendResult::default();
        assert_eq!(empty.overall_risk, RiskLevel::Low);
        assert_eq!(empty.summary, NO_SUMMARY);
    }

    #[test]
    fn empty_results_survive_normalization() {
        let lab = LabTrendResult::default();
        let again = LabTrendResult::normalize(&serde_json::to_value(&lab).unwrap());
        assert_eq!(lab, again);
        let nutrients = NutrientAnalysis::default();
        let again = NutrientAnalysis::normalize(&serde_json::to_value(&nutrients).unwrap());
        assert_eq!(nutrients, again);
    }

    #[test]
    fn interpret_parsed() {
        let analysis: Analysis<PredictionResult> =
            interpret(r#"{"conditions":[{"name":"Flu","probability":80}]}"#);
        assert!(!analysis.is_fallback());
        assert_eq!(analysis.result().conditions[0].name, "Flu");
    }

    #[test]
    fn interpret_refusal_falls_back() {
        let analysis: Analysis<PredictionResult> =
            interpret("I cannot comply with this request.");
        assert!(analysis.is_fallback());
        assert_eq!(analysis.fallback_reason(), Some(&ExtractionError::NoJson));
        assert_eq!(analysis.into_result(), PredictionResult::default());
    }

    #[test]
    fn interpret_unrepairable_falls_back() {
        let analysis: Analysis<ReportDecodeResult> = interpret("{\"summary\": \"x\" \"y\"}");
        assert!(matches!(
            analysis.fallback_reason(),
            Some(ExtractionError::RepairExhausted(_))
        ));
        assert_eq!(analysis.result().summary, NO_SUMMARY);
    }

    #[test]
    fn demo_content_is_normalized() {
        let demo = DemoContent::from_json(
            r#"{"prediction": {"diseases": [{"name": "Common cold", "probability": 300, "severity": "medium"}]}}"#,
        )
        .unwrap();
        let prediction = demo.prediction.unwrap();
        assert_eq!(prediction.conditions[0].probability, 100);
        assert_eq!(prediction.conditions[0].severity, Severity::Medium);
        assert!(demo.lab_trends.is_none());
    }

    #[test]
    fn demo_content_rejects_non_object() {
        assert!(matches!(
            DemoContent::from_json("[1,2]"),
            Err(ConfigError::DemoContent(_))
        ));
        assert!(matches!(
            DemoContent::from_json("not json"),
            Err(ConfigError::DemoContent(_))
        ));
    }

    #[test]
    fn demo_content_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("demo.json");
        std::fs::write(&path, r#"{"nutrients": {"foodItems": ["Oats"], "healthScore": 91}}"#)
            .unwrap();
        let demo = DemoContent::from_file(&path).unwrap();
        assert_eq!(demo.nutrients.unwrap().health_score, 91);
    }

    #[test]
    fn missing_demo_file_is_config_error() {
        let result = DemoContent::from_file(Path::new("/definitely/not/here.json"));
        assert!(matches!(result, Err(ConfigError::DemoContent(_))));
    }

    #[test]
    fn remote_failure_with_demo() {
        let demo = PredictionResult::default();
        let outcome: Result<Analysis<PredictionResult>, RemoteCallError> =
            Err(RemoteCallError::Status {
                status: 429,
                body: "Too many requests".into(),
            });
        match resolve_with_demo(outcome, Some(&demo)) {
            PanelContent::Demo {
                quota_exhausted, ..
            } => assert!(quota_exhausted),
            other => panic!("expected demo, got {other:?}"),
        }
    }

    #[test]
    fn remote_failure_without_demo() {
        let outcome: Result<Analysis<PredictionResult>, RemoteCallError> =
            Err(RemoteCallError::Connection("http://localhost".into()));
        match resolve_with_demo(outcome, None) {
            PanelContent::Unavailable {
                message,
                quota_exhausted,
            } => {
                assert!(message.contains("localhost"));
                assert!(!quota_exhausted);
            }
            other => panic!("expected unavailable, got {other:?}"),
        }
    }

    #[test]
    fn parse_failure_passes_through_as_live() {
        let outcome = Ok(interpret::<PredictionResult>("no json"));
        let demo = PredictionResult::default();
        assert!(matches!(
            resolve_with_demo(outcome, Some(&demo)),
            PanelContent::Live(Analysis::Fallback { .. })
        ));
    }
}
