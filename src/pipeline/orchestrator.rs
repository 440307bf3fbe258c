use std::path::PathBuf;
use std::time::Instant;

use uuid::Uuid;

use super::diagnostic::{self, COMPLETION_FILE, PROMPT_FILE, RESULT_FILE};
use super::fallback::{interpret, Analysis};
use super::gemini::GeminiClient;
use super::normalize::Normalize;
use super::ocr::{OcrEngine, OcrUpload};
use super::prompt::{
    build_lab_trend_prompt, build_nutrient_prompt, build_prediction_prompt, build_report_prompt,
};
use super::types::*;
use super::RemoteCallError;
use crate::config::{self, GenerationSettings};

/// Runs the analysis pipeline:
/// prompt → generate → extract → repair → normalize → result
///
/// Holds no state across calls. Only remote failures surface as errors;
/// unusable completions come back as `Analysis::Fallback`.
pub struct HealthAnalyzer {
    llm: Box<dyn LlmClient + Send + Sync>,
    dump_dir: Option<PathBuf>,
}

impl HealthAnalyzer {
    pub fn new(llm: Box<dyn LlmClient + Send + Sync>) -> Self {
        Self {
            llm,
            dump_dir: None,
        }
    }

    /// Analyzer backed by the remote generation endpoint. Picks up
    /// `VITALYZE_DUMP_DIR` for diagnostics.
    pub fn from_settings(settings: &GenerationSettings) -> Result<Self, RemoteCallError> {
        let client = GeminiClient::new(settings)?;
        let mut analyzer = Self::new(Box::new(client));
        analyzer.dump_dir = config::dump_dir();
        Ok(analyzer)
    }

    /// Write per-request prompts, completions and results under `dir`.
    pub fn with_dump_dir(mut self, dir: PathBuf) -> Self {
        self.dump_dir = Some(dir);
        self
    }

    pub fn predict_conditions(
        &self,
        request: &PredictionRequest,
    ) -> Result<Analysis<PredictionResult>, RemoteCallError> {
        self.analyze(build_prediction_prompt(request))
    }

    pub fn analyze_lab_trends(
        &self,
        request: &LabTrendRequest,
    ) -> Result<Analysis<LabTrendResult>, RemoteCallError> {
        self.analyze(build_lab_trend_prompt(request))
    }

    pub fn decode_report(
        &self,
        report_text: &str,
    ) -> Result<Analysis<ReportDecodeResult>, RemoteCallError> {
        self.analyze(build_report_prompt(report_text))
    }

    /// OCR the uploaded report, then decode the recognized text.
    pub fn decode_report_upload(
        &self,
        ocr: &dyn OcrEngine,
        upload: &OcrUpload,
    ) -> Result<Analysis<ReportDecodeResult>, RemoteCallError> {
        let text = ocr.recognize(upload)?;
        tracing::info!(
            file = %upload.file_name,
            text_len = text.len(),
            "Report recognized"
        );
        self.decode_report(&text)
    }

    pub fn analyze_nutrients(
        &self,
        request: &NutrientRequest,
    ) -> Result<Analysis<NutrientAnalysis>, RemoteCallError> {
        self.analyze(build_nutrient_prompt(request))
    }

    /// Send a prepared prompt and interpret the completion as `T`.
    pub fn analyze<T: Normalize>(
        &self,
        prompt: PromptRequest,
    ) -> Result<Analysis<T>, RemoteCallError> {
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "analysis",
            request_id = %request_id,
            kind = T::KIND.as_str()
        );
        let _enter = span.enter();
        let start = Instant::now();

        let dump = self
            .dump_dir
            .as_deref()
            .and_then(|base| diagnostic::dump_dir_for(base, &request_id));
        if let Some(dir) = &dump {
            diagnostic::dump_text(dir, PROMPT_FILE, &prompt.text);
        }

        let completion = match self.llm.generate(&prompt) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(
                    status = e.status(),
                    quota_exhausted = e.is_quota_exhausted(),
                    error = %e,
                    "Remote call failed"
                );
                return Err(e);
            }
        };
        if let Some(dir) = &dump {
            diagnostic::dump_text(dir, COMPLETION_FILE, &completion);
        }

        let analysis = interpret::<T>(&completion);
        if let Some(dir) = &dump {
            diagnostic::dump_json(dir, RESULT_FILE, analysis.result());
        }

        tracing::info!(
            raw_len = completion.len(),
            fallback = analysis.is_fallback(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Analysis complete"
        );
        Ok(analysis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::gemini::MockLlmClient;
    use crate::pipeline::ocr::MockOcrEngine;

    fn analyzer(response: &str) -> HealthAnalyzer {
        HealthAnalyzer::new(Box::new(MockLlmClient::new(response)))
    }

    #[test]
    fn decode_report_normalizes_findings() {
        let analysis = analyzer(
            r#"{"summary":"Mild anemia","findings":[{"parameter":"Hemoglobin","value":10.9,"unit":"g/dL","status":"low"}]}"#,
        )
        .decode_report("Hemoglobin 10.9 g/dL")
        .unwrap();
        let result = analysis.into_result();
        assert_eq!(result.summary, "Mild anemia");
        assert_eq!(result.findings[0].value, "10.9");
        assert_eq!(result.findings[0].status, FindingStatus::Low);
    }

    #[test]
    fn lab_trends_with_no_json_fall_back() {
        let analysis = analyzer("Sorry, I can't analyze that.")
            .analyze_lab_trends(&LabTrendRequest {
                entries: Vec::new(),
                as_of: chrono::NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            })
            .unwrap();
        assert!(analysis.is_fallback());
        assert_eq!(analysis.result().overall_risk, RiskLevel::Low);
    }

    #[test]
    fn nutrients_parse_from_fenced_json() {
        let analysis = analyzer(
            "```json\n{\"foodItems\":[\"Oatmeal\"],\"calories\":\"320\",\"healthScore\":140}\n```",
        )
        .analyze_nutrients(&NutrientRequest {
            meal_description: "oatmeal with berries".into(),
            image: None,
        })
        .unwrap();
        let result = analysis.result();
        assert_eq!(result.calories, 320.0);
        assert_eq!(result.health_score, 100);
    }

    #[test]
    fn remote_error_propagates() {
        let analyzer = HealthAnalyzer::new(Box::new(MockLlmClient::failing(
            429,
            "RESOURCE_EXHAUSTED: quota exceeded",
        )));
        let err = analyzer.decode_report("text").unwrap_err();
        assert!(err.is_quota_exhausted());
    }

    #[test]
    fn upload_is_recognized_then_decoded() {
        let llm = std::sync::Arc::new(MockLlmClient::new(r#"{"summary":"All normal"}"#));
        let analyzer = HealthAnalyzer::new(Box::new(SharedMock(llm.clone())));
        let ocr = MockOcrEngine::new("Glucose 92 mg/dL");
        let upload = OcrUpload::new("report.png", vec![1, 2, 3]);

        let analysis = analyzer.decode_report_upload(&ocr, &upload).unwrap();

        assert_eq!(analysis.result().summary, "All normal");
        assert!(llm.prompts()[0].text.contains("Glucose 92 mg/dL"));
    }

    #[test]
    fn ocr_failure_skips_generation() {
        let llm = std::sync::Arc::new(MockLlmClient::new("{}"));
        let analyzer = HealthAnalyzer::new(Box::new(SharedMock(llm.clone())));
        let upload = OcrUpload::new("report.png", vec![]);

        let err = analyzer
            .decode_report_upload(&MockOcrEngine::failing("unreadable"), &upload)
            .unwrap_err();

        assert!(matches!(err, RemoteCallError::OcrProcessing(_)));
        assert!(llm.prompts().is_empty());
    }

    #[test]
    fn dump_dir_receives_artifacts() {
        let tmp = tempfile::tempdir().unwrap();
        let analyzer = analyzer(r#"{"summary":"ok"}"#).with_dump_dir(tmp.path().to_path_buf());

        analyzer.decode_report("CBC panel").unwrap();

        let request_dir = std::fs::read_dir(tmp.path())
            .unwrap()
            .next()
            .unwrap()
            .unwrap()
            .path();
        let prompt = std::fs::read_to_string(request_dir.join(PROMPT_FILE)).unwrap();
        assert!(prompt.contains("CBC panel"));
        assert_eq!(
            std::fs::read_to_string(request_dir.join(COMPLETION_FILE)).unwrap(),
            r#"{"summary":"ok"}"#
        );
        let result = std::fs::read_to_string(request_dir.join(RESULT_FILE)).unwrap();
        assert!(result.contains("\"summary\": \"ok\""));
    }

    /// Lets a test keep a handle on the mock after boxing it.
    struct SharedMock(std::sync::Arc<MockLlmClient>);

    impl LlmClient for SharedMock {
        fn generate(&self, request: &PromptRequest) -> Result<String, RemoteCallError> {
            self.0.generate(request)
        }
    }
}
