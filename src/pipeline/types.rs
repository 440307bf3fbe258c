use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::RemoteCallError;

// ──────────────────────────────────────────────
// Requests
// ──────────────────────────────────────────────

/// Age bucket selected by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgeRange {
    Child,
    Teen,
    YoungAdult,
    Adult,
    Senior,
}

impl AgeRange {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Child => "0-12",
            Self::Teen => "13-19",
            Self::YoungAdult => "20-39",
            Self::Adult => "40-59",
            Self::Senior => "60+",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    Other,
    Unspecified,
}

impl Gender {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
            Self::Other => "other",
            Self::Unspecified => "not specified",
        }
    }
}

/// One user submission to the condition predictor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRequest {
    pub symptoms: String,
    pub age_range: AgeRange,
    pub gender: Gender,
}

/// A single lab measurement in a time series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabEntry {
    pub date: NaiveDate,
    pub parameter: String,
    pub value: f64,
    pub unit: String,
    pub normal_range: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabTrendRequest {
    pub entries: Vec<LabEntry>,
    /// Reference date for forecasts ("today").
    pub as_of: NaiveDate,
}

/// Image attached to a prompt, already base64-encoded.
#[derive(Debug, Clone, PartialEq)]
pub struct InlineImage {
    pub mime_type: String,
    pub data_base64: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NutrientRequest {
    pub meal_description: String,
    pub image: Option<InlineImage>,
}

/// Fully assembled input for one generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptRequest {
    pub text: String,
    /// Optional response-schema hint forwarded to the endpoint.
    pub schema_hint: Option<serde_json::Value>,
    pub images: Vec<InlineImage>,
}

impl PromptRequest {
    pub fn text(text: String) -> Self {
        Self {
            text,
            schema_hint: None,
            images: Vec::new(),
        }
    }

    pub fn with_schema(mut self, schema: serde_json::Value) -> Self {
        self.schema_hint = Some(schema);
        self
    }

    pub fn with_image(mut self, image: InlineImage) -> Self {
        self.images.push(image);
        self
    }
}

/// Which analysis a pipeline call performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisKind {
    ConditionPrediction,
    LabTrends,
    ReportDecoding,
    NutrientAnalysis,
}

impl AnalysisKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConditionPrediction => "condition_prediction",
            Self::LabTrends => "lab_trends",
            Self::ReportDecoding => "report_decoding",
            Self::NutrientAnalysis => "nutrient_analysis",
        }
    }
}

// ──────────────────────────────────────────────
// Enums
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Severity {
    #[default]
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Triage {
    #[serde(rename = "Self-care")]
    SelfCare,
    #[serde(rename = "Primary care")]
    PrimaryCare,
    #[serde(rename = "Urgent care")]
    UrgentCare,
    Emergency,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Trend {
    Increasing,
    Decreasing,
    #[default]
    Stable,
    Fluctuating,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FindingStatus {
    #[default]
    Normal,
    Low,
    High,
    Critical,
}

// ──────────────────────────────────────────────
// Results
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLink {
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictedCondition {
    pub name: String,
    /// Always within 0..=100.
    pub probability: u8,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub red_flags: Vec<String>,
    pub tests: Vec<String>,
    pub care_advice: Vec<String>,
    pub medications: Vec<String>,
    pub sources: Vec<SourceLink>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionResult {
    /// At most five, in the order the model returned them.
    pub conditions: Vec<PredictedCondition>,
    pub explanation: String,
    pub recommendations: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub triage: Option<Triage>,
    pub red_flags: Vec<String>,
    pub suggested_tests: Vec<String>,
    pub medications: Vec<String>,
    pub sources: Vec<SourceLink>,
}

impl PredictionResult {
    /// Conditions ordered by probability, highest first. The stored order is untouched.
    pub fn conditions_by_probability(&self) -> Vec<&PredictedCondition> {
        let mut sorted: Vec<&PredictedCondition> = self.conditions.iter().collect();
        sorted.sort_by(|a, b| b.probability.cmp(&a.probability));
        sorted
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabValueTrend {
    pub parameter: String,
    pub current_value: f64,
    pub unit: String,
    pub normal_range: String,
    pub trend: Trend,
    pub risk_level: RiskLevel,
    pub next_prediction: f64,
    /// `YYYY-MM-DD`, or empty when the model gave nothing parseable.
    pub prediction_date: String,
    pub forecast: String,
    pub health_implications: Vec<String>,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabTrendResult {
    pub overall_risk: RiskLevel,
    pub summary: String,
    pub trends: Vec<LabValueTrend>,
    pub key_insights: Vec<String>,
    pub red_flags: Vec<String>,
    pub recommendations: Vec<String>,
    pub next_steps: Vec<String>,
    pub monitoring_schedule: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportFinding {
    pub parameter: String,
    pub value: String,
    pub unit: String,
    pub normal_range: String,
    pub status: FindingStatus,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportDecodeResult {
    pub summary: String,
    pub findings: Vec<ReportFinding>,
    pub recommendations: Vec<String>,
    pub follow_up: Vec<String>,
}

impl ReportDecodeResult {
    pub fn abnormal_findings(&self) -> impl Iterator<Item = &ReportFinding> {
        self.findings
            .iter()
            .filter(|f| f.status != FindingStatus::Normal)
    }
}

/// Grams per macronutrient.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Macronutrients {
    pub protein: f64,
    pub carbohydrates: f64,
    pub fat: f64,
    pub fiber: f64,
    pub sugar: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Micronutrient {
    pub name: String,
    pub amount: f64,
    pub unit: String,
    pub daily_value_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NutrientAnalysis {
    pub food_items: Vec<String>,
    pub calories: f64,
    pub macros: Macronutrients,
    pub micronutrients: Vec<Micronutrient>,
    /// Always within 0..=100.
    pub health_score: u8,
    pub summary: String,
    pub recommendations: Vec<String>,
    pub warnings: Vec<String>,
}

// ──────────────────────────────────────────────
// Seams
// ──────────────────────────────────────────────

/// Remote text-generation abstraction (allows mocking).
pub trait LlmClient {
    /// Send one prompt and return the concatenated completion text.
    fn generate(&self, request: &PromptRequest) -> Result<String, RemoteCallError>;
}
