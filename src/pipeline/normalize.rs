//! Result normalizer: parsed, loosely-typed JSON → strongly-shaped results.
//!
//! All coercion lives here. Missing arrays become empty lists, missing text
//! gets a placeholder, numbers are parsed leniently, enum-like strings fall
//! back to a safe member, and historically-used key names are folded onto
//! one canonical field. Every result type serializes to the same keys it is
//! read from, so normalizing a normalized result changes nothing.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::{Map, Value};

use super::coerce::{
    aliased_array, aliased_list, as_text, cap, number_field, percent_field, quantity_field,
    text_field, text_or, union_dedup,
};
use super::fallback::{NO_EXPLANATION, NO_SUMMARY};
use super::types::*;

pub const MAX_CONDITIONS: usize = 5;
pub const MAX_RECOMMENDATIONS: usize = 10;
pub const MAX_AGGREGATED_MEDICATIONS: usize = 10;

/// Medication list aliases, in priority order.
pub const MEDICATION_KEYS: &[&str] = &["medications", "meds", "medication", "medicationGuidance"];

const CONDITION_KEYS: &[&str] = &["conditions", "diseases", "predictions"];
const RED_FLAG_KEYS: &[&str] = &["redFlags", "red_flags", "warningSigns"];
const TEST_KEYS: &[&str] = &["tests", "suggestedTests", "recommendedTests"];
const GLOBAL_TEST_KEYS: &[&str] = &["suggestedTests", "tests", "recommendedTests"];
const CARE_KEYS: &[&str] = &["careAdvice", "selfCare", "care"];
const RECOMMENDATION_KEYS: &[&str] = &["recommendations", "advice"];

const UNKNOWN_CONDITION: &str = "Unknown condition";
const UNKNOWN_PARAMETER: &str = "Unknown parameter";

/// A result shape that can be built from any parsed JSON value.
pub trait Normalize: Default + serde::Serialize {
    const KIND: AnalysisKind;

    fn normalize(value: &Value) -> Self;
}

/// Split a parsed value into its object form and, for bare arrays, the list.
fn split_root(value: &Value) -> (Option<&Map<String, Value>>, Option<&[Value]>) {
    match value {
        Value::Object(obj) => (Some(obj), None),
        Value::Array(items) => (None, Some(items.as_slice())),
        _ => (None, None),
    }
}

// ──────────────────────────────────────────────
// Enum normalization
// ──────────────────────────────────────────────

/// First letter decides: h → High, m → Medium, anything else → Low.
pub fn normalize_severity(value: Option<&Value>) -> Severity {
    let text = as_text(value).unwrap_or_default().to_lowercase();
    match text.chars().next() {
        Some('h') => Severity::High,
        Some('m') => Severity::Medium,
        _ => Severity::Low,
    }
}

/// Exact labels win. Otherwise the first clause without a negation decides,
/// by keyword: `emergency`, `urgent`, `primary`, `self`.
pub fn normalize_triage(value: Option<&Value>) -> Option<Triage> {
    let text = as_text(value)?.to_lowercase();
    let label = match text.as_str() {
        "emergency" => Some(Triage::Emergency),
        "urgent care" | "urgent-care" => Some(Triage::UrgentCare),
        "primary care" | "primary-care" => Some(Triage::PrimaryCare),
        "self-care" | "self care" | "selfcare" => Some(Triage::SelfCare),
        _ => None,
    };
    if label.is_some() {
        return label;
    }

    let triage = text
        .split([';', ',', '.', '\n'])
        .filter(|clause| !is_negated(clause))
        .find_map(triage_keyword);
    if triage.is_none() {
        tracing::debug!(triage = %text, "Unrecognized triage level dropped");
    }
    triage
}

fn triage_keyword(clause: &str) -> Option<Triage> {
    if clause.contains("emergency") {
        Some(Triage::Emergency)
    } else if clause.contains("urgent") {
        Some(Triage::UrgentCare)
    } else if clause.contains("primary") {
        Some(Triage::PrimaryCare)
    } else if clause.contains("self") {
        Some(Triage::SelfCare)
    } else {
        None
    }
}

fn is_negated(clause: &str) -> bool {
    clause.split_whitespace().any(|word| {
        let word = word.trim_matches(|c: char| !c.is_alphanumeric() && c != '\'' && c != '-');
        matches!(word, "not" | "no" | "isn't" | "without" | "never") || word.starts_with("non-")
    })
}

pub fn normalize_trend(value: Option<&Value>) -> Trend {
    match as_text(value).unwrap_or_default().to_lowercase().as_str() {
        "increasing" => Trend::Increasing,
        "decreasing" => Trend::Decreasing,
        "fluctuating" => Trend::Fluctuating,
        _ => Trend::Stable,
    }
}

pub fn normalize_risk(value: Option<&Value>) -> RiskLevel {
    match as_text(value).unwrap_or_default().to_lowercase().as_str() {
        "low" => RiskLevel::Low,
        "high" => RiskLevel::High,
        "critical" => RiskLevel::Critical,
        _ => RiskLevel::Medium,
    }
}

/// Missing overall risk matches the empty lab result; unrecognized text is Medium.
pub fn normalize_overall_risk(value: Option<&Value>) -> RiskLevel {
    match value {
        None => RiskLevel::Low,
        Some(_) => normalize_risk(value),
    }
}

pub fn normalize_finding_status(value: Option<&Value>) -> FindingStatus {
    match as_text(value).unwrap_or_default().to_lowercase().as_str() {
        "low" => FindingStatus::Low,
        "high" => FindingStatus::High,
        "critical" => FindingStatus::Critical,
        _ => FindingStatus::Normal,
    }
}

/// Reduce a date or RFC 3339 timestamp to `YYYY-MM-DD`; unparseable → empty.
pub fn normalize_date(text: Option<String>) -> String {
    let Some(text) = text else {
        return String::new();
    };
    let date = NaiveDate::parse_from_str(&text, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(&text).ok().map(|dt| dt.date_naive()))
        .or_else(|| {
            NaiveDateTime::parse_from_str(&text, "%Y-%m-%dT%H:%M:%S")
                .ok()
                .map(|dt| dt.date())
        });
    date.map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

fn first_value<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| obj.get(*k))
}

/// First value among `keys` that reads as non-empty text.
fn first_text_value<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .find(|v| as_text(Some(v)).is_some())
}

fn normalize_sources(value: Option<&Value>) -> Vec<SourceLink> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match item {
            Value::String(_) => as_text(Some(item)).map(|url| SourceLink {
                title: url.clone(),
                url,
            }),
            Value::Object(obj) => {
                let url = text_field(obj, &["url", "link"])?;
                let title = text_field(obj, &["title", "name"]).unwrap_or_else(|| url.clone());
                Some(SourceLink { title, url })
            }
            _ => None,
        })
        .collect()
}

fn capped_recommendations(obj: &Map<String, Value>) -> Vec<String> {
    let mut list = aliased_list(obj, RECOMMENDATION_KEYS);
    cap(&mut list, MAX_RECOMMENDATIONS);
    list
}

// ──────────────────────────────────────────────
// Condition prediction
// ──────────────────────────────────────────────

fn normalize_condition(value: &Value) -> Option<PredictedCondition> {
    let obj = match value {
        Value::Object(obj) => obj,
        Value::String(_) => {
            let name = as_text(Some(value))?;
            return Some(PredictedCondition {
                name,
                probability: 0,
                severity: Severity::Low,
                summary: None,
                red_flags: Vec::new(),
                tests: Vec::new(),
                care_advice: Vec::new(),
                medications: Vec::new(),
                sources: Vec::new(),
            });
        }
        _ => return None,
    };

    Some(PredictedCondition {
        name: text_or(obj, &["name", "condition", "disease"], UNKNOWN_CONDITION),
        probability: percent_field(obj, &["probability", "likelihood"]),
        severity: normalize_severity(obj.get("severity")),
        summary: text_field(obj, &["summary", "description"]),
        red_flags: aliased_list(obj, RED_FLAG_KEYS),
        tests: aliased_list(obj, TEST_KEYS),
        care_advice: aliased_list(obj, CARE_KEYS),
        medications: aliased_list(obj, MEDICATION_KEYS),
        sources: normalize_sources(obj.get("sources")),
    })
}

impl Normalize for PredictionResult {
    const KIND: AnalysisKind = AnalysisKind::ConditionPrediction;

    fn normalize(value: &Value) -> Self {
        let empty = Map::new();
        let (root, bare_list) = split_root(value);
        let obj = root.unwrap_or(&empty);

        let raw_conditions = bare_list.unwrap_or_else(|| aliased_array(obj, CONDITION_KEYS));
        let mut conditions: Vec<PredictedCondition> =
            raw_conditions.iter().filter_map(normalize_condition).collect();
        let dropped = cap(&mut conditions, MAX_CONDITIONS);
        if dropped > 0 {
            tracing::debug!(dropped, "Condition list capped at {MAX_CONDITIONS}");
        }

        let mut medications = aliased_list(obj, MEDICATION_KEYS);
        if medications.is_empty() {
            medications = union_dedup(
                conditions.iter().map(|c| &c.medications),
                MAX_AGGREGATED_MEDICATIONS,
            );
        }

        Self {
            explanation: text_or(obj, &["explanation", "analysis"], NO_EXPLANATION),
            recommendations: capped_recommendations(obj),
            triage: normalize_triage(first_text_value(obj, &["triage", "triageLevel"])),
            red_flags: aliased_list(obj, RED_FLAG_KEYS),
            suggested_tests: aliased_list(obj, GLOBAL_TEST_KEYS),
            medications,
            sources: normalize_sources(obj.get("sources")),
            conditions,
        }
    }
}

// ──────────────────────────────────────────────
// Lab trends
// ──────────────────────────────────────────────

fn normalize_lab_trend(value: &Value) -> Option<LabValueTrend> {
    let obj = value.as_object()?;
    let mut recommendations = aliased_list(obj, RECOMMENDATION_KEYS);
    cap(&mut recommendations, MAX_RECOMMENDATIONS);

    Some(LabValueTrend {
        parameter: text_or(obj, &["parameter", "name", "test"], UNKNOWN_PARAMETER),
        current_value: number_field(obj, &["currentValue", "value"]),
        unit: text_or(obj, &["unit"], ""),
        normal_range: text_or(obj, &["normalRange", "referenceRange"], ""),
        trend: normalize_trend(obj.get("trend")),
        risk_level: normalize_risk(first_text_value(obj, &["riskLevel", "risk"])),
        next_prediction: number_field(obj, &["nextPrediction", "predictedValue"]),
        prediction_date: normalize_date(text_field(obj, &["predictionDate"])),
        forecast: text_or(obj, &["forecast"], ""),
        health_implications: aliased_list(obj, &["healthImplications", "implications"]),
        recommendations,
    })
}

impl Normalize for LabTrendResult {
    const KIND: AnalysisKind = AnalysisKind::LabTrends;

    fn normalize(value: &Value) -> Self {
        let empty = Map::new();
        let (root, bare_list) = split_root(value);
        let obj = root.unwrap_or(&empty);

        let raw_trends = bare_list.unwrap_or_else(|| aliased_array(obj, &["trends", "parameters"]));

        Self {
            overall_risk: normalize_overall_risk(first_text_value(
                obj,
                &["overallRisk", "overall_risk"],
            )),
            summary: text_or(obj, &["summary"], NO_SUMMARY),
            trends: raw_trends.iter().filter_map(normalize_lab_trend).collect(),
            key_insights: aliased_list(obj, &["keyInsights", "insights"]),
            red_flags: aliased_list(obj, RED_FLAG_KEYS),
            recommendations: capped_recommendations(obj),
            next_steps: aliased_list(obj, &["nextSteps"]),
            monitoring_schedule: aliased_list(obj, &["monitoringSchedule"]),
        }
    }
}

// ──────────────────────────────────────────────
// Report decoding
// ──────────────────────────────────────────────

fn normalize_finding(value: &Value) -> Option<ReportFinding> {
    let obj = value.as_object()?;
    Some(ReportFinding {
        parameter: text_or(obj, &["parameter", "name", "test"], UNKNOWN_PARAMETER),
        value: text_or(obj, &["value", "result"], ""),
        unit: text_or(obj, &["unit"], ""),
        normal_range: text_or(obj, &["normalRange", "referenceRange"], ""),
        status: normalize_finding_status(first_text_value(obj, &["status", "flag"])),
        explanation: text_or(obj, &["explanation", "interpretation"], ""),
    })
}

impl Normalize for ReportDecodeResult {
    const KIND: AnalysisKind = AnalysisKind::ReportDecoding;

    fn normalize(value: &Value) -> Self {
        let empty = Map::new();
        let obj = value.as_object().unwrap_or(&empty);

        Self {
            summary: text_or(obj, &["summary", "overview"], NO_SUMMARY),
            findings: aliased_array(obj, &["findings", "keyFindings", "results"])
                .iter()
                .filter_map(normalize_finding)
                .collect(),
            recommendations: capped_recommendations(obj),
            follow_up: aliased_list(obj, &["followUp", "nextSteps"]),
        }
    }
}

// ──────────────────────────────────────────────
// Nutrient analysis
// ──────────────────────────────────────────────

fn normalize_macros(value: Option<&Value>) -> Macronutrients {
    let Some(obj) = value.and_then(Value::as_object) else {
        return Macronutrients::default();
    };
    Macronutrients {
        protein: quantity_field(obj, &["protein"]),
        carbohydrates: quantity_field(obj, &["carbohydrates", "carbs"]),
        fat: quantity_field(obj, &["fat"]),
        fiber: quantity_field(obj, &["fiber"]),
        sugar: quantity_field(obj, &["sugar"]),
    }
}

fn normalize_micronutrient(value: &Value) -> Option<Micronutrient> {
    let obj = value.as_object()?;
    Some(Micronutrient {
        name: text_field(obj, &["name", "nutrient"])?,
        amount: quantity_field(obj, &["amount"]),
        unit: text_or(obj, &["unit"], ""),
        daily_value_percent: quantity_field(obj, &["dailyValuePercent", "dailyValue"]),
    })
}

impl Normalize for NutrientAnalysis {
    const KIND: AnalysisKind = AnalysisKind::NutrientAnalysis;

    fn normalize(value: &Value) -> Self {
        let empty = Map::new();
        let obj = value.as_object().unwrap_or(&empty);

        Self {
            food_items: aliased_list(obj, &["foodItems", "foods", "items"]),
            calories: quantity_field(obj, &["calories", "totalCalories"]),
            macros: normalize_macros(first_value(obj, &["macros", "macronutrients"])),
            micronutrients: aliased_array(obj, &["micronutrients", "vitamins"])
                .iter()
                .filter_map(normalize_micronutrient)
                .collect(),
            health_score: percent_field(obj, &["healthScore", "score"]),
            summary: text_or(obj, &["summary"], NO_SUMMARY),
            recommendations: capped_recommendations(obj),
            warnings: aliased_list(obj, &["warnings", "allergens"]),
        }
    }
}
