//! Structured output of the external analysis capability.
//!
//! Field names follow the provider's JSON contract (camelCase), so these
//! types deserialize the model response directly and are stored verbatim
//! as the `result_json` payload of a history item.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// What kind of document the model decided it was looking at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResultKind {
    Report,
    Medication,
    #[serde(other)]
    Unknown,
}

/// Interpretation flag for a single extracted indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IndicatorStatus {
    High,
    Low,
    Normal,
    Critical,
    Borderline,
    #[serde(other)]
    Unknown,
}

impl Default for IndicatorStatus {
    fn default() -> Self {
        Self::Unknown
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReferenceRange {
    pub min: f64,
    pub max: f64,
}

/// A prior value of the same indicator extracted from the SAME document
/// (e.g. a "previous visit" column). Cross-report history is derived
/// separately by the trend aggregator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalValue {
    /// Date label as printed on the document, not necessarily ISO.
    pub date: String,
    pub value: f64,
    #[serde(default)]
    pub is_current: bool,
}

/// One extracted lab value with interpretation metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Indicator {
    pub name: String,
    /// Original value string as printed ("5.6", "阴性", "12.3 ↑").
    pub value: String,
    #[serde(default)]
    pub value_number: Option<f64>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub status: IndicatorStatus,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub possible_causes: String,
    #[serde(default)]
    pub reference_range: Option<ReferenceRange>,
    #[serde(default)]
    pub history: Vec<HistoricalValue>,
}

impl Indicator {
    /// Numeric value for charting: the provider's `valueNumber` when given,
    /// otherwise the first numeric token of the printed value string.
    pub fn numeric_value(&self) -> Option<f64> {
        if let Some(n) = self.value_number {
            return Some(n);
        }
        extract_leading_number(&self.value)
    }
}

/// Pull the first numeric token out of a printed value ("12.3 ↑ mmol/L").
pub fn extract_leading_number(value: &str) -> Option<f64> {
    static NUMBER: OnceLock<Regex> = OnceLock::new();
    let re = NUMBER.get_or_init(|| {
        Regex::new(r"-?\d+(?:\.\d+)?").expect("number regex is valid")
    });
    re.find(value)?.as_str().parse().ok()
}

/// Medication insert interpretation (populated when `kind` is MEDICATION).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicationInfo {
    pub name: String,
    #[serde(default)]
    pub dosage: Option<String>,
    #[serde(default)]
    pub frequency: Option<String>,
    #[serde(default)]
    pub purpose: Option<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub side_effects: Vec<String>,
}

/// Full structured interpretation of one submitted document batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    #[serde(rename = "type")]
    pub kind: ResultKind,
    pub summary: String,
    #[serde(default)]
    pub indicators: Vec<Indicator>,
    #[serde(default)]
    pub medication: Option<MedicationInfo>,
    #[serde(default)]
    pub questions_for_doctor: Vec<String>,
    #[serde(default)]
    pub disclaimer: String,
}
