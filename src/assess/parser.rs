//! Response parsing for commit quality assessment.

use serde_json::Value;

use crate::models::Complexity;
use crate::utils::extract_json_str;

/// Parse error types.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ParseError {
    #[error("No JSON found in response")]
    NoJson,
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),
    #[error("Missing field: {0}")]
    MissingField(&'static str),
    #[error("Field {field} is not a valid number: {value}")]
    NotANumber { field: &'static str, value: String },
    #[error("Unknown complexity tier: {0}")]
    UnknownComplexity(String),
}

/// The parts of a verdict taken from the model's answer.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedAssessment {
    /// In [0, 1]
    pub quality_score: f64,
    pub complexity: Complexity,
    pub rationale: String,
    pub suggestions: Vec<String>,
}

/// Parse the LLM response.
///
/// Scores are expected on a 0-100 scale and are clamped into it. Complexity
/// may come as a tier name (`complexity`) or a 0-100 score (`complexity_score`).
pub fn parse_quality_response(response: &str) -> Result<ParsedAssessment, ParseError> {
    let json_str = extract_json_str(response).ok_or(ParseError::NoJson)?;
    let parsed: Value =
        serde_json::from_str(json_str).map_err(|e| ParseError::InvalidJson(e.to_string()))?;

    let quality = first_of(&parsed, &["code_quality_score", "quality_score"])
        .ok_or(ParseError::MissingField("code_quality_score"))
        .and_then(|v| number(v, "code_quality_score"))?;

    let complexity = match parsed.get("complexity").and_then(Value::as_str) {
        Some(name) => name
            .parse()
            .map_err(|_| ParseError::UnknownComplexity(name.to_string()))?,
        None => {
            let score = parsed
                .get("complexity_score")
                .ok_or(ParseError::MissingField("complexity_score"))
                .and_then(|v| number(v, "complexity_score"))?;
            Complexity::from_score(score.clamp(0.0, 100.0))
        }
    };

    let rationale = first_of(&parsed, &["rationale", "reasoning"])
        .map(text_of)
        .unwrap_or_default();

    let suggestions = first_of(&parsed, &["suggestions", "advice"])
        .map(|v| match v {
            Value::Array(items) => items.iter().map(text_of).filter(|s| !s.is_empty()).collect(),
            other => vec![text_of(other)],
        })
        .unwrap_or_default();

    Ok(ParsedAssessment {
        quality_score: quality.clamp(0.0, 100.0) / 100.0,
        complexity,
        rationale,
        suggestions,
    })
}

fn first_of<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| value.get(*k))
        .find(|v| !v.is_null())
}

fn number(value: &Value, field: &'static str) -> Result<f64, ParseError> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    n.filter(|n| n.is_finite()).ok_or_else(|| ParseError::NotANumber {
        field,
        value: value.to_string(),
    })
}

/// Flatten strings, lists and objects of strings into one line of text.
fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Array(items) => items
            .iter()
            .map(text_of)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" "),
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| format!("{}: {}", k, text_of(v)))
            .collect::<Vec<_>>()
            .join("; "),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
