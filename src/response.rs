use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use thiserror::Error;

use crate::prompt::ResponseFormat;
use crate::redaction::RedactionResult;
use crate::verdict::{Category, ClassificationResult, Sentiment, Severity, Signal, Verdict};

const NO_EXPLANATION: &str = "No explanation provided.";

/// The model answered, but not with something we can decode.
#[derive(Debug, Error)]
pub enum ResponseError {
    #[error("malformed model response: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("malformed model response: expected a JSON object")]
    NotAnObject,
}

/// Removes every ```json / ``` marker and surrounding whitespace.
pub fn strip_code_fences(raw: &str) -> String {
    raw.replace("```json", "").replace("```", "").trim().to_string()
}

/// Narrows prose-wrapped output to the outermost `{ ... }` span.
fn object_span(s: &str) -> &str {
    if s.starts_with('{') {
        return s;
    }
    match (s.find('{'), s.rfind('}')) {
        (Some(start), Some(end)) if end > start => &s[start..=end],
        _ => s,
    }
}

fn decode_object(raw: &str) -> Result<Value, ResponseError> {
    let cleaned = strip_code_fences(raw);
    let value: Value = serde_json::from_str(object_span(&cleaned))?;
    if !value.is_object() {
        return Err(ResponseError::NotAnObject);
    }
    Ok(value)
}

/// Numeric field that tolerates `85`, `85.4` and `"85%"`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Score {
    Int(i64),
    Float(f64),
    Text(String),
}

impl Score {
    fn percent(&self) -> u8 {
        let v = match self {
            Score::Int(i) => *i as f64,
            Score::Float(f) => *f,
            Score::Text(s) => s.trim().trim_end_matches('%').trim().parse().unwrap_or(0.0),
        };
        if v.is_nan() {
            return 0;
        }
        v.round().clamp(0.0, 100.0) as u8
    }
}

fn percent(score: Option<Score>) -> u8 {
    score.map(|s| s.percent()).unwrap_or(0)
}

/// Decodes a field, keeping `None` when the model put a value of the wrong
/// type there.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// Decodes a list field. A lone value is read as a one-item list and items
/// of the wrong type are dropped.
fn lenient_list<'de, D, T>(deserializer: D) -> Result<Option<Vec<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::Array(items) => Some(
            items
                .into_iter()
                .filter_map(|item| serde_json::from_value(item).ok())
                .collect(),
        ),
        one => serde_json::from_value(one).ok().map(|item| vec![item]),
    })
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawSignal {
    Full {
        #[serde(default, deserialize_with = "lenient")]
        label: Option<String>,
        #[serde(default, deserialize_with = "lenient")]
        severity: Option<String>,
    },
    Label(String),
}

impl RawSignal {
    fn into_signal(self) -> Signal {
        let (label, severity) = match self {
            RawSignal::Full { label, severity } => (label.unwrap_or_default(), severity),
            RawSignal::Label(label) => (label, None),
        };
        Signal {
            label: label.trim().to_string(),
            severity: severity
                .as_deref()
                .map(Severity::from_label)
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawDetailed {
    #[serde(default, deserialize_with = "lenient")]
    verdict: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    confidence: Option<Score>,
    #[serde(default, deserialize_with = "lenient")]
    reason: Option<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    signals: Option<Vec<RawSignal>>,
    #[serde(default, deserialize_with = "lenient")]
    spam_score: Option<Score>,
    #[serde(default, deserialize_with = "lenient")]
    category: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    sentiment: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawBinary {
    #[serde(default, deserialize_with = "lenient")]
    verdict: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    confidence: Option<Score>,
    #[serde(default, deserialize_with = "lenient")]
    spam_score: Option<Score>,
    #[serde(default, deserialize_with = "lenient")]
    category: Option<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    reasons: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient_list")]
    suspicious_words: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient_list")]
    safe_words: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient")]
    recommendation: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawRedaction {
    #[serde(default, deserialize_with = "lenient")]
    clean_text: Option<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    redacted_items: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient")]
    redaction_count: Option<Score>,
}

fn clean_list(items: Option<Vec<String>>) -> Vec<String> {
    items
        .unwrap_or_default()
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn verdict_of(label: Option<&str>) -> Verdict {
    label.map(Verdict::from_label).unwrap_or(Verdict::Unknown)
}

/// Decodes a classification completion in the given contract.
///
/// Absent or wrongly typed keys take their defaults; only undecodable
/// payloads fail.
pub fn parse_classification(
    raw: &str,
    format: ResponseFormat,
) -> Result<ClassificationResult, ResponseError> {
    let value = decode_object(raw)?;
    match format {
        ResponseFormat::Detailed => Ok(from_detailed(serde_json::from_value(value)?)),
        ResponseFormat::Binary => Ok(from_binary(serde_json::from_value(value)?)),
    }
}

fn from_detailed(raw: RawDetailed) -> ClassificationResult {
    let signals = raw
        .signals
        .unwrap_or_default()
        .into_iter()
        .map(RawSignal::into_signal)
        .collect();

    ClassificationResult {
        verdict: verdict_of(raw.verdict.as_deref()),
        confidence: percent(raw.confidence),
        spam_score: percent(raw.spam_score),
        category: raw
            .category
            .as_deref()
            .map(Category::from_label)
            .unwrap_or_default(),
        sentiment: raw
            .sentiment
            .as_deref()
            .map(Sentiment::from_label)
            .unwrap_or_default(),
        reason: raw
            .reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| NO_EXPLANATION.to_string()),
        signals,
        reasons: Vec::new(),
        suspicious_words: Vec::new(),
        safe_words: Vec::new(),
        recommendation: None,
    }
}

fn from_binary(raw: RawBinary) -> ClassificationResult {
    let reasons = clean_list(raw.reasons);
    let reason = if reasons.is_empty() {
        NO_EXPLANATION.to_string()
    } else {
        reasons.join(" ")
    };

    ClassificationResult {
        verdict: verdict_of(raw.verdict.as_deref()),
        confidence: percent(raw.confidence),
        spam_score: percent(raw.spam_score),
        category: raw
            .category
            .as_deref()
            .map(Category::from_label)
            .unwrap_or_default(),
        sentiment: Sentiment::default(),
        reason,
        signals: Vec::new(),
        reasons,
        suspicious_words: clean_list(raw.suspicious_words),
        safe_words: clean_list(raw.safe_words),
        recommendation: raw
            .recommendation
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty()),
    }
}

/// Decodes a redaction completion. A missing `clean_text` means the model
/// redacted nothing, so the submitted text is carried through.
pub fn parse_redaction(raw: &str, submitted: &str) -> Result<RedactionResult, ResponseError> {
    let parsed: RawRedaction = serde_json::from_value(decode_object(raw)?)?;
    Ok(RedactionResult {
        clean_text: parsed.clean_text.unwrap_or_else(|| submitted.to_string()),
        redacted_items: clean_list(parsed.redacted_items),
        redaction_count: parsed
            .redaction_count
            .map(|c| match c {
                Score::Int(i) => i.max(0) as u32,
                other => other.percent() as u32,
            })
            .unwrap_or(0),
    })
}

/// Image-to-text answers are plain text; only fences are removed.
pub fn parse_extracted_text(raw: &str) -> String {
    strip_code_fences(raw)
}
