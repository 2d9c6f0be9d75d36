//! Projects raw domain payloads to a requested detail level and synthesizes
//! a natural-language summary. Pure, synchronous, no locks — every function
//! here is a plain transform over `serde_json::Value`.

use crate::model::{DetailLevel, ResponseMetadata, ToolResponse};
use chrono::Utc;
use serde_json::{Map, Value};

/// Options accompanying a raw payload into [`shape`].
pub struct ShapeOptions {
    pub server: String,
    pub persona: String,
    pub execution_time_ms: u64,
    pub detail_level: DetailLevel,
    pub confidence: Option<u8>,
}

const DOMAIN_KEYS: [&str; 4] = ["geological", "economic", "curve", "risk"];

/// Extracts confidence: `opts.confidence` wins; else the first numeric
/// `.confidence` found under any first-level domain key, in the fixed
/// priority order `geological, economic, curve, risk`; else a top-level
/// `confidence`; else 0.
fn extract_confidence(raw: &Value, override_confidence: Option<u8>) -> u8 {
    if let Some(c) = override_confidence {
        return c;
    }
    for key in DOMAIN_KEYS {
        if let Some(found) = raw.get(key).and_then(|v| v.get("confidence")).and_then(Value::as_f64) {
            return found.round() as u8;
        }
    }
    raw.get("confidence").and_then(Value::as_f64).map(|c| c.round() as u8).unwrap_or(0)
}

/// Returns the first first-level domain key present in `raw`, if any.
fn detect_domain(raw: &Value) -> Option<&'static str> {
    DOMAIN_KEYS.into_iter().find(|key| raw.get(key).is_some())
}

fn summary_whitelist(domain: &str) -> &'static [&'static str] {
    match domain {
        "geological" => &[
            "reservoirQuality",
            "recommendedAction",
            "professionalSummary",
            "hydrocarbonPotential",
            "geologicalConfidence",
            "keyRisks",
        ],
        "economic" => &["npv", "irr", "roi", "paybackMonths", "confidence"],
        "curve" => &["initialRate", "eur", "qualityGrade", "confidence"],
        "risk" => &["overallRiskScore", "confidence"],
        _ => &["confidence"],
    }
}

fn project_summary(raw: &Value, domain: Option<&str>, confidence: u8) -> Value {
    let Some(domain) = domain else {
        return serde_json::json!({ "confidence": confidence });
    };
    let Some(section) = raw.get(domain) else {
        return serde_json::json!({ "confidence": confidence });
    };
    let mut out = Map::new();
    for field in summary_whitelist(domain) {
        if *field == "keyRisks" {
            if let Some(Value::Array(risks)) = section.get("keyRisks") {
                let capped: Vec<Value> = risks.iter().take(3).cloned().collect();
                out.insert("keyRisks".to_string(), Value::Array(capped));
            }
            continue;
        }
        if let Some(value) = section.get(*field) {
            out.insert((*field).to_string(), value.clone());
        }
    }
    if !out.contains_key("confidence") {
        out.insert("confidence".to_string(), Value::from(confidence));
    }
    Value::Object(out)
}

/// Recursively strips the "noisy" standard-level fields: `sensitivityAnalysis`,
/// `monthlyData`, any `riskFactors` array, and `assumptions` arrays longer
/// than six entries.
fn strip_noisy_fields(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = Map::new();
            for (key, v) in map {
                match key.as_str() {
                    "sensitivityAnalysis" | "monthlyData" => continue,
                    "riskFactors" if v.is_array() => continue,
                    "assumptions" if matches!(v, Value::Array(a) if a.len() > 6) => continue,
                    _ => {
                        out.insert(key.clone(), strip_noisy_fields(v));
                    }
                }
            }
            Value::Object(out)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(strip_noisy_fields).collect()),
        other => other.clone(),
    }
}

fn natural_language_summary(raw: &Value, domain: Option<&str>, confidence: u8) -> String {
    match domain {
        Some("geological") => {
            let section = raw.get("geological");
            let quality = section.and_then(|s| s.get("reservoirQuality")).and_then(Value::as_str).unwrap_or("unknown");
            let action = section.and_then(|s| s.get("recommendedAction")).and_then(Value::as_str).unwrap_or("review further");
            format!("{quality} prospect; recommended action: {action} (confidence {confidence}%)")
        }
        Some("economic") => {
            let section = raw.get("economic");
            let npv = section.and_then(|s| s.get("npv")).and_then(Value::as_f64).unwrap_or(0.0);
            let irr = section.and_then(|s| s.get("irr")).and_then(Value::as_f64).unwrap_or(0.0);
            format!("NPV ${:.1}M, IRR {irr}% (confidence {confidence}%)", npv / 1_000_000.0)
        }
        Some("curve") => {
            let section = raw.get("curve");
            let eur = section.and_then(|s| s.get("eur")).and_then(Value::as_f64).unwrap_or(0.0);
            let grade = section.and_then(|s| s.get("qualityGrade")).and_then(Value::as_str).unwrap_or("unknown");
            format!("EUR {}K BOE, grade {grade} (confidence {confidence}%)", (eur / 1000.0).round() as i64)
        }
        Some("risk") => {
            let section = raw.get("risk");
            let score = section.and_then(|s| s.get("overallRiskScore")).and_then(Value::as_f64).unwrap_or(0.0);
            format!("risk score {score}/100 (confidence {confidence}%)")
        }
        _ => format!("analysis complete (confidence {confidence}%)"),
    }
}

/// Projects `raw` to `opts.detail_level` and builds a complete `ToolResponse`.
pub fn shape(raw: &Value, opts: ShapeOptions) -> ToolResponse {
    let domain = detect_domain(raw);
    let confidence = extract_confidence(raw, opts.confidence);
    let data = match opts.detail_level {
        DetailLevel::Summary => project_summary(raw, domain, confidence),
        DetailLevel::Standard => strip_noisy_fields(raw),
        DetailLevel::Full => raw.clone(),
    };
    let summary = natural_language_summary(raw, domain, confidence);
    ToolResponse {
        success: true,
        summary,
        confidence,
        data,
        detail_level: opts.detail_level,
        // A successfully shaped single-call response represents a complete
        // answer from its server; partial-failure completeness is a
        // gather-level concept (§3 GatheredResult), not a per-response one.
        completeness: 100,
        metadata: ResponseMetadata {
            server: opts.server,
            persona: opts.persona,
            execution_time_ms: opts.execution_time_ms,
            timestamp: Some(Utc::now()),
            retry_attempts: None,
            total_retry_delay_ms: None,
        },
        error: None,
    }
}
