//! Classifies error strings to a typed taxonomy, builds recovery guides,
//! and computes graceful-degradation reports.
//!
//! Classification is string-pattern based, generalized from a binary
//! transient/non-transient split to a four-way taxonomy with a fixed
//! priority order.

use crate::model::{ErrorDetail, ErrorType, RecoveryGuide, ToolResponse};
use std::collections::{HashMap, HashSet};

const AUTH_REQUIRED_PATTERNS: &[&str] = &[
    "unauthorized",
    "401",
    "403",
    "forbidden",
    "api key",
    "authentication",
    "access denied",
    "token expired",
    "missing credentials",
    "permission denied",
];

const USER_ACTION_PATTERNS: &[&str] =
    &["file not found", "enoent", "missing data", "missing input", "no data", "please provide"];

const RETRYABLE_PATTERNS: &[&str] = &[
    "rate limit",
    "429",
    "timeout",
    "timed out",
    "econnrefused",
    "econnreset",
    "etimedout",
    "socket hang up",
    "temporarily unavailable",
    "502",
    "503",
    "network",
];

const PERMANENT_PATTERNS: &[&str] =
    &["invalid", "zod", "schema validation", "malformed", "unsupported", "unknown tool", "parse error"];

fn matches_any(haystack: &str, patterns: &[&str]) -> bool {
    patterns.iter().any(|p| haystack.contains(p))
}

/// Total function string→ErrorType. Priority order: `auth_required →
/// user_action → retryable → permanent`; default (no pattern matches) is
/// `retryable` — optimistic, since an unrecognized error is more likely a
/// transient upstream hiccup than a permanent one.
pub fn classify(message: &str) -> ErrorType {
    let lower = message.to_lowercase();
    if matches_any(&lower, AUTH_REQUIRED_PATTERNS) {
        ErrorType::AuthRequired
    } else if matches_any(&lower, USER_ACTION_PATTERNS) {
        ErrorType::UserAction
    } else if matches_any(&lower, RETRYABLE_PATTERNS) {
        ErrorType::Retryable
    } else if matches_any(&lower, PERMANENT_PATTERNS) {
        ErrorType::Permanent
    } else {
        ErrorType::Retryable
    }
}

/// Re-classifies an existing [`ErrorDetail`], overriding its `error_type`
/// so misclassified upstream errors self-correct.
pub fn classify_error_detail(detail: &ErrorDetail) -> ErrorDetail {
    let mut out = detail.clone();
    out.error_type = classify(&detail.message);
    out
}

fn retry_after_ms(message: &str) -> u64 {
    let lower = message.to_lowercase();
    if lower.contains("rate limit") || lower.contains("429") {
        5000
    } else if lower.contains("timeout") || lower.contains("timed out") || lower.contains("etimedout") {
        2000
    } else if lower.contains("econnrefused") {
        1000
    } else {
        3000
    }
}

fn recovery_steps(error_type: ErrorType) -> Vec<String> {
    match error_type {
        ErrorType::Retryable => vec![
            "wait for the suggested retry delay".to_string(),
            "retry the call with the same arguments".to_string(),
        ],
        ErrorType::Permanent => vec![
            "inspect the request arguments for malformed or unsupported values".to_string(),
            "do not retry without changing the request".to_string(),
        ],
        ErrorType::AuthRequired => vec![
            "verify the caller's credentials or API key".to_string(),
            "request the required permission or role from an administrator".to_string(),
        ],
        ErrorType::UserAction => vec![
            "supply the missing input or data referenced in the error".to_string(),
            "retry once the required input is available".to_string(),
        ],
    }
}

/// Substitute query servers for a failed server. Command servers and
/// `reporter` have no alternatives (§4.3).
fn alternative_tools_for(server: &str) -> Vec<String> {
    let subs: &[&str] = match server {
        "geowiz" => &["research"],
        "econobot" => &["market", "research"],
        "curve-smith" => &["research"],
        "risk-analysis" => &["research"],
        "market" => &["research"],
        "research" => &[],
        "legal" => &["title"],
        "title" => &["legal"],
        "landman" => &["title", "legal"],
        "drilling-ops" => &["research"],
        "environmental" => &["regulatory"],
        "regulatory" => &["environmental"],
        "reporter" | "decision" => &[],
        _ => &[],
    };
    subs.iter().map(|s| format!("{s}.analyze")).collect()
}

/// Builds a complete recovery guide for a classified error originating
/// from `server_name`.
pub fn build_recovery_guide(error_type: ErrorType, message: &str, server_name: &str) -> RecoveryGuide {
    RecoveryGuide {
        steps: recovery_steps(error_type),
        retry_after_ms: matches!(error_type, ErrorType::Retryable).then(|| retry_after_ms(message)),
        alternative_tools: alternative_tools_for(server_name),
    }
}

#[derive(Debug, Clone)]
pub struct DegradationReport {
    pub completeness: u8,
    pub missing: Vec<String>,
    pub failed: Vec<String>,
    pub suggestions: Vec<String>,
    pub alternatives: HashMap<String, Vec<String>>,
}

/// Computes a graceful-degradation report given the set of expected tool
/// names and the results actually gathered.
pub fn graceful_degradation(expected: &[String], results: &HashMap<String, ToolResponse>) -> DegradationReport {
    let succeeded = expected.iter().filter(|name| results.get(*name).map(|r| r.success).unwrap_or(false)).count();
    let completeness = ((succeeded as f64 / expected.len().max(1) as f64) * 100.0).round() as u8;

    let seen: HashSet<&str> = results.keys().map(String::as_str).collect();
    let missing: Vec<String> = expected.iter().filter(|name| !seen.contains(name.as_str())).cloned().collect();
    let failed: Vec<String> = expected
        .iter()
        .filter(|name| results.get(*name).map(|r| !r.success).unwrap_or(false))
        .cloned()
        .collect();

    let mut suggestions = Vec::new();
    if completeness >= 50 {
        suggestions.push("partial results may be sufficient".to_string());
    } else {
        suggestions.push("insufficient — consider retrying".to_string());
    }

    let mut alternatives = HashMap::new();
    for name in missing.iter().chain(failed.iter()) {
        let server = name.split('.').next().unwrap_or(name);
        alternatives.insert(name.clone(), alternative_tools_for(server));
    }

    DegradationReport { completeness, missing, failed, suggestions, alternatives }
}
