//! Shared data model for the orchestration kernel.
//!
//! Every record here is a plain, serde-derived value type — sum types for
//! variants (`ErrorType`, `ToolType`, `GatherStrategy`, `Role`), flat structs
//! for everything else. Nothing in this module performs I/O or holds a lock.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

/// One of the five fine-grained permissions a role or identity can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Permission {
    #[serde(rename = "read:analysis")]
    ReadAnalysis,
    #[serde(rename = "write:reports")]
    WriteReports,
    #[serde(rename = "execute:decisions")]
    ExecuteDecisions,
    #[serde(rename = "admin:servers")]
    AdminServers,
    #[serde(rename = "admin:users")]
    AdminUsers,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReadAnalysis => "read:analysis",
            Self::WriteReports => "write:reports",
            Self::ExecuteDecisions => "execute:decisions",
            Self::AdminServers => "admin:servers",
            Self::AdminUsers => "admin:users",
        }
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Caller role. Ordered from least to most privileged for `required_role`
/// resolution in the Auth component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Analyst,
    Engineer,
    Executive,
    Admin,
}

impl Role {
    pub const ALL_ASCENDING: [Role; 4] = [Role::Analyst, Role::Engineer, Role::Executive, Role::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Analyst => "analyst",
            Self::Engineer => "engineer",
            Self::Executive => "executive",
            Self::Admin => "admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A pre-authenticated caller identity. Identity issuance is out of scope —
/// identities arrive fully formed from the caller-facing API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: Uuid,
    pub role: Role,
    #[serde(default)]
    pub permissions: Vec<Permission>,
    pub organization: Option<String>,
    pub display_name: Option<String>,
}

impl Identity {
    /// The fixed demo analyst identity used when a caller omits a session.
    pub fn demo_analyst() -> Self {
        Self {
            user_id: Uuid::nil(),
            role: Role::Analyst,
            permissions: Vec::new(),
            organization: Some("demo".to_string()),
            display_name: Some("Demo Analyst".to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTolerance {
    Conservative,
    Moderate,
    Aggressive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetailLevel {
    Summary,
    Standard,
    Full,
}

impl Default for DetailLevel {
    fn default() -> Self {
        Self::Standard
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionPreferences {
    pub default_basin: Option<String>,
    pub risk_tolerance: Option<RiskTolerance>,
    pub detail_level: Option<DetailLevel>,
    pub investment_criteria: Option<Value>,
}

/// Static description of one domain worker in the fleet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Server {
    pub name: String,
    pub domain: String,
    pub persona: String,
    pub capabilities: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolType {
    Query,
    Command,
}

/// A tool derived from a server: every server exposes exactly one logical
/// tool named `{server}.analyze`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    pub name: String,
    pub server: String,
    pub tool_type: ToolType,
    pub read_only: bool,
    pub requires_confirmation: bool,
    pub detail_levels: Vec<DetailLevel>,
}

impl Tool {
    /// Builds the tool record for a server, honoring the invariant
    /// `type=command ⇒ requiresConfirmation=true ∧ readOnly=false`.
    pub fn for_server(server_name: &str, is_command: bool) -> Self {
        Self {
            name: format!("{server_name}.analyze"),
            server: server_name.to_string(),
            tool_type: if is_command { ToolType::Command } else { ToolType::Query },
            read_only: !is_command,
            requires_confirmation: is_command,
            detail_levels: vec![DetailLevel::Summary, DetailLevel::Standard, DetailLevel::Full],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolRequest {
    pub tool_name: String,
    #[serde(default)]
    pub args: Value,
    pub detail_level: Option<DetailLevel>,
}

impl ToolRequest {
    pub fn new(tool_name: impl Into<String>, args: Value) -> Self {
        Self { tool_name: tool_name.into(), args, detail_level: None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    Retryable,
    Permanent,
    AuthRequired,
    UserAction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    #[serde(rename = "type")]
    pub error_type: ErrorType,
    pub message: String,
    pub reason: Option<String>,
    pub recovery_steps: Option<Vec<String>>,
    pub alternative_tools: Option<Vec<String>>,
    pub retry_after_ms: Option<u64>,
}

impl ErrorDetail {
    pub fn new(error_type: ErrorType, message: impl Into<String>) -> Self {
        Self {
            error_type,
            message: message.into(),
            reason: None,
            recovery_steps: None,
            alternative_tools: None,
            retry_after_ms: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseMetadata {
    pub server: String,
    pub persona: String,
    pub execution_time_ms: u64,
    pub timestamp: Option<DateTime<Utc>>,
    pub retry_attempts: Option<u32>,
    pub total_retry_delay_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResponse {
    pub success: bool,
    pub summary: String,
    pub confidence: u8,
    pub data: Value,
    pub detail_level: DetailLevel,
    pub completeness: u8,
    pub metadata: ResponseMetadata,
    pub error: Option<ErrorDetail>,
}

impl ToolResponse {
    pub fn failure(server: &str, error: ErrorDetail) -> Self {
        Self {
            success: false,
            summary: error.message.clone(),
            confidence: 0,
            data: Value::Null,
            detail_level: DetailLevel::Standard,
            completeness: 0,
            metadata: ResponseMetadata {
                server: server.to_string(),
                timestamp: Some(Utc::now()),
                ..Default::default()
            },
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatherStrategy {
    All,
    Majority,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleStep {
    pub tool_name: String,
    pub detail_level: Option<DetailLevel>,
    pub parallel: bool,
    pub optional: bool,
    pub depends_on: Vec<String>,
}

impl BundleStep {
    pub fn new(tool_name: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            detail_level: None,
            parallel: true,
            optional: false,
            depends_on: Vec::new(),
        }
    }

    pub fn detail(mut self, level: DetailLevel) -> Self {
        self.detail_level = Some(level);
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn depends_on(mut self, names: &[&str]) -> Self {
        self.depends_on = names.iter().map(|s| s.to_string()).collect();
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bundle {
    pub name: String,
    pub steps: Vec<BundleStep>,
    pub gather_strategy: GatherStrategy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryGuide {
    pub steps: Vec<String>,
    pub retry_after_ms: Option<u64>,
    pub alternative_tools: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureEntry {
    pub tool_name: String,
    pub error: ErrorDetail,
    pub recovery_guide: Option<RecoveryGuide>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatheredResult {
    pub results: HashMap<String, ToolResponse>,
    pub failures: Vec<FailureEntry>,
    pub completeness: u8,
    pub total_time_ms: u64,
}

impl GatheredResult {
    /// `completeness = round(100 · |successful| / |requested|)`.
    pub fn compute_completeness(successful: usize, requested: usize) -> u8 {
        if requested == 0 {
            return 100;
        }
        ((successful as f64 / requested as f64) * 100.0).round() as u8
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleResult {
    pub bundle_name: String,
    pub phases: Vec<Vec<BundleStep>>,
    pub overall_success: bool,
    #[serde(flatten)]
    pub gathered: GatheredResult,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingAction {
    pub action_id: Uuid,
    pub tool_name: String,
    pub args: Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditAction {
    Request,
    Response,
    Denied,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub tool: String,
    pub action: AuditAction,
    pub parameters: Value,
    pub user_id: Uuid,
    pub session_id: Option<Uuid>,
    pub role: Role,
    pub timestamp: DateTime<Utc>,
    pub success: Option<bool>,
    pub duration_ms: Option<u64>,
    pub error_type: Option<ErrorType>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthDecision {
    pub allowed: bool,
    pub reason: Option<String>,
    pub required_permissions: Vec<Permission>,
    pub required_role: Option<Role>,
}

impl AuthDecision {
    pub fn allow() -> Self {
        Self { allowed: true, reason: None, required_permissions: Vec::new(), required_role: None }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InjectedContext {
    pub user_id: Uuid,
    pub role: Role,
    pub session_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub timezone: String,
    pub default_basin: Option<String>,
    pub risk_tolerance: Option<RiskTolerance>,
    pub available_results: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhoAmI {
    pub identity: Identity,
    pub context: InjectedContext,
}

/// A filter for `Registry::list_servers`.
#[derive(Debug, Clone, Default)]
pub struct ServerFilter {
    pub domain: Option<String>,
    pub tool_type: Option<ToolType>,
    pub capability: Option<String>,
}
