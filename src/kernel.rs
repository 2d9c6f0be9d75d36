//! The Kernel Facade: the single composing struct that wires Registry, Auth,
//! Session Manager, Executor, Bundles, and Audit behind the operations named
//! in §4.9, composed the way provider trait objects are wired elsewhere in
//! this codebase: construct the struct, then wire the transport in with
//! `set_executor_fn` once it's ready.

use crate::audit::AuditLog;
use crate::auth::AuthService;
use crate::bundles::{self, BundleLibrary};
use crate::executor::{generate_idempotency_key, Executor, ExecutorConfig, ToolInvoker};
use crate::model::{
    AuditAction, AuditEntry, AuthDecision, Bundle, BundleResult, GatheredResult, Identity,
    ServerFilter, Server, SessionPreferences, Tool, ToolRequest, ToolResponse, WhoAmI,
};
use crate::registry::Registry;
use crate::session::SessionManager;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

pub struct KernelConfig {
    pub executor: ExecutorConfig,
    pub audit_enabled: bool,
    pub audit_path: std::path::PathBuf,
    pub auth_disabled: bool,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            executor: ExecutorConfig::default(),
            audit_enabled: true,
            audit_path: std::path::PathBuf::from("./audit"),
            auth_disabled: false,
        }
    }
}

pub struct Kernel {
    registry: Arc<Registry>,
    auth: AuthService,
    audit: AuditLog,
    sessions: SessionManager,
    executor: Arc<Executor>,
    bundles: BundleLibrary,
}

impl Kernel {
    /// `initialize(serverConfigs)` — builds the registry from the given
    /// configs and every other process-wide table, composing the facade.
    pub fn initialize(configs: Vec<crate::registry::ServerConfig>, config: KernelConfig) -> Self {
        let registry = Arc::new(Registry::new(configs));
        let executor = Arc::new(Executor::new(registry.clone(), config.executor));
        Self {
            registry,
            auth: AuthService::new(config.auth_disabled),
            audit: AuditLog::new(config.audit_enabled, config.audit_path),
            sessions: SessionManager::new(),
            executor,
            bundles: BundleLibrary::with_defaults(),
        }
    }

    pub fn with_defaults() -> Self {
        Self::initialize(crate::registry::default_server_configs(), KernelConfig::default())
    }

    pub async fn set_executor_fn(&self, invoker: Arc<dyn ToolInvoker>) {
        self.executor.set_invoker(invoker).await;
    }

    pub fn list_servers(&self, filter: Option<&ServerFilter>) -> Vec<&Server> {
        self.registry.list_servers(filter)
    }

    pub fn describe_tools(&self, server_name: Option<&str>) -> Vec<&Tool> {
        self.registry.describe_tools(server_name)
    }

    pub async fn create_session(&self, identity: Option<Identity>, preferences: Option<SessionPreferences>) -> Uuid {
        self.sessions.create(identity, preferences).await.id
    }

    pub async fn get_session(&self, session_id: Uuid) -> Option<Arc<crate::session::Session>> {
        self.sessions.get(session_id).await
    }

    pub async fn destroy_session(&self, session_id: Uuid) -> bool {
        self.sessions.destroy(session_id).await
    }

    /// `whoAmI(sessionId)`: identity plus injected context. Unknown sessions
    /// fall back to the fixed demo identity with no available results.
    pub async fn who_am_i(&self, session_id: Option<Uuid>) -> WhoAmI {
        if let Some(session) = self.resolve_session(session_id).await {
            WhoAmI { identity: session.identity.clone(), context: session.context().await }
        } else {
            let identity = Identity::demo_analyst();
            let context = crate::model::InjectedContext {
                user_id: identity.user_id,
                role: identity.role,
                session_id: Uuid::nil(),
                timestamp: chrono::Utc::now(),
                timezone: chrono::Local::now().offset().to_string(),
                default_basin: None,
                risk_tolerance: None,
                available_results: Vec::new(),
            };
            WhoAmI { identity, context }
        }
    }

    async fn resolve_session(&self, session_id: Option<Uuid>) -> Option<Arc<crate::session::Session>> {
        self.sessions.get(session_id?).await
    }

    async fn identity_for(&self, session_id: Option<Uuid>) -> Identity {
        match self.resolve_session(session_id).await {
            Some(session) => session.identity.clone(),
            None => Identity::demo_analyst(),
        }
    }

    pub fn auth_check(&self, tool_name: &str, identity: &Identity) -> AuthDecision {
        self.auth.check(tool_name, identity)
    }

    /// `execute(request)`: runs the Executor directly, with no auth or
    /// audit wrapping — used internally and by callers that have already
    /// authorized the call themselves.
    pub async fn execute(&self, request: &ToolRequest) -> ToolResponse {
        self.executor.execute(request).await
    }

    /// `callTool(request, sessionId?)`: auth precedes invocation; both the
    /// request and its outcome are recorded to the audit log regardless of
    /// outcome (§7 invariant #1). A missing session uses the default demo
    /// identity. The result is cached in the session under the tool name.
    #[instrument(skip(self, request), fields(tool = %request.tool_name))]
    pub async fn call_tool(&self, request: ToolRequest, session_id: Option<Uuid>) -> ToolResponse {
        let session = self.resolve_session(session_id).await;
        let identity = match &session {
            Some(s) => s.identity.clone(),
            None => Identity::demo_analyst(),
        };

        self.audit
            .record(AuditEntry {
                tool: request.tool_name.clone(),
                action: AuditAction::Request,
                parameters: request.args.clone(),
                user_id: identity.user_id,
                session_id,
                role: identity.role,
                timestamp: chrono::Utc::now(),
                success: None,
                duration_ms: None,
                error_type: None,
            })
            .await;

        let decision = self.auth.check(&request.tool_name, &identity);
        if !decision.allowed {
            info!(tool = %request.tool_name, role = %identity.role, "auth denied");
            let error = crate::model::ErrorDetail {
                error_type: crate::model::ErrorType::AuthRequired,
                message: decision.reason.clone().unwrap_or_else(|| "not authorized".to_string()),
                reason: decision.reason.clone(),
                recovery_steps: Some(vec!["request the required permission or role from an administrator".to_string()]),
                alternative_tools: None,
                retry_after_ms: None,
            };
            let response = ToolResponse::failure(&request.tool_name, error);
            self.audit_response(&request, &identity, session_id, &response).await;
            return response;
        }

        let start = std::time::Instant::now();
        let response = self.executor.execute(&request).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        if let Some(session) = &session {
            session.store_result(request.tool_name.clone(), response.clone()).await;
        }

        self.audit
            .record(AuditEntry {
                tool: request.tool_name.clone(),
                action: AuditAction::Response,
                parameters: request.args.clone(),
                user_id: identity.user_id,
                session_id,
                role: identity.role,
                timestamp: chrono::Utc::now(),
                success: Some(response.success),
                duration_ms: Some(duration_ms),
                error_type: response.error.as_ref().map(|e| e.error_type),
            })
            .await;

        response
    }

    async fn audit_response(&self, request: &ToolRequest, identity: &Identity, session_id: Option<Uuid>, response: &ToolResponse) {
        self.audit
            .record(AuditEntry {
                tool: request.tool_name.clone(),
                action: AuditAction::Denied,
                parameters: request.args.clone(),
                user_id: identity.user_id,
                session_id,
                role: identity.role,
                timestamp: chrono::Utc::now(),
                success: Some(false),
                duration_ms: None,
                error_type: response.error.as_ref().map(|e| e.error_type),
            })
            .await;
    }

    /// `executeBundle(bundle, args, sessionId?)`: resolves phases, executes
    /// them, and computes `overallSuccess` against the bundle's gather
    /// strategy. Does not itself run auth per step — bundle steps are
    /// treated as pre-authorized server-side compositions, matching §4.8's
    /// "static named workflows" model; per-step auth is the caller's
    /// responsibility if a bundle is exposed to an untrusted caller.
    #[instrument(skip(self, bundle, args), fields(bundle = %bundle.name))]
    pub async fn execute_bundle(&self, bundle: &Bundle, args: Value, _session_id: Option<Uuid>) -> BundleResult {
        let phases = match Executor::resolve_phases(&bundle.steps) {
            Ok(phases) => phases,
            Err(e) => {
                warn!(bundle = %bundle.name, error = %e, "bundle dependency graph is invalid");
                return BundleResult {
                    bundle_name: bundle.name.clone(),
                    phases: Vec::new(),
                    overall_success: false,
                    gathered: GatheredResult { results: Default::default(), failures: Vec::new(), completeness: 0, total_time_ms: 0 },
                };
            }
        };

        let gathered = self.executor.execute_bundle_steps(&phases, &args).await;
        let overall_success = bundles::overall_success(bundle, &gathered.results);

        BundleResult { bundle_name: bundle.name.clone(), phases, overall_success, gathered }
    }

    pub async fn quick_screen(&self, args: Value, session_id: Option<Uuid>) -> BundleResult {
        let bundle = self.bundles.get("quick_screen").expect("builtin bundle").clone();
        self.execute_bundle(&bundle, args, session_id).await
    }

    pub async fn full_due_diligence(&self, args: Value, session_id: Option<Uuid>) -> BundleResult {
        let bundle = self.bundles.get("full_due_diligence").expect("builtin bundle").clone();
        self.execute_bundle(&bundle, args, session_id).await
    }

    pub async fn geological_deep_dive(&self, args: Value, session_id: Option<Uuid>) -> BundleResult {
        let bundle = self.bundles.get("geological_deep_dive").expect("builtin bundle").clone();
        self.execute_bundle(&bundle, args, session_id).await
    }

    pub async fn financial_review(&self, args: Value, session_id: Option<Uuid>) -> BundleResult {
        let bundle = self.bundles.get("financial_review").expect("builtin bundle").clone();
        self.execute_bundle(&bundle, args, session_id).await
    }

    pub fn list_bundles(&self) -> &[Bundle] {
        self.bundles.list()
    }

    pub async fn confirm_action(&self, action_id: Uuid) -> Option<ToolResponse> {
        self.executor.confirm_action(action_id).await
    }

    pub async fn cancel_action(&self, action_id: Uuid) -> bool {
        self.executor.cancel_action(action_id).await
    }

    pub async fn execute_with_confirmation(&self, request: &ToolRequest) -> ToolResponse {
        self.executor.execute_with_confirmation(request).await
    }

    pub fn generate_idempotency_key(&self, tool_name: &str, args: &Value, session_id: Uuid) -> String {
        generate_idempotency_key(tool_name, args, session_id)
    }
}
