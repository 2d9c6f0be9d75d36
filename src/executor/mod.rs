//! The heart of the kernel: single-call execution with timeout and retry,
//! bounded-concurrency scatter-gather, dependency-phase resolution for
//! bundles, and the confirmation gate for side-effecting tools.
//!
//! Three mechanisms compose here: an `Arc<Semaphore>` + `tokio::spawn`
//! bounded pool for scatter-gather, a `tokio::time::timeout` wrap combined
//! with string-based failure classification for the retry loop, and a flat
//! `HashMap`-backed pending-actions table for the confirmation gate.

use crate::errors::KernelError;
use crate::model::{
    BundleStep, DetailLevel, ErrorDetail, ErrorType, FailureEntry,
    GatheredResult, PendingAction, ResponseMetadata, Tool, ToolRequest, ToolResponse,
};
use crate::registry::Registry;
use crate::resilience;
use crate::shaper::{self, ShapeOptions};
use async_trait::async_trait;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, warn};
use uuid::Uuid;

/// Abstract transport the kernel invokes tools through. The kernel compiles
/// against this trait and never a concrete server connection (§6).
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    async fn invoke(&self, server_name: &str, args: Value) -> Result<ToolResponse, String>;
}

#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    pub max_parallel: usize,
    pub tool_timeout_ms: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self { max_parallel: 6, tool_timeout_ms: 10_000, max_retries: 2, retry_backoff_ms: 500 }
    }
}

/// Deterministic backoff delay for retry attempt `i` (0-indexed), excluding
/// jitter: `retry_backoff_ms · 2^i`.
fn base_backoff_ms(retry_backoff_ms: u64, attempt: u32) -> u64 {
    retry_backoff_ms.saturating_mul(1u64 << attempt)
}

/// Jitter in `[0, retry_backoff_ms * 0.3]`, via `fastrand`.
fn jitter_ms(retry_backoff_ms: u64) -> u64 {
    let max_jitter = ((retry_backoff_ms as f64) * 0.3) as u64;
    if max_jitter == 0 {
        0
    } else {
        fastrand::u64(0..=max_jitter)
    }
}

/// Recursively sorts object keys so that semantically-equal argument trees
/// always serialize identically, regardless of insertion order.
fn canonical_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let mut out = serde_json::Map::new();
            for (k, v) in entries {
                out.insert(k.clone(), canonical_value(v));
            }
            Value::Object(out)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(canonical_value).collect()),
        other => other.clone(),
    }
}

/// Pure, deterministic idempotency key: SHA-256 of `toolName | canonical(args)
/// | sessionId`, truncated to 16 hex characters. Stable under argument-key
/// reordering; changes if the tool, any argument value, or the session does.
pub fn generate_idempotency_key(tool_name: &str, args: &Value, session_id: Uuid) -> String {
    let canonical = canonical_value(args);
    let payload = format!("{tool_name}|{canonical}|{session_id}");
    let digest = Sha256::digest(payload.as_bytes());
    let full_hex = format!("{digest:x}");
    full_hex[..16].to_string()
}

pub struct Executor {
    registry: Arc<Registry>,
    config: ExecutorConfig,
    invoker: Mutex<Option<Arc<dyn ToolInvoker>>>,
    semaphore: Arc<Semaphore>,
    pending: Mutex<HashMap<Uuid, PendingAction>>,
}

impl Executor {
    pub fn new(registry: Arc<Registry>, config: ExecutorConfig) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_parallel.max(1)));
        Self { registry, config, invoker: Mutex::new(None), semaphore, pending: Mutex::new(HashMap::new()) }
    }

    pub async fn set_invoker(&self, invoker: Arc<dyn ToolInvoker>) {
        *self.invoker.lock().await = Some(invoker);
    }

    fn resolve_tool(&self, tool_name: &str) -> Option<Tool> {
        self.registry.resolve_tool(tool_name).cloned()
    }

    fn persona_for(&self, server_name: &str) -> String {
        self.registry.resolve_server(server_name).map(|s| s.persona.clone()).unwrap_or_default()
    }

    /// Invokes the underlying transport exactly once, applying the
    /// per-call timeout. Never retries; the caller drives retry policy.
    async fn invoke_once(&self, server_name: &str, args: Value) -> ToolResponse {
        let invoker = self.invoker.lock().await.clone();
        let Some(invoker) = invoker else {
            return ToolResponse::failure(
                server_name,
                ErrorDetail::new(ErrorType::Permanent, "no invoker is connected"),
            );
        };

        let call = invoker.invoke(server_name, args);
        let outcome = tokio::time::timeout(Duration::from_millis(self.config.tool_timeout_ms), call).await;

        match outcome {
            Ok(Ok(mut response)) => {
                // Pre-existing ErrorDetail.type is overridden by classification
                // (§4.3) regardless of how the invoker arrived at it.
                if let Some(error) = response.error.take() {
                    response.error = Some(resilience::classify_error_detail(&error));
                }
                response
            }
            Ok(Err(message)) => {
                // Thrown/rejected invoker errors are treated as retryable
                // failures with the thrown message (§6), then reclassified.
                let detail = resilience::classify_error_detail(&ErrorDetail::new(ErrorType::Retryable, message));
                ToolResponse::failure(server_name, detail)
            }
            Err(_) => ToolResponse::failure(
                server_name,
                ErrorDetail::new(ErrorType::Retryable, "timed out"),
            ),
        }
    }

    /// Executes a single request end to end: resolve → invoke → classify →
    /// retry-if-retryable → shape. This is the `execute` operation of §4.7.
    pub async fn execute(&self, request: &ToolRequest) -> ToolResponse {
        let Some(tool) = self.resolve_tool(&request.tool_name) else {
            return ToolResponse::failure(
                &request.tool_name,
                ErrorDetail::new(ErrorType::Permanent, format!("unknown tool: {}", request.tool_name)),
            );
        };

        let start = Instant::now();
        let mut attempt: u32 = 0;
        let mut total_retry_delay_ms: u64 = 0;
        let mut last = self.invoke_once(&tool.server, request.args.clone()).await;

        while !last.success && attempt < self.config.max_retries {
            let error_type = last.error.as_ref().map(|e| e.error_type).unwrap_or(ErrorType::Permanent);
            if error_type != ErrorType::Retryable {
                break;
            }
            let delay = base_backoff_ms(self.config.retry_backoff_ms, attempt) + jitter_ms(self.config.retry_backoff_ms);
            total_retry_delay_ms += delay;
            debug!(tool = %request.tool_name, attempt, delay_ms = delay, "retrying after classified-retryable failure");
            tokio::time::sleep(Duration::from_millis(delay)).await;
            attempt += 1;
            last = self.invoke_once(&tool.server, request.args.clone()).await;
        }

        let execution_time_ms = start.elapsed().as_millis() as u64;

        let mut shaped = if last.success {
            shaper::shape(
                &last.data,
                ShapeOptions {
                    server: tool.server.clone(),
                    persona: self.persona_for(&tool.server),
                    execution_time_ms,
                    detail_level: request.detail_level.unwrap_or(DetailLevel::Standard),
                    confidence: None,
                },
            )
        } else {
            let error = last.error.clone().unwrap_or_else(|| ErrorDetail::new(ErrorType::Permanent, "unknown failure"));
            ToolResponse::failure(&tool.server, resilience::classify_error_detail(&error))
        };

        shaped.metadata.execution_time_ms = execution_time_ms;
        shaped.metadata.timestamp = Some(chrono::Utc::now());
        if attempt > 0 {
            shaped.metadata.retry_attempts = Some(attempt);
            shaped.metadata.total_retry_delay_ms = Some(total_retry_delay_ms);
        }
        shaped
    }

    /// Bounded-concurrency scatter-gather over independent requests. Takes
    /// `self` behind an `Arc` so each request's work can run as its own
    /// `tokio::spawn`ed task, gated by a shared semaphore.
    pub async fn scatter_gather(self: &Arc<Self>, requests: &[ToolRequest]) -> GatheredResult {
        let start = Instant::now();
        let mut handles = Vec::with_capacity(requests.len());

        for request in requests {
            let permit = self.semaphore.clone();
            let request = request.clone();
            let executor = self.clone();
            let fut = async move {
                let _permit = permit.acquire_owned().await.expect("semaphore never closed");
                (request.tool_name.clone(), executor.execute(&request).await)
            };
            handles.push(tokio::spawn(fut));
        }

        let mut results = HashMap::new();
        let mut failures = Vec::new();
        for handle in handles {
            let (tool_name, response) = handle.await.expect("scatter-gather task panicked");
            if !response.success {
                let error = response.error.clone().unwrap_or_else(|| ErrorDetail::new(ErrorType::Permanent, "unknown failure"));
                let server_name = tool_name.split('.').next().unwrap_or(&tool_name).to_string();
                let recovery_guide = Some(resilience::build_recovery_guide(error.error_type, &error.message, &server_name));
                failures.push(FailureEntry { tool_name: tool_name.clone(), error, recovery_guide });
            }
            results.insert(tool_name, response);
        }

        let completeness = GatheredResult::compute_completeness(requests.len() - failures.len(), requests.len());
        GatheredResult { results, failures, completeness, total_time_ms: start.elapsed().as_millis() as u64 }
    }

    /// Topologically layers bundle steps into phases, per the dependency
    /// edges in `dependsOn`. Detects cycles and unresolved references,
    /// returning a `permanent`-classified `KernelError`.
    pub fn resolve_phases(steps: &[BundleStep]) -> Result<Vec<Vec<BundleStep>>, KernelError> {
        let names: HashMap<&str, &BundleStep> = steps.iter().map(|s| (s.tool_name.as_str(), s)).collect();
        for step in steps {
            for dep in &step.depends_on {
                if !names.contains_key(dep.as_str()) {
                    return Err(KernelError::Config(format!(
                        "bundle step {} depends on undefined step {}",
                        step.tool_name, dep
                    )));
                }
            }
        }

        let mut remaining: Vec<&BundleStep> = steps.iter().collect();
        let mut resolved: Vec<String> = Vec::new();
        let mut phases: Vec<Vec<BundleStep>> = Vec::new();

        while !remaining.is_empty() {
            let (ready, rest): (Vec<&BundleStep>, Vec<&BundleStep>) = remaining
                .into_iter()
                .partition(|s| s.depends_on.iter().all(|d| resolved.contains(d)));

            if ready.is_empty() {
                return Err(KernelError::Config("bundle step dependency graph contains a cycle".to_string()));
            }

            resolved.extend(ready.iter().map(|s| s.tool_name.clone()));
            phases.push(ready.into_iter().cloned().collect());
            remaining = rest;
        }

        Ok(phases)
    }

    /// Executes a phased bundle. Required-predecessor failures mark
    /// dependents as failed without invocation, per §4.7.
    pub async fn execute_bundle_steps(
        self: &Arc<Self>,
        phases: &[Vec<BundleStep>],
        args: &Value,
    ) -> GatheredResult {
        let start = Instant::now();
        let mut results: HashMap<String, ToolResponse> = HashMap::new();
        let mut failures: Vec<FailureEntry> = Vec::new();
        let mut failed_required: std::collections::HashSet<String> = std::collections::HashSet::new();
        let total_requested: usize = phases.iter().map(|p| p.len()).sum();

        for phase in phases {
            let mut to_invoke = Vec::new();
            for step in phase {
                let blocked_dep = step.depends_on.iter().find(|d| failed_required.contains(*d));
                if let Some(dep) = blocked_dep {
                    let error = ErrorDetail::new(ErrorType::UserAction, format!("dependency failed: {dep}"));
                    warn!(step = %step.tool_name, dependency = %dep, "skipping step, required predecessor failed");
                    let response = ToolResponse::failure(&step.tool_name, error.clone());
                    if !step.optional {
                        failed_required.insert(step.tool_name.clone());
                    }
                    failures.push(FailureEntry { tool_name: step.tool_name.clone(), error, recovery_guide: None });
                    results.insert(step.tool_name.clone(), response.clone());
                } else {
                    to_invoke.push(step.clone());
                }
            }

            let requests: Vec<ToolRequest> = to_invoke
                .iter()
                .map(|step| {
                    let mut request = ToolRequest::new(step.tool_name.clone(), args.clone());
                    request.detail_level = step.detail_level;
                    request
                })
                .collect();

            let gathered = self.scatter_gather(&requests).await;
            for step in &to_invoke {
                if let Some(response) = gathered.results.get(&step.tool_name) {
                    if !response.success && !step.optional {
                        failed_required.insert(step.tool_name.clone());
                    }
                    results.insert(step.tool_name.clone(), response.clone());
                }
            }
            failures.extend(gathered.failures);
        }

        let successful = total_requested - failures.len();
        debug!(total_requested, failed = failures.len(), "bundle phase execution complete");

        GatheredResult {
            results,
            failures,
            completeness: GatheredResult::compute_completeness(successful, total_requested),
            total_time_ms: start.elapsed().as_millis() as u64,
        }
    }

    /// `executeWithConfirmation`: gates a `requiresConfirmation` tool behind
    /// a single-use `PendingAction`.
    pub async fn execute_with_confirmation(&self, request: &ToolRequest) -> ToolResponse {
        let Some(tool) = self.resolve_tool(&request.tool_name) else {
            return ToolResponse::failure(
                &request.tool_name,
                ErrorDetail::new(ErrorType::Permanent, format!("unknown tool: {}", request.tool_name)),
            );
        };

        if !tool.requires_confirmation {
            return self.execute(request).await;
        }

        let action = PendingAction {
            action_id: Uuid::new_v4(),
            tool_name: request.tool_name.clone(),
            args: request.args.clone(),
            created_at: chrono::Utc::now(),
        };
        let action_id = action.action_id;
        self.pending.lock().await.insert(action_id, action.clone());

        ToolResponse {
            success: true,
            summary: format!("{} requires confirmation before executing.", tool.name),
            confidence: 0,
            data: serde_json::json!({
                "requires_confirmation": true,
                "pending_action": {
                    "actionId": action.action_id,
                    "toolName": action.tool_name,
                    "args": action.args,
                },
            }),
            detail_level: request.detail_level.unwrap_or(DetailLevel::Standard),
            completeness: 100,
            metadata: ResponseMetadata { server: tool.server.clone(), ..Default::default() },
            error: None,
        }
    }

    /// Invokes the originally-gated request and removes the pending entry.
    /// Returns `None` if `action_id` is unknown (already confirmed, cancelled,
    /// or never existed).
    pub async fn confirm_action(&self, action_id: Uuid) -> Option<ToolResponse> {
        let action = self.pending.lock().await.remove(&action_id)?;
        let request = ToolRequest::new(action.tool_name, action.args);
        Some(self.execute(&request).await)
    }

    /// Removes a pending action. Returns whether it existed.
    pub async fn cancel_action(&self, action_id: Uuid) -> bool {
        self.pending.lock().await.remove(&action_id).is_some()
    }
}

#[cfg(test)]
mod tests;
