use super::*;
use crate::model::DetailLevel;
use crate::registry::Registry;
use std::sync::atomic::{AtomicU32, Ordering};

struct FixedInvoker {
    response: ToolResponse,
}

#[async_trait]
impl ToolInvoker for FixedInvoker {
    async fn invoke(&self, _server_name: &str, _args: Value) -> Result<ToolResponse, String> {
        Ok(self.response.clone())
    }
}

fn success_response() -> ToolResponse {
    ToolResponse {
        success: true,
        summary: "ok".to_string(),
        confidence: 90,
        data: serde_json::json!({"geological": {"confidence": 90}}),
        detail_level: DetailLevel::Standard,
        completeness: 100,
        metadata: Default::default(),
        error: None,
    }
}

async fn executor_with(invoker: Arc<dyn ToolInvoker>) -> Arc<Executor> {
    let registry = Arc::new(Registry::with_defaults());
    let executor = Arc::new(Executor::new(registry, ExecutorConfig::default()));
    executor.set_invoker(invoker).await;
    executor
}

#[test]
fn idempotency_key_is_deterministic_and_order_insensitive() {
    let session = Uuid::new_v4();
    let a = serde_json::json!({"basin": "Permian", "depth": 8000});
    let b = serde_json::json!({"depth": 8000, "basin": "Permian"});
    assert_eq!(
        generate_idempotency_key("geowiz.analyze", &a, session),
        generate_idempotency_key("geowiz.analyze", &b, session)
    );
}

#[test]
fn idempotency_key_differs_by_tool_name() {
    let session = Uuid::new_v4();
    let args = serde_json::json!({"basin": "Permian"});
    assert_ne!(
        generate_idempotency_key("geowiz.analyze", &args, session),
        generate_idempotency_key("econobot.analyze", &args, session)
    );
}

#[test]
fn idempotency_key_differs_by_session() {
    let args = serde_json::json!({"basin": "Permian"});
    let a = generate_idempotency_key("geowiz.analyze", &args, Uuid::new_v4());
    let b = generate_idempotency_key("geowiz.analyze", &args, Uuid::new_v4());
    assert_ne!(a, b);
}

#[test]
fn idempotency_key_differs_by_arg_value() {
    let session = Uuid::new_v4();
    let a = serde_json::json!({"basin": "Permian"});
    let b = serde_json::json!({"basin": "Bakken"});
    assert_ne!(
        generate_idempotency_key("geowiz.analyze", &a, session),
        generate_idempotency_key("geowiz.analyze", &b, session)
    );
}

#[test]
fn idempotency_key_is_sixteen_hex_chars() {
    let key = generate_idempotency_key("geowiz.analyze", &serde_json::json!({}), Uuid::new_v4());
    assert_eq!(key.len(), 16);
    assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
}

#[tokio::test]
async fn execute_unknown_tool_fails_without_invoking() {
    let executor = executor_with(Arc::new(FixedInvoker { response: success_response() })).await;
    let response = executor.execute(&ToolRequest::new("nonexistent.analyze", serde_json::json!({}))).await;
    assert!(!response.success);
    assert_eq!(response.error.unwrap().error_type, ErrorType::Permanent);
}

#[tokio::test]
async fn execute_without_invoker_reports_not_connected() {
    let registry = Arc::new(Registry::with_defaults());
    let executor = Arc::new(Executor::new(registry, ExecutorConfig::default()));
    let response = executor.execute(&ToolRequest::new("geowiz.analyze", serde_json::json!({}))).await;
    assert!(!response.success);
    assert!(response.error.unwrap().message.contains("not connected"));
}

#[tokio::test]
async fn execute_happy_path_shapes_the_response() {
    let executor = executor_with(Arc::new(FixedInvoker { response: success_response() })).await;
    let response = executor.execute(&ToolRequest::new("geowiz.analyze", serde_json::json!({}))).await;
    assert!(response.success);
    assert_eq!(response.confidence, 90);
    assert_eq!(response.metadata.server, "geowiz");
}

struct CountingInvoker {
    calls: AtomicU32,
    error_message: String,
}

#[async_trait]
impl ToolInvoker for CountingInvoker {
    async fn invoke(&self, server_name: &str, _args: Value) -> Result<ToolResponse, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ToolResponse::failure(server_name, ErrorDetail::new(ErrorType::Retryable, self.error_message.clone())))
    }
}

#[tokio::test]
async fn retry_exhaustion_invokes_exactly_max_retries_plus_one() {
    let invoker = Arc::new(CountingInvoker { calls: AtomicU32::new(0), error_message: "429".to_string() });
    let registry = Arc::new(Registry::with_defaults());
    let config = ExecutorConfig { max_retries: 2, retry_backoff_ms: 1, ..Default::default() };
    let executor = Arc::new(Executor::new(registry, config));
    executor.set_invoker(invoker.clone()).await;

    let response = executor.execute(&ToolRequest::new("geowiz.analyze", serde_json::json!({}))).await;

    assert_eq!(invoker.calls.load(Ordering::SeqCst), 3);
    assert!(!response.success);
    assert_eq!(response.metadata.retry_attempts, Some(2));
    assert!(response.metadata.total_retry_delay_ms.unwrap() > 0);
}

struct PermanentInvoker;

#[async_trait]
impl ToolInvoker for PermanentInvoker {
    async fn invoke(&self, server_name: &str, _args: Value) -> Result<ToolResponse, String> {
        Ok(ToolResponse::failure(server_name, ErrorDetail::new(ErrorType::Permanent, "malformed request")))
    }
}

#[tokio::test]
async fn permanent_failure_is_invoked_exactly_once() {
    let invoker = Arc::new(PermanentInvoker);
    let executor = executor_with(invoker).await;
    let response = executor.execute(&ToolRequest::new("geowiz.analyze", serde_json::json!({}))).await;
    assert!(!response.success);
    assert_eq!(response.metadata.retry_attempts, None);
}

#[tokio::test]
async fn backoff_grows_monotonically_with_attempt() {
    for attempt in 0..4 {
        assert!(base_backoff_ms(100, attempt + 1) > base_backoff_ms(100, attempt));
    }
}

struct ConcurrencyProbe {
    in_flight: Arc<std::sync::atomic::AtomicUsize>,
    max_observed: Arc<std::sync::atomic::AtomicUsize>,
}

#[async_trait]
impl ToolInvoker for ConcurrencyProbe {
    async fn invoke(&self, server_name: &str, _args: Value) -> Result<ToolResponse, String> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_observed.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(ToolResponse::failure(server_name, ErrorDetail::new(ErrorType::Permanent, "n/a")))
    }
}

#[tokio::test]
async fn scatter_gather_respects_max_parallel_bound() {
    let in_flight = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let max_observed = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let invoker = Arc::new(ConcurrencyProbe { in_flight: in_flight.clone(), max_observed: max_observed.clone() });
    let registry = Arc::new(Registry::with_defaults());
    let config = ExecutorConfig { max_parallel: 2, max_retries: 0, ..Default::default() };
    let executor = Arc::new(Executor::new(registry, config));
    executor.set_invoker(invoker).await;

    let requests: Vec<ToolRequest> = ["geowiz.analyze", "econobot.analyze", "curve-smith.analyze", "market.analyze"]
        .iter()
        .map(|name| ToolRequest::new(*name, serde_json::json!({})))
        .collect();

    let gathered = executor.scatter_gather(&requests).await;
    assert_eq!(gathered.results.len(), 4);
    assert!(max_observed.load(Ordering::SeqCst) <= 2);
}

#[tokio::test]
async fn scatter_gather_collects_every_outcome_even_with_failures() {
    let invoker = Arc::new(CountingInvoker { calls: AtomicU32::new(0), error_message: "invalid".to_string() });
    let registry = Arc::new(Registry::with_defaults());
    let config = ExecutorConfig { max_retries: 0, ..Default::default() };
    let executor = Arc::new(Executor::new(registry, config));
    executor.set_invoker(invoker).await;

    let requests = vec![ToolRequest::new("geowiz.analyze", serde_json::json!({})), ToolRequest::new("econobot.analyze", serde_json::json!({}))];
    let gathered = executor.scatter_gather(&requests).await;
    assert_eq!(gathered.results.len(), 2);
    assert_eq!(gathered.failures.len(), 2);
    assert_eq!(gathered.completeness, 0);
}

#[test]
fn resolve_phases_layers_by_dependency() {
    let steps = vec![
        BundleStep::new("geowiz.analyze"),
        BundleStep::new("econobot.analyze"),
        BundleStep::new("risk-analysis.analyze").depends_on(&["geowiz.analyze", "econobot.analyze"]),
        BundleStep::new("reporter.generate_report").depends_on(&["risk-analysis.analyze"]),
    ];
    let phases = Executor::resolve_phases(&steps).unwrap();
    assert_eq!(phases.len(), 3);
    assert_eq!(phases[0].len(), 2);
    assert_eq!(phases[1][0].tool_name, "risk-analysis.analyze");
    assert_eq!(phases[2][0].tool_name, "reporter.generate_report");
}

#[test]
fn resolve_phases_detects_cycles() {
    let steps = vec![
        BundleStep::new("a").depends_on(&["b"]),
        BundleStep::new("b").depends_on(&["a"]),
    ];
    assert!(Executor::resolve_phases(&steps).is_err());
}

#[test]
fn resolve_phases_rejects_undefined_dependency() {
    let steps = vec![BundleStep::new("a").depends_on(&["ghost"])];
    assert!(Executor::resolve_phases(&steps).is_err());
}

#[tokio::test]
async fn required_predecessor_failure_blocks_dependent_step() {
    let invoker = Arc::new(PermanentInvoker);
    let executor = executor_with(invoker).await;

    let steps = vec![
        BundleStep::new("geowiz.analyze"),
        BundleStep::new("risk-analysis.analyze").depends_on(&["geowiz.analyze"]),
    ];
    let phases = Executor::resolve_phases(&steps).unwrap();
    let gathered = executor.execute_bundle_steps(&phases, &serde_json::json!({})).await;

    let dependent_failure = gathered.results.get("risk-analysis.analyze").unwrap();
    assert!(!dependent_failure.success);
    assert_eq!(dependent_failure.error.as_ref().unwrap().error_type, ErrorType::UserAction);
    assert!(dependent_failure.error.as_ref().unwrap().reason.as_deref().unwrap_or_default().contains("geowiz.analyze")
        || dependent_failure.error.as_ref().unwrap().message.contains("geowiz.analyze"));
}

#[tokio::test]
async fn confirmation_gate_requires_confirm_before_real_invocation() {
    let invoker = Arc::new(FixedInvoker { response: success_response() });
    let executor = executor_with(invoker).await;

    let request = ToolRequest::new("decision.analyze", serde_json::json!({"basin": "Permian"}));
    let gated = executor.execute_with_confirmation(&request).await;
    assert!(gated.success);
    assert_eq!(gated.confidence, 0);
    assert_eq!(gated.data["requires_confirmation"], true);

    let action_id_str = gated.data["pending_action"]["actionId"].as_str().unwrap();
    let action_id = Uuid::parse_str(action_id_str).unwrap();

    let confirmed = executor.confirm_action(action_id).await.unwrap();
    assert!(confirmed.success);

    assert!(!executor.cancel_action(action_id).await);
}

#[tokio::test]
async fn cancelling_a_pending_action_removes_it() {
    let invoker = Arc::new(FixedInvoker { response: success_response() });
    let executor = executor_with(invoker).await;

    let request = ToolRequest::new("reporter.generate_report", serde_json::json!({}));
    let gated = executor.execute_with_confirmation(&request).await;
    let action_id_str = gated.data["pending_action"]["actionId"].as_str().unwrap();
    let action_id = Uuid::parse_str(action_id_str).unwrap();

    assert!(executor.cancel_action(action_id).await);
    assert!(executor.confirm_action(action_id).await.is_none());
}

#[tokio::test]
async fn confirming_or_cancelling_an_unknown_id_is_reported_as_absent() {
    let invoker = Arc::new(FixedInvoker { response: success_response() });
    let executor = executor_with(invoker).await;
    let unknown = Uuid::new_v4();
    assert!(executor.confirm_action(unknown).await.is_none());
    assert!(!executor.cancel_action(unknown).await);
}

#[tokio::test]
async fn non_command_tool_bypasses_the_confirmation_gate() {
    let invoker = Arc::new(FixedInvoker { response: success_response() });
    let executor = executor_with(invoker).await;
    let request = ToolRequest::new("geowiz.analyze", serde_json::json!({}));
    let response = executor.execute_with_confirmation(&request).await;
    assert!(response.success);
    assert!(response.data.get("requires_confirmation").is_none());
}

