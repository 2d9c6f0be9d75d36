use super::*;
use crate::executor::Executor;
use crate::model::ResponseMetadata;
use std::collections::HashMap;

#[test]
fn library_carries_exactly_the_four_named_bundles() {
    let library = BundleLibrary::with_defaults();
    let names: Vec<&str> = library.list().iter().map(|b| b.name.as_str()).collect();
    assert_eq!(names, vec!["quick_screen", "full_due_diligence", "geological_deep_dive", "financial_review"]);
}

#[test]
fn get_returns_none_for_unknown_bundle() {
    let library = BundleLibrary::with_defaults();
    assert!(library.get("nonexistent").is_none());
}

#[test]
fn quick_screen_has_four_parallel_summary_steps_and_all_strategy() {
    let library = BundleLibrary::with_defaults();
    let bundle = library.get("quick_screen").unwrap();
    assert_eq!(bundle.steps.len(), 4);
    assert_eq!(bundle.gather_strategy, GatherStrategy::All);
    assert!(bundle.steps.iter().all(|s| s.detail_level == Some(DetailLevel::Summary) && !s.optional));
}

#[test]
fn full_due_diligence_has_fourteen_steps_across_four_phases() {
    let library = BundleLibrary::with_defaults();
    let bundle = library.get("full_due_diligence").unwrap();
    assert_eq!(bundle.steps.len(), 14);
    assert_eq!(bundle.gather_strategy, GatherStrategy::Majority);

    let phases = Executor::resolve_phases(&bundle.steps).unwrap();
    assert_eq!(phases.len(), 4);
    assert_eq!(phases[0].len(), 11);
    assert_eq!(phases[1][0].tool_name, "risk-analysis.analyze");
    assert_eq!(phases[2][0].tool_name, "reporter.generate_report");
    assert_eq!(phases[3][0].tool_name, "decision.make_recommendation");
}

#[test]
fn full_due_diligence_reporter_and_decision_run_at_full_detail() {
    let library = BundleLibrary::with_defaults();
    let bundle = library.get("full_due_diligence").unwrap();
    let reporter = bundle.steps.iter().find(|s| s.tool_name == "reporter.generate_report").unwrap();
    let decision = bundle.steps.iter().find(|s| s.tool_name == "decision.make_recommendation").unwrap();
    assert_eq!(reporter.detail_level, Some(DetailLevel::Full));
    assert_eq!(decision.detail_level, Some(DetailLevel::Full));
}

#[test]
fn geological_deep_dive_marks_only_research_optional() {
    let library = BundleLibrary::with_defaults();
    let bundle = library.get("geological_deep_dive").unwrap();
    let optional: Vec<&str> = bundle.steps.iter().filter(|s| s.optional).map(|s| s.tool_name.as_str()).collect();
    assert_eq!(optional, vec!["research.analyze"]);
}

fn response(success: bool) -> crate::model::ToolResponse {
    crate::model::ToolResponse {
        success,
        summary: String::new(),
        confidence: 0,
        data: serde_json::Value::Null,
        detail_level: DetailLevel::Standard,
        completeness: if success { 100 } else { 0 },
        metadata: ResponseMetadata::default(),
        error: None,
    }
}

#[test]
fn overall_success_all_strategy_requires_every_required_step() {
    let library = BundleLibrary::with_defaults();
    let bundle = library.get("quick_screen").unwrap();
    let mut results = HashMap::new();
    for step in &bundle.steps {
        results.insert(step.tool_name.clone(), response(true));
    }
    assert!(overall_success(bundle, &results));

    results.insert("econobot.analyze".to_string(), response(false));
    assert!(!overall_success(bundle, &results));
}

#[test]
fn overall_success_ignores_optional_step_failures() {
    let library = BundleLibrary::with_defaults();
    let bundle = library.get("geological_deep_dive").unwrap();
    let mut results = HashMap::new();
    results.insert("geowiz.analyze".to_string(), response(true));
    results.insert("curve-smith.analyze".to_string(), response(true));
    results.insert("research.analyze".to_string(), response(false));
    assert!(overall_success(bundle, &results));
}

#[test]
fn overall_success_majority_strategy_needs_more_than_half() {
    let library = BundleLibrary::with_defaults();
    let bundle = library.get("full_due_diligence").unwrap();
    let mut results = HashMap::new();
    let required: Vec<&str> = bundle.steps.iter().filter(|s| !s.optional).map(|s| s.tool_name.as_str()).collect();
    let needed_successes = required.len() / 2 + 1;
    for (i, name) in required.iter().enumerate() {
        results.insert(name.to_string(), response(i < needed_successes));
    }
    assert!(overall_success(bundle, &results));
}
