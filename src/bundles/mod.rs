//! The four static, named bundles the kernel ships with (§4.8). Built once
//! as a process-wide read-only table, never mutated after startup.

use crate::model::{Bundle, BundleStep, DetailLevel, GatherStrategy};

fn quick_screen() -> Bundle {
    Bundle {
        name: "quick_screen".to_string(),
        gather_strategy: GatherStrategy::All,
        steps: ["geowiz.analyze", "econobot.analyze", "curve-smith.analyze", "risk-analysis.analyze"]
            .into_iter()
            .map(|name| BundleStep::new(name).detail(DetailLevel::Summary))
            .collect(),
    }
}

/// 14 steps across 4 phases. Phase 1 is the set of independent query steps;
/// phase 2 is risk-analysis (which needs geowiz + econobot's findings);
/// phase 3 is reporter, which needs every analysis step complete before it
/// can assemble a report; phase 4 is decision, which needs the report. This
/// is the Open Question resolution for "reporter depends on test" recorded
/// in `DESIGN.md` — read literally that dependency names a step that does
/// not exist in this bundle, so it is resolved as "reporter depends on the
/// complete set of prior analysis steps".
fn full_due_diligence() -> Bundle {
    let phase1_queries = [
        "geowiz.analyze",
        "econobot.analyze",
        "curve-smith.analyze",
        "market.analyze",
        "research.analyze",
        "legal.analyze",
        "title.analyze",
        "landman.analyze",
        "drilling-ops.analyze",
        "environmental.analyze",
        "regulatory.analyze",
    ];

    let mut steps: Vec<BundleStep> = phase1_queries.into_iter().map(BundleStep::new).collect();

    steps.push(BundleStep::new("risk-analysis.analyze").depends_on(&["geowiz.analyze", "econobot.analyze"]));

    let mut all_prior: Vec<&str> = phase1_queries.to_vec();
    all_prior.push("risk-analysis.analyze");
    steps.push(BundleStep::new("reporter.generate_report").detail(DetailLevel::Full).depends_on(&all_prior));

    steps.push(
        BundleStep::new("decision.make_recommendation")
            .detail(DetailLevel::Full)
            .depends_on(&["reporter.generate_report"]),
    );

    Bundle { name: "full_due_diligence".to_string(), gather_strategy: GatherStrategy::Majority, steps }
}

fn geological_deep_dive() -> Bundle {
    Bundle {
        name: "geological_deep_dive".to_string(),
        gather_strategy: GatherStrategy::All,
        steps: vec![
            BundleStep::new("geowiz.analyze").detail(DetailLevel::Full),
            BundleStep::new("curve-smith.analyze").detail(DetailLevel::Standard),
            BundleStep::new("research.analyze").detail(DetailLevel::Summary).optional(),
        ],
    }
}

fn financial_review() -> Bundle {
    Bundle {
        name: "financial_review".to_string(),
        gather_strategy: GatherStrategy::All,
        steps: vec![
            BundleStep::new("econobot.analyze").detail(DetailLevel::Full),
            BundleStep::new("risk-analysis.analyze").detail(DetailLevel::Standard),
            BundleStep::new("market.analyze").detail(DetailLevel::Summary).optional(),
        ],
    }
}

/// The process-wide bundle library, built once.
pub struct BundleLibrary {
    bundles: Vec<Bundle>,
}

impl BundleLibrary {
    pub fn with_defaults() -> Self {
        Self { bundles: vec![quick_screen(), full_due_diligence(), geological_deep_dive(), financial_review()] }
    }

    pub fn get(&self, name: &str) -> Option<&Bundle> {
        self.bundles.iter().find(|b| b.name == name)
    }

    pub fn list(&self) -> &[Bundle] {
        &self.bundles
    }
}

impl Default for BundleLibrary {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// `overallSuccess` per §3: `all` ⇒ every required step succeeded;
/// `majority` ⇒ more than half of required steps succeeded.
pub fn overall_success(bundle: &Bundle, results: &std::collections::HashMap<String, crate::model::ToolResponse>) -> bool {
    let required: Vec<&BundleStep> = bundle.steps.iter().filter(|s| !s.optional).collect();
    if required.is_empty() {
        return true;
    }
    let succeeded = required.iter().filter(|s| results.get(&s.tool_name).map(|r| r.success).unwrap_or(false)).count();
    match bundle.gather_strategy {
        GatherStrategy::All => succeeded == required.len(),
        GatherStrategy::Majority => succeeded * 2 > required.len(),
    }
}

#[cfg(test)]
mod tests;
