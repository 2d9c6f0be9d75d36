//! A deterministic fake [`ToolInvoker`] used only by the demo CLI. It
//! returns canned, domain-shaped payloads keyed off the server's registry
//! domain so the shaper's per-domain projection has something real to act
//! on — this is the kernel's own behavior on display, not a stand-in for
//! the fourteen real domain workers (§1 Non-goals: their semantic content
//! is out of scope).

use crate::executor::ToolInvoker;
use crate::model::ToolResponse;
use crate::registry::Registry;
use async_trait::async_trait;
use serde_json::{json, Value};

pub struct DemoInvoker {
    registry: Registry,
}

impl DemoInvoker {
    pub fn new() -> Self {
        Self { registry: Registry::with_defaults() }
    }

    fn canned_payload(&self, server_name: &str) -> Value {
        let domain = self.registry.resolve_server(server_name).map(|s| s.domain.as_str()).unwrap_or("unknown");
        match domain {
            "geological" => json!({
                "geological": {
                    "reservoirQuality": "good",
                    "recommendedAction": "proceed to drilling",
                    "professionalSummary": "Favorable stratigraphy with moderate structural risk.",
                    "hydrocarbonPotential": "moderate-high",
                    "geologicalConfidence": 82,
                    "keyRisks": ["fault proximity", "seal integrity"],
                    "confidence": 82
                }
            }),
            "economic" => json!({
                "economic": {
                    "npv": 14_200_000.0,
                    "irr": 19,
                    "roi": 1.6,
                    "paybackMonths": 16,
                    "confidence": 78,
                    "sensitivityAnalysis": { "oilPrice": { "low": 8_000_000.0, "high": 21_000_000.0 } }
                }
            }),
            "curve" => json!({
                "curve": {
                    "initialRate": 520,
                    "eur": 910_000.0,
                    "qualityGrade": "B+",
                    "confidence": 74
                }
            }),
            "risk" => json!({
                "risk": {
                    "overallRiskScore": 41,
                    "confidence": 70
                }
            }),
            _ => json!({ "confidence": 65, "persona_notes": format!("{server_name} demo output") }),
        }
    }
}

impl Default for DemoInvoker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolInvoker for DemoInvoker {
    async fn invoke(&self, server_name: &str, _args: Value) -> Result<ToolResponse, String> {
        let data = self.canned_payload(server_name);
        Ok(ToolResponse {
            success: true,
            summary: String::new(),
            confidence: 0,
            data,
            detail_level: crate::model::DetailLevel::Full,
            completeness: 100,
            metadata: crate::model::ResponseMetadata { server: server_name.to_string(), ..Default::default() },
            error: None,
        })
    }
}
