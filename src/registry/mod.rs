//! Static catalog of servers, tools, capabilities, and the tool→permission
//! mapping. Built once at startup and never mutated afterward (§9: "Global
//! state... initialized at startup and never mutated").

use crate::model::{Permission, Server, ServerFilter, Tool, ToolType};
use std::collections::HashMap;

/// Input record used to build one [`Server`] entry.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub name: &'static str,
    pub domain: &'static str,
    pub persona: &'static str,
    pub capabilities: &'static [&'static str],
    pub is_command: bool,
}

/// The fourteen domain workers in the fleet (§1, §4.1). Ten are
/// `geowiz` through `decision`; `landman`, `drilling-ops`, `environmental`,
/// and `regulatory` round the fleet out to its stated size of fourteen —
/// see `DESIGN.md` for the rationale.
pub fn default_server_configs() -> Vec<ServerConfig> {
    vec![
        ServerConfig {
            name: "geowiz",
            domain: "geological",
            persona: "Structural geologist",
            capabilities: &["formation analysis", "reservoir quality", "stratigraphy"],
            is_command: false,
        },
        ServerConfig {
            name: "econobot",
            domain: "economic",
            persona: "Petroleum economist",
            capabilities: &["npv modeling", "irr analysis", "cash flow projection"],
            is_command: false,
        },
        ServerConfig {
            name: "curve-smith",
            domain: "curve",
            persona: "Production engineer",
            capabilities: &["decline curve analysis", "eur estimation", "type curve fitting"],
            is_command: false,
        },
        ServerConfig {
            name: "risk-analysis",
            domain: "risk",
            persona: "Risk quantification analyst",
            capabilities: &["geological risk", "operational risk", "portfolio risk scoring"],
            is_command: false,
        },
        ServerConfig {
            name: "market",
            domain: "market",
            persona: "Commodity market analyst",
            capabilities: &["price forecasting", "basis differentials", "market intelligence"],
            is_command: false,
        },
        ServerConfig {
            name: "research",
            domain: "research",
            persona: "General research analyst",
            capabilities: &["literature review", "comparable analysis", "general research"],
            is_command: false,
        },
        ServerConfig {
            name: "legal",
            domain: "legal",
            persona: "Oil and gas attorney",
            capabilities: &["contract review", "lease terms", "legal risk"],
            is_command: false,
        },
        ServerConfig {
            name: "title",
            domain: "title",
            persona: "Title examiner",
            capabilities: &["title search", "ownership verification", "chain of title"],
            is_command: false,
        },
        ServerConfig {
            name: "landman",
            domain: "land",
            persona: "Landman",
            capabilities: &["lease acquisition", "mineral rights", "surface agreements"],
            is_command: false,
        },
        ServerConfig {
            name: "drilling-ops",
            domain: "drilling",
            persona: "Drilling engineer",
            capabilities: &["well design", "drilling cost estimation", "completion planning"],
            is_command: false,
        },
        ServerConfig {
            name: "environmental",
            domain: "environmental",
            persona: "Environmental compliance analyst",
            capabilities: &["environmental impact", "spill risk", "permitting"],
            is_command: false,
        },
        ServerConfig {
            name: "regulatory",
            domain: "regulatory",
            persona: "Regulatory compliance analyst",
            capabilities: &["permit compliance", "regulatory filings", "jurisdictional review"],
            is_command: false,
        },
        ServerConfig {
            name: "reporter",
            domain: "reporting",
            persona: "Report generator",
            capabilities: &["report generation", "document assembly"],
            is_command: true,
        },
        ServerConfig {
            name: "decision",
            domain: "decision",
            persona: "Investment decision engine",
            capabilities: &["investment recommendation", "go/no-go decision"],
            is_command: true,
        },
    ]
}

/// Returns the permission required to invoke `tool_name`, a pure function
/// of the leading (server) segment — §4.1 / §9 Open Question: `.analyze`,
/// `.make_recommendation`, and `.generate_report` suffixes are all resolved
/// the same way, by server name alone.
pub fn required_permission_for(tool_name: &str) -> Permission {
    let server = tool_name.split('.').next().unwrap_or(tool_name);
    match server {
        "reporter" => Permission::WriteReports,
        "decision" => Permission::ExecuteDecisions,
        s if s.starts_with("admin") => Permission::AdminServers,
        _ => Permission::ReadAnalysis,
    }
}

pub struct Registry {
    servers: HashMap<String, Server>,
    tools: HashMap<String, Tool>,
}

impl Registry {
    /// Builds the registry from a static list of server configurations.
    /// Idempotent: calling this twice with the same input yields identical
    /// state (no mutable global, no incremental registration order effect).
    pub fn new(configs: Vec<ServerConfig>) -> Self {
        let mut servers = HashMap::new();
        let mut tools = HashMap::new();
        for cfg in configs {
            let server = Server {
                name: cfg.name.to_string(),
                domain: cfg.domain.to_string(),
                persona: cfg.persona.to_string(),
                capabilities: cfg.capabilities.iter().map(|s| s.to_string()).collect(),
            };
            let tool = Tool::for_server(cfg.name, cfg.is_command);
            tools.insert(tool.name.clone(), tool);
            servers.insert(server.name.clone(), server);
        }
        Self { servers, tools }
    }

    pub fn with_defaults() -> Self {
        Self::new(default_server_configs())
    }

    pub fn list_servers(&self, filter: Option<&ServerFilter>) -> Vec<&Server> {
        let mut out: Vec<&Server> = self
            .servers
            .values()
            .filter(|s| match filter {
                None => true,
                Some(f) => {
                    let domain_ok = f.domain.as_ref().map_or(true, |d| d.eq_ignore_ascii_case(&s.domain));
                    let type_ok = f.tool_type.map_or(true, |t| {
                        self.tools
                            .get(&format!("{}.analyze", s.name))
                            .map(|tool| tool.tool_type == t)
                            .unwrap_or(false)
                    });
                    let cap_ok = f.capability.as_ref().map_or(true, |c| {
                        let needle = c.to_lowercase();
                        s.capabilities.iter().any(|cap| cap.to_lowercase().contains(&needle))
                    });
                    domain_ok && type_ok && cap_ok
                }
            })
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    /// Describes the tools for a single server, or every tool when
    /// `server_name` is `None`.
    pub fn describe_tools(&self, server_name: Option<&str>) -> Vec<&Tool> {
        let mut out: Vec<&Tool> = self
            .tools
            .values()
            .filter(|t| server_name.map_or(true, |name| t.server == name))
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    /// Case-insensitive substring match over capability strings.
    pub fn find_capability(&self, name: &str) -> Vec<&Server> {
        let needle = name.to_lowercase();
        let mut out: Vec<&Server> = self
            .servers
            .values()
            .filter(|s| s.capabilities.iter().any(|cap| cap.to_lowercase().contains(&needle)))
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    /// Resolves a server from either `server.verb` or a bare server name.
    pub fn resolve_server(&self, name: &str) -> Option<&Server> {
        let bare = name.split('.').next().unwrap_or(name);
        self.servers.get(bare)
    }

    pub fn resolve_tool(&self, tool_name: &str) -> Option<&Tool> {
        let bare = tool_name.split('.').next().unwrap_or(tool_name);
        let canonical = format!("{bare}.analyze");
        self.tools.get(&canonical).or_else(|| self.tools.get(tool_name))
    }

    pub fn server_count(&self) -> usize {
        self.servers.len()
    }
}
