//! Demo CLI harness (`kernel-cli`): exercises the facade end to end against
//! a deterministic fake invoker, built with `#[derive(Parser)]` /
//! `#[derive(Subcommand)]`. This is an external-collaborator-facing demo,
//! not part of the kernel's tested core logic — the fourteen domain
//! workers remain uninterpreted strings here, never real
//! geological/economic analysis (§1 Non-goals).

mod demo_invoker;

use crate::config::{load_config, Config};
use crate::kernel::Kernel;
use crate::model::{Identity, Role, ToolRequest};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "kernel-cli")]
#[command(about = "Demo harness for the tool orchestration kernel")]
pub struct Cli {
    /// Path to a kernel config JSON file (defaults are used when omitted).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the registered domain servers.
    Servers,
    /// Call a single tool directly (e.g. `geowiz.analyze`).
    Call {
        tool: String,
        /// JSON-encoded args, e.g. '{"basin":"Permian"}'.
        #[arg(long, default_value = "{}")]
        args: String,
        /// Role to act as for this call's demo session.
        #[arg(long, default_value = "analyst")]
        role: String,
    },
    /// Run one of the four built-in bundles.
    Bundle {
        #[arg(value_enum)]
        name: BundleName,
        #[arg(long, default_value = "{}")]
        args: String,
    },
    /// Show the identity and injected context for a session.
    Whoami {
        #[arg(long)]
        session: Option<Uuid>,
    },
    /// Confirm a pending gated action by id.
    Confirm { action_id: Uuid },
    /// Cancel a pending gated action by id.
    Cancel { action_id: Uuid },
}

#[derive(Clone, clap::ValueEnum)]
enum BundleName {
    QuickScreen,
    FullDueDiligence,
    GeologicalDeepDive,
    FinancialReview,
}

fn role_from_str(role: &str) -> Role {
    match role {
        "engineer" => Role::Engineer,
        "executive" => Role::Executive,
        "admin" => Role::Admin,
        _ => Role::Analyst,
    }
}

async fn build_kernel(config_path: Option<&std::path::Path>) -> Result<Kernel> {
    let config: Config = load_config(config_path).context("loading kernel config")?;
    let kernel = Kernel::initialize(crate::registry::default_server_configs(), config.into_kernel_config());
    kernel.set_executor_fn(Arc::new(demo_invoker::DemoInvoker::new())).await;
    Ok(kernel)
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let kernel = build_kernel(cli.config.as_deref()).await?;

    match cli.command {
        Commands::Servers => {
            for server in kernel.list_servers(None) {
                println!("{:<16} {:<12} {}", server.name, server.domain, server.persona);
            }
        }
        Commands::Call { tool, args, role } => {
            let identity = Identity { user_id: Uuid::new_v4(), role: role_from_str(&role), permissions: vec![], organization: None, display_name: None };
            let session_id = kernel.create_session(Some(identity), None).await;
            let args = serde_json::from_str(&args).context("parsing --args as JSON")?;
            let request = ToolRequest::new(tool, args);
            let response = kernel.call_tool(request, Some(session_id)).await;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Commands::Bundle { name, args } => {
            let args = serde_json::from_str(&args).context("parsing --args as JSON")?;
            let result = match name {
                BundleName::QuickScreen => kernel.quick_screen(args, None).await,
                BundleName::FullDueDiligence => kernel.full_due_diligence(args, None).await,
                BundleName::GeologicalDeepDive => kernel.geological_deep_dive(args, None).await,
                BundleName::FinancialReview => kernel.financial_review(args, None).await,
            };
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Whoami { session } => {
            let who = kernel.who_am_i(session).await;
            println!("{}", serde_json::to_string_pretty(&who)?);
        }
        Commands::Confirm { action_id } => match kernel.confirm_action(action_id).await {
            Some(response) => println!("{}", serde_json::to_string_pretty(&response)?),
            None => println!("no pending action with that id"),
        },
        Commands::Cancel { action_id } => {
            println!("cancelled: {}", kernel.cancel_action(action_id).await);
        }
    }

    Ok(())
}
