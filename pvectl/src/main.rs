use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use tabled::{Table, Tabled};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

use pvectl::api::{ApiClient, ClientConfig, WorkloadClient};
use pvectl::model::{Node, Resource, ResourceKind};
use pvectl::operation::{ExecutionReport, Operation, OperationResult, Outcome};
use pvectl::orchestrator::{
    Confirmation, ExecuteOptions, ImpactSummary, KindStrategy, Orchestrator, StrategyRegistry,
    confirmation_for, is_affirmative,
};
use pvectl::repository::{NodeRepository, WorkloadRepository};
use pvectl::resolver::Resolver;
use pvectl::retry::RetryPolicy;
use pvectl::selector::Selector;
use pvectl::targets::{Requested, select_targets};

const EXIT_USAGE: u8 = 2;
const EXIT_DECLINED: u8 = 130;

#[derive(Parser)]
#[command(name = "pvectl")]
#[command(about = "Lifecycle control for cluster VMs and containers", long_about = None)]
struct Cli {
    /// API server address
    #[arg(short, long, env = "PVECTL_SERVER", default_value = "https://localhost:8006")]
    server: String,

    /// Authorization header value, e.g. PVEAPIToken=user@pam!id=secret
    #[arg(long, env = "PVECTL_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Skip TLS certificate verification
    #[arg(long)]
    insecure: bool,

    /// Retries for transient API errors (0 disables)
    #[arg(long, default_value = "3")]
    retries: u32,

    /// Also retry lifecycle calls on transient errors
    #[arg(long)]
    retry_writes: bool,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List VMs, containers or nodes
    List {
        #[arg(value_enum, default_value = "vms")]
        what: ListKind,

        /// Filter with a selector, e.g. status=running,tags=prod
        #[arg(short = 'l', long = "selector")]
        selectors: Vec<String>,

        /// Only list workloads on this node
        #[arg(long)]
        node: Option<String>,
    },

    /// Start workloads
    Start(LifecycleArgs),

    /// Hard stop workloads
    Stop(LifecycleArgs),

    /// Gracefully shut down workloads
    Shutdown(LifecycleArgs),

    /// Reboot workloads
    Restart(LifecycleArgs),

    /// Hard reset VMs
    Reset(LifecycleArgs),

    /// Suspend VMs
    Suspend(LifecycleArgs),

    /// Resume suspended VMs
    Resume(LifecycleArgs),

    /// Delete workloads
    Delete(LifecycleArgs),

    /// Convert workloads to templates
    Template(LifecycleArgs),
}

impl Commands {
    fn operation(&self) -> Option<(Operation, &LifecycleArgs)> {
        let (operation, args) = match self {
            Commands::List { .. } => return None,
            Commands::Start(args) => (Operation::Start, args),
            Commands::Stop(args) => (Operation::Stop, args),
            Commands::Shutdown(args) => (Operation::Shutdown, args),
            Commands::Restart(args) => (Operation::Restart, args),
            Commands::Reset(args) => (Operation::Reset, args),
            Commands::Suspend(args) => (Operation::Suspend, args),
            Commands::Resume(args) => (Operation::Resume, args),
            Commands::Delete(args) => (Operation::Delete, args),
            Commands::Template(args) => (Operation::ConvertToTemplate, args),
        };
        Some((operation, args))
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ListKind {
    Vms,
    Containers,
    Nodes,
}

#[derive(Args)]
struct LifecycleArgs {
    /// VM/container IDs
    #[arg(conflicts_with = "all")]
    ids: Vec<u32>,

    /// Target every workload in the cluster
    #[arg(long)]
    all: bool,

    /// Filter targets with a selector, e.g. status=running,tags=prod
    #[arg(short = 'l', long = "selector")]
    selectors: Vec<String>,

    /// Return after dispatch without waiting for tasks
    #[arg(long = "async")]
    detach: bool,

    /// Wait for each task to finish (default; --async wins)
    #[arg(long)]
    wait: bool,

    /// Stop at the first failure
    #[arg(long)]
    fail_fast: bool,

    /// Seconds to wait for each task
    #[arg(long, default_value = "60")]
    timeout: u64,

    /// Do not ask for confirmation
    #[arg(short, long)]
    yes: bool,
}

#[derive(Tabled)]
struct WorkloadRow {
    #[tabled(rename = "ID")]
    id: u32,
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "NODE")]
    node: String,
    #[tabled(rename = "STATUS")]
    status: String,
    #[tabled(rename = "TAGS")]
    tags: String,
    #[tabled(rename = "POOL")]
    pool: String,
    #[tabled(rename = "TEMPLATE")]
    template: &'static str,
}

impl From<Resource> for WorkloadRow {
    fn from(resource: Resource) -> Self {
        Self {
            id: resource.id,
            name: resource.display_name().to_string(),
            node: resource.node,
            status: resource.status,
            tags: resource
                .tags
                .map(|t| t.join(";"))
                .unwrap_or_else(|| "-".to_string()),
            pool: resource.pool.unwrap_or_else(|| "-".to_string()),
            template: if resource.is_template { "yes" } else { "no" },
        }
    }
}

#[derive(Tabled)]
struct NodeRow {
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "STATUS")]
    status: String,
}

impl From<Node> for NodeRow {
    fn from(node: Node) -> Self {
        Self {
            name: node.name,
            status: node.status,
        }
    }
}

#[derive(Tabled)]
struct ResultRow {
    #[tabled(rename = "ID")]
    id: u32,
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "RESULT")]
    result: &'static str,
    #[tabled(rename = "TASK")]
    task: String,
    #[tabled(rename = "ERROR")]
    error: String,
}

impl From<&OperationResult> for ResultRow {
    fn from(result: &OperationResult) -> Self {
        Self {
            id: result.resource().id,
            name: result.resource().display_name().to_string(),
            result: match result.outcome() {
                Outcome::Success => "ok",
                Outcome::Failure => "failed",
                Outcome::Pending => "pending",
            },
            task: result.task().unwrap_or("-").to_string(),
            error: result.error().unwrap_or("").to_string(),
        }
    }
}

/// Shared handles for one invocation.
struct Session {
    api: Arc<ApiClient>,
    registry: StrategyRegistry,
}

impl Session {
    fn new(cli: &Cli) -> pvectl::Result<Self> {
        let retry = RetryPolicy::new(cli.retries, Duration::from_secs(1), Duration::from_secs(30))
            .with_retry_writes(cli.retry_writes);
        let mut config = ClientConfig::new(&cli.server);
        config.authorization = cli.token.clone();
        config.insecure = cli.insecure;
        config.retry = retry;

        let api = Arc::new(ApiClient::new(config)?);
        let registry = StrategyRegistry::new()
            .with(KindStrategy::vm(Arc::new(WorkloadClient::vms(api.clone()))))
            .with(KindStrategy::container(Arc::new(WorkloadClient::containers(
                api.clone(),
            ))));
        Ok(Self { api, registry })
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| format!("pvectl={level}").into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

async fn list(
    session: &Session,
    what: ListKind,
    selectors: &[String],
    node: Option<&str>,
) -> anyhow::Result<ExitCode> {
    let selector = Selector::parse_all(selectors)?;

    match what {
        ListKind::Nodes => {
            let nodes = selector.apply(session.api.list_nodes().await?)?;
            if nodes.is_empty() {
                println!("No nodes found");
            } else {
                let rows: Vec<NodeRow> = nodes.into_iter().map(NodeRow::from).collect();
                println!("{}", Table::new(rows));
            }
        }
        ListKind::Vms | ListKind::Containers => {
            let kind = match what {
                ListKind::Containers => ResourceKind::Container,
                _ => ResourceKind::Vm,
            };
            let strategy = session
                .registry
                .get(kind)
                .with_context(|| format!("no handler registered for {kind} workloads"))?;
            let resources = selector.apply(strategy.repository().list(node).await?)?;
            if resources.is_empty() {
                println!("No {}s found", strategy.resource_label());
            } else {
                let rows: Vec<WorkloadRow> = resources.into_iter().map(WorkloadRow::from).collect();
                println!("{}", Table::new(rows));
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

async fn confirm(summary: &ImpactSummary) -> anyhow::Result<bool> {
    let mut stderr = tokio::io::stderr();
    stderr.write_all(summary.to_string().as_bytes()).await?;
    stderr.flush().await?;

    let mut answer = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut answer)
        .await
        .context("failed to read confirmation")?;
    Ok(is_affirmative(&answer))
}

async fn lifecycle(
    session: &Session,
    operation: Operation,
    args: &LifecycleArgs,
) -> anyhow::Result<ExitCode> {
    let selector = Selector::parse_all(&args.selectors)?;
    let requested = if args.all || (args.ids.is_empty() && !selector.is_empty()) {
        Requested::All
    } else if args.ids.is_empty() {
        eprintln!("Error: give IDs, --all or a selector");
        return Ok(ExitCode::from(EXIT_USAGE));
    } else {
        Requested::Ids(args.ids.clone())
    };

    let resolver = Resolver::new(session.api.clone());
    let targets = select_targets(&resolver, &session.registry, &requested, &selector).await?;
    for id in &targets.missing {
        eprintln!("Warning: {id} not found in cluster");
    }
    if targets.resources.is_empty() {
        eprintln!("No matching resources");
        return Ok(ExitCode::from(EXIT_USAGE));
    }

    if let Confirmation::Required(summary) =
        confirmation_for(operation, &targets.resources, args.yes)
        && !confirm(&summary).await?
    {
        eprintln!("Aborted");
        return Ok(ExitCode::from(EXIT_DECLINED));
    }

    let options = ExecuteOptions {
        detach: args.detach,
        wait: args.wait,
        fail_fast: args.fail_fast,
        timeout: Duration::from_secs(args.timeout),
    };
    info!(
        operation = %operation,
        count = targets.resources.len(),
        detach = options.detach,
        "Executing"
    );

    let orchestrator = Orchestrator::new(
        &session.registry,
        session.api.as_ref(),
        session.api.retry_policy().clone(),
    );
    let results = orchestrator
        .execute(operation, &targets.resources, &options)
        .await;
    let report = ExecutionReport::new(results, targets.resources.len());

    let rows: Vec<ResultRow> = report.results().iter().map(ResultRow::from).collect();
    println!("{}", Table::new(rows));
    println!("{report}");

    Ok(ExitCode::from(report.exit_code()))
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let session = Session::new(&cli)?;

    match &cli.command {
        Commands::List {
            what,
            selectors,
            node,
        } => list(&session, *what, selectors, node.as_deref()).await,
        command => match command.operation() {
            Some((operation, args)) => lifecycle(&session, operation, args).await,
            None => Ok(ExitCode::SUCCESS),
        },
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            let usage = e
                .downcast_ref::<pvectl::Error>()
                .is_some_and(pvectl::Error::is_usage_error);
            ExitCode::from(if usage { EXIT_USAGE } else { 1 })
        }
    }
}
