use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use stockflow_analytics::{
    AlertScanJob, AnalyticsJob, EngineConfig, HealthJob, InventoryReportJob, RecommendationJob, Scope,
    department_efficiency, summarize_movements,
};
use stockflow_core::{NodeId, WarehouseId};
use stockflow_inventory::LedgerSnapshot;
use stockflow_observability::LogFormat;
use stockflow_routing::{
    DeliveryRecord, Network, RouteObjective, best_source, delivery_efficiency, shortest_path, shortest_routes,
};

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.log_format {
        LogFormatArg::Json => stockflow_observability::init(),
        LogFormatArg::Compact => stockflow_observability::init_with(LogFormat::Compact),
    }

    match cli.command {
        Commands::Alerts(args) => {
            let (snapshot, scope, config) = args.load()?;
            print_json(&AlertScanJob::new(snapshot.into()).with_scope(scope).with_config(config).run()?)
        }
        Commands::Recommend(args) => {
            let (snapshot, scope, config) = args.load()?;
            print_json(&RecommendationJob::new(snapshot.into()).with_scope(scope).with_config(config).run()?)
        }
        Commands::Health(args) => {
            let (snapshot, scope, config) = args.load()?;
            print_json(&HealthJob::new(snapshot.into()).with_scope(scope).with_config(config).run()?)
        }
        Commands::Report(args) => {
            let (snapshot, scope, config) = args.load()?;
            print_json(&InventoryReportJob::new(snapshot.into()).with_scope(scope).with_config(config).run()?)
        }
        Commands::Movements(args) => handle_movements(args),
        Commands::Routes(args) => handle_routes(args),
        Commands::BestSource(args) => handle_best_source(args),
        Commands::Efficiency(args) => handle_efficiency(args),
    }
}

#[derive(Parser)]
#[command(name = "stockflow", about = "Inventory analytics and distribution routing", version)]
struct Cli {
    #[arg(long, global = true, value_enum, default_value_t = LogFormatArg::Json, help = "Log line format (logs go to stderr)")]
    log_format: LogFormatArg,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Urgency-classified low-stock alerts.
    Alerts(LedgerArgs),
    /// Reorder and slow-mover recommendations with category analysis.
    Recommend(LedgerArgs),
    /// Composite inventory health score.
    Health(LedgerArgs),
    /// Alerts, recommendations and health in one report.
    Report(LedgerArgs),
    /// Stock movement and department consumption over a window.
    Movements(MovementArgs),
    /// Optimal routes from a source node.
    Routes(RouteArgs),
    /// Warehouse best placed to serve a market.
    BestSource(BestSourceArgs),
    /// Delivery cost efficiency against optimal routes.
    Efficiency(EfficiencyArgs),
}

#[derive(Args)]
struct LedgerArgs {
    #[arg(long, help = "Ledger snapshot JSON file (as_of, items, transactions)")]
    ledger: PathBuf,
    #[arg(long, value_parser = clap::value_parser!(WarehouseId), help = "Restrict to one warehouse (UUID)")]
    warehouse: Option<WarehouseId>,
    #[arg(long, help = "Engine configuration JSON file; defaults apply to missing fields")]
    config: Option<PathBuf>,
}

impl LedgerArgs {
    fn load(&self) -> Result<(LedgerSnapshot, Scope, EngineConfig)> {
        let snapshot: LedgerSnapshot = read_json(&self.ledger, "ledger snapshot")?;
        let config = match &self.config {
            Some(path) => read_json(path, "engine config")?,
            None => EngineConfig::default(),
        };
        config.validate().context("invalid engine configuration")?;
        info!(
            items = snapshot.items().len(),
            transactions = snapshot.transactions().len(),
            as_of = %snapshot.as_of(),
            "ledger loaded"
        );
        Ok((snapshot, Scope::from(self.warehouse), config))
    }
}

#[derive(Args)]
struct MovementArgs {
    #[command(flatten)]
    ledger: LedgerArgs,
    #[arg(long, default_value_t = 30, help = "Window length in days")]
    days: i64,
}

#[derive(Serialize)]
struct MovementOutput {
    movements: stockflow_analytics::MovementSummary,
    departments: stockflow_analytics::DepartmentReport,
}

fn handle_movements(args: MovementArgs) -> Result<()> {
    let (snapshot, scope, _) = args.ledger.load()?;
    print_json(&MovementOutput {
        movements: summarize_movements(&snapshot, scope, args.days)?,
        departments: department_efficiency(&snapshot, scope, args.days)?,
    })
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum LogFormatArg {
    Json,
    Compact,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum ObjectiveArg {
    Cost,
    Time,
    Blended,
}

#[derive(Args)]
struct ObjectiveArgs {
    #[arg(long, value_enum, default_value_t = ObjectiveArg::Blended, help = "What routes minimise")]
    objective: ObjectiveArg,
    #[arg(long, default_value_t = 0.7, help = "Cost weight of the blended objective (time gets the rest)")]
    cost_weight: f64,
}

impl ObjectiveArgs {
    fn objective(&self) -> Result<RouteObjective> {
        let objective = match self.objective {
            ObjectiveArg::Cost => RouteObjective::Cost,
            ObjectiveArg::Time => RouteObjective::Time,
            ObjectiveArg::Blended => RouteObjective::Blended {
                cost_weight: self.cost_weight,
                time_weight: 1.0 - self.cost_weight,
            },
        };
        objective.validate().context("invalid route objective")?;
        Ok(objective)
    }
}

#[derive(Args)]
struct RouteArgs {
    #[arg(long, help = "Route network JSON file (nodes, edges)")]
    network: PathBuf,
    #[arg(long, help = "Source node code")]
    source: NodeId,
    #[arg(long, help = "Single destination; all markets when omitted")]
    to: Option<NodeId>,
    #[command(flatten)]
    objective: ObjectiveArgs,
}

fn handle_routes(args: RouteArgs) -> Result<()> {
    let network: Network = read_json(&args.network, "route network")?;
    let objective = args.objective.objective()?;
    match &args.to {
        Some(destination) => print_json(&shortest_path(&network, &args.source, destination, &objective)?),
        None => print_json(&shortest_routes(&network, &args.source, &objective)?),
    }
}

#[derive(Args)]
struct BestSourceArgs {
    #[arg(long, help = "Route network JSON file (nodes, edges)")]
    network: PathBuf,
    #[arg(long, help = "Market node code")]
    market: NodeId,
    #[command(flatten)]
    objective: ObjectiveArgs,
}

fn handle_best_source(args: BestSourceArgs) -> Result<()> {
    let network: Network = read_json(&args.network, "route network")?;
    let objective = args.objective.objective()?;
    match best_source(&network, &args.market, &objective)? {
        Some(route) => print_json(&route),
        None => bail!("no warehouse can reach market {}", args.market),
    }
}

#[derive(Args)]
struct EfficiencyArgs {
    #[arg(long, help = "Route network JSON file (nodes, edges)")]
    network: PathBuf,
    #[arg(long, help = "Delivery records JSON file (array of source, destination, actual_cost)")]
    deliveries: PathBuf,
    #[command(flatten)]
    objective: ObjectiveArgs,
}

fn handle_efficiency(args: EfficiencyArgs) -> Result<()> {
    let network: Network = read_json(&args.network, "route network")?;
    let deliveries: Vec<DeliveryRecord> = read_json(&args.deliveries, "delivery records")?;
    let objective = args.objective.objective()?;
    print_json(&delivery_efficiency(&network, &deliveries, &objective)?)
}

fn read_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let raw = fs::read_to_string(path).with_context(|| format!("failed to read {what} from {}", path.display()))?;
    debug!(path = %path.display(), bytes = raw.len(), "read {what}");
    serde_json::from_str(&raw).with_context(|| format!("failed to parse {what} in {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("failed to render output as JSON")?;
    println!("{rendered}");
    Ok(())
}
