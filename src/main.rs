use std::{fs, path::PathBuf, sync::Arc};

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use demand_planner::{
    config::{self, AppConfig},
    db,
    events::{self, EventSender},
    models::{DemandDataset, DemandScope},
    repositories::SeaOrmDemandStore,
    services::demand::DemandService,
    ServiceError,
};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::error;

#[derive(Parser)]
#[command(
    name = "demand-planner",
    about = "Robust demand forecasting, inventory parameters and audited demand adjustments",
    version
)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON"
    )]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending schema migrations
    Migrate,
    /// Replace the whole dataset with the demand and product rows of a JSON file
    Import(ImportArgs),
    /// Scale working demand by a percentage
    BulkUpdate(BulkUpdateArgs),
    /// Recompute forecasts and inventory parameters for every product
    ProcessForecast,
    /// List bulk adjustments, newest first
    History,
    /// List product forecasts
    Products,
    /// Totals and monthly demand per product over the imported data
    Summary,
    /// Compare working demand against the imported original
    Difference,
}

#[derive(Args)]
struct ImportArgs {
    #[arg(help = "JSON file with `demand` and `products` arrays")]
    file: PathBuf,
}

#[derive(Args)]
struct BulkUpdateArgs {
    #[arg(long, help = "Restrict to one month, formatted YYYY-MM")]
    month: Option<String>,
    #[arg(long, help = "Restrict to one product id")]
    product: Option<String>,
    #[arg(long, help = "Restrict to one customer id")]
    customer: Option<String>,
    #[arg(long, allow_hyphen_values = true, help = "Change in percent, e.g. 10 or -25")]
    percentage: f64,
    #[arg(long, help = "Why the adjustment is made")]
    description: String,
}

struct CliContext {
    config: AppConfig,
    pool: Arc<db::DbPool>,
    service: DemandService,
    event_sender: Arc<EventSender>,
    event_loop: JoinHandle<()>,
}

impl CliContext {
    async fn initialize() -> Result<Self> {
        let config = config::load_config().context("failed to load application config")?;
        config::init_tracing(config.log_level(), config.log_json);

        let pool = db::establish_connection_from_app_config(&config)
            .await
            .context("failed to connect to database")?;
        db::check_connection(&pool)
            .await
            .context("database is not reachable")?;
        if config.auto_migrate {
            db::run_migrations(&pool).await?;
        }
        let pool = Arc::new(pool);

        let (event_sender, event_rx) = EventSender::channel(config.event_channel_capacity);
        let event_sender = Arc::new(event_sender);
        let event_loop = tokio::spawn(events::process_events(event_rx));

        let store = SeaOrmDemandStore::new(pool.clone()).with_batch_size(config.import_batch_size);
        let service = DemandService::new(Arc::new(store), event_sender.clone());

        Ok(Self {
            config,
            pool,
            service,
            event_sender,
            event_loop,
        })
    }

    /// Lets the event loop drain before the process exits
    async fn shutdown(self) -> Result<()> {
        let CliContext {
            service,
            event_sender,
            event_loop,
            ..
        } = self;
        // the loop ends once every sender is gone
        drop(service);
        drop(event_sender);
        event_loop.await.context("event loop panicked")?;
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let context = CliContext::initialize().await?;

    let outcome = run(&context, cli).await;
    context.shutdown().await?;

    outcome.map_err(|err| match err.downcast::<ServiceError>() {
        Ok(service_error) => {
            error!("Command failed: {}", service_error);
            anyhow!("{}: {}", service_error.kind(), service_error.response_message())
        }
        Err(other) => other,
    })
}

async fn run(context: &CliContext, cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Migrate => {
            db::run_migrations(&context.pool).await?;
            println!("Migrations applied to {}", context.config.environment);
        }
        Commands::Import(args) => handle_import(context, args, cli.json).await?,
        Commands::BulkUpdate(args) => handle_bulk_update(context, args, cli.json).await?,
        Commands::ProcessForecast => handle_process_forecast(context, cli.json).await?,
        Commands::History => handle_history(context, cli.json).await?,
        Commands::Products => handle_products(context, cli.json).await?,
        Commands::Summary => handle_summary(context, cli.json).await?,
        Commands::Difference => handle_difference(context, cli.json).await?,
    }
    Ok(())
}

async fn handle_import(context: &CliContext, args: ImportArgs, json: bool) -> Result<()> {
    let raw = fs::read_to_string(&args.file)
        .with_context(|| format!("failed to read {}", args.file.display()))?;
    let dataset: DemandDataset = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a valid dataset", args.file.display()))?;

    let result = context.service.import_dataset(dataset).await?;
    if json {
        print_json(&result)?;
    } else {
        println!(
            "Successfully processed {} demand records and {} product records ({} aggregate rows)",
            result.records_processed, result.product_records_processed, result.aggregate_rows
        );
    }
    Ok(())
}

async fn handle_bulk_update(context: &CliContext, args: BulkUpdateArgs, json: bool) -> Result<()> {
    let scope = DemandScope::from_filters(
        args.month.as_deref(),
        args.product.as_deref(),
        args.customer.as_deref(),
    )?;

    let result = context
        .service
        .apply_bulk_change(scope, args.percentage, &args.description)
        .await?;

    if json {
        print_json(&result)?;
    } else {
        println!(
            "Updated {} records: {}",
            result.records_affected, result.change_summary
        );
        println!("Audit entry {}", result.history_id);
    }
    Ok(())
}

async fn handle_process_forecast(context: &CliContext, json: bool) -> Result<()> {
    let run = context.service.run_forecast().await?;
    if json {
        return print_json(&run);
    }

    for r in &run.results {
        match &r.parameters {
            Some(p) => println!(
                "- {} ({}) forecast {:.3} stdev {:.3} dl {:.3} eoq {} ss {} rop {}",
                r.product_id,
                r.product_name,
                r.forecast,
                r.dmd_stdev,
                p.dl,
                render_optional(p.eoq),
                render_optional(p.ss),
                render_optional(p.rop)
            ),
            None => println!(
                "- {} ({}) forecast {:.3} stdev {:.3} (no product parameters)",
                r.product_id, r.product_name, r.forecast, r.dmd_stdev
            ),
        }
    }
    println!(
        "Processed {} products, {} parameter rows written",
        run.results.len(),
        run.parameters_written
    );
    Ok(())
}

async fn handle_history(context: &CliContext, json: bool) -> Result<()> {
    let history = context.service.update_history().await?;
    if json {
        return print_json(&history);
    }
    if history.is_empty() {
        println!("No bulk updates recorded");
    }
    for entry in &history {
        println!(
            "- {} • {:+}% • {} records • {} • {}",
            entry.created_at.to_rfc3339(),
            entry.percentage,
            entry.records_affected,
            entry.description,
            entry.change_summary
        );
    }
    Ok(())
}

async fn handle_products(context: &CliContext, json: bool) -> Result<()> {
    let products = context.service.product_forecasts().await?;
    if json {
        return print_json(&products);
    }
    for p in &products {
        println!(
            "- {} ({}) forecast {:.3} stdev {:.3}",
            p.product_id, p.product_name, p.forecast, p.dmd_stdev
        );
    }
    Ok(())
}

async fn handle_summary(context: &CliContext, json: bool) -> Result<()> {
    let summary = context.service.demand_summary().await?;
    if json {
        return print_json(&summary);
    }
    println!(
        "{} records • total quantity {:.3} • {} products • {} customers",
        summary.total_records,
        summary.total_quantity,
        summary.unique_products,
        summary.unique_customers
    );
    if let (Some(start), Some(end)) = (summary.start_date, summary.end_date) {
        println!("From {} to {}", start.date_naive(), end.date_naive());
    }
    for product in &summary.product_demand_by_month {
        println!("- {} ({})", product.product_name, product.product_id);
        for m in &product.monthly_demand {
            println!("    {} {}: {:.3}", m.month_name, m.year, m.total_quantity);
        }
    }
    Ok(())
}

async fn handle_difference(context: &CliContext, json: bool) -> Result<()> {
    let diff = context.service.demand_difference().await?;
    if json {
        return print_json(&diff);
    }
    println!(
        "Original {:.3} • working {:.3} • difference {:+.3} ({:+.2}%)",
        diff.total_original, diff.total_modified, diff.difference, diff.percentage_change
    );
    println!(
        "{} of {} records changed",
        diff.records_changed, diff.records_total
    );
    for d in &diff.product_month_differences {
        println!(
            "- {} {} {}: {:.3} -> {:.3} ({:+.2}%)",
            d.product_name,
            d.month_name,
            d.year,
            d.original_quantity,
            d.modified_quantity,
            d.percentage_change
        );
    }
    Ok(())
}

fn render_optional(value: Option<f64>) -> String {
    value
        .map(|v| format!("{:.3}", v))
        .unwrap_or_else(|| "n/a".to_string())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
