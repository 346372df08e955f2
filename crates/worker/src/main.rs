use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stock_picker_core::crew::{Crew, CrewConfig};
use stock_picker_core::domain::request::AnalysisRequest;
use stock_picker_core::handler::{AnalysisService, LogProgress, Outcome};
use stock_picker_core::notify::SendGridClient;

#[derive(Debug, Parser)]
#[command(name = "stock_picker_worker")]
struct Args {
    /// Recipient of the HTML report.
    #[arg(long)]
    email: String,

    /// Investment sector to analyse, e.g. "Renewable Energy".
    #[arg(long)]
    sector: String,

    /// Validate input and crew configuration, print the execution plan, call no external service.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = stock_picker_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();
    settings.log_presence();

    let crew_config = load_crew_config(settings.crew_config_dir.as_deref())?;
    let crew = Crew::from_settings(&settings, Arc::new(crew_config));

    if args.dry_run {
        let request = AnalysisRequest::validate(&args.email, &args.sector)
            .map_err(|e| anyhow::anyhow!(e.user_message()))?;
        print_plan(&crew, &request);
        tracing::info!(dry_run = true, sector = %request.sector, "crew plan validated");
        return Ok(());
    }

    let email = SendGridClient::from_settings(&settings)?;
    let service = AnalysisService::new(Arc::new(crew), Arc::new(email));

    let out = service
        .run_analysis(&args.email, &args.sector, &LogProgress)
        .await;

    println!("{}", out.report);
    eprintln!("{}", out.status);

    match out.outcome {
        Outcome::Success | Outcome::PartialSuccess => Ok(()),
        Outcome::InvalidInput | Outcome::Failed => anyhow::bail!("{}", out.status),
    }
}

/// Invalid crew configuration is fatal; it is reported to Sentry before the process exits.
fn load_crew_config(dir: Option<&str>) -> anyhow::Result<CrewConfig> {
    CrewConfig::load(dir)
        .context("load crew configuration")
        .inspect_err(|e| {
            sentry_anyhow::capture_anyhow(e);
            tracing::error!(error = %format!("{e:#}"), "crew configuration invalid");
        })
}

fn print_plan(crew: &Crew, request: &AnalysisRequest) {
    let config = crew.config();
    let graph = config.graph();

    println!("sector: {}", request.sector);
    println!("recipient: {}", request.email);
    for (step, task) in graph.order().iter().enumerate() {
        let context = graph
            .context(*task)
            .iter()
            .map(|t| t.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        match config.policy().assign(*task) {
            Some(a) => println!(
                "{}. {task} -> {} [{}] context=[{context}]",
                step + 1,
                a.worker,
                a.capability
            ),
            None => println!("{}. {task} -> unassigned context=[{context}]", step + 1),
        }
    }
}

fn init_sentry(settings: &stock_picker_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
