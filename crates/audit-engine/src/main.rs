//! audit-engine — cloud cost and security audit engine with an embedded
//! real-time host telemetry service.
//!
//! Runs either as a long-lived HTTP service (`serve`) or as a one-shot CLI
//! audit that prints a report to stdout or a file (`audit`).

use audit_config::Config;
use audit_core::{AuditOrchestrator, CloudClient, FakeCloudClient, RunContext};
use audit_observe::OperationsMetrics;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use telemetry::{AlertThresholds, TelemetrySampler};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use visitor::VisitorCounter;

#[derive(Parser)]
#[command(name = "audit-engine")]
#[command(about = "Cloud cost and security audit engine")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP service: dashboard, telemetry, and audit endpoints
    Serve {
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },

    /// Run one audit pass and print the report
    Audit {
        #[arg(long, value_enum, default_value_t = AuditMode::Full)]
        mode: AuditMode,

        #[arg(long, value_enum, default_value_t = ReportFormat::Json)]
        format: ReportFormat,

        /// Write the report to a file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Print host and build information
    Info,
}

#[derive(Clone, Copy, ValueEnum)]
enum AuditMode {
    Full,
    Structured,
    Quick,
}

#[derive(Clone, Copy, ValueEnum)]
enum ReportFormat {
    Json,
    Csv,
    Text,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("audit_engine=info".parse()?))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Serve { port } => serve(port).await,
        Commands::Audit { mode, format, output } => run_audit(mode, format, output).await,
        Commands::Info => print_info(),
    }
}

fn default_client(config: &Config) -> Arc<dyn CloudClient> {
    Arc::new(FakeCloudClient::new("000000000000", config.aws_region.clone()))
}

async fn serve(port: u16) -> anyhow::Result<()> {
    let config = Arc::new(Config::from_env());
    info!(env = ?config.env, region = %config.aws_region, "starting audit-engine");

    let sampler = Arc::new(TelemetrySampler::new(
        Duration::from_secs(config.metrics_interval_secs),
        AlertThresholds {
            cpu: config.alert_cpu_threshold,
            memory: config.alert_memory_threshold,
            disk: config.alert_disk_threshold,
        },
    ));
    sampler.clone().spawn();

    let redis_url = format!(
        "redis://{}{}:{}",
        config
            .redis_password
            .as_ref()
            .map(|p| format!(":{p}@"))
            .unwrap_or_default(),
        config.redis_host,
        config.redis_port
    );
    let visitors = Arc::new(VisitorCounter::connect(&redis_url).await);

    let metrics = Arc::new(OperationsMetrics::new());
    let client = default_client(&config);
    let state = http_service::AppState::new(config, sampler, client, visitors, metrics);
    let app = http_service::api_routes(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn run_audit(mode: AuditMode, format: ReportFormat, output: Option<PathBuf>) -> anyhow::Result<()> {
    let config = Config::from_env();
    let client = default_client(&config);
    let orchestrator = AuditOrchestrator::new(client);
    let ctx = RunContext::new(chrono::Utc::now());

    let report = match mode {
        AuditMode::Full => orchestrator.run_full(&ctx).await,
        AuditMode::Structured => orchestrator.run_structured(&ctx).await,
        AuditMode::Quick => orchestrator.run_quick(&ctx).await,
    };

    match output {
        Some(path) => {
            match format {
                ReportFormat::Json => audit_persist::export_json(&report, &path)?,
                ReportFormat::Csv => audit_persist::export_csv(&report, &path)?,
                ReportFormat::Text => audit_persist::export_text(&report, &path)?,
            }
            println!("report written to {}", path.display());
        }
        None => {
            let rendered = match format {
                ReportFormat::Json => audit_persist::render_json(&report)?,
                ReportFormat::Csv => audit_persist::render_csv(&report),
                ReportFormat::Text => audit_persist::render_text(&report),
            };
            println!("{rendered}");
        }
    }
    Ok(())
}

fn print_info() -> anyhow::Result<()> {
    let mut sys = sysinfo::System::new_all();
    sys.refresh_all();
    println!("audit-engine v{}", env!("CARGO_PKG_VERSION"));
    println!(
        "host: {} ({})",
        sysinfo::System::host_name().unwrap_or_default(),
        sysinfo::System::long_os_version().unwrap_or_default()
    );
    println!("cpus: {}", sys.cpus().len());
    println!(
        "memory: {} / {} MiB",
        sys.used_memory() / 1024 / 1024,
        sys.total_memory() / 1024 / 1024
    );
    Ok(())
}
