use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use stockpulse_application::config::{self, Config};
use stockpulse_application::ingest::{IngestSettings, IngestionService};
use stockpulse_application::reporting::{self, ReportSettings};
use stockpulse_infrastructure::market_data::iex::IexQuoteClient;
use stockpulse_infrastructure::persistence::postgres_snapshots::PostgresSnapshotStore;

const DEFAULT_CONFIG_PATH: &str = "config/stockpulse.toml";

#[derive(Parser, Debug)]
#[command(name = "stockpulse")]
#[command(about = "Polls the quote feed and reports the biggest movers.", version)]
struct Cli {
    /// Config file path (TOML). If omitted, uses env STOCKPULSE_CONFIG.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Run bootstrap plus a single sweep and report, then exit.
    #[arg(long)]
    once: bool,
}

fn main() {
    let cli = Cli::parse();

    if let Err(err) = init_tracing() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
    if let Err(err) = init_metrics() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }

    let config_path = resolve_config_path(cli.config);
    let config = match config::load_config(config_path.as_path()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("error: unable to start async runtime: {err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = runtime.block_on(run(config, cli.once)) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

async fn run(config: Config, once: bool) -> Result<(), String> {
    let db_url = config::resolve_db_url(&config)?;
    let token = config::resolve_api_token(&config)?;

    let store = Arc::new(PostgresSnapshotStore::connect(&db_url).await?);
    store.init_schema().await?;

    let source = IexQuoteClient::new(
        &config.api.url,
        token,
        config.api.timeout_ms,
        config.api.retries,
    )?;
    let report_settings = ReportSettings::from_config(&config);
    let service = IngestionService::new(
        source,
        Arc::clone(&store),
        IngestSettings::from_config(&config),
    );

    if once {
        let active = service.bootstrap().await?;
        let stats = service.sweep_once(&active).await;
        tracing::info!(
            written = stats.written,
            fetch_failures = stats.fetch_failures,
            "single sweep complete"
        );
        let report = reporting::report_once(store.as_ref(), report_settings.top_limit).await?;
        println!("{}", report.render());
        return Ok(());
    }

    let worker = tokio::spawn(async move { service.run().await });
    let reporter = tokio::spawn(reporting::run_reporter(Arc::clone(&store), report_settings));

    let result = tokio::select! {
        joined = worker => match joined {
            Ok(result) => result,
            Err(err) => Err(format!("ingestion worker terminated abnormally: {err}")),
        },
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown requested");
            Ok(())
        }
    };
    reporter.abort();
    result
}

fn resolve_config_path(cli_path: Option<PathBuf>) -> PathBuf {
    cli_path
        .or_else(|| {
            std::env::var("STOCKPULSE_CONFIG")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
        })
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

fn init_tracing() -> Result<(), String> {
    let filter = std::env::var("STOCKPULSE_LOG").unwrap_or_else(|_| "info".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_new(filter)
        .map_err(|err| format!("invalid log filter: {err}"))?;

    tracing_subscriber::fmt().with_env_filter(env_filter).init();
    Ok(())
}

#[cfg(feature = "prometheus")]
fn init_metrics() -> Result<Option<SocketAddr>, String> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    let Some(raw) = std::env::var("STOCKPULSE_METRICS_ADDR").ok() else {
        return Ok(None);
    };
    if raw.trim().is_empty() {
        return Ok(None);
    }

    let addr: SocketAddr = raw
        .parse()
        .map_err(|err| format!("invalid STOCKPULSE_METRICS_ADDR (expected host:port): {err}"))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|err| format!("failed to install prometheus exporter: {err}"))?;

    tracing::info!(metrics_addr = %addr, "prometheus metrics exporter enabled");
    Ok(Some(addr))
}

#[cfg(not(feature = "prometheus"))]
fn init_metrics() -> Result<Option<SocketAddr>, String> {
    Ok(None)
}
