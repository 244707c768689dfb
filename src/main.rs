use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use userprofile::cli::{Cli, run_profile_command};
use userprofile::config::Config;
use userprofile::db::libsql::LibSqlBackend;
use userprofile::db::postgres::PgBasicInfoStore;
use userprofile::import::{ColdStartImporter, HttpSummarySource};
use userprofile::llm::create_llm_provider;
use userprofile::oracle::ProfileOracle;
use userprofile::service::ProfileService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let config = Config::from_env()?;
    let service = build_service(&config).await?;
    service.initialize().await?;

    run_profile_command(cli.command, &service).await
}

/// `RUST_LOG` picks the filter; `LOG_FORMAT=json` switches to JSON lines.
fn init_tracing() {
    let json = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("userprofile=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
        }))
        .with((!json).then(|| {
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
        }))
        .init();
}

async fn build_service(config: &Config) -> anyhow::Result<ProfileService> {
    let basic = PgBasicInfoStore::new(&config.database).await?;
    let documents = LibSqlBackend::new_local(&config.documents.path).await?;
    let llm = create_llm_provider(&config.llm)?;
    let oracle = ProfileOracle::new(llm).with_temperature(config.llm.temperature);

    let mut service = ProfileService::new(oracle, Arc::new(basic), Arc::new(documents))
        .with_config(config.profile);

    if let Some(cold_start) = &config.cold_start {
        let source = HttpSummarySource::new(cold_start)?;
        tracing::info!(base_url = %cold_start.base_url, "Cold start import enabled");
        service = service.with_cold_start(ColdStartImporter::new(Arc::new(source)));
    }

    Ok(service)
}
