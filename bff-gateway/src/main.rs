use anyhow::Context;
use bff_gateway::config::get_configuration;
use bff_gateway::services::metrics::init_metrics;
use bff_gateway::startup::Application;
use dotenvy::dotenv;
use service_core::observability::{init_tracing, shutdown_tracing};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let settings = get_configuration().context("Failed to read configuration")?;

    init_tracing(
        &settings.server.service_name,
        &settings.observability.log_level,
        settings.observability.otlp_endpoint.as_deref(),
    );
    init_metrics();

    let application = Application::build(settings)
        .await
        .context("Failed to start application")?;

    application.run_until_stopped().await?;

    shutdown_tracing();
    Ok(())
}
