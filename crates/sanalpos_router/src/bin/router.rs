use sanalpos_router::configs::settings::Settings;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    #[allow(clippy::expect_used)]
    let settings = Settings::new().expect("unable to construct application configuration");
    #[allow(clippy::expect_used)]
    settings
        .validate()
        .expect("failed to validate router configuration");

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(settings.log.level.clone())),
        )
        .init();

    tracing::info!(
        host = %settings.server.host,
        port = settings.server.port,
        "application started"
    );

    sanalpos_router::routes::app::start_server(settings).await
}
