use arena_infra::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    arena_observability::init();

    let config = AppConfig::from_env()?;
    tracing::info!(
        start = %config.window.start(),
        end = %config.window.end(),
        port = config.server_port,
        "configuration loaded"
    );

    arena_api::server::run(config).await
}
