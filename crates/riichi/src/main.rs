use riichi::RiichiServer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let bind = std::env::var("RIICHI_BIND").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let server = RiichiServer::builder().bind(&bind).build().await?;
    tracing::info!(addr = %server.local_addr()?, "listening");

    server.run().await?;
    Ok(())
}
