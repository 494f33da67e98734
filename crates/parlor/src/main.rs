use parlor::{ParlorServer, ServerConfig};
use parlor_store::SqliteStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "parlor=info".into()),
        )
        .init();

    let config = ServerConfig::from_env()?;
    let store = SqliteStore::open(&config.db_path)?;

    let server = ParlorServer::<SqliteStore>::builder()
        .bind(&config.bind_addr())
        .admin_name(&config.admin_name)
        .build(store)
        .await?;

    tracing::info!(addr = %server.local_addr()?, "listening");
    server.run().await?;
    Ok(())
}
