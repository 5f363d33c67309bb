use dotenvy::dotenv;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use vip_points::{
    api, bot,
    config::{database, loyalty, settings::{AppContext, Settings}},
    core::rules,
    errors::Result,
};

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; env vars can also be set externally
    dotenv().ok();
    let settings = Settings::from_env()?;

    // 3. Load the loyalty program configuration
    let loyalty = loyalty::load_or_default(&settings.loyalty_config_path)
        .inspect_err(|e| error!("Failed to load loyalty configuration: {}", e))?;
    info!(
        gold = loyalty.tiers.gold,
        black = loyalty.tiers.black,
        "Loyalty configuration loaded"
    );

    // 4. Initialize database and seed point rules
    let db = database::create_connection(&settings.database_url)
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db).await?;
    rules::seed_rules(&db, &loyalty.rules).await?;

    let context = AppContext::new(db, loyalty);

    // 5. Start the staff bot alongside the API when a token is configured
    match settings.discord_token.clone() {
        Some(token) => {
            let bot_context = context.clone();
            tokio::spawn(async move {
                if let Err(e) = bot::run_bot(bot_context, token).await {
                    error!("Staff bot stopped: {}", e);
                }
            });
        }
        None => warn!("DISCORD_BOT_TOKEN not set, staff bot disabled"),
    }

    // 6. Serve the HTTP API until Ctrl-C
    api::serve(context, settings.bind_addr, shutdown_signal()).await?;
    info!("Shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
