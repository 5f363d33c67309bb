//! Staff bot - Discord slash commands for looking up and correcting VIP balances
//!
//! The bot is an optional front end over the same core functions the HTTP API uses.
//! It only starts when `DISCORD_BOT_TOKEN` is set.

/// Discord command implementations (points, general)
pub mod commands;
/// Discord interaction handlers (autocomplete)
pub mod handlers;

use crate::{
    config::{loyalty::LoyaltyConfig, settings::AppContext},
    errors::{Error, Result},
};
use poise::serenity_prelude as serenity;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tracing::{error, info, instrument};

/// Shared data available to all bot commands.
pub struct BotData {
    /// Database connection for all database operations
    pub database: DatabaseConnection,
    /// Loyalty program configuration (tier thresholds)
    pub loyalty: Arc<LoyaltyConfig>,
}

impl BotData {
    /// Creates a new `BotData` from the application context.
    #[must_use]
    pub fn new(context: &AppContext) -> Self {
        Self {
            database: context.database.clone(),
            loyalty: Arc::clone(&context.loyalty),
        }
    }
}

async fn on_error(error: poise::FrameworkError<'_, BotData, Error>) {
    match error {
        poise::FrameworkError::Command { error, ctx, .. } => {
            error!(command = %ctx.command().name, error = %error, "Command failed");
            if let Err(e) = ctx.say(format!("❌ {error}")).await {
                error!("Failed to send error message: {e}");
            }
        }
        other => {
            if let Err(e) = poise::builtins::on_error(other).await {
                error!("Error while handling error: {e}");
            }
        }
    }
}

/// Runs the staff bot until the gateway connection ends.
#[instrument(skip(context, token))]
pub async fn run_bot(context: AppContext, token: String) -> Result<()> {
    let data = BotData::new(&context);

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: vec![
                commands::points(),
                commands::history(),
                commands::adjust(),
                commands::reverse(),
                commands::ping(),
                commands::help(),
            ],
            on_error: |error| Box::pin(on_error(error)),
            ..Default::default()
        })
        .setup(|ctx, ready, framework| {
            Box::pin(async move {
                info!("Logged in as {}", ready.user.name);
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                Ok(data)
            })
        })
        .build();

    let intents = serenity::GatewayIntents::non_privileged();

    info!("Starting staff bot client");
    let mut client = serenity::Client::builder(&token, intents)
        .framework(framework)
        .await?;
    client.start().await?;
    Ok(())
}

pub use commands::*;
pub use handlers::*;
