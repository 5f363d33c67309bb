//! General Discord commands - ping and help.

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use crate::{
        bot::BotData,
        errors::{Error, Result},
    };

    /// Responds with "Pong!" to test bot connectivity.
    #[poise::command(slash_command, prefix_command)]
    pub async fn ping(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        ctx.say("Pong!").await?;
        Ok(())
    }

    /// Displays help information about available commands.
    #[poise::command(slash_command, prefix_command)]
    pub async fn help(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let help_text = "**VIP Points Staff Help**\n\n\
        **Lookup**\n\
        • `/points <user_id>` - Shows a member's balance, lifetime points and tier.\n\
        • `/history <user_id> [limit]` - Lists the member's latest ledger entries.\n\n\
        **Corrections**\n\
        • `/adjust <user_id> <points> <reason> [reference]` - Adds or removes points. \
        Reusing a reference never applies twice.\n\
        • `/reverse <user_id> <source> <reference>` - Undoes an earlier award.\n\n\
        **Utility**\n\
        • `/ping` - Checks if the bot is responsive.\n\
        • `/help` - Shows this help message.";

        ctx.say(help_text).await?;
        Ok(())
    }
}

// Re-export all commands
pub use inner::*;
