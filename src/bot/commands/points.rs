//! Points commands - `points`, `history`, `adjust` and `reverse`.
//!
//! Lookups and corrections for staff. Every write goes through the same ledger path
//! as the HTTP API, so bot-issued changes show up in the member's history and audit.

use crate::entities::{membership, points_ledger};

/// One-line summary of a membership
#[must_use]
pub fn format_membership(member: &membership::Model) -> String {
    format!(
        "**{}** - {} pts (lifetime {}) - {} tier, {}",
        member.user_id, member.points_balance, member.lifetime_points, member.tier, member.status
    )
}

/// One line per ledger entry
#[must_use]
pub fn format_entry(entry: &points_ledger::Model) -> String {
    format!(
        "`#{}` {} {:+} → {} ({} `{}`)",
        entry.id,
        entry.created_at.format("%Y-%m-%d %H:%M"),
        entry.delta_points,
        entry.balance_after,
        entry.source,
        entry.ref_id
    )
}

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use super::{format_entry, format_membership};
    use crate::{
        bot::{BotData, handlers::autocomplete},
        core::{adjustment, ledger, membership, reversal},
        entities::PointSource,
        errors::{Error, Result},
    };

    /// Shows a member's balance, lifetime points and tier.
    #[poise::command(slash_command, prefix_command)]
    pub async fn points(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Member user id"] user_id: String,
    ) -> Result<()> {
        let db = &ctx.data().database;

        let Some(member) = membership::get_membership(db, &user_id).await? else {
            ctx.say(format!("❌ No VIP membership for '{user_id}'"))
                .await?;
            return Ok(());
        };

        ctx.say(format_membership(&member)).await?;
        Ok(())
    }

    /// Lists a member's latest ledger entries, newest first.
    #[poise::command(slash_command, prefix_command)]
    pub async fn history(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Member user id"] user_id: String,
        #[description = "Number of entries (default 10, max 25)"] limit: Option<u64>,
    ) -> Result<()> {
        let limit = limit.unwrap_or(10).clamp(1, 25);
        let entries = ledger::get_entries_for_user(&ctx.data().database, &user_id, Some(limit))
            .await?;

        if entries.is_empty() {
            ctx.say(format!("No ledger entries for '{user_id}'")).await?;
            return Ok(());
        }

        let lines: Vec<String> = entries.iter().map(format_entry).collect();
        ctx.say(format!("**Ledger for {user_id}**\n{}", lines.join("\n")))
            .await?;
        Ok(())
    }

    /// Adds or removes points with a reason.
    #[poise::command(slash_command, prefix_command)]
    pub async fn adjust(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Member user id"] user_id: String,
        #[description = "Points to add (negative to remove)"] points: i64,
        #[description = "Reason for the adjustment"] reason: String,
        #[description = "Reference that makes the adjustment apply once"] reference: Option<String>,
    ) -> Result<()> {
        let data = ctx.data();
        let reference = reference.unwrap_or_else(|| format!("discord:{}", ctx.id()));
        let actor = ctx.author().name.clone();

        let result = adjustment::adjust_points(
            &data.database,
            &data.loyalty.tiers,
            &user_id,
            &reference,
            points,
            &reason,
            &actor,
        )
        .await?;

        if result.already_applied {
            ctx.say(format!(
                "ℹ️ Reference `{reference}` was already applied. Balance: {} pts",
                result.new_balance
            ))
            .await?;
        } else {
            ctx.say(format!(
                "✅ {:+} pts for {user_id}. Balance: {} pts ({} tier)",
                result.delta_points, result.new_balance, result.new_tier
            ))
            .await?;
        }
        Ok(())
    }

    /// Reverses an earlier award, e.g. for a refunded order.
    #[poise::command(slash_command, prefix_command)]
    pub async fn reverse(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Member user id"] user_id: String,
        #[description = "Source of the award"]
        #[autocomplete = "autocomplete::autocomplete_source"]
        source: String,
        #[description = "Order or check-in id of the award"] reference: String,
    ) -> Result<()> {
        let Some(source) = PointSource::parse(&source) else {
            ctx.say(format!("❌ Unknown source '{source}'")).await?;
            return Ok(());
        };

        let result =
            reversal::reverse_points(&ctx.data().database, &user_id, source, &reference).await?;

        let message = if result.already_reversed {
            format!("ℹ️ Already reversed. Balance: {} pts", result.new_balance)
        } else if result.points_reversed == 0 {
            format!("ℹ️ No {source} award found for `{reference}`")
        } else {
            format!(
                "✅ Reversed {} pts. Balance: {} pts",
                result.points_reversed, result.new_balance
            )
        };
        ctx.say(message).await?;
        Ok(())
    }
}

pub use inner::*;
