//! Autocomplete handlers for Discord slash command parameters.

use crate::{bot::BotData, entities::PointSource, errors::Error};
use sea_orm::Iterable;

/// Source tags whose name contains `partial` (case-insensitive).
#[must_use]
pub fn matching_sources(partial: &str) -> Vec<String> {
    let partial_lower = partial.trim().to_lowercase();
    PointSource::iter()
        .map(|source| source.as_str().to_string())
        .filter(|tag| tag.contains(&partial_lower))
        .take(25) // Discord autocomplete limit
        .collect()
}

/// Provides autocomplete suggestions for point sources.
pub async fn autocomplete_source(
    _ctx: poise::Context<'_, BotData, Error>,
    partial: &str,
) -> Vec<String> {
    matching_sources(partial)
}
