use std::time::Duration;

use anyhow::{Context, Result};
use tokio::time::Instant;

use crate::cli::output::{output, RankOutput};
use crate::cli::types::RankArgs;
use crate::domain::models::SearchFilters;
use crate::infrastructure::RetrievalContext;
use crate::services::RankOptions;

/// Handle the rank command
pub async fn execute(ctx: &RetrievalContext, args: RankArgs, json: bool) -> Result<()> {
    let options = RankOptions {
        limit: args.limit.unwrap_or(ctx.config.retrieval.default_limit),
        filters: SearchFilters {
            emotion_tone: args.emotion_tone,
            category: args.category,
            usage_scene: args.usage_scene,
        },
        deadline: args
            .timeout_ms
            .map(|ms| Instant::now() + Duration::from_millis(ms)),
    };

    let matches = ctx
        .engine
        .rank_with(&args.text, options)
        .await
        .context("Failed to rank emojis")?;

    output(
        &RankOutput {
            query: args.text,
            matches,
        },
        json,
    );
    Ok(())
}
