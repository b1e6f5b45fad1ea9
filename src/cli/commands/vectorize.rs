use anyhow::{Context, Result};

use crate::cli::output::{output, VectorizeOutput};
use crate::cli::types::VectorizeArgs;
use crate::infrastructure::RetrievalContext;

/// Handle the vectorize command
///
/// Fails after printing the report when any candidate could not be
/// vectorized, so scripts see a non-zero exit.
pub async fn execute(ctx: &RetrievalContext, args: VectorizeArgs, json: bool) -> Result<()> {
    let store = ctx.store();
    let candidates = ctx
        .store_guard()
        .call(None, || store.list_candidates())
        .await
        .context("Failed to list candidates")?;

    let report = ctx.engine.vectorize_batch(&candidates, !args.force).await;
    output(&VectorizeOutput::from(&report), json);

    if !report.is_clean() {
        anyhow::bail!(
            "{} of {} candidate(s) failed to vectorize",
            report.failed.len(),
            report.total()
        );
    }
    Ok(())
}
