use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::cli::output::{output, ImportOutput, VectorizeOutput};
use crate::cli::types::ImportArgs;
use crate::domain::models::Candidate;
use crate::infrastructure::RetrievalContext;

/// Handle the import command
pub async fn execute(ctx: &RetrievalContext, args: ImportArgs, json: bool) -> Result<()> {
    let candidates = read_candidates(&args.file, ctx.config.embedding.dimension).await?;

    let store = ctx.store();
    let stored = ctx
        .store_guard()
        .call(None, || store.insert_candidates(&candidates))
        .await
        .context("Failed to store candidates")?;

    info!(count = stored.len(), file = %args.file.display(), "Imported candidates");

    let vectorized = if args.vectorize {
        let report = ctx.engine.vectorize_batch(&stored, true).await;
        Some(VectorizeOutput::from(&report))
    } else {
        None
    };

    output(
        &ImportOutput {
            imported: stored.len(),
            codes: stored.into_iter().map(|c| c.code).collect(),
            vectorized,
        },
        json,
    );
    Ok(())
}

/// Parse and validate a JSON array of candidates.
///
/// The whole file is rejected if any record is invalid; nothing is written.
pub async fn read_candidates(path: &Path, dimension: usize) -> Result<Vec<Candidate>> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let candidates: Vec<Candidate> = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse candidates from {}", path.display()))?;

    candidates
        .into_iter()
        .enumerate()
        .map(|(i, candidate)| {
            let candidate = candidate.normalized();
            candidate
                .validate(dimension)
                .with_context(|| format!("Invalid candidate #{} ({})", i + 1, candidate.code))?;
            Ok(candidate)
        })
        .collect()
}
