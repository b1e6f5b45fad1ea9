use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::cli::output::{output, ExportOutput};
use crate::cli::types::ExportArgs;
use crate::domain::models::Candidate;
use crate::infrastructure::RetrievalContext;

/// Handle the export command
pub async fn execute(ctx: &RetrievalContext, args: ExportArgs, json: bool) -> Result<()> {
    let exported = export_candidates(ctx, &args.file, args.with_embeddings).await?;

    output(
        &ExportOutput {
            exported,
            file: args.file.display().to_string(),
        },
        json,
    );
    Ok(())
}

/// Write every stored candidate to `path` as a pretty-printed JSON array,
/// in the format `import` reads back.
///
/// Embeddings are dropped unless `with_embeddings` is set.
pub async fn export_candidates(
    ctx: &RetrievalContext,
    path: &Path,
    with_embeddings: bool,
) -> Result<usize> {
    let store = ctx.store();
    let mut candidates: Vec<Candidate> = ctx
        .store_guard()
        .call(None, || store.list_candidates())
        .await
        .context("Failed to list candidates")?;

    if !with_embeddings {
        for candidate in &mut candidates {
            candidate.embedding = None;
        }
    }

    let body = serde_json::to_string_pretty(&candidates).context("Failed to serialize candidates")?;
    tokio::fs::write(path, body)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;

    info!(count = candidates.len(), file = %path.display(), "Exported candidates");
    Ok(candidates.len())
}
