use anyhow::Result;
use tracing::warn;

use crate::cli::output::{output, StatusOutput};
use crate::infrastructure::RetrievalContext;

/// Handle the status command
///
/// An unreachable store is reported rather than treated as an error.
pub async fn execute(ctx: &RetrievalContext, json: bool) -> Result<()> {
    let store = ctx.store();
    let candidates = match ctx.store_guard().call(None, || store.count()).await {
        Ok(count) => Some(count),
        Err(e) => {
            warn!(error = %e, "Could not count candidates");
            None
        }
    };

    output(
        &StatusOutput {
            candidates,
            cache: ctx.engine.embeddings().cache().stats(),
            circuits: ctx.circuits(),
        },
        json,
    );
    Ok(())
}
