//! Command-line interface.

pub mod commands;
pub mod output;
pub mod types;

pub use types::{Cli, Commands};

use crate::domain::errors::RetrievalError;

/// Exit status for a failed command: 2 when a breaker rejected the call
/// (open circuit), 1 for everything else, including exhausted retries.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    if is_degraded(err) {
        2
    } else {
        1
    }
}

fn is_degraded(err: &anyhow::Error) -> bool {
    err.chain()
        .filter_map(|cause| cause.downcast_ref::<RetrievalError>())
        .any(RetrievalError::is_degraded)
}

/// Print an error chain and exit with [`exit_code`].
pub fn handle_error(err: anyhow::Error, json: bool) -> ! {
    let degraded = is_degraded(&err);

    if json {
        let kind = err
            .chain()
            .find_map(|cause| cause.downcast_ref::<RetrievalError>())
            .map(RetrievalError::kind);
        let body = serde_json::json!({
            "error": format!("{err:#}"),
            "kind": kind,
            "degraded": degraded,
        });
        eprintln!(
            "{}",
            serde_json::to_string_pretty(&body).unwrap_or_else(|_| body.to_string())
        );
    } else {
        eprintln!("Error: {err:#}");
    }

    std::process::exit(exit_code(&err));
}
