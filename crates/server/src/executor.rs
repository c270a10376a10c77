//! Run-with-transaction glue.
//!
//! The host wraps each auto-committed request in [`execute`]: start a
//! session, run the runner, commit, publish any staged DDL, then fire the
//! post-commit hooks with the session's events. The runner's error path
//! rolls the session back; a post-commit indexing failure is reported in
//! the outcome but never fails the committed write.

use folio_types::{Error, Result};
use tracing::warn;

use crate::response::Response;
use crate::runner::{QueryRunner, Tenant};
use crate::search_indexer::TxListener;
use crate::transaction::TxManager;

/// Result of one executed request.
#[derive(Debug)]
pub struct ExecuteOutcome {
    /// The runner's response.
    pub response: Response,
    /// Set when the post-commit hooks failed after the KV commit
    /// succeeded; the write itself stands.
    pub indexing_error: Option<Error>,
}

/// Executes a runner inside a fresh transaction.
pub async fn execute(
    mgr: &TxManager,
    tenant: &Tenant,
    hooks: &dyn TxListener,
    runner: &mut dyn QueryRunner,
) -> Result<ExecuteOutcome> {
    let session = mgr.start_tx().await?;

    let response = match runner.run(&session, tenant).await {
        Ok(response) => response,
        Err(e) => {
            // Best effort: the session may already be unusable.
            let _ = session.rollback().await;
            hooks.on_rollback(&session.take_events().await).await;
            return Err(e);
        },
    };

    let events = session.take_events().await;
    if let Err(e) = hooks.on_commit(&session, &events).await {
        let _ = session.rollback().await;
        hooks.on_rollback(&events).await;
        return Err(e);
    }

    if let Err(e) = session.commit().await {
        hooks.on_rollback(&events).await;
        return Err(e);
    }

    // DDL staged inside the transaction becomes visible to later
    // transactions only after the commit succeeded.
    if let Some(staged) = session.staged_database().await {
        tenant.manager().publish(staged);
    }

    let indexing_error = match hooks.on_post_commit(&events).await {
        Ok(()) => None,
        Err(e) => {
            warn!(error = %e, "post-commit indexing failed; KV commit stands");
            Some(e)
        },
    };

    Ok(ExecuteOutcome { response, indexing_error })
}
