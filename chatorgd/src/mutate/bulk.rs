use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use super::retry::{RetryOutcome, RetryableMutator};
use super::{MutationKind, MutationOp, ValidationError};
use crate::pacing::Jitter;
use crate::progress::{ProgressEvent, ProgressSink, millis};
use crate::remote::RemoteApi;

const INTER_ITEM_JITTER_MS: u64 = 300;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkResult {
    pub id: String,
    pub outcome: RetryOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkReport {
    pub run_id: String,
    pub op: MutationKind,
    pub ok_count: usize,
    pub fail_count: usize,
    pub elapsed_ms: u64,
    /// One entry per input id, in input order.
    pub results: Vec<BulkResult>,
}

/// Applies one mutation to many ids, strictly one after another.
pub struct BulkExecutor<'a, A> {
    api: &'a A,
    sink: &'a dyn ProgressSink,
}

impl<'a, A: RemoteApi> BulkExecutor<'a, A> {
    pub fn new(api: &'a A, sink: &'a dyn ProgressSink) -> Self {
        Self { api, sink }
    }

    /// Runs `op` over `ids`, waiting `throttle` plus jitter between items.
    ///
    /// Per-id failures land in the report; only an unusable request is
    /// rejected, before any remote call.
    pub async fn run(
        &self,
        run_id: &str,
        ids: &[String],
        op: &MutationOp,
        throttle: Duration,
    ) -> Result<BulkReport, ValidationError> {
        op.validate_run(ids)?;

        let kind = op.kind();
        let total = ids.len();
        let throttle_ms = millis(throttle);
        let pacing = Jitter::base_plus(throttle_ms, INTER_ITEM_JITTER_MS);
        let mutator = RetryableMutator::new(self.api);
        let started = Instant::now();
        tracing::info!(run_id, op = %kind, total, throttle_ms, "bulk run started");

        let mut results = Vec::with_capacity(total);
        let mut ok_count = 0;
        let mut fail_count = 0;

        for (index, raw_id) in ids.iter().enumerate() {
            if index > 0 {
                pacing.wait().await;
            }

            let id = raw_id.trim();
            let outcome = if id.is_empty() {
                RetryOutcome::missing_id()
            } else {
                mutator.mutate(op, id).await
            };

            if outcome.ok {
                ok_count += 1;
            } else {
                fail_count += 1;
                tracing::warn!(
                    run_id,
                    op = %kind,
                    id,
                    attempt = outcome.attempt,
                    status = outcome.status,
                    error = outcome.error.as_deref().unwrap_or_default(),
                    "mutation failed"
                );
            }

            self.sink.emit(ProgressEvent::MutationProgress {
                run_id: run_id.to_string(),
                op: kind,
                i: index + 1,
                total,
                id: id.to_string(),
                ok: outcome.ok,
                status: outcome.status,
                error: outcome.error.clone(),
                attempt: outcome.attempt,
                elapsed_ms: millis(started.elapsed()),
                last_op_ms: outcome.elapsed_ms,
            });
            results.push(BulkResult {
                id: id.to_string(),
                outcome,
            });
        }

        let elapsed_ms = millis(started.elapsed());
        self.sink.emit(ProgressEvent::MutationDone {
            run_id: run_id.to_string(),
            op: kind,
            total,
            ok_count,
            fail_count,
            elapsed_ms,
        });
        tracing::info!(run_id, op = %kind, ok_count, fail_count, elapsed_ms, "bulk run finished");

        Ok(BulkReport {
            run_id: run_id.to_string(),
            op: kind,
            ok_count,
            fail_count,
            elapsed_ms,
            results,
        })
    }
}
