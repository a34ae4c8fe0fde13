use chatorg_core::ItemRow;
use serde::Serialize;
use tokio::time::Instant;

use super::paginator::{Page, PagePosition, Paginator};
use super::scope::{Admission, ScopeScan};
use super::{HarvestError, HarvestOptions, ITEM_LIST_MAX_STEPS, ITEM_LIST_PACING, MAX_PAGE_SIZE};
use crate::model::{ItemRecord, ItemSet};
use crate::progress::{ProgressEvent, ProgressSink, millis};
use crate::remote::RemoteApi;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemHarvestRequest {
    pub limit: usize,
    pub page_size: u32,
    pub since_updated_ms: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemHarvest {
    pub items: Vec<ItemRecord>,
    /// Total reported by the remote, when it reports one.
    pub total: Option<u64>,
    /// The scan hit the scope boundary or the end of the data.
    pub reached_end: bool,
    pub pages: u32,
    pub ordering_violations: u32,
}

/// Flat, cross-project harvest of the conversation listing.
pub struct ItemHarvester<'a, A> {
    api: &'a A,
    sink: &'a dyn ProgressSink,
    options: HarvestOptions,
}

#[derive(Default)]
struct Progress {
    items: ItemSet,
    total: Option<u64>,
    offset: u64,
    pages: u32,
    reached_end: bool,
    violations: u32,
}

impl<'a, A: RemoteApi> ItemHarvester<'a, A> {
    pub fn new(api: &'a A, sink: &'a dyn ProgressSink, options: HarvestOptions) -> Self {
        Self { api, sink, options }
    }

    /// Harvests up to `limit` conversations, newest first.
    ///
    /// With a cutoff the scan ends at the first row that is not provably in
    /// scope. The done event is emitted on every exit path.
    pub async fn harvest(
        &self,
        run_id: &str,
        request: ItemHarvestRequest,
    ) -> Result<ItemHarvest, HarvestError> {
        let started = Instant::now();
        tracing::info!(
            run_id,
            limit = request.limit,
            page_size = request.page_size,
            since_updated_ms = request.since_updated_ms,
            "item harvest started"
        );

        let mut progress = Progress::default();
        let result = self.collect(run_id, request, &mut progress).await;
        let elapsed_ms = millis(started.elapsed());

        self.sink.emit(ProgressEvent::ItemsDone {
            run_id: run_id.to_string(),
            total: progress.items.len(),
            elapsed_ms,
        });

        match result {
            Ok(()) => {
                tracing::info!(
                    run_id,
                    found = progress.items.len(),
                    pages = progress.pages,
                    reached_end = progress.reached_end,
                    elapsed_ms,
                    "item harvest finished"
                );
                Ok(ItemHarvest {
                    items: progress.items.into_vec(),
                    total: progress.total,
                    reached_end: progress.reached_end,
                    pages: progress.pages,
                    ordering_violations: progress.violations,
                })
            }
            Err(err) => {
                tracing::error!(run_id, found = progress.items.len(), %err, "item harvest aborted");
                Err(err)
            }
        }
    }

    async fn collect(
        &self,
        run_id: &str,
        request: ItemHarvestRequest,
        progress: &mut Progress,
    ) -> Result<(), HarvestError> {
        if request.limit == 0 {
            return Ok(());
        }
        let api = self.api;
        let page_size = request.page_size.clamp(1, MAX_PAGE_SIZE);
        let mut pager = Paginator::offset(
            page_size,
            ITEM_LIST_MAX_STEPS,
            ITEM_LIST_PACING,
            move |position| {
                let (offset, limit) = match position {
                    PagePosition::Offset { offset, limit } => (offset, limit),
                    PagePosition::Cursor(_) => (0, page_size),
                };
                async move { api.list_items_page(offset, limit).await.map(Page::<ItemRow>::from) }
            },
        );
        let mut scan = ScopeScan::new(request.since_updated_ms);

        while progress.items.len() < request.limit {
            let Some(page) = pager.next_page().await? else {
                progress.reached_end = pager.is_drained();
                break;
            };
            progress.pages += 1;
            progress.offset += page.rows.len() as u64;
            if page.total.is_some() {
                progress.total = page.total;
            }

            let mut scope_end = false;
            for row in &page.rows {
                if let Admission::ScopeEnd(scope) = scan.admit(row) {
                    tracing::debug!(run_id, ?scope, offset = progress.offset, "reached scope end");
                    scope_end = true;
                    break;
                }
                if let Some(record) = ItemRecord::from_row(row, None, api) {
                    progress.items.insert(record);
                }
                if progress.items.len() >= request.limit {
                    break;
                }
            }
            progress.violations = scan.violations();

            tracing::debug!(
                run_id,
                page = progress.pages,
                rows = page.rows.len(),
                found = progress.items.len(),
                "item page scanned"
            );
            self.sink.emit(ProgressEvent::ItemsProgress {
                run_id: run_id.to_string(),
                found: progress.items.len(),
                offset: progress.offset,
            });

            if self.options.strict_ordering && scan.violations() > 0 {
                return Err(HarvestError::OrderingViolated {
                    list: "conversation listing".to_string(),
                    violations: scan.violations(),
                });
            }
            if scope_end {
                pager.stop();
                progress.reached_end = true;
                break;
            }
            if pager.is_drained() {
                progress.reached_end = true;
                break;
            }
        }
        Ok(())
    }
}
