use std::collections::HashSet;

use chatorg_core::{ItemRow, SidebarEntry};
use futures_util::TryStreamExt;
use serde::Serialize;
use tokio::time::Instant;

use super::paginator::{Page, PagePosition, Paginator};
use super::scope::{Admission, ScopeScan, fast_skip};
use super::{
    BETWEEN_CONTAINERS_PACING, CONTAINER_ITEMS_MAX_STEPS, CONTAINER_ITEMS_PACING,
    CONTAINER_LIST_MAX_STEPS, CONTAINER_LIST_PACING, HarvestError, HarvestOptions,
};
use crate::model::{ContainerRecord, ItemRecord, ItemSet};
use crate::progress::{ProgressEvent, ProgressSink, millis};
use crate::remote::RemoteApi;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerHarvestRequest {
    /// Projects to list, in sidebar order.
    pub limit: usize,
    /// Preview size the sidebar endpoint is asked for.
    pub items_per_container: u32,
    pub per_container_limit: usize,
    pub since_updated_ms: Option<i64>,
    /// Consecutive confirmed out-of-scope projects that end the harvest;
    /// `0` disables the rule.
    pub stop_after_out_of_scope: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerHarvest {
    pub containers: Vec<ContainerRecord>,
    pub listed: usize,
    pub processed: usize,
    pub stopped_early: bool,
    pub ordering_violations: u32,
}

/// Project-first harvest: list projects, then page each project's
/// conversations with the cutoff applied.
pub struct ContainerHarvester<'a, A> {
    api: &'a A,
    sink: &'a dyn ProgressSink,
    options: HarvestOptions,
}

struct Listed {
    id: String,
    title: String,
    href: String,
}

struct ContainerScan {
    items: ItemSet,
    out_of_scope: bool,
    violations: u32,
}

#[derive(Default)]
struct Progress {
    kept: Vec<ContainerRecord>,
    listed: usize,
    processed: usize,
    items: usize,
    stopped_early: bool,
    violations: u32,
}

impl<'a, A: RemoteApi> ContainerHarvester<'a, A> {
    pub fn new(api: &'a A, sink: &'a dyn ProgressSink, options: HarvestOptions) -> Self {
        Self { api, sink, options }
    }

    pub async fn harvest(
        &self,
        run_id: &str,
        request: ContainerHarvestRequest,
    ) -> Result<ContainerHarvest, HarvestError> {
        let started = Instant::now();
        tracing::info!(
            run_id,
            limit = request.limit,
            per_container_limit = request.per_container_limit,
            since_updated_ms = request.since_updated_ms,
            stop_after_out_of_scope = request.stop_after_out_of_scope,
            "container harvest started"
        );

        let mut progress = Progress::default();
        let result = self.collect(run_id, request, &mut progress).await;
        let elapsed_ms = millis(started.elapsed());

        self.sink.emit(ProgressEvent::ContainersDone {
            run_id: run_id.to_string(),
            processed: progress.processed,
            kept: progress.kept.len(),
            items: progress.items,
            elapsed_ms,
        });

        match result {
            Ok(()) => {
                tracing::info!(
                    run_id,
                    listed = progress.listed,
                    processed = progress.processed,
                    kept = progress.kept.len(),
                    items = progress.items,
                    stopped_early = progress.stopped_early,
                    elapsed_ms,
                    "container harvest finished"
                );
                Ok(ContainerHarvest {
                    containers: progress.kept,
                    listed: progress.listed,
                    processed: progress.processed,
                    stopped_early: progress.stopped_early,
                    ordering_violations: progress.violations,
                })
            }
            Err(err) => {
                tracing::error!(
                    run_id,
                    processed = progress.processed,
                    kept = progress.kept.len(),
                    %err,
                    "container harvest aborted"
                );
                Err(err)
            }
        }
    }

    async fn collect(
        &self,
        run_id: &str,
        request: ContainerHarvestRequest,
        progress: &mut Progress,
    ) -> Result<(), HarvestError> {
        let listed = self.list_containers(&request).await?;
        progress.listed = listed.len();
        tracing::debug!(run_id, listed = listed.len(), "projects listed");

        let mut consecutive_out_of_scope = 0u32;
        for (index, container) in listed.into_iter().enumerate() {
            if index > 0 {
                BETWEEN_CONTAINERS_PACING.wait().await;
            }

            let scan = self.scan_container(&container.id, &request).await;
            progress.processed += 1;
            let scan = scan?;
            progress.violations += scan.violations;

            if request.since_updated_ms.is_some() {
                if scan.out_of_scope {
                    consecutive_out_of_scope += 1;
                } else {
                    consecutive_out_of_scope = 0;
                }
            }

            let found = scan.items.len();
            let keep = request.since_updated_ms.is_none() || found > 0;
            if keep {
                progress.items += found;
                progress.kept.push(ContainerRecord {
                    id: container.id.clone(),
                    title: container.title,
                    href: container.href,
                    items: scan.items.into_vec(),
                });
            }
            tracing::debug!(
                run_id,
                container_id = %container.id,
                found,
                keep,
                out_of_scope = scan.out_of_scope,
                consecutive_out_of_scope,
                "project scanned"
            );
            self.sink.emit(ProgressEvent::ContainersProgress {
                run_id: run_id.to_string(),
                processed: progress.processed,
                kept: progress.kept.len(),
                listed: progress.listed,
                items: progress.items,
                container_id: container.id,
                out_of_scope: scan.out_of_scope,
            });

            if request.stop_after_out_of_scope > 0
                && consecutive_out_of_scope >= request.stop_after_out_of_scope
            {
                tracing::info!(
                    run_id,
                    consecutive_out_of_scope,
                    "stopping after consecutive out-of-scope projects"
                );
                progress.stopped_early = true;
                break;
            }
        }
        Ok(())
    }

    /// Sidebar listing, deduplicated by id and capped at `limit`. No scope
    /// applies here: project order says nothing about item recency.
    async fn list_containers(
        &self,
        request: &ContainerHarvestRequest,
    ) -> Result<Vec<Listed>, HarvestError> {
        if request.limit == 0 {
            return Ok(Vec::new());
        }
        let api = self.api;
        let per_container = request.items_per_container;
        let rows = Paginator::cursor(
            CONTAINER_LIST_MAX_STEPS,
            CONTAINER_LIST_PACING,
            move |position| {
                let cursor = match position {
                    PagePosition::Cursor(cursor) => cursor,
                    PagePosition::Offset { .. } => None,
                };
                async move {
                    api.list_containers_page(cursor.as_deref(), per_container)
                        .await
                        .map(Page::<SidebarEntry>::from)
                }
            },
        )
        .into_rows();
        let mut rows = std::pin::pin!(rows);

        let mut seen = HashSet::new();
        let mut listed = Vec::new();
        while listed.len() < request.limit {
            let Some(entry) = rows.try_next().await? else {
                break;
            };
            let Some(info) = entry.info() else {
                continue;
            };
            let Some(id) = info.id() else {
                continue;
            };
            if !seen.insert(id.to_string()) {
                continue;
            }
            listed.push(Listed {
                id: id.to_string(),
                title: info.display_title(),
                href: api.container_href(info.short_url()),
            });
        }
        Ok(listed)
    }

    async fn scan_container(
        &self,
        container_id: &str,
        request: &ContainerHarvestRequest,
    ) -> Result<ContainerScan, HarvestError> {
        let api = self.api;
        let mut pager = Paginator::cursor(
            CONTAINER_ITEMS_MAX_STEPS,
            CONTAINER_ITEMS_PACING,
            move |position| {
                let cursor = match position {
                    PagePosition::Cursor(cursor) => cursor,
                    PagePosition::Offset { .. } => None,
                };
                async move {
                    api.list_container_items_page(container_id, cursor.as_deref())
                        .await
                        .map(Page::<ItemRow>::from)
                }
            },
        );
        let mut scan = ScopeScan::new(request.since_updated_ms);
        let mut items = ItemSet::default();
        let mut out_of_scope = false;

        while items.len() < request.per_container_limit {
            let Some(page) = pager.next_page().await? else {
                break;
            };
            if pager.steps() == 1 {
                if let Some(cutoff_ms) = scan.cutoff_ms() {
                    if fast_skip(page.rows.first(), cutoff_ms) {
                        tracing::debug!(container_id, "newest conversation predates cutoff");
                        out_of_scope = true;
                        break;
                    }
                }
            }

            let mut scope_end = false;
            for row in &page.rows {
                if let Admission::ScopeEnd(scope) = scan.admit(row) {
                    tracing::debug!(container_id, ?scope, "reached scope end");
                    scope_end = true;
                    break;
                }
                if let Some(record) = ItemRecord::from_row(row, Some(container_id), api) {
                    items.insert(record);
                }
                if items.len() >= request.per_container_limit {
                    break;
                }
            }

            if self.options.strict_ordering && scan.violations() > 0 {
                return Err(HarvestError::OrderingViolated {
                    list: format!("project {container_id}"),
                    violations: scan.violations(),
                });
            }
            if scope_end || pager.is_drained() {
                break;
            }
        }

        Ok(ContainerScan {
            items,
            out_of_scope,
            violations: scan.violations(),
        })
    }
}
