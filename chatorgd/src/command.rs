//! Inbound requests, one closed set of tagged JSON messages.

use serde::Deserialize;

use crate::config::EngineConfig;
use crate::guard::RunCategory;
use crate::harvest::{ContainerHarvestRequest, ItemHarvestRequest};
use crate::mutate::{MutationOp, ValidationError};

pub const MAX_ITEM_LIMIT: usize = 50_000;
pub const MAX_PAGE_SIZE: u32 = 100;
pub const MAX_CONTAINER_LIMIT: usize = 5_000;
pub const MAX_ITEMS_PER_CONTAINER: u32 = 50;
pub const MAX_PER_CONTAINER_LIMIT: usize = 50_000;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    Ping,
    ListItems {
        #[serde(default)]
        limit: Option<usize>,
        #[serde(default)]
        page_size: Option<u32>,
        #[serde(default)]
        since_updated_ms: Option<i64>,
    },
    ListContainers {
        #[serde(default)]
        limit: Option<usize>,
        #[serde(default)]
        items_per_container: Option<u32>,
        #[serde(default)]
        per_container_limit: Option<usize>,
        #[serde(default)]
        since_updated_ms: Option<i64>,
        #[serde(default)]
        stop_after_out_of_scope: Option<u32>,
    },
    HideItems {
        #[serde(default)]
        ids: Vec<String>,
        #[serde(default)]
        throttle_ms: Option<u64>,
    },
    MoveItems {
        #[serde(default)]
        ids: Vec<String>,
        #[serde(default)]
        container_id: String,
        #[serde(default)]
        throttle_ms: Option<u64>,
    },
    DeleteContainers {
        #[serde(default)]
        ids: Vec<String>,
        #[serde(default)]
        throttle_ms: Option<u64>,
    },
    CreateContainer {
        #[serde(default)]
        name: String,
        #[serde(default)]
        description: String,
        #[serde(default)]
        prompt_starters: Vec<String>,
    },
}

impl Command {
    /// Run category gated by the guard; `None` for commands that touch
    /// nothing remote.
    pub fn category(&self) -> Option<RunCategory> {
        match self {
            Command::Ping => None,
            Command::ListItems { .. } => Some(RunCategory::ListItems),
            Command::ListContainers { .. } => Some(RunCategory::ListContainers),
            Command::HideItems { .. }
            | Command::MoveItems { .. }
            | Command::DeleteContainers { .. }
            | Command::CreateContainer { .. } => Some(RunCategory::ExecuteMutation),
        }
    }

    /// Checks that need no remote state. Runs before the guard is asked for
    /// a permit.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Command::HideItems { ids, .. } => MutationOp::HideItem.validate_run(ids),
            Command::MoveItems {
                ids, container_id, ..
            } => MutationOp::MoveItem {
                container_id: container_id.clone(),
            }
            .validate_run(ids),
            Command::DeleteContainers { ids, .. } => MutationOp::DeleteContainer.validate_run(ids),
            Command::Ping
            | Command::ListItems { .. }
            | Command::ListContainers { .. }
            | Command::CreateContainer { .. } => Ok(()),
        }
    }
}

pub(crate) fn item_request(
    config: &EngineConfig,
    limit: Option<usize>,
    page_size: Option<u32>,
    since_updated_ms: Option<i64>,
) -> ItemHarvestRequest {
    ItemHarvestRequest {
        limit: limit.unwrap_or(config.item_limit).clamp(1, MAX_ITEM_LIMIT),
        page_size: page_size.unwrap_or(config.page_size).clamp(1, MAX_PAGE_SIZE),
        since_updated_ms: since_updated_ms.or(config.since_updated_ms),
    }
}

pub(crate) fn container_request(
    config: &EngineConfig,
    limit: Option<usize>,
    items_per_container: Option<u32>,
    per_container_limit: Option<usize>,
    since_updated_ms: Option<i64>,
    stop_after_out_of_scope: Option<u32>,
) -> ContainerHarvestRequest {
    ContainerHarvestRequest {
        limit: limit
            .unwrap_or(config.container_limit)
            .clamp(1, MAX_CONTAINER_LIMIT),
        items_per_container: items_per_container
            .unwrap_or(config.items_per_container)
            .clamp(1, MAX_ITEMS_PER_CONTAINER),
        per_container_limit: per_container_limit
            .unwrap_or(config.per_container_limit)
            .clamp(1, MAX_PER_CONTAINER_LIMIT),
        since_updated_ms: since_updated_ms.or(config.since_updated_ms),
        stop_after_out_of_scope: stop_after_out_of_scope.unwrap_or(config.stop_after_out_of_scope),
    }
}
