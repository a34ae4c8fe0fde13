//! Write path: classified retries around single mutations, the
//! sequential, throttled bulk loop built on them, and project creation.

use std::fmt;
use std::time::Duration;

use chatorg_core::ApiError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::remote::RemoteApi;

pub mod bulk;
pub mod create;
pub mod retry;

pub use bulk::{BulkExecutor, BulkReport, BulkResult};
pub use create::{ContainerCreator, CreateOutcome};
pub use retry::{MAX_ATTEMPTS, RetryClass, RetryOutcome, RetryableMutator};

pub const MIN_THROTTLE_MS: u64 = 150;
pub const MAX_THROTTLE_MS: u64 = 5000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MutationKind {
    HideItem,
    MoveItem,
    DeleteContainer,
}

impl MutationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MutationKind::HideItem => "hide-item",
            MutationKind::MoveItem => "move-item",
            MutationKind::DeleteContainer => "delete-container",
        }
    }

    pub fn default_throttle_ms(self) -> u64 {
        match self {
            MutationKind::HideItem => 600,
            MutationKind::MoveItem => 400,
            MutationKind::DeleteContainer => 250,
        }
    }

    /// Requested delay between items, clamped to the allowed window.
    pub fn throttle(self, requested_ms: Option<u64>) -> Duration {
        let ms = requested_ms
            .unwrap_or_else(|| self.default_throttle_ms())
            .clamp(MIN_THROTTLE_MS, MAX_THROTTLE_MS);
        Duration::from_millis(ms)
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One remote mutation, applied per id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOp {
    /// Soft delete: the conversation is hidden, not destroyed.
    HideItem,
    MoveItem { container_id: String },
    DeleteContainer,
}

impl MutationOp {
    pub fn kind(&self) -> MutationKind {
        match self {
            MutationOp::HideItem => MutationKind::HideItem,
            MutationOp::MoveItem { .. } => MutationKind::MoveItem,
            MutationOp::DeleteContainer => MutationKind::DeleteContainer,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            MutationOp::MoveItem { container_id } if container_id.trim().is_empty() => {
                Err(ValidationError::MissingContainerId)
            }
            _ => Ok(()),
        }
    }

    /// Checks a whole run: the op itself and that at least one id is usable.
    pub fn validate_run(&self, ids: &[String]) -> Result<(), ValidationError> {
        self.validate()?;
        if ids.iter().all(|id| id.trim().is_empty()) {
            return Err(ValidationError::NoIds);
        }
        Ok(())
    }

    pub async fn apply<A: RemoteApi>(&self, api: &A, id: &str) -> Result<u16, ApiError> {
        match self {
            MutationOp::HideItem => api.hide_item(id).await,
            MutationOp::MoveItem { container_id } => api.move_item(id, container_id.trim()).await,
            MutationOp::DeleteContainer => api.delete_container(id).await,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("no ids given")]
    NoIds,
    #[error("target project id is missing")]
    MissingContainerId,
}
