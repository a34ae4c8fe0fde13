//! Read path: paged, scope-aware harvesting of conversations and projects.

use chatorg_core::ApiError;
use thiserror::Error;

use crate::pacing::Jitter;

pub mod containers;
pub mod items;
pub mod paginator;
pub mod scope;

pub use containers::{ContainerHarvest, ContainerHarvestRequest, ContainerHarvester};
pub use items::{ItemHarvest, ItemHarvestRequest, ItemHarvester};

/// Flat conversation listing.
pub(crate) const ITEM_LIST_MAX_STEPS: u32 = 200;
pub(crate) const ITEM_LIST_PACING: Jitter = Jitter::base_plus(90, 120);
pub(crate) const MAX_PAGE_SIZE: u32 = 100;

/// Project sidebar listing.
pub(crate) const CONTAINER_LIST_MAX_STEPS: u32 = 80;
pub(crate) const CONTAINER_LIST_PACING: Jitter = Jitter::base_plus(60, 80);

/// Conversations inside one project.
pub(crate) const CONTAINER_ITEMS_MAX_STEPS: u32 = 120;
pub(crate) const CONTAINER_ITEMS_PACING: Jitter = Jitter::base_plus(80, 120);

pub(crate) const BETWEEN_CONTAINERS_PACING: Jitter = Jitter::base_plus(120, 180);

#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("api error: {0}")]
    Api(#[from] ApiError),
    #[error("{list} is not ordered newest-first ({violations} inversions)")]
    OrderingViolated { list: String, violations: u32 },
}

/// Knobs shared by both harvesters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HarvestOptions {
    /// Fail the harvest instead of warning when a listing is out of order
    /// while a cutoff is active.
    pub strict_ordering: bool,
}
