use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunCategory {
    ListItems,
    ListContainers,
    ExecuteMutation,
}

impl RunCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            RunCategory::ListItems => "list-items",
            RunCategory::ListContainers => "list-containers",
            RunCategory::ExecuteMutation => "execute-mutation",
        }
    }
}

impl fmt::Display for RunCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("a {0} run is already in progress")]
pub struct ConcurrentRunRejected(pub RunCategory);

/// Single-flight admission per run category.
///
/// Categories are independent: a listing and a mutation run may overlap,
/// two runs of the same category may not.
#[derive(Debug, Default)]
pub struct RunGuard {
    list_items: AtomicBool,
    list_containers: AtomicBool,
    execute_mutation: AtomicBool,
}

impl RunGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_acquire(&self, category: RunCategory) -> Result<RunPermit<'_>, ConcurrentRunRejected> {
        self.flag(category)
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| RunPermit {
                guard: self,
                category,
            })
            .map_err(|_| ConcurrentRunRejected(category))
    }

    pub fn is_running(&self, category: RunCategory) -> bool {
        self.flag(category).load(Ordering::Acquire)
    }

    fn release(&self, category: RunCategory) {
        self.flag(category).store(false, Ordering::Release);
    }

    fn flag(&self, category: RunCategory) -> &AtomicBool {
        match category {
            RunCategory::ListItems => &self.list_items,
            RunCategory::ListContainers => &self.list_containers,
            RunCategory::ExecuteMutation => &self.execute_mutation,
        }
    }
}

/// Held for the lifetime of a run; dropping it releases the category.
#[derive(Debug)]
pub struct RunPermit<'a> {
    guard: &'a RunGuard,
    category: RunCategory,
}

impl RunPermit<'_> {
    pub fn category(&self) -> RunCategory {
        self.category
    }
}

impl Drop for RunPermit<'_> {
    fn drop(&mut self) {
        self.guard.release(self.category);
    }
}
