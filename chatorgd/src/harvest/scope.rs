//! Scope decisions against an "updated at or after" cutoff.
//!
//! Listings are assumed to come newest-first, so the first row that is not
//! provably in scope ends the scan of that list. A row with an unknown
//! timestamp also ends the scan, but only a known-older newest row marks a
//! whole project as confirmed out of scope.

use chatorg_core::ItemRow;
use chatorg_core::time::row_updated_ms;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowScope {
    InScope,
    OutOfScope,
    Unknown,
}

pub fn classify_row(row: &ItemRow, cutoff_ms: i64) -> RowScope {
    match row_updated_ms(row) {
        Some(updated) if updated >= cutoff_ms => RowScope::InScope,
        Some(_) => RowScope::OutOfScope,
        None => RowScope::Unknown,
    }
}

/// True only when the newest row has a known timestamp older than the cutoff.
pub fn fast_skip(first_row: Option<&ItemRow>, cutoff_ms: i64) -> bool {
    first_row.is_some_and(|row| classify_row(row, cutoff_ms) == RowScope::OutOfScope)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Take,
    /// Stop scanning this list; carries the classification that ended it.
    ScopeEnd(RowScope),
}

/// Per-list scan state: applies the cutoff row by row and watches for rows
/// that break newest-first ordering.
#[derive(Debug, Clone)]
pub struct ScopeScan {
    cutoff_ms: Option<i64>,
    last_seen_ms: Option<i64>,
    violations: u32,
}

impl ScopeScan {
    pub fn new(cutoff_ms: Option<i64>) -> Self {
        Self {
            cutoff_ms,
            last_seen_ms: None,
            violations: 0,
        }
    }

    pub fn cutoff_ms(&self) -> Option<i64> {
        self.cutoff_ms
    }

    pub fn admit(&mut self, row: &ItemRow) -> Admission {
        let Some(cutoff_ms) = self.cutoff_ms else {
            return Admission::Take;
        };
        if let Some(updated) = row_updated_ms(row) {
            if self.last_seen_ms.is_some_and(|previous| updated > previous) {
                self.violations += 1;
                tracing::warn!(
                    row_id = row.id().unwrap_or_default(),
                    updated,
                    previous = self.last_seen_ms,
                    "listing is not ordered newest-first"
                );
            }
            self.last_seen_ms = Some(updated);
        }
        match classify_row(row, cutoff_ms) {
            RowScope::InScope => Admission::Take,
            other => Admission::ScopeEnd(other),
        }
    }

    /// Rows seen newer than the row before them.
    pub fn violations(&self) -> u32 {
        self.violations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{row, untimed_row};

    const CUTOFF_MS: i64 = 1_000_000;

    #[test]
    fn classifies_against_cutoff_inclusively() {
        assert_eq!(classify_row(&row("a", 1_000), CUTOFF_MS), RowScope::InScope);
        assert_eq!(classify_row(&row("a", 1_001), CUTOFF_MS), RowScope::InScope);
        assert_eq!(classify_row(&row("a", 999), CUTOFF_MS), RowScope::OutOfScope);
        assert_eq!(classify_row(&untimed_row("a"), CUTOFF_MS), RowScope::Unknown);
    }

    #[test]
    fn unparseable_time_is_unknown() {
        let mut garbage = untimed_row("a");
        garbage.update_time = Some(serde_json::json!("not a date"));
        assert_eq!(classify_row(&garbage, CUTOFF_MS), RowScope::Unknown);
    }

    #[test]
    fn fast_skip_requires_known_older_newest_row() {
        assert!(fast_skip(Some(&row("a", 10)), CUTOFF_MS));
        assert!(!fast_skip(Some(&row("a", 5_000)), CUTOFF_MS));
        assert!(!fast_skip(Some(&untimed_row("a")), CUTOFF_MS));
        assert!(!fast_skip(None, CUTOFF_MS));
    }

    #[test]
    fn scan_without_cutoff_takes_everything() {
        let mut scan = ScopeScan::new(None);
        assert_eq!(scan.admit(&row("a", 1)), Admission::Take);
        assert_eq!(scan.admit(&untimed_row("b")), Admission::Take);
        assert_eq!(scan.admit(&row("c", 9_999)), Admission::Take);
        assert_eq!(scan.violations(), 0);
    }

    #[test]
    fn scan_ends_on_first_row_outside_scope() {
        let mut scan = ScopeScan::new(Some(CUTOFF_MS));
        assert_eq!(scan.admit(&row("a", 3_000)), Admission::Take);
        assert_eq!(
            scan.admit(&row("b", 10)),
            Admission::ScopeEnd(RowScope::OutOfScope)
        );
    }

    #[test]
    fn scan_ends_on_unknown_time() {
        let mut scan = ScopeScan::new(Some(CUTOFF_MS));
        assert_eq!(
            scan.admit(&untimed_row("a")),
            Admission::ScopeEnd(RowScope::Unknown)
        );
    }

    #[test]
    fn scan_counts_ordering_inversions() {
        let mut scan = ScopeScan::new(Some(CUTOFF_MS));
        scan.admit(&row("a", 3_000));
        scan.admit(&row("b", 2_000));
        scan.admit(&row("c", 2_500));
        scan.admit(&row("d", 2_500));
        assert_eq!(scan.violations(), 1);
    }
}
