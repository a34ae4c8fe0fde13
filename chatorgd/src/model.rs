use std::collections::HashMap;

use chatorg_core::ItemRow;
use chatorg_core::time::parse_time_ms;
use serde::{Deserialize, Serialize};

use crate::remote::RemoteApi;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub id: String,
    pub title: String,
    pub href: String,
    /// `None` for conversations that do not belong to a project.
    pub container_id: Option<String>,
    pub created_at: Option<i64>,
    pub updated_at: Option<i64>,
}

impl ItemRecord {
    /// Builds a record from a listing row; rows without an id are dropped.
    pub fn from_row<A: RemoteApi>(
        row: &ItemRow,
        container_id: Option<&str>,
        api: &A,
    ) -> Option<Self> {
        let id = row.id()?;
        Some(Self {
            id: id.to_string(),
            title: row.display_title(),
            href: api.item_href(id),
            container_id: container_id.map(str::to_string),
            created_at: row.create_time.as_ref().and_then(parse_time_ms),
            updated_at: row.update_time.as_ref().and_then(parse_time_ms),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerRecord {
    pub id: String,
    pub title: String,
    pub href: String,
    pub items: Vec<ItemRecord>,
}

/// Insertion-ordered set of records keyed by id.
///
/// Re-inserting a known id replaces the stored record in place.
#[derive(Debug, Default)]
pub struct ItemSet {
    records: Vec<ItemRecord>,
    positions: HashMap<String, usize>,
}

impl ItemSet {
    pub fn insert(&mut self, record: ItemRecord) -> bool {
        match self.positions.get(&record.id) {
            Some(&position) => {
                self.records[position] = record;
                false
            }
            None => {
                self.positions.insert(record.id.clone(), self.records.len());
                self.records.push(record);
                true
            }
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_vec(self) -> Vec<ItemRecord> {
        self.records
    }
}
