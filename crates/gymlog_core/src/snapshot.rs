//! Immutable committed state.

use crate::error::{CoreError, CoreResult};
use crate::schema::{Schema, TableDef};
use crate::types::SequenceNumber;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Rows of one table plus its index entries.
#[derive(Debug, Clone, Default)]
pub(crate) struct TableData {
    pub(crate) rows: BTreeMap<String, Vec<u8>>,
    /// index name -> (index key, primary key)
    pub(crate) indexes: BTreeMap<&'static str, BTreeSet<(String, String)>>,
}

impl TableData {
    fn empty(def: &TableDef) -> Self {
        Self {
            rows: BTreeMap::new(),
            indexes: def
                .indexes()
                .iter()
                .map(|index| (index.name(), BTreeSet::new()))
                .collect(),
        }
    }

    pub(crate) fn put(&mut self, def: &TableDef, key: String, value: Vec<u8>) {
        self.unindex(def, &key);
        for index in def.indexes() {
            if let Some(index_key) = index.key_for(&value) {
                self.indexes
                    .entry(index.name())
                    .or_default()
                    .insert((index_key, key.clone()));
            }
        }
        self.rows.insert(key, value);
    }

    pub(crate) fn delete(&mut self, def: &TableDef, key: &str) {
        self.unindex(def, key);
        self.rows.remove(key);
    }

    fn unindex(&mut self, def: &TableDef, key: &str) {
        let Some(old) = self.rows.get(key) else {
            return;
        };
        for index in def.indexes() {
            if let Some(index_key) = index.key_for(old) {
                if let Some(entries) = self.indexes.get_mut(index.name()) {
                    entries.remove(&(index_key, key.to_string()));
                }
            }
        }
    }

    /// Primary keys whose index key equals `value`, ascending.
    pub(crate) fn index_keys<'a>(
        &'a self,
        index: &str,
        value: &'a str,
    ) -> impl Iterator<Item = &'a str> + 'a {
        self.indexes
            .get(index)
            .into_iter()
            .flat_map(move |entries| {
                entries
                    .range((value.to_string(), String::new())..)
                    .take_while(move |(index_key, _)| index_key == value)
                    .map(|(_, key)| key.as_str())
            })
    }
}

/// The committed contents of every table at one sequence number.
#[derive(Debug, Clone)]
pub(crate) struct Snapshot {
    pub(crate) sequence: SequenceNumber,
    tables: BTreeMap<&'static str, Arc<TableData>>,
}

impl Snapshot {
    pub(crate) fn empty(schema: &Schema) -> Self {
        Self {
            sequence: SequenceNumber::default(),
            tables: schema
                .tables()
                .iter()
                .map(|def| (def.name(), Arc::new(TableData::empty(def))))
                .collect(),
        }
    }

    pub(crate) fn table(&self, name: &str) -> CoreResult<&TableData> {
        self.tables
            .get(name)
            .map(Arc::as_ref)
            .ok_or_else(|| CoreError::unknown_table(name))
    }

    /// Copy-on-write access; tables not touched stay shared with older snapshots.
    pub(crate) fn table_mut(&mut self, name: &str) -> CoreResult<&mut TableData> {
        self.tables
            .get_mut(name)
            .map(Arc::make_mut)
            .ok_or_else(|| CoreError::unknown_table(name))
    }

    pub(crate) fn tables(&self) -> impl Iterator<Item = (&'static str, &TableData)> {
        self.tables.iter().map(|(name, data)| (*name, data.as_ref()))
    }

    pub(crate) fn row_count(&self) -> usize {
        self.tables.values().map(|t| t.rows.len()).sum()
    }
}
