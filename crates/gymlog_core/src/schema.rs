//! Table and index declarations.

/// Computes the secondary index key for a stored value.
///
/// Returning `None` leaves the row out of the index.
pub type IndexExtractor = fn(&[u8]) -> Option<String>;

/// A secondary index over one table.
#[derive(Debug, Clone, Copy)]
pub struct IndexDef {
    name: &'static str,
    extract: IndexExtractor,
}

impl IndexDef {
    /// Declares an index named `name` keyed by `extract`.
    #[must_use]
    pub const fn new(name: &'static str, extract: IndexExtractor) -> Self {
        Self { name, extract }
    }

    /// Returns the index name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Computes the index key for `value`.
    #[must_use]
    pub fn key_for(&self, value: &[u8]) -> Option<String> {
        (self.extract)(value)
    }
}

/// A named table and its indexes.
#[derive(Debug, Clone)]
pub struct TableDef {
    name: &'static str,
    indexes: Vec<IndexDef>,
}

impl TableDef {
    /// Declares a table with no indexes.
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            indexes: Vec::new(),
        }
    }

    /// Adds a secondary index.
    #[must_use]
    pub fn with_index(mut self, index: IndexDef) -> Self {
        self.indexes.push(index);
        self
    }

    /// Returns the table name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the declared indexes.
    #[must_use]
    pub fn indexes(&self) -> &[IndexDef] {
        &self.indexes
    }

    /// Looks up an index by name.
    #[must_use]
    pub fn index(&self, name: &str) -> Option<&IndexDef> {
        self.indexes.iter().find(|index| index.name == name)
    }
}

/// The set of tables a database holds.
///
/// Tables cannot be created at runtime. Journal records for tables missing
/// from the schema are skipped during recovery.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    tables: Vec<TableDef>,
}

impl Schema {
    /// Creates an empty schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a table, replacing any earlier declaration with the same name.
    #[must_use]
    pub fn with_table(mut self, table: TableDef) -> Self {
        self.tables.retain(|t| t.name != table.name);
        self.tables.push(table);
        self
    }

    /// Looks up a table by name.
    #[must_use]
    pub fn table(&self, name: &str) -> Option<&TableDef> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Returns every table in declaration order.
    #[must_use]
    pub fn tables(&self) -> &[TableDef] {
        &self.tables
    }
}
