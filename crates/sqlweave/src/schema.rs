//! Column metadata and the schema-provider collaborator interface.
//!
//! The compiler consults schemas for two things: key-vs-value routing in
//! UPDATE, and parameter type inference. Live introspection belongs to the
//! execution collaborator; this module only defines the interface and an
//! in-memory registry suitable for tests and static registration.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::value::DbType;

/// Metadata for one column.
#[derive(Debug, Clone, Default)]
pub struct ColumnInfo {
    /// Part of the primary key.
    pub key: bool,
    pub unique: bool,
    pub db_type: Option<DbType>,
    pub size: Option<u32>,
    pub precision: Option<u8>,
    pub scale: Option<u8>,
    /// Never read or written by builders.
    pub ignored: bool,
    /// Written on INSERT but skipped by UPDATE SET lists.
    pub no_update: bool,
}

impl ColumnInfo {
    pub fn new(db_type: DbType) -> Self {
        Self {
            db_type: Some(db_type),
            ..Self::default()
        }
    }

    pub fn key(mut self) -> Self {
        self.key = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn ignored(mut self) -> Self {
        self.ignored = true;
        self
    }

    pub fn no_update(mut self) -> Self {
        self.no_update = true;
        self
    }
}

/// Column map for one table. Ordered so generated column lists are stable.
#[derive(Debug, Clone, Default)]
pub struct TableSchema {
    pub name: String,
    pub owner: Option<String>,
    pub columns: BTreeMap<String, ColumnInfo>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            owner: None,
            columns: BTreeMap::new(),
        }
    }

    pub fn owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn column(mut self, name: impl Into<String>, info: ColumnInfo) -> Self {
        self.columns.insert(name.into(), info);
        self
    }

    pub fn column_type(&self, name: &str) -> Option<DbType> {
        self.columns.get(name).and_then(|c| c.db_type)
    }

    pub fn is_key(&self, name: &str) -> bool {
        self.columns.get(name).is_some_and(|c| c.key)
    }
}

/// Collaborator interface: resolve column metadata for a table.
pub trait SchemaProvider {
    fn get_schema(&self, table: &str, owner: Option<&str>) -> Option<TableSchema>;
}

/// In-memory schema registry keyed by `owner.table` (or bare table name).
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    tables: BTreeMap<String, TableSchema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(table: &str, owner: Option<&str>) -> String {
        match owner {
            Some(o) => format!("{o}.{table}"),
            None => table.to_string(),
        }
    }

    /// Register a table schema under its (owner, name) pair.
    pub fn register(&mut self, schema: TableSchema) {
        let key = Self::key(&schema.name, schema.owner.as_deref());
        self.tables.insert(key, schema);
    }

    /// Builder-style registration.
    pub fn with(mut self, schema: TableSchema) -> Self {
        self.register(schema);
        self
    }

    /// Wrap into the shared handle builders hold.
    pub fn shared(self) -> Arc<SchemaRegistry> {
        Arc::new(self)
    }
}

impl SchemaProvider for SchemaRegistry {
    fn get_schema(&self, table: &str, owner: Option<&str>) -> Option<TableSchema> {
        self.tables
            .get(&Self::key(table, owner))
            .or_else(|| self.tables.get(table))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> TableSchema {
        TableSchema::new("users")
            .owner("public")
            .column("id", ColumnInfo::new(DbType::BigInt).key())
            .column("email", ColumnInfo::new(DbType::Text).unique())
            .column("created_at", ColumnInfo::new(DbType::Timestamp).no_update())
    }

    #[test]
    fn registry_lookup_with_and_without_owner() {
        let reg = SchemaRegistry::new().with(users());
        assert!(reg.get_schema("users", Some("public")).is_some());
        // Bare lookup falls back to the unqualified key only if registered
        // without owner.
        assert!(reg.get_schema("users", None).is_none());
    }

    #[test]
    fn key_and_type_accessors() {
        let schema = users();
        assert!(schema.is_key("id"));
        assert!(!schema.is_key("email"));
        assert_eq!(schema.column_type("email"), Some(DbType::Text));
        assert_eq!(schema.column_type("missing"), None);
    }
}
