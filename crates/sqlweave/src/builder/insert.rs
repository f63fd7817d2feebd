//! INSERT builder.

use std::sync::Arc;

use serde::Serialize;

use crate::builder::table::{resolve_table_spec, Scope, TableEntry};
use crate::builder::traits::SqlStatement;
use crate::capture::{Capture, Captured, Expr, IntoCaptured};
use crate::compile::Compiler;
use crate::dialect::Dialect;
use crate::error::{SqlError, SqlResult};
use crate::param::ParamBag;
use crate::schema::SchemaRegistry;
use crate::value::Value;

/// Fluent INSERT specification. Column/value pairs accumulate in call
/// order; columns the schema marks `ignored` are dropped at build time.
#[derive(Debug, Clone)]
pub struct InsertStatement {
    dialect: Dialect,
    schemas: Option<Arc<SchemaRegistry>>,
    table_spec: String,
    pairs: Vec<(String, Captured)>,
}

impl InsertStatement {
    pub fn new(table: &str) -> Self {
        Self {
            dialect: Dialect::default(),
            schemas: None,
            table_spec: table.to_string(),
            pairs: Vec::new(),
        }
    }

    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn with_schemas(mut self, schemas: Arc<SchemaRegistry>) -> Self {
        self.schemas = Some(schemas);
        self
    }

    /// Set one column to a literal value.
    pub fn value(mut self, column: &str, v: impl Into<Value>) -> Self {
        self.pairs.push((column.to_string(), Captured::Value(v.into())));
        self
    }

    /// Set one column to a captured expression.
    pub fn value_expr<F, R>(mut self, column: &str, f: F) -> Self
    where
        F: FnOnce(Expr) -> R,
        R: IntoCaptured,
    {
        self.pairs.push((column.to_string(), Capture::one(f)));
        self
    }

    /// Set columns from a serializable model. The model must serialize to
    /// a JSON object; each field becomes one column/value pair.
    pub fn values_model<T: Serialize>(mut self, model: &T) -> SqlResult<Self> {
        for (column, value) in model_fields(model)? {
            self.pairs.push((column, Captured::Value(value)));
        }
        Ok(self)
    }
}

/// Serialize a model and flatten it into column/value pairs.
pub(crate) fn model_fields<T: Serialize>(model: &T) -> SqlResult<Vec<(String, Value)>> {
    let json = serde_json::to_value(model)?;
    let serde_json::Value::Object(map) = json else {
        return Err(SqlError::argument(
            "model must serialize to an object with named fields",
        ));
    };
    Ok(map
        .into_iter()
        .map(|(k, v)| (k, Value::from_json(v)))
        .collect())
}

impl SqlStatement for InsertStatement {
    fn build(&self) -> SqlResult<(String, ParamBag)> {
        let spec = Captured::Value(Value::from(self.table_spec.as_str()));
        let resolved = resolve_table_spec(&spec, 0, self.schemas.as_deref())?;
        let entry: TableEntry = resolved.entry;

        let pairs: Vec<&(String, Captured)> = self
            .pairs
            .iter()
            .filter(|(column, _)| {
                entry
                    .schema
                    .as_ref()
                    .and_then(|s| s.columns.get(column))
                    .is_none_or(|c| !c.ignored)
            })
            .collect();
        if pairs.is_empty() {
            return Err(SqlError::validation("INSERT requires at least one column"));
        }

        let tables = std::slice::from_ref(&entry);
        let scope = Scope {
            tables,
            parent: None,
        };
        let mut bag = ParamBag::new();
        let mut compiler = Compiler::new(&scope, &self.dialect, Some(&mut bag));

        let mut columns = Vec::with_capacity(pairs.len());
        let mut values = Vec::with_capacity(pairs.len());
        for (column, captured) in pairs {
            columns.push(self.dialect.decorate(column));
            values.push(compiler.compile_column_value(column, captured)?);
        }

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            entry.sql(&self.dialect),
            columns.join(", "),
            values.join(", ")
        );
        Ok((sql, bag))
    }

    fn dialect(&self) -> &Dialect {
        &self.dialect
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::insert;
    use crate::schema::{ColumnInfo, TableSchema};
    use crate::value::DbType;

    #[test]
    fn insert_with_explicit_values() {
        let stmt = insert("public.users")
            .value("email", "a@b.c")
            .value("age", 30i64);
        let (text, bag) = stmt.build().unwrap();
        assert_eq!(
            text,
            "INSERT INTO \"public\".\"users\" (\"email\", \"age\") VALUES (@p0, @p1)"
        );
        assert_eq!(bag.len(), 2);
    }

    #[test]
    fn insert_from_model() {
        #[derive(Serialize)]
        struct NewUser {
            email: String,
            age: i64,
        }
        let stmt = insert("users")
            .values_model(&NewUser {
                email: "a@b.c".into(),
                age: 30,
            })
            .unwrap();
        let (text, bag) = stmt.build().unwrap();
        assert_eq!(
            text,
            "INSERT INTO \"users\" (\"age\", \"email\") VALUES (@p0, @p1)"
        );
        assert_eq!(bag.get("p0").unwrap().value, Value::Int(30));
    }

    #[test]
    fn ignored_columns_are_dropped() {
        let schemas = SchemaRegistry::new()
            .with(
                TableSchema::new("users")
                    .column("email", ColumnInfo::new(DbType::Text))
                    .column("cached_rank", ColumnInfo::new(DbType::BigInt).ignored()),
            )
            .shared();
        let stmt = insert("users")
            .with_schemas(schemas)
            .value("email", "a@b.c")
            .value("cached_rank", 9i64);
        let (text, bag) = stmt.build().unwrap();
        assert_eq!(text, "INSERT INTO \"users\" (\"email\") VALUES (@p0)");
        assert_eq!(bag.len(), 1);
    }

    #[test]
    fn empty_insert_is_rejected() {
        let err = insert("users").build().unwrap_err();
        assert!(matches!(err, SqlError::Validation(_)));
    }

    #[test]
    fn non_object_model_is_rejected() {
        assert!(insert("users").values_model(&42i64).is_err());
    }

    #[test]
    fn schema_drives_parameter_types() {
        let schemas = SchemaRegistry::new()
            .with(TableSchema::new("users").column("age", ColumnInfo::new(DbType::BigInt)))
            .shared();
        let stmt = insert("users").with_schemas(schemas).value("age", 30i32);
        let (_, bag) = stmt.build().unwrap();
        assert_eq!(bag.get("p0").unwrap().db_type, DbType::BigInt);
    }
}
