//! UPDATE builder.
//!
//! `update(column, value)` routes through the schema: key columns become
//! WHERE conditions, everything else lands in the SET list. Model-based
//! variants do the same for every serialized field. Statements without a
//! WHERE clause are rejected unless explicitly allowed.

use std::sync::Arc;

use serde::Serialize;

use crate::builder::insert::model_fields;
use crate::builder::table::{resolve_table_spec, Scope};
use crate::builder::traits::SqlStatement;
use crate::builder::where_clause::{Connective, WhereClause};
use crate::capture::{Capture, Captured, Expr, IntoCaptured};
use crate::compile::Compiler;
use crate::dialect::Dialect;
use crate::error::{SqlError, SqlResult};
use crate::param::ParamBag;
use crate::schema::SchemaRegistry;
use crate::value::Value;

/// One stored column/value pair plus how it should be routed at build
/// time, once the schema is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Routing {
    /// Always a SET assignment.
    Set,
    /// SET unless the schema marks the column as a key, then WHERE.
    Auto,
}

#[derive(Debug, Clone)]
struct PairSpec {
    column: String,
    value: Captured,
    routing: Routing,
    /// Pair came from a serialized model; honors `no_update`.
    from_model: bool,
}

/// Fluent UPDATE specification.
#[derive(Debug, Clone)]
pub struct UpdateStatement {
    dialect: Dialect,
    schemas: Option<Arc<SchemaRegistry>>,
    table_spec: String,
    pairs: Vec<PairSpec>,
    filter: WhereClause,
    allow_all: bool,
}

impl UpdateStatement {
    pub fn new(table: &str) -> Self {
        Self {
            dialect: Dialect::default(),
            schemas: None,
            table_spec: table.to_string(),
            pairs: Vec::new(),
            filter: WhereClause::default(),
            allow_all: false,
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

    /// Permit an UPDATE that touches every row.
    pub fn allow_update_all(mut self) -> Self {
        self.allow_all = true;
        self
    }

    /// Unconditional SET assignment.
    pub fn set(mut self, column: &str, v: impl Into<Value>) -> Self {
        self.pairs.push(PairSpec {
            column: column.to_string(),
            value: Captured::Value(v.into()),
            routing: Routing::Set,
            from_model: false,
        });
        self
    }

    /// SET assignment from a captured expression
    /// (`t.set_member("count", t.col("count") + 1)` style expressions go
    /// through [`UpdateStatement::set_expr`] as plain values).
    pub fn set_expr<F, R>(mut self, column: &str, f: F) -> Self
    where
        F: FnOnce(Expr) -> R,
        R: IntoCaptured,
    {
        self.pairs.push(PairSpec {
            column: column.to_string(),
            value: Capture::one(f),
            routing: Routing::Set,
            from_model: false,
        });
        self
    }

    /// Schema-routed pair: key columns filter, value columns assign.
    pub fn update(mut self, column: &str, v: impl Into<Value>) -> Self {
        self.pairs.push(PairSpec {
            column: column.to_string(),
            value: Captured::Value(v.into()),
            routing: Routing::Auto,
            from_model: false,
        });
        self
    }

    /// SET every serialized field of the model, skipping `ignored` and
    /// `no_update` columns.
    pub fn set_model<T: Serialize>(mut self, model: &T) -> SqlResult<Self> {
        for (column, value) in model_fields(model)? {
            self.pairs.push(PairSpec {
                column,
                value: Captured::Value(value),
                routing: Routing::Set,
                from_model: true,
            });
        }
        Ok(self)
    }

    /// Schema-routed model update: key fields become the WHERE clause,
    /// the rest the SET list.
    pub fn update_model<T: Serialize>(mut self, model: &T) -> SqlResult<Self> {
        for (column, value) in model_fields(model)? {
            self.pairs.push(PairSpec {
                column,
                value: Captured::Value(value),
                routing: Routing::Auto,
                from_model: true,
            });
        }
        Ok(self)
    }

    pub fn and_where<F, R>(mut self, f: F) -> Self
    where
        F: FnOnce(Expr) -> R,
        R: IntoCaptured,
    {
        self.filter.push(Capture::one(f), Connective::And);
        self
    }

    pub fn or_where<F, R>(mut self, f: F) -> Self
    where
        F: FnOnce(Expr) -> R,
        R: IntoCaptured,
    {
        self.filter.push(Capture::one(f), Connective::Or);
        self
    }
}

impl SqlStatement for UpdateStatement {
    fn build(&self) -> SqlResult<(String, ParamBag)> {
        let spec = Captured::Value(Value::from(self.table_spec.as_str()));
        let resolved = resolve_table_spec(&spec, 0, self.schemas.as_deref())?;
        let entry = resolved.entry;
        let schema = entry.schema.clone();

        let tables = std::slice::from_ref(&entry);
        let scope = Scope {
            tables,
            parent: None,
        };
        let mut bag = ParamBag::new();
        let mut compiler = Compiler::new(&scope, &self.dialect, Some(&mut bag));

        // SET text precedes WHERE text, so assignments are compiled first
        // to keep parameter tokens in text order.
        let is_key = |pair: &PairSpec| {
            pair.routing == Routing::Auto
                && schema
                    .as_ref()
                    .and_then(|s| s.columns.get(&pair.column))
                    .is_some_and(|c| c.key)
        };
        let mut assignments = Vec::new();
        for pair in &self.pairs {
            let info = schema.as_ref().and_then(|s| s.columns.get(&pair.column));
            if info.is_some_and(|c| c.ignored) || is_key(pair) {
                continue;
            }
            if pair.from_model && info.is_some_and(|c| c.no_update) {
                continue;
            }
            assignments.push(compiler.compile_assignment(&pair.column, &pair.value)?);
        }
        let mut key_conditions = Vec::new();
        for pair in self.pairs.iter().filter(|p| is_key(p)) {
            let text = compiler.compile_column_value(&pair.column, &pair.value)?;
            key_conditions.push(format!(
                "({} = {text})",
                self.dialect.decorate(&pair.column)
            ));
        }
        if assignments.is_empty() {
            return Err(SqlError::validation("UPDATE requires at least one SET column"));
        }

        let mut where_parts = Vec::new();
        if !self.filter.is_empty() {
            where_parts.push(self.filter.build(&mut compiler)?);
        }
        where_parts.extend(key_conditions);
        if where_parts.is_empty() && !self.allow_all {
            return Err(SqlError::validation(
                "UPDATE without a WHERE clause; call allow_update_all() if intended",
            ));
        }

        let mut sql = format!(
            "UPDATE {} SET {}",
            entry.sql(&self.dialect),
            assignments.join(", ")
        );
        if !where_parts.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&where_parts.join(" AND "));
        }
        Ok((sql, bag))
    }

    fn dialect(&self) -> &Dialect {
        &self.dialect
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::update;
    use crate::schema::{ColumnInfo, TableSchema};
    use crate::value::DbType;

    fn users_schemas() -> Arc<SchemaRegistry> {
        SchemaRegistry::new()
            .with(
                TableSchema::new("users")
                    .column("id", ColumnInfo::new(DbType::BigInt).key())
                    .column("email", ColumnInfo::new(DbType::Text))
                    .column("created_at", ColumnInfo::new(DbType::Timestamp).no_update())
                    .column("cached_rank", ColumnInfo::new(DbType::BigInt).ignored()),
            )
            .shared()
    }

    #[test]
    fn set_with_explicit_where() {
        let stmt = update("users")
            .set("email", "new@b.c")
            .and_where(|t| t.col("id").eq(7i64));
        let (text, bag) = stmt.build().unwrap();
        assert_eq!(
            text,
            "UPDATE \"users\" SET \"email\" = @p0 WHERE (\"id\" = @p1)"
        );
        assert_eq!(bag.len(), 2);
    }

    #[test]
    fn update_routes_key_columns_to_where() {
        let stmt = update("users")
            .with_schemas(users_schemas())
            .update("id", 7i64)
            .update("email", "new@b.c");
        let (text, _) = stmt.build().unwrap();
        assert_eq!(
            text,
            "UPDATE \"users\" SET \"email\" = @p0 WHERE (\"id\" = @p1)"
        );
    }

    #[test]
    fn update_model_routes_and_skips() {
        #[derive(Serialize)]
        struct User {
            id: i64,
            email: String,
            created_at: String,
            cached_rank: i64,
        }
        let stmt = update("users")
            .with_schemas(users_schemas())
            .update_model(&User {
                id: 7,
                email: "new@b.c".into(),
                created_at: "2026-01-01".into(),
                cached_rank: 3,
            })
            .unwrap();
        let (text, _) = stmt.build().unwrap();
        // created_at is no_update, cached_rank is ignored.
        assert_eq!(
            text,
            "UPDATE \"users\" SET \"email\" = @p0 WHERE (\"id\" = @p1)"
        );
    }

    #[test]
    fn set_model_keeps_keys_in_set_list() {
        #[derive(Serialize)]
        struct Patch {
            email: String,
        }
        let stmt = update("users")
            .with_schemas(users_schemas())
            .set_model(&Patch {
                email: "new@b.c".into(),
            })
            .unwrap()
            .and_where(|t| t.col("id").gt(0i64));
        let (text, _) = stmt.build().unwrap();
        assert!(text.starts_with("UPDATE \"users\" SET \"email\" = @p0"));
    }

    #[test]
    fn update_without_where_is_rejected() {
        let err = update("users").set("email", "x").build().unwrap_err();
        assert!(matches!(err, SqlError::Validation(_)));
        let stmt = update("users").set("email", "x").allow_update_all();
        assert_eq!(
            stmt.command_text().unwrap(),
            "UPDATE \"users\" SET \"email\" = @p0"
        );
    }

    #[test]
    fn set_expr_compiles_expression() {
        let stmt = update("counters")
            .set_expr("hits", |t| t.col("hits") + 1i64)
            .allow_update_all();
        let (text, bag) = stmt.build().unwrap();
        assert_eq!(
            text,
            "UPDATE \"counters\" SET \"hits\" = (\"hits\" + @p0)"
        );
        assert_eq!(bag.len(), 1);
    }
}
