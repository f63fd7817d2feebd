//! DELETE builder. Safe by default: a DELETE with no WHERE clause is a
//! validation error unless the caller opts in.

use std::sync::Arc;

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

/// Fluent DELETE specification.
#[derive(Debug, Clone)]
pub struct DeleteStatement {
    dialect: Dialect,
    schemas: Option<Arc<SchemaRegistry>>,
    table_spec: String,
    filter: WhereClause,
    allow_all: bool,
}

impl DeleteStatement {
    pub fn new(table: &str) -> Self {
        Self {
            dialect: Dialect::default(),
            schemas: None,
            table_spec: table.to_string(),
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

    /// Permit deleting every row of the table.
    pub fn allow_delete_all(mut self) -> Self {
        self.allow_all = true;
        self
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

impl SqlStatement for DeleteStatement {
    fn build(&self) -> SqlResult<(String, ParamBag)> {
        let spec = Captured::Value(Value::from(self.table_spec.as_str()));
        let resolved = resolve_table_spec(&spec, 0, self.schemas.as_deref())?;
        let entry = resolved.entry;

        if self.filter.is_empty() && !self.allow_all {
            return Err(SqlError::validation(
                "DELETE without a WHERE clause; call allow_delete_all() if intended",
            ));
        }

        let tables = std::slice::from_ref(&entry);
        let scope = Scope {
            tables,
            parent: None,
        };
        let mut bag = ParamBag::new();
        let mut sql = format!("DELETE FROM {}", entry.sql(&self.dialect));
        if !self.filter.is_empty() {
            let mut compiler = Compiler::new(&scope, &self.dialect, Some(&mut bag));
            sql.push_str(" WHERE ");
            sql.push_str(&self.filter.build(&mut compiler)?);
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
    use crate::builder::delete;

    #[test]
    fn delete_with_condition() {
        let stmt = delete("public.users").and_where(|t| t.col("id").eq(7i64));
        let (text, bag) = stmt.build().unwrap();
        assert_eq!(
            text,
            "DELETE FROM \"public\".\"users\" WHERE (\"id\" = @p0)"
        );
        assert_eq!(bag.len(), 1);
    }

    #[test]
    fn bare_delete_is_rejected() {
        let err = delete("users").build().unwrap_err();
        assert!(matches!(err, SqlError::Validation(_)));
    }

    #[test]
    fn delete_all_requires_opt_in() {
        let stmt = delete("users").allow_delete_all();
        assert_eq!(stmt.command_text().unwrap(), "DELETE FROM \"users\"");
    }

    #[test]
    fn delete_binds_markers() {
        let stmt = delete("users")
            .with_dialect(Dialect::postgres())
            .and_where(|t| t.col("id").in_list(vec![Value::array([1i64, 2i64])]));
        let bound = stmt.bind().unwrap();
        assert_eq!(bound.sql, "DELETE FROM \"users\" WHERE \"id\" IN($1, $2)");
        assert_eq!(bound.values.len(), 2);
    }
}
