//! SELECT builder.
//!
//! Tables and aliases are registered when `from`/`join` are called; every
//! other clause is stored as a captured specification and compiled at build
//! time, once the complete alias scope is known. That two-pass split is
//! what lets an ON condition reference an alias declared by a later join.

use std::sync::Arc;

use crate::builder::table::{resolve_table_spec, JoinKind, Scope, TableEntry};
use crate::builder::traits::SqlStatement;
use crate::builder::where_clause::{Connective, WhereClause};
use crate::capture::{Capture, Captured, Expr, IntoCaptured};
use crate::compile::{CompileOpts, Compiler};
use crate::dialect::Dialect;
use crate::error::{SqlError, SqlResult};
use crate::param::ParamBag;
use crate::schema::SchemaRegistry;
use crate::value::Value;

#[derive(Debug, Clone)]
struct JoinSpec {
    table: usize,
    kind: JoinKind,
    on: Option<Captured>,
}

/// Fluent SELECT specification.
#[derive(Debug, Clone)]
pub struct SelectQuery {
    dialect: Dialect,
    schemas: Option<Arc<SchemaRegistry>>,
    tables: Vec<TableEntry>,
    from_idx: Vec<usize>,
    joins: Vec<JoinSpec>,
    items: Vec<Captured>,
    filter: WhereClause,
    group_items: Vec<Captured>,
    order_items: Vec<Captured>,
    distinct: bool,
    limit: Option<u64>,
    offset: Option<u64>,
    top: Option<u64>,
    named: Vec<(String, Value)>,
    template: bool,
}

impl Default for SelectQuery {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectQuery {
    pub fn new() -> Self {
        Self {
            dialect: Dialect::default(),
            schemas: None,
            tables: Vec::new(),
            from_idx: Vec::new(),
            joins: Vec::new(),
            items: Vec::new(),
            filter: WhereClause::default(),
            group_items: Vec::new(),
            order_items: Vec::new(),
            distinct: false,
            limit: None,
            offset: None,
            top: None,
            named: Vec::new(),
            template: false,
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

    /// Compose a template: constants still become parameters, but they are
    /// flagged virtual and `= NULL` folding is suppressed.
    pub fn as_template(mut self) -> Self {
        self.template = true;
        self
    }

    // ---- tables ----

    /// Add a FROM table from a captured specification
    /// (`t.member("public").member("users").as_alias("u")`).
    pub fn from<F, R>(mut self, f: F) -> SqlResult<Self>
    where
        F: FnOnce(Expr) -> R,
        R: IntoCaptured,
    {
        let captured = Capture::one(f);
        self.add_from(captured)
    }

    /// Add a FROM table from a string (`"public.users u"`).
    pub fn from_table(self, spec: &str) -> SqlResult<Self> {
        self.add_from(Captured::Value(Value::from(spec)))
    }

    fn add_from(mut self, captured: Captured) -> SqlResult<Self> {
        let index = self.tables.len();
        let resolved = resolve_table_spec(&captured, index, self.schemas.as_deref())?;
        if resolved.kind.is_some() || resolved.on.is_some() {
            return Err(SqlError::specification(
                index,
                "join metadata is not allowed in a FROM specification",
            ));
        }
        self.tables.push(resolved.entry);
        self.from_idx.push(index);
        Ok(self)
    }

    /// Add a join. The specification carries the join type selector and,
    /// except for cross joins, an `on(..)` condition:
    /// `t.member("orders").as_alias("o").inner().on(..)`.
    pub fn join<F, R>(mut self, f: F) -> SqlResult<Self>
    where
        F: FnOnce(Expr) -> R,
        R: IntoCaptured,
    {
        let captured = Capture::one(f);
        let index = self.tables.len();
        let resolved = resolve_table_spec(&captured, index, self.schemas.as_deref())?;
        self.tables.push(resolved.entry);
        self.joins.push(JoinSpec {
            table: index,
            kind: resolved.kind.unwrap_or(JoinKind::Join),
            on: resolved.on,
        });
        Ok(self)
    }

    // ---- select list ----

    /// Append a select-list item. With no items the list renders as `*`.
    pub fn select<F, R>(mut self, f: F) -> Self
    where
        F: FnOnce(Expr) -> R,
        R: IntoCaptured,
    {
        self.items.push(Capture::one(f));
        self
    }

    /// Append a raw select-list fragment, verbatim.
    pub fn select_raw(mut self, fragment: &str) -> Self {
        self.items.push(Captured::Value(Value::from(fragment)));
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    // ---- filtering ----

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

    /// Add a condition only when `value` is present.
    pub fn and_where_opt<T, F, R>(self, value: Option<T>, f: F) -> Self
    where
        F: FnOnce(Expr, T) -> R,
        R: IntoCaptured,
    {
        match value {
            Some(v) => self.and_where(move |t| f(t, v)),
            None => self,
        }
    }

    /// Open an explicit bracket before the next condition.
    pub fn where_group_start(mut self) -> Self {
        self.filter.group_start();
        self
    }

    /// Close the innermost open bracket.
    pub fn where_group_end(mut self) -> SqlResult<Self> {
        self.filter.group_end()?;
        Ok(self)
    }

    // ---- grouping and ordering ----

    pub fn group_by<F, R>(mut self, f: F) -> Self
    where
        F: FnOnce(Expr) -> R,
        R: IntoCaptured,
    {
        self.group_items.push(Capture::one(f));
        self
    }

    pub fn order_by<F, R>(mut self, f: F) -> Self
    where
        F: FnOnce(Expr) -> R,
        R: IntoCaptured,
    {
        self.order_items.push(Capture::one(f));
        self
    }

    /// Order by select-list position (1-based).
    pub fn order_by_position(mut self, position: u32) -> Self {
        self.order_items
            .push(Captured::Value(Value::Int(position as i64)));
        self
    }

    // ---- row limiting ----

    pub fn limit(mut self, n: u64) -> SqlResult<Self> {
        if !self.dialect.caps.supports_row_limit() {
            return Err(SqlError::not_supported(format!(
                "dialect '{}' has no row-limiting syntax",
                self.dialect.name
            )));
        }
        self.limit = Some(n);
        Ok(self)
    }

    pub fn offset(mut self, n: u64) -> SqlResult<Self> {
        if !self.dialect.caps.limit_offset && !self.dialect.caps.first_skip {
            return Err(SqlError::not_supported(format!(
                "dialect '{}' cannot skip rows",
                self.dialect.name
            )));
        }
        self.offset = Some(n);
        Ok(self)
    }

    /// Prefix-form row cap (`TOP n`).
    pub fn top(mut self, n: u64) -> SqlResult<Self> {
        if !self.dialect.caps.top {
            return Err(SqlError::not_supported(format!(
                "dialect '{}' has no TOP syntax",
                self.dialect.name
            )));
        }
        self.top = Some(n);
        Ok(self)
    }

    /// Convenience for `limit`/`offset` from a 1-based page number.
    pub fn paginate(self, page: u64, per_page: u64) -> SqlResult<Self> {
        let page = page.max(1);
        self.limit(per_page)?.offset((page - 1) * per_page)
    }

    // ---- named parameters ----

    /// Register a well-known parameter referenced as `@name` from raw
    /// fragments.
    pub fn param(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.named.push((name.to_string(), value.into()));
        self
    }

    // ---- compilation ----

    pub(crate) fn build_into(
        &self,
        parent: Option<&Scope<'_>>,
        bag: &mut ParamBag,
    ) -> SqlResult<String> {
        let scope = Scope {
            tables: &self.tables,
            parent,
        };
        for (name, value) in &self.named {
            bag.add_named(name, value.clone())?;
        }
        let mut compiler = Compiler::new(&scope, &self.dialect, Some(bag));

        let mut sql = String::from("SELECT ");
        if self.distinct {
            sql.push_str("DISTINCT ");
        }
        self.push_prefix_limits(&mut sql);

        if self.items.is_empty() {
            sql.push('*');
        } else {
            let rendered: Vec<String> = self
                .items
                .iter()
                .map(|item| compiler.compile(item, CompileOpts::select_item()))
                .collect::<SqlResult<_>>()?;
            sql.push_str(&rendered.join(", "));
        }

        if !self.from_idx.is_empty() {
            sql.push_str(" FROM ");
            let rendered: Vec<String> = self
                .from_idx
                .iter()
                .map(|&i| self.tables[i].sql_with_alias(&self.dialect))
                .collect();
            sql.push_str(&rendered.join(", "));
        }

        for join in &self.joins {
            let entry = &self.tables[join.table];
            sql.push(' ');
            sql.push_str(join.kind.sql());
            sql.push(' ');
            sql.push_str(&entry.sql_with_alias(&self.dialect));
            match (&join.on, join.kind) {
                (Some(on), _) => {
                    sql.push_str(" ON ");
                    sql.push_str(&compiler.compile(on, CompileOpts::condition())?);
                }
                (None, JoinKind::Cross) => {}
                (None, _) => {
                    return Err(SqlError::validation(format!(
                        "{} of {} requires an ON condition",
                        join.kind.sql(),
                        entry.name
                    )));
                }
            }
        }

        if !self.filter.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.filter.build(&mut compiler)?);
        }

        if !self.group_items.is_empty() {
            sql.push_str(" GROUP BY ");
            let rendered: Vec<String> = self
                .group_items
                .iter()
                .map(|item| compiler.compile(item, CompileOpts::select_item()))
                .collect::<SqlResult<_>>()?;
            sql.push_str(&rendered.join(", "));
        }

        if !self.order_items.is_empty() {
            sql.push_str(" ORDER BY ");
            let rendered: Vec<String> = self
                .order_items
                .iter()
                .map(|item| match item {
                    // Positional ordering stays a literal, never a parameter.
                    Captured::Value(Value::Int(n)) => Ok(n.to_string()),
                    other => compiler.compile(other, CompileOpts::select_item()),
                })
                .collect::<SqlResult<_>>()?;
            sql.push_str(&rendered.join(", "));
        }

        if self.dialect.caps.limit_offset {
            if let Some(n) = self.limit {
                sql.push_str(&format!(" LIMIT {n}"));
            }
            if let Some(n) = self.offset {
                sql.push_str(&format!(" OFFSET {n}"));
            }
        }

        Ok(sql)
    }

    /// `TOP n` / `FIRST n SKIP m` go between SELECT and the item list.
    fn push_prefix_limits(&self, sql: &mut String) {
        if self.dialect.caps.top {
            if let Some(n) = self.top.or(self.limit) {
                sql.push_str(&format!("TOP {n} "));
            }
        }
        if self.dialect.caps.first_skip {
            if let Some(n) = self.limit {
                sql.push_str(&format!("FIRST {n} "));
            }
            if let Some(n) = self.offset {
                sql.push_str(&format!("SKIP {n} "));
            }
        }
    }
}

impl SqlStatement for SelectQuery {
    fn build(&self) -> SqlResult<(String, ParamBag)> {
        let mut bag = if self.template {
            ParamBag::template()
        } else {
            ParamBag::new()
        };
        let text = self.build_into(None, &mut bag)?;
        Ok((text, bag))
    }

    fn dialect(&self) -> &Dialect {
        &self.dialect
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::select;

    #[test]
    fn minimal_select_star() {
        let q = select().from_table("users").unwrap();
        assert_eq!(q.command_text().unwrap(), "SELECT * FROM \"users\"");
    }

    #[test]
    fn from_capture_chain_with_owner_and_alias() {
        let q = select()
            .from(|t| t.member("public").member("Customer").as_alias("c"))
            .unwrap()
            .select(|t| t.member("c").col("Name"));
        assert_eq!(
            q.command_text().unwrap(),
            "SELECT c.\"Name\" FROM \"public\".\"Customer\" AS c"
        );
    }

    #[test]
    fn where_condition_parameterizes() {
        let q = select()
            .from(|t| t.member("public").member("Customer").as_alias("c"))
            .unwrap()
            .and_where(|t| t.member("c").col("Id").eq(42i64));
        let (text, bag) = q.build().unwrap();
        assert_eq!(
            text,
            "SELECT * FROM \"public\".\"Customer\" AS c WHERE (c.\"Id\" = @p0)"
        );
        assert_eq!(bag.len(), 1);
    }

    #[test]
    fn join_condition_sees_both_aliases() {
        let q = select()
            .from(|t| t.member("users").as_alias("u"))
            .unwrap()
            .join(|t| {
                t.member("orders").as_alias("o").inner().on(
                    t.member("o").col("user_id").eq(t.member("u").col("id")),
                )
            })
            .unwrap();
        assert_eq!(
            q.command_text().unwrap(),
            "SELECT * FROM \"users\" AS u INNER JOIN \"orders\" AS o \
             ON (o.\"user_id\" = u.\"id\")"
        );
    }

    #[test]
    fn join_without_on_is_rejected() {
        let q = select()
            .from_table("users")
            .unwrap()
            .join(|t| t.member("orders").inner())
            .unwrap();
        assert!(matches!(
            q.command_text().unwrap_err(),
            SqlError::Validation(_)
        ));
    }

    #[test]
    fn cross_join_needs_no_on() {
        let q = select()
            .from_table("a")
            .unwrap()
            .join(|t| t.member("b").cross())
            .unwrap();
        assert_eq!(
            q.command_text().unwrap(),
            "SELECT * FROM \"a\" CROSS JOIN \"b\""
        );
    }

    #[test]
    fn command_text_is_idempotent() {
        let q = select()
            .from_table("users")
            .unwrap()
            .and_where(|t| t.col("id").in_list(vec![Value::array([1i64, 2i64])]))
            .and_where(|t| t.col("email").like("%x%"));
        let first = q.command_text().unwrap();
        let second = q.command_text().unwrap();
        assert_eq!(first, second);
        let (_, bag) = q.build().unwrap();
        assert_eq!(bag.len(), 3);
    }

    #[test]
    fn order_group_distinct() {
        let q = select()
            .from_table("orders")
            .unwrap()
            .distinct()
            .select(|t| t.col("status"))
            .select(|t| t.count())
            .group_by(|t| t.col("status"))
            .order_by(|t| t.col("status").desc())
            .order_by_position(2);
        assert_eq!(
            q.command_text().unwrap(),
            "SELECT DISTINCT \"status\", COUNT(*) FROM \"orders\" \
             GROUP BY \"status\" ORDER BY \"status\" DESC, 2"
        );
    }

    #[test]
    fn limit_offset_render_for_postgres() {
        let q = select()
            .with_dialect(Dialect::postgres())
            .from_table("users")
            .unwrap()
            .paginate(3, 20)
            .unwrap();
        assert_eq!(
            q.command_text().unwrap(),
            "SELECT * FROM \"users\" LIMIT 20 OFFSET 40"
        );
    }

    #[test]
    fn top_renders_as_prefix() {
        let q = select()
            .with_dialect(Dialect::sql_server())
            .from_table("users")
            .unwrap()
            .top(5)
            .unwrap();
        assert_eq!(q.command_text().unwrap(), "SELECT TOP 5 * FROM \"users\"");
    }

    #[test]
    fn first_skip_renders_as_prefix() {
        let q = select()
            .with_dialect(Dialect::firebird())
            .from_table("users")
            .unwrap()
            .limit(10)
            .unwrap()
            .offset(30)
            .unwrap();
        assert_eq!(
            q.command_text().unwrap(),
            "SELECT FIRST 10 SKIP 30 * FROM \"users\""
        );
    }

    #[test]
    fn limit_unsupported_leaves_builder_usable() {
        let q = select()
            .with_dialect(Dialect::bare())
            .from_table("users")
            .unwrap();
        let before = q.command_text().unwrap();
        let err = q.clone().limit(10).unwrap_err();
        assert!(err.is_not_supported());
        assert_eq!(q.command_text().unwrap(), before);
    }

    #[test]
    fn subquery_parameters_merge_into_parent() {
        let inner = select()
            .from_table("orders")
            .unwrap()
            .select(|t| t.col("user_id"))
            .and_where(|t| t.col("total").gt(100i64));
        let q = select()
            .from_table("users")
            .unwrap()
            .and_where(move |t| t.col("id").in_query(inner))
            .and_where(|t| t.col("active").eq(true));
        let (text, bag) = q.build().unwrap();
        assert_eq!(
            text,
            "SELECT * FROM \"users\" WHERE \"id\" IN(SELECT \"user_id\" FROM \"orders\" \
             WHERE (\"total\" > @p0)) AND (\"active\" = @p1)"
        );
        assert_eq!(bag.len(), 2);
    }

    #[test]
    fn named_parameter_flows_through_raw_fragment() {
        let q = select()
            .from_table("users")
            .unwrap()
            .param("min_age", 18i64)
            .and_where(|_| "age >= @min_age");
        let bound = q.bind().unwrap();
        assert_eq!(
            bound.sql,
            "SELECT * FROM \"users\" WHERE age >= ?"
        );
        assert_eq!(bound.values, vec![Value::from(18i64)]);
    }

    #[test]
    fn template_flags_parameters_virtual() {
        let q = select()
            .from_table("users")
            .unwrap()
            .as_template()
            .and_where(|t| t.col("email").eq(Value::Null));
        let (text, bag) = q.build().unwrap();
        assert!(text.ends_with("WHERE (\"email\" = @p0)"));
        assert!(bag.iter().all(|p| p.is_virtual));
    }

    #[test]
    fn and_where_opt_skips_none() {
        let base = select().from_table("users").unwrap();
        let q = base
            .and_where_opt(None::<i64>, |t, v| t.col("age").gt(v))
            .and_where_opt(Some(21i64), |t, v| t.col("age").gt(v));
        let (text, bag) = q.build().unwrap();
        assert_eq!(text, "SELECT * FROM \"users\" WHERE (\"age\" > @p0)");
        assert_eq!(bag.len(), 1);
    }
}
