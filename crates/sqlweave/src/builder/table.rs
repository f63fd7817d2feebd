//! Table descriptors, alias scope, and table-specification resolution.
//!
//! A FROM/JOIN specification arrives either as a plain string
//! (`"owner.table alias"`) or as a captured chain ending in `as_alias`,
//! `on`, or a join-type selector. Resolution turns it into a [`TableEntry`]
//! and registers it so later clauses can resolve aliases.

use crate::capture::Captured;
use crate::dialect::Dialect;
use crate::error::{SqlError, SqlResult};
use crate::graph::{Node, Operand};
use crate::schema::{SchemaProvider, SchemaRegistry, TableSchema};
use crate::value::{DbType, Value};

/// One table participating in a statement.
#[derive(Debug, Clone)]
pub struct TableEntry {
    pub owner: Option<String>,
    pub name: String,
    pub alias: Option<String>,
    /// Cached column schema, when the provider knows the table.
    pub schema: Option<TableSchema>,
}

impl TableEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            owner: None,
            name: name.into(),
            alias: None,
            schema: None,
        }
    }

    /// Qualified, decorated table path without alias.
    pub(crate) fn sql(&self, dialect: &Dialect) -> String {
        match &self.owner {
            Some(owner) => format!("{}.{}", dialect.decorate(owner), dialect.decorate(&self.name)),
            None => dialect.decorate(&self.name),
        }
    }

    /// Table path plus `AS alias` when an alias is set.
    pub(crate) fn sql_with_alias(&self, dialect: &Dialect) -> String {
        match &self.alias {
            Some(alias) => format!("{} AS {}", self.sql(dialect), alias),
            None => self.sql(dialect),
        }
    }
}

/// Alias/table lookup scope, chained outward through nested builders.
pub(crate) struct Scope<'a> {
    pub tables: &'a [TableEntry],
    pub parent: Option<&'a Scope<'a>>,
}

impl Scope<'_> {
    /// True when `name` is a registered table alias. Alias match
    /// short-circuits table-name match everywhere this is consulted.
    pub fn is_alias(&self, name: &str) -> bool {
        self.tables.iter().any(|t| t.alias.as_deref() == Some(name))
            || self.parent.is_some_and(|p| p.is_alias(name))
    }

    /// True when `name` is a registered table name.
    pub fn is_table(&self, name: &str) -> bool {
        self.tables.iter().any(|t| t.name == name) || self.parent.is_some_and(|p| p.is_table(name))
    }

    /// Column type lookup across all tables in scope, innermost first.
    pub fn column_type(&self, column: &str) -> Option<DbType> {
        for table in self.tables {
            if let Some(schema) = &table.schema {
                if let Some(ty) = schema.column_type(column) {
                    return Some(ty);
                }
            }
        }
        self.parent.and_then(|p| p.column_type(column))
    }

    /// Seed type inference from a raw SQL fragment by spotting a known
    /// column name inside it.
    pub fn infer_from_fragment(&self, fragment: &str) -> Option<DbType> {
        for table in self.tables {
            if let Some(schema) = &table.schema {
                for (column, info) in &schema.columns {
                    if fragment.contains(column.as_str()) {
                        if let Some(ty) = info.db_type {
                            return Some(ty);
                        }
                    }
                }
            }
        }
        self.parent.and_then(|p| p.infer_from_fragment(fragment))
    }
}

/// Join type, normalized so rendered text always contains exactly one
/// space-separated `JOIN` keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Join,
    Inner,
    Left,
    LeftOuter,
    Right,
    RightOuter,
    Cross,
}

impl JoinKind {
    pub fn sql(self) -> &'static str {
        match self {
            JoinKind::Join => "JOIN",
            JoinKind::Inner => "INNER JOIN",
            JoinKind::Left => "LEFT JOIN",
            JoinKind::LeftOuter => "LEFT OUTER JOIN",
            JoinKind::Right => "RIGHT JOIN",
            JoinKind::RightOuter => "RIGHT OUTER JOIN",
            JoinKind::Cross => "CROSS JOIN",
        }
    }

    /// Parse a raw join-type name. Anything that is not exactly `JOIN` is
    /// split around embedded `JOIN`/`OUTER` tokens first, so `LEFTOUTER`,
    /// `LEFT OUTER JOIN`, and `INNERJOIN` all normalize.
    pub fn parse(raw: &str) -> SqlResult<JoinKind> {
        let upper = raw.to_ascii_uppercase();
        if upper.trim() == "JOIN" {
            return Ok(JoinKind::Join);
        }
        let had_outer = upper.contains("OUTER");
        let head = upper.replace("JOIN", " ").replace("OUTER", " ");
        match (head.trim(), had_outer) {
            ("", _) => Ok(JoinKind::Join),
            ("INNER", _) => Ok(JoinKind::Inner),
            ("LEFT", false) => Ok(JoinKind::Left),
            ("LEFT", true) => Ok(JoinKind::LeftOuter),
            ("RIGHT", false) => Ok(JoinKind::Right),
            ("RIGHT", true) => Ok(JoinKind::RightOuter),
            ("CROSS", _) => Ok(JoinKind::Cross),
            _ => Err(SqlError::argument(format!("unknown join type '{raw}'"))),
        }
    }
}

/// Result of resolving one table specification.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedTable {
    pub entry: TableEntry,
    pub kind: Option<JoinKind>,
    pub on: Option<Captured>,
}

/// Resolve a captured table specification into a [`TableEntry`].
///
/// `index` is the position of the specification within its clause, used in
/// error messages.
pub(crate) fn resolve_table_spec(
    captured: &Captured,
    index: usize,
    schemas: Option<&SchemaRegistry>,
) -> SqlResult<ResolvedTable> {
    let (segments, alias, kind, on) = match captured {
        Captured::Value(Value::Text(text)) => parse_table_text(text, index)?,
        Captured::Node { graph, id } => {
            let g = graph.borrow();
            let mut segments_rev: Vec<String> = Vec::new();
            let mut alias: Option<String> = None;
            let mut kind: Option<JoinKind> = None;
            let mut on: Option<Captured> = None;
            let mut cursor = *id;
            loop {
                match g.node(cursor) {
                    Node::Argument { .. } => break,
                    Node::GetMember { host, name } => {
                        segments_rev.push(name.clone());
                        cursor = *host;
                    }
                    Node::Method { host, name, args } => {
                        match name.to_ascii_uppercase().as_str() {
                            "AS" => {
                                if alias.is_some() {
                                    return Err(SqlError::specification(
                                        index,
                                        format!("duplicate alias in {}", captured.sketch()),
                                    ));
                                }
                                alias = Some(extract_alias(args, index, captured)?);
                            }
                            "ON" => {
                                if on.is_some() {
                                    return Err(SqlError::specification(
                                        index,
                                        format!("duplicate ON condition in {}", captured.sketch()),
                                    ));
                                }
                                let arg = args.first().cloned().ok_or_else(|| {
                                    SqlError::argument("On() takes exactly one argument")
                                })?;
                                on = Some(Captured::from_operand(graph, arg));
                            }
                            other => {
                                let parsed = JoinKind::parse(other).map_err(|_| {
                                    SqlError::specification(
                                        index,
                                        format!("unexpected method '{name}' in table specification {}", captured.sketch()),
                                    )
                                })?;
                                if kind.is_some() {
                                    return Err(SqlError::specification(
                                        index,
                                        format!("duplicate join type in {}", captured.sketch()),
                                    ));
                                }
                                kind = Some(parsed);
                            }
                        }
                        cursor = *host;
                    }
                    _ => {
                        return Err(SqlError::specification(
                            index,
                            format!("not a table specification: {}", captured.sketch()),
                        ));
                    }
                }
            }
            segments_rev.reverse();
            (segments_rev, alias, kind, on)
        }
        other => {
            return Err(SqlError::specification(
                index,
                format!("not a table specification: {}", other.sketch()),
            ));
        }
    };

    let (owner, name) = match segments.len() {
        1 => (None, segments.into_iter().next().expect("len checked")),
        2 => {
            let mut it = segments.into_iter();
            (it.next(), it.next().expect("len checked"))
        }
        0 => {
            return Err(SqlError::specification(index, "empty table specification"));
        }
        _ => {
            return Err(SqlError::specification(
                index,
                format!("ambiguous owner specification: {}", segments.join(".")),
            ));
        }
    };

    if name.trim().is_empty() {
        return Err(SqlError::specification(index, "blank table name"));
    }

    let schema = schemas.and_then(|s| s.get_schema(&name, owner.as_deref()));
    Ok(ResolvedTable {
        entry: TableEntry {
            owner,
            name,
            alias,
            schema,
        },
        kind,
        on,
    })
}

fn extract_alias(args: &[Operand], index: usize, captured: &Captured) -> SqlResult<String> {
    if args.len() != 1 {
        return Err(SqlError::argument("As() takes exactly one argument"));
    }
    match &args[0] {
        Operand::Value(Value::Text(s)) if !s.trim().is_empty() => Ok(s.clone()),
        _ => Err(SqlError::specification(
            index,
            format!("empty or non-textual alias in {}", captured.sketch()),
        )),
    }
}

/// Parse `"owner.table"`, `"table alias"`, or `"owner.table AS alias"`.
fn parse_table_text(
    text: &str,
    index: usize,
) -> SqlResult<(Vec<String>, Option<String>, Option<JoinKind>, Option<Captured>)> {
    let words: Vec<&str> = text
        .split_whitespace()
        .filter(|w| !w.eq_ignore_ascii_case("as"))
        .collect();
    let (path, alias) = match words.as_slice() {
        [path] => (*path, None),
        [path, alias] => (*path, Some((*alias).to_string())),
        _ => {
            return Err(SqlError::specification(
                index,
                format!("cannot parse table specification '{text}'"),
            ));
        }
    };
    let segments: Vec<String> = path.split('.').map(str::to_string).collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(SqlError::specification(
            index,
            format!("blank segment in table path '{path}'"),
        ));
    }
    Ok((segments, alias, None, None))
}
