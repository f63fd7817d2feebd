//! Recursive operation-graph compiler.
//!
//! Walks a captured graph host-first and emits dialect-aware SQL text.
//! Constants never land in the text: they are allocated in the surrounding
//! [`ParamBag`] and the opaque token is embedded instead. The only
//! exceptions are raw string fragments in positions that allow them, and
//! literal rendering when no parameter sink is available.

use crate::builder::table::Scope;
use crate::capture::Captured;
use crate::dialect::Dialect;
use crate::error::{SqlError, SqlResult};
use crate::graph::{BinaryOp, Node, NodeId, OpGraph, Operand, UnaryOp};
use crate::param::ParamBag;
use crate::value::{DbType, Value};

/// Per-position compilation switches.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CompileOpts {
    /// Text constants pass through verbatim instead of being parameterized.
    pub allow_raw: bool,
    /// A literal NULL renders as the dialect's null literal instead of
    /// being rejected.
    pub allow_null: bool,
    /// Placeholder arguments whose name matches a table alias render as
    /// that alias token.
    pub qualified: bool,
}

impl CompileOpts {
    /// WHERE/ON/HAVING conditions: raw fragments allowed at the top level.
    pub fn condition() -> Self {
        Self {
            allow_raw: true,
            allow_null: false,
            qualified: true,
        }
    }

    /// Select-list, GROUP BY, and ORDER BY items.
    pub fn select_item() -> Self {
        Self {
            allow_raw: true,
            allow_null: false,
            qualified: true,
        }
    }

    /// INSERT/UPDATE value positions: parameterized, NULL permitted.
    pub fn value() -> Self {
        Self {
            allow_raw: false,
            allow_null: true,
            qualified: true,
        }
    }

    /// Nested operand positions inside comparisons and method arguments.
    fn operand(self) -> Self {
        Self {
            allow_raw: false,
            allow_null: false,
            ..self
        }
    }

    fn unqualified(self) -> Self {
        Self {
            qualified: false,
            ..self
        }
    }
}

/// One compilation pass over captured specifications.
///
/// Holds the alias scope, the target dialect, and an optional parameter
/// sink. Column-type inference flows left to right: compiling a member
/// access records the column's declared type, and the next constant
/// consumed adopts it.
pub(crate) struct Compiler<'a, 'b> {
    scope: &'a Scope<'a>,
    dialect: &'a Dialect,
    sink: Option<&'b mut ParamBag>,
    inferred: Option<DbType>,
}

impl<'a, 'b> Compiler<'a, 'b> {
    pub fn new(
        scope: &'a Scope<'a>,
        dialect: &'a Dialect,
        sink: Option<&'b mut ParamBag>,
    ) -> Self {
        Self {
            scope,
            dialect,
            sink,
            inferred: None,
        }
    }

    /// Compile a value destined for `column`, seeding type inference from
    /// the column's declared type.
    pub fn compile_column_value(&mut self, column: &str, value: &Captured) -> SqlResult<String> {
        self.inferred = self.scope.column_type(column);
        self.compile(value, CompileOpts::value())
    }

    /// Compile a SET-list assignment: `"column" = <value>`.
    pub fn compile_assignment(&mut self, column: &str, value: &Captured) -> SqlResult<String> {
        let text = self.compile_column_value(column, value)?;
        Ok(format!("{} = {text}", self.dialect.decorate(column)))
    }

    pub fn compile(&mut self, captured: &Captured, opts: CompileOpts) -> SqlResult<String> {
        match captured {
            Captured::Node { graph, id } => {
                let g = graph.borrow();
                self.compile_node(&g, *id, opts)
            }
            Captured::Value(Value::Text(s)) if opts.allow_raw => Ok(s.clone()),
            Captured::Value(v) => self.constant(v, opts),
            Captured::Query(q) => self.nested(q),
        }
    }

    fn compile_operand(&mut self, g: &OpGraph, operand: &Operand, opts: CompileOpts) -> SqlResult<String> {
        match operand {
            Operand::Node(id) => self.compile_node(g, *id, opts),
            Operand::Value(Value::Text(s)) if opts.allow_raw => Ok(s.clone()),
            Operand::Value(v) => self.constant(v, opts),
            Operand::Query(q) => self.nested(q),
        }
    }

    fn compile_node(&mut self, g: &OpGraph, id: NodeId, opts: CompileOpts) -> SqlResult<String> {
        match g.node(id) {
            Node::Argument { name } => {
                if opts.qualified && self.scope.is_alias(name) {
                    Ok(name.clone())
                } else {
                    Ok(String::new())
                }
            }
            Node::GetMember { host, name } => {
                if self.scope.is_alias(name) {
                    // Alias match short-circuits table match.
                    let host_text = self.compile_node(g, *host, opts.unqualified())?;
                    Ok(join_path(&host_text, name))
                } else if self.scope.is_table(name) {
                    let host_text = self.compile_node(g, *host, opts.unqualified())?;
                    Ok(join_path(&host_text, &self.dialect.decorate(name)))
                } else {
                    let host_text = self.compile_node(g, *host, opts)?;
                    self.inferred = self.scope.column_type(name);
                    Ok(join_path(&host_text, &self.dialect.decorate(name)))
                }
            }
            Node::SetMember { host, name, value } => {
                let _ = self.compile_node(g, *host, opts)?;
                self.inferred = self.scope.column_type(name);
                let value_text = self.compile_operand(g, value, CompileOpts::value())?;
                Ok(format!("{} = ({value_text})", self.dialect.decorate(name)))
            }
            Node::GetIndex { host, indices } => {
                let host_text = self.compile_node(g, *host, opts)?;
                let idx = self.operand_list(g, indices, opts.operand())?;
                Ok(format!("{host_text}[{}]", idx.join(", ")))
            }
            Node::SetIndex {
                host,
                indices,
                value,
            } => {
                let host_text = self.compile_node(g, *host, opts)?;
                let idx = self.operand_list(g, indices, opts.operand())?;
                let value_text = self.compile_operand(g, value, CompileOpts::value())?;
                Ok(format!("{host_text}[{}] = ({value_text})", idx.join(", ")))
            }
            Node::Invoke { host, args } => self.invoke(g, *host, args, opts),
            Node::Method { host, name, args } => self.dispatch(g, *host, name, args, opts),
            Node::Binary { left, op, right } => self.binary(g, left, *op, right, opts),
            Node::Unary { op, target } => {
                let inner = self.compile_operand(g, target, opts.operand())?;
                match op {
                    UnaryOp::Not => Ok(format!("NOT ({inner})")),
                    UnaryOp::Neg => Ok(format!("(-{inner})")),
                }
            }
            Node::Convert { target } => self.compile_operand(g, target, opts),
        }
    }

    // ---- node kinds ----

    fn binary(
        &mut self,
        g: &OpGraph,
        left: &Operand,
        op: BinaryOp,
        right: &Operand,
        opts: CompileOpts,
    ) -> SqlResult<String> {
        let inner = opts.operand();
        let left_text = self.compile_operand(g, left, inner)?;
        // `= NULL` / `<> NULL` against a literal fold to IS [NOT] NULL,
        // except in template mode where the null stays a parameter slot.
        if right.as_literal_null() && !self.is_virtual() {
            match op {
                BinaryOp::Eq => return Ok(format!("({left_text} IS NULL)")),
                BinaryOp::Ne => return Ok(format!("({left_text} IS NOT NULL)")),
                _ => {}
            }
        }
        let right_text = self.compile_operand(g, right, inner)?;
        Ok(format!("({left_text} {} {right_text})", op.sql_token()))
    }

    fn invoke(
        &mut self,
        g: &OpGraph,
        host: NodeId,
        args: &[Operand],
        opts: CompileOpts,
    ) -> SqlResult<String> {
        if args.is_empty() {
            // No-op escape hatch: contributes nothing to the text.
            return Ok(String::new());
        }
        let host_text = self.compile_node(g, host, opts)?;
        if let [Operand::Value(Value::Text(fragment))] = args {
            // A sole raw fragment seeds type inference from column names
            // it mentions.
            self.inferred = self.scope.infer_from_fragment(fragment);
        }
        let inner = CompileOpts {
            allow_raw: true,
            allow_null: true,
            qualified: opts.qualified,
        };
        let mut out = host_text;
        for arg in args {
            out.push_str(&self.compile_operand(g, arg, inner)?);
        }
        Ok(out)
    }

    fn dispatch(
        &mut self,
        g: &OpGraph,
        host: NodeId,
        name: &str,
        args: &[Operand],
        opts: CompileOpts,
    ) -> SqlResult<String> {
        match name.to_ascii_uppercase().as_str() {
            "AS" => {
                let host_text = self.compile_node(g, host, opts)?;
                let alias = match args {
                    [Operand::Value(Value::Text(s))] if !s.trim().is_empty() => s,
                    _ => {
                        return Err(SqlError::argument(
                            "As() takes exactly one non-empty string",
                        ));
                    }
                };
                Ok(format!("{host_text} AS {alias}"))
            }
            // Join metadata is consumed during table resolution; if one of
            // these reaches expression compilation it is a passthrough.
            "ON" | "INNER" | "LEFT" | "LEFTOUTER" | "RIGHT" | "RIGHTOUTER" | "CROSS" | "JOIN" => {
                self.compile_node(g, host, opts)
            }
            "IN" => self.in_clause(g, host, args, opts, false),
            "NOTIN" => self.in_clause(g, host, args, opts, true),
            "BETWEEN" => {
                let host_text = self.compile_node(g, host, opts)?;
                let inner = opts.operand();
                let (lo, hi) = match args {
                    [Operand::Value(Value::Array(bounds))] if bounds.len() == 2 => (
                        self.constant_inferred(&bounds[0], inner)?,
                        self.constant_inferred(&bounds[1], inner)?,
                    ),
                    [lo, hi] => (
                        self.compile_operand(g, lo, inner)?,
                        self.compile_operand(g, hi, inner)?,
                    ),
                    _ => {
                        return Err(SqlError::argument("Between() takes exactly two bounds"));
                    }
                };
                Ok(format!("{host_text} BETWEEN {lo} AND {hi}"))
            }
            "LIKE" | "NOTLIKE" => {
                let host_text = self.compile_node(g, host, opts)?;
                let keyword = if name.eq_ignore_ascii_case("LIKE") {
                    "LIKE"
                } else {
                    "NOT LIKE"
                };
                let pattern = match args {
                    [pattern] => self.compile_operand(g, pattern, opts.operand())?,
                    _ => return Err(SqlError::argument("Like() takes exactly one pattern")),
                };
                Ok(format!("{host_text} {keyword} {pattern}"))
            }
            "AND" | "OR" => {
                let connective = if name.eq_ignore_ascii_case("AND") {
                    " AND "
                } else {
                    " OR "
                };
                let mut parts = Vec::with_capacity(args.len() + 1);
                let host_text = self.compile_node(g, host, opts)?;
                if !host_text.is_empty() {
                    parts.push(host_text);
                }
                for arg in args {
                    parts.push(self.compile_operand(g, arg, CompileOpts::condition())?);
                }
                if parts.is_empty() {
                    return Err(SqlError::argument("empty connective"));
                }
                if parts.len() == 1 {
                    Ok(parts.remove(0))
                } else {
                    Ok(format!("({})", parts.join(connective)))
                }
            }
            "NOT" => {
                let condition = match args {
                    [condition] => self.compile_operand(g, condition, CompileOpts::condition())?,
                    _ => return Err(SqlError::argument("Not() takes exactly one condition")),
                };
                Ok(format!("NOT ({condition})"))
            }
            "COUNT" => match args {
                [] => Ok("COUNT(*)".to_string()),
                [expr] => {
                    let inner = CompileOpts {
                        allow_raw: true,
                        ..opts.operand()
                    };
                    let text = self.compile_operand(g, expr, inner)?;
                    Ok(format!("COUNT({text})"))
                }
                _ => Err(SqlError::argument("Count() takes at most one expression")),
            },
            "ASC" | "DESC" => {
                let host_text = self.compile_node(g, host, opts)?;
                Ok(format!("{host_text} {}", name.to_ascii_uppercase()))
            }
            "ALL" => {
                let host_text = self.compile_node(g, host, opts)?;
                if host_text.is_empty() {
                    Ok("*".to_string())
                } else {
                    Ok(format!("{host_text}.*"))
                }
            }
            _ => {
                // Unrecognized name: literal SQL function call.
                let host_text = self.compile_node(g, host, opts)?;
                let inner = CompileOpts {
                    allow_null: true,
                    ..opts.operand()
                };
                let rendered: Vec<String> = args
                    .iter()
                    .map(|a| self.compile_operand(g, a, inner))
                    .collect::<SqlResult<_>>()?;
                Ok(format!(
                    "{}{name}({})",
                    if host_text.is_empty() {
                        String::new()
                    } else {
                        format!("{host_text}.")
                    },
                    rendered.join(", ")
                ))
            }
        }
    }

    fn in_clause(
        &mut self,
        g: &OpGraph,
        host: NodeId,
        args: &[Operand],
        opts: CompileOpts,
        negated: bool,
    ) -> SqlResult<String> {
        let host_text = self.compile_node(g, host, opts)?;
        let keyword = if negated { "NOT IN" } else { "IN" };
        // A single sub-query argument keeps its own parentheses.
        if let [Operand::Query(q)] = args {
            let text = self.nested(q)?;
            return Ok(format!("{host_text} {keyword}{text}"));
        }
        let inner = opts.operand();
        let mut items = Vec::new();
        for arg in args {
            match arg {
                // Array values flatten into the list.
                Operand::Value(Value::Array(values)) => {
                    for v in values {
                        items.push(self.constant_inferred(v, inner)?);
                    }
                }
                other => items.push(self.compile_operand(g, other, inner)?),
            }
        }
        if items.is_empty() {
            return Err(SqlError::argument("In() requires at least one item"));
        }
        Ok(format!("{host_text} {keyword}({})", items.join(", ")))
    }

    // ---- leaves ----

    fn is_virtual(&self) -> bool {
        self.sink.as_ref().is_some_and(|s| s.is_virtual())
    }

    /// Compile a constant, preserving the pending inferred type across
    /// siblings of the same clause (IN lists, BETWEEN bounds).
    fn constant_inferred(&mut self, v: &Value, opts: CompileOpts) -> SqlResult<String> {
        let pending = self.inferred;
        let text = self.constant(v, opts)?;
        self.inferred = pending;
        Ok(text)
    }

    fn constant(&mut self, v: &Value, opts: CompileOpts) -> SqlResult<String> {
        if v.is_null() {
            if opts.allow_null {
                self.inferred = None;
                return Ok(self.dialect.null_literal.to_string());
            }
            if !self.is_virtual() {
                return Err(SqlError::argument(
                    "NULL is not allowed in this position; compare with eq(Value::Null) instead",
                ));
            }
        }
        let db_type = self.inferred.take().unwrap_or_else(|| v.db_type());
        match self.sink.as_deref_mut() {
            Some(bag) => Ok(bag.add(v.clone(), db_type)),
            None => Ok(v.render_literal()),
        }
    }

    fn nested(&mut self, q: &crate::builder::SelectQuery) -> SqlResult<String> {
        match self.sink.as_deref_mut() {
            Some(bag) => {
                let text = q.build_into(Some(self.scope), bag)?;
                Ok(format!("({text})"))
            }
            None => {
                let mut scratch = ParamBag::new();
                let text = q.build_into(Some(self.scope), &mut scratch)?;
                if !scratch.is_empty() {
                    return Err(SqlError::validation(
                        "nested query has parameters but no parameter sink is available",
                    ));
                }
                Ok(format!("({text})"))
            }
        }
    }

    fn operand_list(
        &mut self,
        g: &OpGraph,
        operands: &[Operand],
        opts: CompileOpts,
    ) -> SqlResult<Vec<String>> {
        operands
            .iter()
            .map(|o| self.compile_operand(g, o, opts))
            .collect()
    }
}

fn join_path(host: &str, leaf: &str) -> String {
    if host.is_empty() {
        leaf.to_string()
    } else {
        format!("{host}.{leaf}")
    }
}
