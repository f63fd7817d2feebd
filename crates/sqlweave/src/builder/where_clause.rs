//! Shared WHERE-clause accumulation for SELECT/UPDATE/DELETE builders.
//!
//! Conditions are stored as captured specifications and compiled only at
//! build time, once the full alias scope is known. A condition whose root
//! is a bare placeholder wrapped in `and(..)`/`or(..)` selects its own
//! connective, overriding the method that added it.

use crate::capture::Captured;
use crate::compile::{CompileOpts, Compiler};
use crate::error::{SqlError, SqlResult};
use crate::graph::Node;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Connective {
    And,
    Or,
}

impl Connective {
    fn sql(self) -> &'static str {
        match self {
            Connective::And => " AND ",
            Connective::Or => " OR ",
        }
    }
}

#[derive(Debug, Clone)]
struct CondSpec {
    cond: Captured,
    connective: Connective,
    open_before: usize,
    close_after: usize,
}

/// Ordered list of conditions plus explicit grouping brackets.
#[derive(Debug, Clone, Default)]
pub(crate) struct WhereClause {
    items: Vec<CondSpec>,
    /// Brackets opened by `group_start` before the next condition.
    pending_open: usize,
}

impl WhereClause {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.pending_open == 0
    }

    /// Append a condition. `connective` is the default joiner; a leading
    /// `and(..)`/`or(..)` wrapper on the condition itself wins.
    pub fn push(&mut self, cond: Captured, connective: Connective) {
        let (connective, cond) = match split_leading_connective(&cond) {
            Some((explicit, inner)) => (explicit, inner),
            None => (connective, cond),
        };
        self.items.push(CondSpec {
            cond,
            connective,
            open_before: std::mem::take(&mut self.pending_open),
            close_after: 0,
        });
    }

    /// Open an explicit bracket before the next condition.
    pub fn group_start(&mut self) {
        self.pending_open += 1;
    }

    /// Close the innermost open bracket after the last condition.
    pub fn group_end(&mut self) -> SqlResult<()> {
        let opened: usize = self.items.iter().map(|i| i.open_before).sum();
        let closed: usize = self.items.iter().map(|i| i.close_after).sum();
        if opened <= closed {
            return Err(SqlError::validation("group_end without matching group_start"));
        }
        let last = self
            .items
            .last_mut()
            .ok_or_else(|| SqlError::validation("group_end before any condition"))?;
        last.close_after += 1;
        Ok(())
    }

    /// Compile the clause body (no `WHERE` keyword). Unclosed brackets are
    /// closed at the end.
    pub fn build(&self, compiler: &mut Compiler<'_, '_>) -> SqlResult<String> {
        if self.pending_open > 0 {
            return Err(SqlError::validation("group_start without a condition"));
        }
        let mut out = String::new();
        let mut open = 0usize;
        for (i, item) in self.items.iter().enumerate() {
            if i > 0 {
                out.push_str(item.connective.sql());
            }
            for _ in 0..item.open_before {
                out.push('(');
                open += 1;
            }
            out.push_str(&compiler.compile(&item.cond, CompileOpts::condition())?);
            for _ in 0..item.close_after {
                out.push(')');
                open -= 1;
            }
        }
        for _ in 0..open {
            out.push(')');
        }
        Ok(out)
    }
}

/// Detect a condition of the shape `placeholder.and(inner)` /
/// `placeholder.or(inner)` and peel the wrapper off.
fn split_leading_connective(cond: &Captured) -> Option<(Connective, Captured)> {
    let Captured::Node { graph, id } = cond else {
        return None;
    };
    let inner = {
        let g = graph.borrow();
        let Node::Method { host, name, args } = g.node(*id) else {
            return None;
        };
        let connective = match name.to_ascii_uppercase().as_str() {
            "AND" => Connective::And,
            "OR" => Connective::Or,
            _ => return None,
        };
        if !matches!(g.node(*host), Node::Argument { .. }) {
            return None;
        }
        let [arg] = args.as_slice() else {
            return None;
        };
        (connective, arg.clone())
    };
    Some((inner.0, Captured::from_operand(graph, inner.1)))
}
