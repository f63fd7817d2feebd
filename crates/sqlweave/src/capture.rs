//! Capture front-end: runs a caller-supplied closure against placeholder
//! handles and records every operation into an [`OpGraph`].
//!
//! The closure is invoked exactly once. Each operation on an [`Expr`] handle
//! appends one node and returns a new handle pointing at it, so chained
//! calls attach to the previous operation. A closure that performs no
//! captured operation and simply returns a constant (string, number,
//! [`Value`], or a nested [`SelectQuery`]) yields that constant directly —
//! no graph is produced and the compiler treats it as a literal or an
//! embedded sub-statement.
//!
//! The operation vocabulary is a fixed, enumerated set of typed methods;
//! there is no open-ended interception.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::builder::SelectQuery;
use crate::graph::{BinaryOp, Node, NodeId, OpGraph, Operand, UnaryOp};
use crate::value::Value;

/// A placeholder handle rooted at an `Argument` node, or the tip of a chain
/// of recorded operations.
#[derive(Clone)]
pub struct Expr {
    graph: Rc<RefCell<OpGraph>>,
    id: NodeId,
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Expr").field("id", &self.id).finish()
    }
}

impl Expr {
    pub(crate) fn argument(graph: &Rc<RefCell<OpGraph>>, name: &str) -> Expr {
        let id = graph.borrow_mut().push(Node::Argument {
            name: name.to_string(),
        });
        Expr {
            graph: graph.clone(),
            id,
        }
    }

    fn push(&self, node: Node) -> Expr {
        let id = self.graph.borrow_mut().push(node);
        Expr {
            graph: self.graph.clone(),
            id,
        }
    }

    fn method(&self, name: &str, args: Vec<Operand>) -> Expr {
        self.push(Node::Method {
            host: self.id,
            name: name.to_string(),
            args,
        })
    }

    pub(crate) fn node_id(&self) -> NodeId {
        self.id
    }

    // ---- structural operations ----

    /// Member access: one dotted-path segment.
    pub fn member(&self, name: &str) -> Expr {
        self.push(Node::GetMember {
            host: self.id,
            name: name.to_string(),
        })
    }

    /// Alias for [`Expr::member`]; reads better for column access.
    pub fn col(&self, name: &str) -> Expr {
        self.member(name)
    }

    /// Member assignment: renders `name = (value)`.
    pub fn set_member(&self, name: &str, value: impl IntoOperand) -> Expr {
        self.push(Node::SetMember {
            host: self.id,
            name: name.to_string(),
            value: value.into_operand(),
        })
    }

    /// Indexed access: renders `host[index]`.
    pub fn at(&self, index: impl IntoOperand) -> Expr {
        self.push(Node::GetIndex {
            host: self.id,
            indices: vec![index.into_operand()],
        })
    }

    /// Multi-index access.
    pub fn at_many(&self, indices: Vec<Operand>) -> Expr {
        self.push(Node::GetIndex {
            host: self.id,
            indices,
        })
    }

    /// Indexed assignment: renders `host[index] = (value)`.
    pub fn set_at(&self, index: impl IntoOperand, value: impl IntoOperand) -> Expr {
        self.push(Node::SetIndex {
            host: self.id,
            indices: vec![index.into_operand()],
            value: value.into_operand(),
        })
    }

    /// Invocation: injects its arguments verbatim. Raw strings pass through
    /// unchanged; other operands (nested queries, sub-expressions) are
    /// compiled in place. With no arguments this is a no-op escape hatch.
    pub fn invoke(&self, args: Vec<Operand>) -> Expr {
        self.push(Node::Invoke {
            host: self.id,
            args,
        })
    }

    /// Inject a hand-written SQL fragment verbatim.
    pub fn raw(&self, fragment: &str) -> Expr {
        self.invoke(vec![Operand::Value(Value::Text(fragment.to_string()))])
    }

    /// Named method call. Reserved names (`As`, `On`, `In`, `Between`, ...)
    /// carry special compilation rules; anything else compiles to a literal
    /// SQL function call with comma-joined arguments.
    pub fn call(&self, name: &str, args: Vec<Operand>) -> Expr {
        self.method(name, args)
    }

    // ---- reserved method vocabulary ----

    /// `expr AS alias`. The alias is raw and never parameterized.
    pub fn as_alias(&self, alias: &str) -> Expr {
        self.method("AS", vec![Operand::Value(Value::Text(alias.to_string()))])
    }

    /// Join condition carrier, consumed by join resolution.
    pub fn on(&self, condition: Expr) -> Expr {
        self.method("ON", vec![Operand::Node(condition.id)])
    }

    /// `host IN(...)`. Array arguments are flattened into the value list.
    pub fn in_list<I, T>(&self, items: I) -> Expr
    where
        I: IntoIterator<Item = T>,
        T: IntoOperand,
    {
        self.method(
            "IN",
            items.into_iter().map(IntoOperand::into_operand).collect(),
        )
    }

    /// `host IN(subquery)`.
    pub fn in_query(&self, query: SelectQuery) -> Expr {
        self.method("IN", vec![Operand::Query(Box::new(query))])
    }

    /// `host NOT IN(...)`.
    pub fn not_in<I, T>(&self, items: I) -> Expr
    where
        I: IntoIterator<Item = T>,
        T: IntoOperand,
    {
        self.method(
            "NOTIN",
            items.into_iter().map(IntoOperand::into_operand).collect(),
        )
    }

    /// `host BETWEEN lo AND hi`.
    pub fn between(&self, lo: impl IntoOperand, hi: impl IntoOperand) -> Expr {
        self.method("BETWEEN", vec![lo.into_operand(), hi.into_operand()])
    }

    /// Single-argument BETWEEN; an array of length 2 is unpacked.
    pub fn between_array(&self, bounds: impl IntoOperand) -> Expr {
        self.method("BETWEEN", vec![bounds.into_operand()])
    }

    /// `host LIKE pattern`.
    pub fn like(&self, pattern: impl IntoOperand) -> Expr {
        self.method("LIKE", vec![pattern.into_operand()])
    }

    /// `host NOT LIKE pattern`.
    pub fn not_like(&self, pattern: impl IntoOperand) -> Expr {
        self.method("NOTLIKE", vec![pattern.into_operand()])
    }

    /// Conjunction. On a placeholder root this selects the connective for
    /// the enclosing WHERE; elsewhere it renders `(host AND arg)`.
    pub fn and(&self, other: impl IntoOperand) -> Expr {
        self.method("AND", vec![other.into_operand()])
    }

    /// Disjunction; see [`Expr::and`].
    pub fn or(&self, other: impl IntoOperand) -> Expr {
        self.method("OR", vec![other.into_operand()])
    }

    /// Negation wrapper: `NOT (condition)`.
    pub fn not(&self, condition: impl IntoOperand) -> Expr {
        self.method("NOT", vec![condition.into_operand()])
    }

    /// `COUNT(*)`.
    pub fn count(&self) -> Expr {
        self.method("COUNT", Vec::new())
    }

    /// `COUNT(expr)`.
    pub fn count_of(&self, expr: impl IntoOperand) -> Expr {
        self.method("COUNT", vec![expr.into_operand()])
    }

    /// Ascending sort marker.
    pub fn asc(&self) -> Expr {
        self.method("ASC", Vec::new())
    }

    /// Descending sort marker.
    pub fn desc(&self) -> Expr {
        self.method("DESC", Vec::new())
    }

    /// `alias.*` in a select list.
    pub fn all(&self) -> Expr {
        self.method("ALL", Vec::new())
    }

    // Join-type selectors, consumed by join resolution.

    pub fn inner(&self) -> Expr {
        self.method("INNER", Vec::new())
    }

    pub fn left(&self) -> Expr {
        self.method("LEFT", Vec::new())
    }

    pub fn left_outer(&self) -> Expr {
        self.method("LEFTOUTER", Vec::new())
    }

    pub fn right(&self) -> Expr {
        self.method("RIGHT", Vec::new())
    }

    pub fn right_outer(&self) -> Expr {
        self.method("RIGHTOUTER", Vec::new())
    }

    pub fn cross(&self) -> Expr {
        self.method("CROSS", Vec::new())
    }

    /// Type-conversion artifact; compiles as a passthrough.
    pub fn convert(&self) -> Expr {
        self.push(Node::Convert {
            target: Operand::Node(self.id),
        })
    }

    // ---- comparisons ----

    fn binary(&self, op: BinaryOp, rhs: impl IntoOperand) -> Expr {
        self.push(Node::Binary {
            left: Operand::Node(self.id),
            op,
            right: rhs.into_operand(),
        })
    }

    pub fn eq(&self, rhs: impl IntoOperand) -> Expr {
        self.binary(BinaryOp::Eq, rhs)
    }

    pub fn ne(&self, rhs: impl IntoOperand) -> Expr {
        self.binary(BinaryOp::Ne, rhs)
    }

    pub fn gt(&self, rhs: impl IntoOperand) -> Expr {
        self.binary(BinaryOp::Gt, rhs)
    }

    pub fn gte(&self, rhs: impl IntoOperand) -> Expr {
        self.binary(BinaryOp::Gte, rhs)
    }

    pub fn lt(&self, rhs: impl IntoOperand) -> Expr {
        self.binary(BinaryOp::Lt, rhs)
    }

    pub fn lte(&self, rhs: impl IntoOperand) -> Expr {
        self.binary(BinaryOp::Lte, rhs)
    }
}

impl<T: IntoOperand> std::ops::Add<T> for Expr {
    type Output = Expr;
    fn add(self, rhs: T) -> Expr {
        self.binary(BinaryOp::Add, rhs)
    }
}

impl<T: IntoOperand> std::ops::Sub<T> for Expr {
    type Output = Expr;
    fn sub(self, rhs: T) -> Expr {
        self.binary(BinaryOp::Sub, rhs)
    }
}

impl<T: IntoOperand> std::ops::Mul<T> for Expr {
    type Output = Expr;
    fn mul(self, rhs: T) -> Expr {
        self.binary(BinaryOp::Mul, rhs)
    }
}

impl<T: IntoOperand> std::ops::Div<T> for Expr {
    type Output = Expr;
    fn div(self, rhs: T) -> Expr {
        self.binary(BinaryOp::Div, rhs)
    }
}

impl<T: IntoOperand> std::ops::Rem<T> for Expr {
    type Output = Expr;
    fn rem(self, rhs: T) -> Expr {
        self.binary(BinaryOp::Mod, rhs)
    }
}

/// `^` maps to SQL exponentiation.
impl<T: IntoOperand> std::ops::BitXor<T> for Expr {
    type Output = Expr;
    fn bitxor(self, rhs: T) -> Expr {
        self.binary(BinaryOp::Pow, rhs)
    }
}

impl std::ops::Not for Expr {
    type Output = Expr;
    fn not(self) -> Expr {
        let target = Operand::Node(self.id);
        self.push(Node::Unary {
            op: UnaryOp::Not,
            target,
        })
    }
}

impl std::ops::Neg for Expr {
    type Output = Expr;
    fn neg(self) -> Expr {
        let target = Operand::Node(self.id);
        self.push(Node::Unary {
            op: UnaryOp::Neg,
            target,
        })
    }
}

/// Anything that can appear as an operand of a captured operation.
pub trait IntoOperand {
    fn into_operand(self) -> Operand;
}

impl IntoOperand for Operand {
    fn into_operand(self) -> Operand {
        self
    }
}

impl IntoOperand for Expr {
    fn into_operand(self) -> Operand {
        Operand::Node(self.id)
    }
}

impl IntoOperand for &Expr {
    fn into_operand(self) -> Operand {
        Operand::Node(self.id)
    }
}

impl IntoOperand for Value {
    fn into_operand(self) -> Operand {
        Operand::Value(self)
    }
}

impl IntoOperand for SelectQuery {
    fn into_operand(self) -> Operand {
        Operand::Query(Box::new(self))
    }
}

impl<T: Into<Value>> IntoOperand for Option<T> {
    fn into_operand(self) -> Operand {
        Operand::Value(self.map(Into::into).unwrap_or(Value::Null))
    }
}

macro_rules! operand_from_value {
    ($($t:ty),* $(,)?) => {
        $(impl IntoOperand for $t {
            fn into_operand(self) -> Operand {
                Operand::Value(self.into())
            }
        })*
    };
}

operand_from_value!(
    bool,
    i16,
    i32,
    i64,
    u32,
    f32,
    f64,
    &str,
    String,
    uuid::Uuid,
    chrono::DateTime<chrono::Utc>,
    serde_json::Value,
);

/// Result of one capture call: the tip of an operation graph, or the
/// constant the closure returned.
#[derive(Debug, Clone)]
pub enum Captured {
    Node {
        graph: Rc<RefCell<OpGraph>>,
        id: NodeId,
    },
    Value(Value),
    Query(Box<SelectQuery>),
}

impl Captured {
    pub(crate) fn from_operand(graph: &Rc<RefCell<OpGraph>>, operand: Operand) -> Captured {
        match operand {
            Operand::Node(id) => Captured::Node {
                graph: graph.clone(),
                id,
            },
            Operand::Value(v) => Captured::Value(v),
            Operand::Query(q) => Captured::Query(q),
        }
    }

    /// Short textual rendering for error messages.
    pub(crate) fn sketch(&self) -> String {
        match self {
            Captured::Value(v) => v.render_literal(),
            Captured::Query(_) => "(sub-query)".to_string(),
            Captured::Node { graph, id } => {
                let g = graph.borrow();
                sketch_node(&g, *id)
            }
        }
    }
}

fn sketch_node(g: &OpGraph, id: NodeId) -> String {
    match g.node(id) {
        Node::Argument { name } => name.clone(),
        Node::GetMember { host, name } => format!("{}.{}", sketch_node(g, *host), name),
        Node::SetMember { host, name, .. } => {
            format!("{}.{} = (..)", sketch_node(g, *host), name)
        }
        Node::GetIndex { host, .. } => format!("{}[..]", sketch_node(g, *host)),
        Node::SetIndex { host, .. } => format!("{}[..] = (..)", sketch_node(g, *host)),
        Node::Invoke { host, .. } => format!("{}(..)", sketch_node(g, *host)),
        Node::Method { host, name, args } => {
            format!("{}.{}(/*{}*/)", sketch_node(g, *host), name, args.len())
        }
        Node::Binary { op, .. } => format!("(.. {} ..)", op.sql_token()),
        Node::Unary { op, .. } => format!("{op:?}(..)"),
        Node::Convert { .. } => "convert(..)".to_string(),
    }
}

/// Anything a capture closure may return.
pub trait IntoCaptured {
    fn into_captured(self, graph: Rc<RefCell<OpGraph>>) -> Captured;
}

impl IntoCaptured for Expr {
    fn into_captured(self, _graph: Rc<RefCell<OpGraph>>) -> Captured {
        Captured::Node {
            graph: self.graph,
            id: self.id,
        }
    }
}

impl IntoCaptured for Captured {
    fn into_captured(self, _graph: Rc<RefCell<OpGraph>>) -> Captured {
        self
    }
}

impl IntoCaptured for SelectQuery {
    fn into_captured(self, _graph: Rc<RefCell<OpGraph>>) -> Captured {
        Captured::Query(Box::new(self))
    }
}

macro_rules! captured_from_value {
    ($($t:ty),* $(,)?) => {
        $(impl IntoCaptured for $t {
            fn into_captured(self, _graph: Rc<RefCell<OpGraph>>) -> Captured {
                Captured::Value(self.into())
            }
        })*
    };
}

captured_from_value!(bool, i16, i32, i64, u32, f32, f64, &str, String, Value);

/// Entry point for running capture closures.
pub struct Capture;

impl Capture {
    /// Run `f` once against a single fresh placeholder.
    pub fn one<F, R>(f: F) -> Captured
    where
        F: FnOnce(Expr) -> R,
        R: IntoCaptured,
    {
        Self::with_names(&["t0"], |mut args| f(args.remove(0)))
    }

    /// Run `f` once against one placeholder per name. Names that match a
    /// table alias in the enclosing builder compile to that alias token.
    pub fn with_names<F, R>(names: &[&str], f: F) -> Captured
    where
        F: FnOnce(Vec<Expr>) -> R,
        R: IntoCaptured,
    {
        let graph = Rc::new(RefCell::new(OpGraph::new()));
        let args = names.iter().map(|n| Expr::argument(&graph, n)).collect();
        f(args).into_captured(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_records_member_chain() {
        let captured = Capture::one(|t| t.member("public").member("users"));
        match captured {
            Captured::Node { graph, id } => {
                let g = graph.borrow();
                // Argument + two members
                assert_eq!(g.len(), 3);
                match g.node(id) {
                    Node::GetMember { name, .. } => assert_eq!(name, "users"),
                    other => panic!("unexpected tip {other:?}"),
                }
            }
            other => panic!("expected node, got {other:?}"),
        }
    }

    #[test]
    fn capture_constant_produces_no_graph() {
        let captured = Capture::one(|_| "orders");
        match captured {
            Captured::Value(Value::Text(s)) => assert_eq!(s, "orders"),
            other => panic!("expected constant, got {other:?}"),
        }
    }

    #[test]
    fn operator_overloads_build_binary_nodes() {
        let captured = Capture::one(|t| (t.col("price") * 2i64).gt(100i64));
        let Captured::Node { graph, id } = captured else {
            panic!("expected node");
        };
        let g = graph.borrow();
        match g.node(id) {
            Node::Binary { op, .. } => assert_eq!(*op, BinaryOp::Gt),
            other => panic!("unexpected tip {other:?}"),
        }
    }

    #[test]
    fn multiple_arguments_share_one_arena() {
        let captured = Capture::with_names(&["u", "o"], |args| {
            args[0].col("id").eq(&args[1].col("user_id"))
        });
        let Captured::Node { graph, .. } = captured else {
            panic!("expected node");
        };
        // two arguments, two members, one binary
        assert_eq!(graph.borrow().len(), 5);
    }

    #[test]
    fn sketch_is_compact() {
        let captured = Capture::one(|t| t.member("a").member("b").as_alias("x"));
        assert_eq!(captured.sketch(), "t0.a.b.AS(/*1*/)");
    }
}
