//! Operation graph: the record of symbolic operations a capture produced.
//!
//! Nodes live in a flat arena and reference the node they were chained from
//! (their "host") by index. The graph is singly rooted per argument, built
//! once during a capture call, and read-only afterwards. The compiler walks
//! it host-first so emitted SQL reproduces left-to-right source order.

use crate::builder::SelectQuery;
use crate::value::Value;

/// Index of a node within its arena.
pub type NodeId = usize;

/// Binary operator recorded by the capture front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    And,
    Or,
    Gt,
    Gte,
    Lt,
    Lte,
    Eq,
    Ne,
}

impl BinaryOp {
    /// SQL token for this operator.
    pub fn sql_token(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "^",
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
            BinaryOp::Gt => ">",
            BinaryOp::Gte => ">=",
            BinaryOp::Lt => "<",
            BinaryOp::Lte => "<=",
            BinaryOp::Eq => "=",
            BinaryOp::Ne => "<>",
        }
    }
}

/// Unary operator recorded by the capture front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

/// One operand of a node: another node, a literal, or a nested sub-select.
#[derive(Debug, Clone)]
pub enum Operand {
    Node(NodeId),
    Value(Value),
    Query(Box<SelectQuery>),
}

impl Operand {
    pub(crate) fn as_literal_null(&self) -> bool {
        matches!(self, Operand::Value(Value::Null))
    }
}

/// One recorded symbolic operation.
///
/// Every variant except `Argument` holds the id of the node it was invoked
/// on. Method names are dispatched case-insensitively; a fixed vocabulary
/// of reserved names (`AS`, `ON`, `IN`, `NOTIN`, `BETWEEN`, `LIKE`,
/// `NOTLIKE`, `AND`, `OR`, `NOT`, `COUNT`, `ASC`, `DESC`, `ALL`, join
/// selectors) carries special compilation rules; anything else compiles to
/// a literal SQL function call.
#[derive(Debug, Clone)]
pub enum Node {
    Argument {
        name: String,
    },
    GetMember {
        host: NodeId,
        name: String,
    },
    SetMember {
        host: NodeId,
        name: String,
        value: Operand,
    },
    GetIndex {
        host: NodeId,
        indices: Vec<Operand>,
    },
    SetIndex {
        host: NodeId,
        indices: Vec<Operand>,
        value: Operand,
    },
    Invoke {
        host: NodeId,
        args: Vec<Operand>,
    },
    Method {
        host: NodeId,
        name: String,
        args: Vec<Operand>,
    },
    Binary {
        left: Operand,
        op: BinaryOp,
        right: Operand,
    },
    Unary {
        op: UnaryOp,
        target: Operand,
    },
    /// Type conversion artifact; compiles as a passthrough.
    Convert {
        target: Operand,
    },
}

/// Flat arena of operation nodes produced by one capture call.
#[derive(Debug, Default)]
pub struct OpGraph {
    nodes: Vec<Node>,
}

impl OpGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a node, returning its id.
    pub fn push(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
