//! Document types for transformation rules.
//!
//! A rule document is the serialized form of a rule's syntax tree: a
//! condition node and an ordered list of statement nodes. Nodes name
//! functions by string; resolving and type-checking them is the job of the
//! evaluator's compiler.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

// =============================================================================
// Literals and operators
// =============================================================================

/// A scalar literal as written in a rule document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Literal {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

/// Binary comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComparisonOp {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl ComparisonOp {
    pub const ALL: [ComparisonOp; 6] = [
        ComparisonOp::Eq,
        ComparisonOp::Ne,
        ComparisonOp::Lt,
        ComparisonOp::Lte,
        ComparisonOp::Gt,
        ComparisonOp::Gte,
    ];

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "eq" => Some(ComparisonOp::Eq),
            "ne" => Some(ComparisonOp::Ne),
            "lt" => Some(ComparisonOp::Lt),
            "lte" => Some(ComparisonOp::Lte),
            "gt" => Some(ComparisonOp::Gt),
            "gte" => Some(ComparisonOp::Gte),
            _ => None,
        }
    }

    /// The document key for this operator.
    pub fn keyword(self) -> &'static str {
        match self {
            ComparisonOp::Eq => "eq",
            ComparisonOp::Ne => "ne",
            ComparisonOp::Lt => "lt",
            ComparisonOp::Lte => "lte",
            ComparisonOp::Gt => "gt",
            ComparisonOp::Gte => "gte",
        }
    }

    /// The infix symbol used when rendering expressions.
    pub fn symbol(self) -> &'static str {
        match self {
            ComparisonOp::Eq => "==",
            ComparisonOp::Ne => "!=",
            ComparisonOp::Lt => "<",
            ComparisonOp::Lte => "<=",
            ComparisonOp::Gt => ">",
            ComparisonOp::Gte => ">=",
        }
    }
}

impl fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

// =============================================================================
// Expression nodes
// =============================================================================

/// One node of a rule's syntax tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExprNode {
    Literal(Literal),
    /// Read a field of the message being processed.
    Field(String),
    /// Read a variable defined earlier in the rule.
    Variable(String),
    /// Define a variable for the remaining statements.
    Let { name: String, value: Box<ExprNode> },
    /// Call a registered function with named arguments.
    Call {
        function: String,
        args: BTreeMap<String, ExprNode>,
    },
    Not(Box<ExprNode>),
    And(Vec<ExprNode>),
    Or(Vec<ExprNode>),
    Compare {
        op: ComparisonOp,
        lhs: Box<ExprNode>,
        rhs: Box<ExprNode>,
    },
    /// Object literal.
    Map(BTreeMap<String, ExprNode>),
}

impl ExprNode {
    pub fn bool(b: bool) -> Self {
        ExprNode::Literal(Literal::Bool(b))
    }

    pub fn string(s: impl Into<String>) -> Self {
        ExprNode::Literal(Literal::String(s.into()))
    }

    pub fn integer(n: i64) -> Self {
        ExprNode::Literal(Literal::Integer(n))
    }

    /// Build a call node from `(name, node)` argument pairs.
    pub fn call<I, S>(function: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = (S, ExprNode)>,
        S: Into<String>,
    {
        ExprNode::Call {
            function: function.into(),
            args: args.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

// =============================================================================
// Rule documents
// =============================================================================

/// A parsed rule document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleDocument {
    pub title: String,
    pub id: Option<String>,
    pub description: Option<String>,
    /// The `when:` node. Defaults to `true` when omitted.
    pub condition: ExprNode,
    /// The `then:` nodes, in execution order.
    pub statements: Vec<ExprNode>,
}

impl RuleDocument {
    /// The id if present, else the title.
    pub fn name(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.title)
    }
}

/// Rule documents read from one or more YAML sources.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RuleCollection {
    pub rules: Vec<RuleDocument>,
    /// Per-document errors. A broken document does not stop the others
    /// from loading.
    #[serde(skip)]
    pub errors: Vec<String>,
}

impl RuleCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn extend(&mut self, other: RuleCollection) {
        self.rules.extend(other.rules);
        self.errors.extend(other.errors);
    }
}
