//! Boundary to the SQL compiler.
//!
//! The driver only needs a tiny statement tree: raw SQL fragments, quoted
//! identifiers and bound values. Dialects render it through [`QueryCompiler`].

use crate::query::{CompiledQuery, QueryId};
use crate::value::Value;

/// A node of an abstract statement.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryNode {
    /// Literal SQL text followed by child nodes, rendered in order.
    Raw {
        sql: String,
        children: Vec<QueryNode>,
    },
    /// An identifier, always emitted quoted.
    Identifier(String),
    /// A value, emitted as a placeholder with the value appended to the parameters.
    Value(Value),
}

impl QueryNode {
    /// A raw SQL fragment with no children.
    pub fn raw(sql: impl Into<String>) -> Self {
        QueryNode::Raw {
            sql: sql.into(),
            children: Vec::new(),
        }
    }

    /// A sequence of nodes with no SQL of its own.
    pub fn with_children(children: Vec<QueryNode>) -> Self {
        QueryNode::Raw {
            sql: String::new(),
            children,
        }
    }

    pub fn identifier(name: impl Into<String>) -> Self {
        QueryNode::Identifier(name.into())
    }

    pub fn value(value: impl Into<Value>) -> Self {
        QueryNode::Value(value.into())
    }
}

/// Turns a [`QueryNode`] into dialect-specific SQL text plus parameters.
pub trait QueryCompiler: Send + Sync {
    fn compile_query(&self, node: &QueryNode, query_id: QueryId) -> CompiledQuery;
}
