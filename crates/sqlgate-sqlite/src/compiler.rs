//! SQLite rendering of [`QueryNode`] trees.

use sqlgate_core::{CompiledQuery, QueryCompiler, QueryId, QueryNode, Value, quote_ident};

/// Renders nodes with double-quoted identifiers and `?` placeholders.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteQueryCompiler;

impl SqliteQueryCompiler {
    pub fn new() -> Self {
        Self
    }

    fn render(node: &QueryNode, sql: &mut String, params: &mut Vec<Value>) {
        match node {
            QueryNode::Raw { sql: text, children } => {
                sql.push_str(text);
                for child in children {
                    Self::render(child, sql, params);
                }
            }
            QueryNode::Identifier(name) => sql.push_str(&quote_ident(name)),
            QueryNode::Value(value) => {
                sql.push('?');
                params.push(value.clone());
            }
        }
    }
}

impl QueryCompiler for SqliteQueryCompiler {
    fn compile_query(&self, node: &QueryNode, query_id: QueryId) -> CompiledQuery {
        let mut sql = String::new();
        let mut params = Vec::new();
        Self::render(node, &mut sql, &mut params);
        CompiledQuery::new(sql, params, query_id)
    }
}
