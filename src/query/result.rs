//! Per-node results of the tree handler
//!
//! Visiting a parse node yields a [`NodeResult`]: an expression, a table
//! handle, a list of names, a column specification, and so on. The parent
//! node asks for the field it expects with a checked accessor; a mismatch
//! surfaces as [`TableError::WrongResultKind`] instead of a panic.

use super::expr::{ExprNode, SetElement};
use crate::data::Value;
use crate::table::{ColumnDesc, TableHandle};
use crate::{Result, TableError};

/// Result of visiting one parse node
#[derive(Debug)]
pub enum NodeResult {
    /// Node was handled by a side effect on the current context
    None,
    Int(i64),
    Str(String),
    /// A compiled expression
    Expr(ExprNode),
    /// One set element (IN operand)
    Elem(SetElement),
    /// A list of set elements
    Set(Vec<SetElement>),
    /// A resolved table plus the alias it is known under
    Table {
        handle: TableHandle,
        alias: Option<String>,
    },
    /// A list of names (columns to drop, show parts, ...)
    Names(Vec<String>),
    /// A column specification
    ColSpec(ColumnDesc),
    /// One sort key
    SortKey { expr: ExprNode, descending: bool },
    /// One UPDATE assignment
    Assignment { column: String, expr: ExprNode },
    /// A bare value, as produced by CALC
    Value(Value),
}

impl NodeResult {
    /// Short name of the result kind, for error messages
    pub fn kind(&self) -> &'static str {
        match self {
            NodeResult::None => "none",
            NodeResult::Int(_) => "int",
            NodeResult::Str(_) => "string",
            NodeResult::Expr(_) => "expression",
            NodeResult::Elem(_) => "set element",
            NodeResult::Set(_) => "set",
            NodeResult::Table { .. } => "table",
            NodeResult::Names(_) => "names",
            NodeResult::ColSpec(_) => "column spec",
            NodeResult::SortKey { .. } => "sort key",
            NodeResult::Assignment { .. } => "assignment",
            NodeResult::Value(_) => "value",
        }
    }

    fn mismatch(&self, expected: &'static str) -> TableError {
        TableError::WrongResultKind {
            expected,
            actual: self.kind(),
        }
    }

    pub fn into_expr(self) -> Result<ExprNode> {
        match self {
            NodeResult::Expr(e) => Ok(e),
            // A literal travels as a value in some positions.
            NodeResult::Value(v) => Ok(ExprNode::Literal(v)),
            NodeResult::Int(i) => Ok(ExprNode::Literal(Value::Int64(i))),
            other => Err(other.mismatch("expression")),
        }
    }

    pub fn into_elem(self) -> Result<SetElement> {
        match self {
            NodeResult::Elem(e) => Ok(e),
            NodeResult::Expr(e) => Ok(SetElement::Value(e)),
            // Literals in a set travel as plain values.
            other => Ok(SetElement::Value(other.into_expr()?)),
        }
    }

    pub fn into_set(self) -> Result<Vec<SetElement>> {
        match self {
            NodeResult::Set(set) => Ok(set),
            NodeResult::Elem(e) => Ok(vec![e]),
            other => {
                let elem = other.into_expr()?;
                Ok(vec![SetElement::Value(elem)])
            }
        }
    }

    pub fn into_table(self) -> Result<(TableHandle, Option<String>)> {
        match self {
            NodeResult::Table { handle, alias } => Ok((handle, alias)),
            other => Err(other.mismatch("table")),
        }
    }

    pub fn into_names(self) -> Result<Vec<String>> {
        match self {
            NodeResult::Names(names) => Ok(names),
            NodeResult::Str(s) => Ok(vec![s]),
            other => Err(other.mismatch("names")),
        }
    }

    pub fn into_colspec(self) -> Result<ColumnDesc> {
        match self {
            NodeResult::ColSpec(desc) => Ok(desc),
            other => Err(other.mismatch("column spec")),
        }
    }

    pub fn into_sort_key(self) -> Result<(ExprNode, bool)> {
        match self {
            NodeResult::SortKey { expr, descending } => Ok((expr, descending)),
            other => Err(other.mismatch("sort key")),
        }
    }

    pub fn into_assignment(self) -> Result<(String, ExprNode)> {
        match self {
            NodeResult::Assignment { column, expr } => Ok((column, expr)),
            other => Err(other.mismatch("assignment")),
        }
    }

    pub fn into_value(self) -> Result<Value> {
        match self {
            NodeResult::Value(v) => Ok(v),
            NodeResult::Int(i) => Ok(Value::Int64(i)),
            NodeResult::Str(s) => Ok(Value::String(s)),
            other => Err(other.mismatch("value")),
        }
    }

    /// Row count of a table result; values count as no rows
    pub fn row_count(&self) -> Result<usize> {
        match self {
            NodeResult::Table { handle, .. } => Ok(handle.read().nrow()),
            other => Err(other.mismatch("table")),
        }
    }
}
