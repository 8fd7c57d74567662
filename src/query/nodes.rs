//! Raw TaQL parse-tree nodes
//!
//! The grammar layer (external to this crate) produces a [`TaqlNode`]
//! tree; the tree handler visits it exactly once, top-down. The node set
//! is closed, so dispatch stays exhaustive at compile time.

use crate::data::Value;

/// Unary operators appearing in the raw tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Minus,
    Not,
}

/// Binary operators appearing in the raw tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Plus,
    Minus,
    Times,
    Divide,
    Modulo,
    Power,
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    And,
    Or,
    In,
}

/// Rename/drop targets of an ALTER TABLE command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenDropKind {
    /// Rename columns; `names` alternates old, new
    RenameColumn,
    /// Drop the named columns
    DropColumn,
    /// Rename table keywords; `names` alternates old, new
    RenameKeyword,
    /// Drop the named table keywords
    DropKeyword,
}

/// One bounded axis of an array index: `start:end` with open ends allowed
#[derive(Debug, Clone)]
pub struct IndexRange {
    pub start: Option<Box<TaqlNode>>,
    pub end: Option<Box<TaqlNode>>,
}

/// A node of the raw TaQL parse tree
#[derive(Debug, Clone)]
pub enum TaqlNode {
    /// Literal constant
    Const(Value),
    /// Regex literal, `~ p/.../` or negated
    Regex { pattern: String, negate: bool },
    /// Unary operator applied to a child expression
    Unary { op: UnaryOp, child: Box<TaqlNode> },
    /// Binary operator applied to two child expressions
    Binary {
        op: BinaryOp,
        left: Box<TaqlNode>,
        right: Box<TaqlNode>,
    },
    /// Heterogeneous list of child nodes
    Multi(Vec<TaqlNode>),
    /// Function call
    Func { name: String, args: Vec<TaqlNode> },
    /// Value range with optionally open and optionally exclusive ends
    Range {
        lower: Option<Box<TaqlNode>>,
        upper: Option<Box<TaqlNode>>,
        incl_lower: bool,
        incl_upper: bool,
    },
    /// Array index / slice applied to an expression
    Index {
        target: Box<TaqlNode>,
        ranges: Vec<IndexRange>,
    },
    /// Keyword access, `key` on the table or `column::key`
    KeyCol {
        column: Option<String>,
        key: String,
    },
    /// Table reference in a from-list: name, `$k` number, nested select,
    /// or a parenthesized set of tables to concatenate
    TableRef {
        table: Box<TaqlNode>,
        alias: Option<String>,
    },
    /// One select-list entry
    Col {
        expr: Box<TaqlNode>,
        alias: Option<String>,
        mask: Option<String>,
    },
    /// Select-list (list of [`TaqlNode::Col`]) with optional DISTINCT
    Columns {
        distinct: bool,
        columns: Vec<TaqlNode>,
    },
    /// Join clause: extra tables plus the join condition
    Join {
        tables: Vec<TaqlNode>,
        condition: Box<TaqlNode>,
    },
    /// GROUP BY keys
    GroupBy { keys: Vec<TaqlNode> },
    /// One sort key; `descending` is None when unspecified
    SortKey {
        expr: Box<TaqlNode>,
        descending: Option<bool>,
    },
    /// ORDER BY clause (list of [`TaqlNode::SortKey`])
    Sort { keys: Vec<TaqlNode> },
    /// LIMIT / OFFSET clause
    LimitOff {
        limit: Option<Box<TaqlNode>>,
        offset: Option<Box<TaqlNode>>,
    },
    /// GIVING clause naming the result table
    Giving { name: String },
    /// UPDATE SET assignment
    UpdExpr {
        column: String,
        expr: Box<TaqlNode>,
    },
    /// SELECT statement
    Select {
        columns: Option<Box<TaqlNode>>,
        tables: Vec<TaqlNode>,
        join: Option<Box<TaqlNode>>,
        where_: Option<Box<TaqlNode>>,
        groupby: Option<Box<TaqlNode>>,
        having: Option<Box<TaqlNode>>,
        sort: Option<Box<TaqlNode>>,
        limitoff: Option<Box<TaqlNode>>,
        giving: Option<Box<TaqlNode>>,
    },
    /// UPDATE statement
    Update {
        tables: Vec<TaqlNode>,
        assignments: Vec<TaqlNode>,
        where_: Option<Box<TaqlNode>>,
        sort: Option<Box<TaqlNode>>,
        limitoff: Option<Box<TaqlNode>>,
    },
    /// INSERT statement: literal value rows or a source select
    Insert {
        tables: Vec<TaqlNode>,
        columns: Vec<String>,
        rows: Vec<Vec<TaqlNode>>,
        select: Option<Box<TaqlNode>>,
    },
    /// DELETE statement
    Delete {
        tables: Vec<TaqlNode>,
        where_: Option<Box<TaqlNode>>,
        sort: Option<Box<TaqlNode>>,
        limitoff: Option<Box<TaqlNode>>,
    },
    /// COUNT statement
    Count {
        columns: Option<Box<TaqlNode>>,
        tables: Vec<TaqlNode>,
        where_: Option<Box<TaqlNode>>,
    },
    /// CALC statement: a bare expression over optional tables
    Calc {
        tables: Vec<TaqlNode>,
        expr: Box<TaqlNode>,
    },
    /// CREATE TABLE statement
    CreateTable {
        name: String,
        like: Option<Box<TaqlNode>>,
        /// Columns dropped from the LIKE source before merging specs
        like_drop: Vec<String>,
        columns: Vec<TaqlNode>,
        nrow: Option<Box<TaqlNode>>,
    },
    /// One column specification in CREATE TABLE or ADD COLUMN
    ColSpec {
        name: String,
        dtype: String,
        shape: Option<Vec<usize>>,
        unit: Option<String>,
    },
    /// One record field, `name = expr` or a nested field list
    RecFld {
        name: String,
        value: Box<TaqlNode>,
    },
    /// Unit annotation on an expression
    Unit {
        unit: String,
        child: Box<TaqlNode>,
    },
    /// ALTER TABLE statement carrying a list of subcommands
    AlterTable {
        table: Box<TaqlNode>,
        commands: Vec<TaqlNode>,
    },
    /// ALTER TABLE ADD COLUMN
    AddCol { columns: Vec<TaqlNode> },
    /// ALTER TABLE SET KEYWORD; `column` selects column keywords
    SetKey {
        column: Option<String>,
        fields: Vec<TaqlNode>,
    },
    /// ALTER TABLE RENAME/DROP COLUMN or KEYWORD
    RenDrop {
        kind: RenDropKind,
        names: Vec<String>,
    },
    /// ALTER TABLE ADD ROW
    AddRow { count: Box<TaqlNode> },
    /// Concatenation of several tables into one
    ConcTab { tables: Vec<TaqlNode> },
    /// SHOW command
    Show { parts: Vec<String> },
    /// ALTER TABLE COPY COLUMN; pairs of (new, source)
    CopyCol { pairs: Vec<(String, String)> },
    /// DROP TABLE statement
    DropTable { tables: Vec<TaqlNode> },
}

impl TaqlNode {
    /// Short name of the node kind, for error messages
    pub fn kind(&self) -> &'static str {
        match self {
            TaqlNode::Const(_) => "const",
            TaqlNode::Regex { .. } => "regex",
            TaqlNode::Unary { .. } => "unary",
            TaqlNode::Binary { .. } => "binary",
            TaqlNode::Multi(_) => "multi",
            TaqlNode::Func { .. } => "func",
            TaqlNode::Range { .. } => "range",
            TaqlNode::Index { .. } => "index",
            TaqlNode::KeyCol { .. } => "keycol",
            TaqlNode::TableRef { .. } => "table",
            TaqlNode::Col { .. } => "col",
            TaqlNode::Columns { .. } => "columns",
            TaqlNode::Join { .. } => "join",
            TaqlNode::GroupBy { .. } => "groupby",
            TaqlNode::SortKey { .. } => "sortkey",
            TaqlNode::Sort { .. } => "sort",
            TaqlNode::LimitOff { .. } => "limitoff",
            TaqlNode::Giving { .. } => "giving",
            TaqlNode::UpdExpr { .. } => "updexpr",
            TaqlNode::Select { .. } => "select",
            TaqlNode::Update { .. } => "update",
            TaqlNode::Insert { .. } => "insert",
            TaqlNode::Delete { .. } => "delete",
            TaqlNode::Count { .. } => "count",
            TaqlNode::Calc { .. } => "calc",
            TaqlNode::CreateTable { .. } => "createtable",
            TaqlNode::ColSpec { .. } => "colspec",
            TaqlNode::RecFld { .. } => "recfld",
            TaqlNode::Unit { .. } => "unit",
            TaqlNode::AlterTable { .. } => "altertable",
            TaqlNode::AddCol { .. } => "addcol",
            TaqlNode::SetKey { .. } => "setkey",
            TaqlNode::RenDrop { .. } => "rendrop",
            TaqlNode::AddRow { .. } => "addrow",
            TaqlNode::ConcTab { .. } => "conctab",
            TaqlNode::Show { .. } => "show",
            TaqlNode::CopyCol { .. } => "copycol",
            TaqlNode::DropTable { .. } => "droptable",
        }
    }

    /// Column-reference shorthand used heavily in tests
    pub fn column(name: impl Into<String>) -> TaqlNode {
        TaqlNode::KeyCol {
            column: None,
            key: name.into(),
        }
    }

    /// Integer literal shorthand
    pub fn int(i: i64) -> TaqlNode {
        TaqlNode::Const(Value::Int64(i))
    }

    /// String literal shorthand
    pub fn string(s: impl Into<String>) -> TaqlNode {
        TaqlNode::Const(Value::String(s.into()))
    }
}
