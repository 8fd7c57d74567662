//! Tree handler: visits a parsed statement tree and executes it
//!
//! The handler owns the table catalog, the caller-supplied temporary-table
//! registry and a stack of query contexts. Visiting a compound statement
//! pushes a context, fills it clause by clause in grammar order (table
//! list first, so an unresolved table fails before anything else runs),
//! then pops and executes it. Nested sub-selects get their own context;
//! the enclosing context is untouched. Any failure truncates the stack
//! back to its pre-statement depth.

use super::context::{CommandKind, QueryContext, SelectItem};
use super::expr::{ExprNode, SetElement};
use super::nodes::{BinaryOp, RenDropKind, TaqlNode};
use super::result::NodeResult;
use crate::data::{DataType, Record, Value};
use crate::table::{ColumnDesc, Table, TableCatalog, TableHandle};
use crate::{Result, TableError};

/// Statement-tree visitor and executor
#[derive(Default)]
pub struct TreeHandler {
    /// Named tables the handler resolves FROM clauses against
    pub catalog: TableCatalog,
    temp_tables: Vec<TableHandle>,
    stack: Vec<QueryContext>,
    /// Target of the ALTER TABLE subcommands currently being visited
    alter_target: Option<TableHandle>,
}

impl TreeHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current context-stack depth; zero outside a statement
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Process one statement tree against the given temporary-table
    /// registry, returning a table or (for CALC) a bare value
    pub fn handle_tree(
        &mut self,
        node: &TaqlNode,
        temp_tables: &[TableHandle],
    ) -> Result<NodeResult> {
        log::debug!("handling {} statement tree", node.kind());
        self.temp_tables = temp_tables.to_vec();
        self.stack.clear();
        self.alter_target = None;
        let depth = self.stack.len();
        let result = self.visit(node);
        if result.is_err() {
            self.stack.truncate(depth);
        }
        result
    }

    fn top_mut(&mut self) -> Result<&mut QueryContext> {
        self.stack
            .last_mut()
            .ok_or_else(|| TableError::ExprError("no active statement context".into()))
    }

    fn pop_context(&mut self) -> Result<QueryContext> {
        self.stack
            .pop()
            .ok_or_else(|| TableError::ExprError("context stack underflow".into()))
    }

    fn visit(&mut self, node: &TaqlNode) -> Result<NodeResult> {
        match node {
            TaqlNode::Const(v) => Ok(NodeResult::Value(v.clone())),
            TaqlNode::Regex { .. } => Err(TableError::ExprError(
                "regex literal outside a comparison".into(),
            )),
            TaqlNode::Unary { op, child } => {
                let child = self.visit(child)?.into_expr()?;
                Ok(NodeResult::Expr(ExprNode::Unary {
                    op: *op,
                    child: Box::new(child),
                }))
            }
            TaqlNode::Binary { op, left, right } => self.visit_binary(*op, left, right),
            TaqlNode::Multi(children) => {
                let mut set = Vec::with_capacity(children.len());
                for child in children {
                    set.push(self.visit(child)?.into_elem()?);
                }
                Ok(NodeResult::Set(set))
            }
            TaqlNode::Func { name, args } => self.visit_func(name, args),
            TaqlNode::Range {
                lower,
                upper,
                incl_lower,
                incl_upper,
            } => {
                let lower = match lower {
                    Some(n) => Some(self.visit(n)?.into_expr()?),
                    None => None,
                };
                let upper = match upper {
                    Some(n) => Some(self.visit(n)?.into_expr()?),
                    None => None,
                };
                Ok(NodeResult::Elem(SetElement::Range {
                    lower,
                    upper,
                    incl_lower: *incl_lower,
                    incl_upper: *incl_upper,
                }))
            }
            TaqlNode::Index { target, ranges } => {
                let target = self.visit(target)?.into_expr()?;
                let mut axes = Vec::with_capacity(ranges.len());
                for range in ranges {
                    let start = match &range.start {
                        Some(n) => Some(self.const_usize(n)?),
                        None => None,
                    };
                    let end = match &range.end {
                        Some(n) => Some(self.const_usize(n)?),
                        None => None,
                    };
                    axes.push((start, end));
                }
                Ok(NodeResult::Expr(ExprNode::Slice {
                    target: Box::new(target),
                    axes,
                }))
            }
            TaqlNode::KeyCol { column, key } => {
                let expr = match column {
                    Some(col) => ExprNode::Keyword {
                        column: Some(col.clone()),
                        key: key.clone(),
                    },
                    // A bare "::key" addresses a table keyword; anything
                    // else is a column reference.
                    None => match key.strip_prefix("::") {
                        Some(stripped) => ExprNode::Keyword {
                            column: None,
                            key: stripped.to_string(),
                        },
                        None => ExprNode::Column(key.clone()),
                    },
                };
                Ok(NodeResult::Expr(expr))
            }
            TaqlNode::Unit { unit: _, child } => self.visit(child),
            TaqlNode::TableRef { .. } => {
                let (handle, alias) = self.resolve_table(node)?;
                Ok(NodeResult::Table { handle, alias })
            }
            TaqlNode::Col { expr, alias, mask: _ } => {
                let expr = self.visit(expr)?.into_expr()?;
                let item = SelectItem {
                    expr,
                    alias: alias.clone(),
                };
                self.top_mut()?.add_select(item)?;
                Ok(NodeResult::None)
            }
            TaqlNode::Columns { distinct, columns } => {
                self.top_mut()?.distinct = *distinct;
                for col in columns {
                    self.visit(col)?;
                }
                Ok(NodeResult::None)
            }
            TaqlNode::Join { tables, condition } => {
                for t in tables {
                    let (handle, alias) = self.resolve_table(t)?;
                    self.top_mut()?.add_table(alias, handle);
                }
                // The join condition folds into the row predicate.
                let cond = self.visit(condition)?.into_expr()?;
                let ctx = self.top_mut()?;
                ctx.where_ = Some(match ctx.where_.take() {
                    Some(prev) => ExprNode::Binary {
                        op: BinaryOp::And,
                        left: Box::new(prev),
                        right: Box::new(cond),
                    },
                    None => cond,
                });
                Ok(NodeResult::None)
            }
            TaqlNode::GroupBy { keys } => {
                let mut exprs = Vec::with_capacity(keys.len());
                for key in keys {
                    exprs.push(self.visit(key)?.into_expr()?);
                }
                self.top_mut()?.set_groupby(exprs)?;
                Ok(NodeResult::None)
            }
            TaqlNode::SortKey { expr, descending } => {
                let expr = self.visit(expr)?.into_expr()?;
                Ok(NodeResult::SortKey {
                    expr,
                    descending: descending.unwrap_or(false),
                })
            }
            TaqlNode::Sort { keys } => {
                let mut sort = Vec::with_capacity(keys.len());
                for key in keys {
                    sort.push(self.visit(key)?.into_sort_key()?);
                }
                self.top_mut()?.set_sort(sort)?;
                Ok(NodeResult::None)
            }
            TaqlNode::LimitOff { limit, offset } => {
                let limit = match limit {
                    Some(n) => Some(self.const_usize(n)?),
                    None => None,
                };
                let offset = match offset {
                    Some(n) => self.const_usize(n)?,
                    None => 0,
                };
                self.top_mut()?.set_limit_offset(limit, offset)?;
                Ok(NodeResult::None)
            }
            TaqlNode::Giving { name } => {
                self.top_mut()?.set_giving(name.clone())?;
                Ok(NodeResult::None)
            }
            TaqlNode::UpdExpr { column, expr } => {
                let expr = self.visit(expr)?.into_expr()?;
                self.top_mut()?.add_assignment(column.clone(), expr)?;
                Ok(NodeResult::None)
            }
            TaqlNode::Select { .. } => {
                let ctx = self.process_select(node)?;
                let giving = ctx.giving.clone();
                let result = ctx.execute()?;
                if let (Some(name), NodeResult::Table { handle, .. }) = (&giving, &result) {
                    self.catalog.insert_as(name.clone(), handle.clone());
                }
                Ok(result)
            }
            TaqlNode::Update {
                tables,
                assignments,
                where_,
                sort,
                limitoff,
            } => {
                self.stack.push(QueryContext::new(CommandKind::Update));
                self.fill_from_list(tables)?;
                for assignment in assignments {
                    self.visit(assignment)?;
                }
                self.fill_filters(where_, sort, limitoff)?;
                self.pop_context()?.execute()
            }
            TaqlNode::Insert {
                tables,
                columns,
                rows,
                select,
            } => {
                self.stack.push(QueryContext::new(CommandKind::Insert));
                self.fill_from_list(tables)?;
                self.top_mut()?.insert_columns = columns.clone();
                for row in rows {
                    let mut exprs = Vec::with_capacity(row.len());
                    for value in row {
                        exprs.push(self.visit(value)?.into_expr()?);
                    }
                    self.top_mut()?.insert_rows.push(exprs);
                }
                if let Some(select) = select {
                    let inner = self.process_select(select)?;
                    self.top_mut()?.insert_select = Some(Box::new(inner));
                }
                self.pop_context()?.execute()
            }
            TaqlNode::Delete {
                tables,
                where_,
                sort,
                limitoff,
            } => {
                self.stack.push(QueryContext::new(CommandKind::Delete));
                self.fill_from_list(tables)?;
                self.fill_filters(where_, sort, limitoff)?;
                self.pop_context()?.execute()
            }
            TaqlNode::Count {
                columns,
                tables,
                where_,
            } => {
                self.stack.push(QueryContext::new(CommandKind::Count));
                self.fill_from_list(tables)?;
                if let Some(columns) = columns {
                    self.visit(columns)?;
                }
                if let Some(pred) = where_ {
                    let pred = self.visit(pred)?.into_expr()?;
                    self.top_mut()?.set_where(pred)?;
                }
                self.pop_context()?.execute()
            }
            TaqlNode::Calc { tables, expr } => {
                self.stack.push(QueryContext::new(CommandKind::Calc));
                self.fill_from_list(tables)?;
                let expr = self.visit(expr)?.into_expr()?;
                self.top_mut()?.set_calc(expr)?;
                self.pop_context()?.execute()
            }
            TaqlNode::CreateTable {
                name,
                like,
                like_drop,
                columns,
                nrow,
            } => self.visit_create_table(name, like.as_deref(), like_drop, columns, nrow.as_deref()),
            TaqlNode::ColSpec {
                name,
                dtype,
                shape,
                unit,
            } => {
                let dtype = parse_dtype(dtype)?;
                let mut desc = match shape {
                    Some(shape) => ColumnDesc::array(name.clone(), dtype).with_shape(shape.clone()),
                    None => ColumnDesc::scalar(name.clone(), dtype),
                };
                if let Some(unit) = unit {
                    desc = desc.with_unit(unit.clone());
                }
                Ok(NodeResult::ColSpec(desc))
            }
            TaqlNode::RecFld { name, value } => {
                let expr = match value.as_ref() {
                    // A nested field list is a record literal.
                    TaqlNode::Multi(fields) => {
                        ExprNode::Literal(Value::Record(self.const_record(fields)?))
                    }
                    other => self.visit(other)?.into_expr()?,
                };
                Ok(NodeResult::Assignment {
                    column: name.clone(),
                    expr,
                })
            }
            TaqlNode::AlterTable { table, commands } => {
                let (handle, _) = self.resolve_table(table)?;
                self.alter_target = Some(handle.clone());
                self.stack.push(QueryContext::new(CommandKind::AlterTable));
                for command in commands {
                    self.visit(command)?;
                }
                self.pop_context()?;
                self.alter_target = None;
                Ok(NodeResult::Table {
                    handle,
                    alias: None,
                })
            }
            TaqlNode::AddCol { columns } => {
                let target = self.alter_target_handle()?;
                for column in columns {
                    let desc = self.visit(column)?.into_colspec()?;
                    target.write().add_column(desc)?;
                }
                Ok(NodeResult::None)
            }
            TaqlNode::SetKey { column, fields } => {
                let target = self.alter_target_handle()?;
                for field in fields {
                    let (key, expr) = self.visit(field)?.into_assignment()?;
                    let value = expr.eval(None, 0)?;
                    let mut tab = target.write();
                    match column {
                        Some(col) => tab.set_column_keyword(col, key, value)?,
                        None => tab.set_keyword(key, value),
                    }
                }
                Ok(NodeResult::None)
            }
            TaqlNode::RenDrop { kind, names } => self.visit_rendrop(*kind, names),
            TaqlNode::AddRow { count } => {
                let target = self.alter_target_handle()?;
                let count = self.const_usize(count)?;
                target.write().add_rows(count)?;
                Ok(NodeResult::None)
            }
            TaqlNode::ConcTab { tables } => {
                let handle = self.concat_tables(tables)?;
                Ok(NodeResult::Table {
                    handle,
                    alias: None,
                })
            }
            TaqlNode::Show { parts } => self.visit_show(parts),
            TaqlNode::CopyCol { pairs } => {
                let target = self.alter_target_handle()?;
                for (new, source) in pairs {
                    target.write().copy_column(source, new)?;
                }
                Ok(NodeResult::None)
            }
            TaqlNode::DropTable { tables } => {
                for table in tables {
                    let name = table_name(table)?;
                    self.catalog.drop_table(&name)?;
                }
                Ok(NodeResult::None)
            }
        }
    }

    fn visit_binary(
        &mut self,
        op: BinaryOp,
        left: &TaqlNode,
        right: &TaqlNode,
    ) -> Result<NodeResult> {
        if let TaqlNode::Regex { pattern, negate } = right {
            let target = self.visit(left)?.into_expr()?;
            let negate = match op {
                BinaryOp::Eq => *negate,
                BinaryOp::Ne => !*negate,
                _ => {
                    return Err(TableError::ExprError(
                        "pattern match requires = or !=".into(),
                    ))
                }
            };
            return Ok(NodeResult::Expr(ExprNode::regex_match(
                target, pattern, negate,
            )?));
        }
        if op == BinaryOp::In {
            let target = self.visit(left)?.into_expr()?;
            let set = self.visit(right)?.into_set()?;
            return Ok(NodeResult::Expr(ExprNode::InSet {
                target: Box::new(target),
                set,
            }));
        }
        let left = self.visit(left)?.into_expr()?;
        let right = self.visit(right)?.into_expr()?;
        Ok(NodeResult::Expr(ExprNode::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }))
    }

    fn visit_func(&mut self, name: &str, args: &[TaqlNode]) -> Result<NodeResult> {
        if name.eq_ignore_ascii_case("exists") {
            let [sub] = args else {
                return Err(TableError::ExprError("EXISTS takes one subquery".into()));
            };
            if !matches!(sub, TaqlNode::Select { .. }) {
                return Err(TableError::ExprError("EXISTS needs a SELECT".into()));
            }
            // Processed on its own context but not executed here.
            let ctx = self.process_select(sub)?;
            return Ok(NodeResult::Expr(ExprNode::Exists(Box::new(ctx))));
        }
        let func = super::expr::Function::from_name(name)
            .ok_or_else(|| TableError::ExprError(format!("unknown function {}", name)))?;
        let mut exprs = Vec::with_capacity(args.len());
        for arg in args {
            exprs.push(self.visit(arg)?.into_expr()?);
        }
        Ok(NodeResult::Expr(ExprNode::Func { func, args: exprs }))
    }

    /// Push a SELECT context and fill it clause by clause; the caller
    /// decides whether to execute the returned context
    fn process_select(&mut self, node: &TaqlNode) -> Result<QueryContext> {
        let TaqlNode::Select {
            columns,
            tables,
            join,
            where_,
            groupby,
            having,
            sort,
            limitoff,
            giving,
        } = node
        else {
            return Err(TableError::ExprError(format!(
                "expected a select node, got {}",
                node.kind()
            )));
        };
        self.stack.push(QueryContext::new(CommandKind::Select));
        // Table list first: an unresolvable table fails the statement
        // before any other clause is touched.
        self.fill_from_list(tables)?;
        if let Some(join) = join {
            self.visit(join)?;
        }
        if let Some(pred) = where_ {
            let pred = self.visit(pred)?.into_expr()?;
            self.top_mut()?.set_where(pred)?;
        }
        if let Some(groupby) = groupby {
            self.visit(groupby)?;
        }
        if let Some(having) = having {
            let pred = self.visit(having)?.into_expr()?;
            self.top_mut()?.set_having(pred)?;
        }
        if let Some(sort) = sort {
            self.visit(sort)?;
        }
        if let Some(limitoff) = limitoff {
            self.visit(limitoff)?;
        }
        if let Some(giving) = giving {
            self.visit(giving)?;
        }
        if let Some(columns) = columns {
            self.visit(columns)?;
        }
        self.pop_context()
    }

    fn fill_from_list(&mut self, tables: &[TaqlNode]) -> Result<()> {
        for table in tables {
            let (handle, alias) = self.resolve_table(table)?;
            self.top_mut()?.add_table(alias, handle);
        }
        Ok(())
    }

    fn fill_filters(
        &mut self,
        where_: &Option<Box<TaqlNode>>,
        sort: &Option<Box<TaqlNode>>,
        limitoff: &Option<Box<TaqlNode>>,
    ) -> Result<()> {
        if let Some(pred) = where_ {
            let pred = self.visit(pred)?.into_expr()?;
            self.top_mut()?.set_where(pred)?;
        }
        if let Some(sort) = sort {
            self.visit(sort)?;
        }
        if let Some(limitoff) = limitoff {
            self.visit(limitoff)?;
        }
        Ok(())
    }

    /// Resolve a from-list entry: a name, a `$k` registry index, a nested
    /// select (executed), or a parenthesized list concatenated into one
    /// synthetic table
    fn resolve_table(&mut self, node: &TaqlNode) -> Result<(TableHandle, Option<String>)> {
        match node {
            TaqlNode::TableRef { table, alias } => {
                let (handle, _) = self.resolve_table(table)?;
                Ok((handle, alias.clone()))
            }
            TaqlNode::Const(Value::String(name)) => Ok((self.catalog.open(name)?, None)),
            TaqlNode::Const(Value::Int64(k)) => Ok((self.temp_table(*k)?, None)),
            TaqlNode::Select { .. } => {
                let ctx = self.process_select(node)?;
                let giving = ctx.giving.clone();
                let (handle, _) = ctx.execute()?.into_table()?;
                // A GIVING name registers here too, as for a top-level SELECT.
                if let Some(name) = giving {
                    self.catalog.insert_as(name, handle.clone());
                }
                Ok((handle, None))
            }
            TaqlNode::Multi(parts) => Ok((self.concat_tables(parts)?, None)),
            TaqlNode::ConcTab { tables } => Ok((self.concat_tables(tables)?, None)),
            other => Err(TableError::ExprError(format!(
                "cannot use a {} node as a table",
                other.kind()
            ))),
        }
    }

    fn temp_table(&self, k: i64) -> Result<TableHandle> {
        let count = self.temp_tables.len();
        let index = usize::try_from(k)
            .map_err(|_| TableError::ExprError(format!("negative table index ${}", k)))?;
        self.temp_tables
            .get(index)
            .cloned()
            .ok_or(TableError::UnknownTempTable { index, count })
    }

    fn concat_tables(&mut self, parts: &[TaqlNode]) -> Result<TableHandle> {
        // Copy each part under its own short-lived lock; two entries may
        // resolve to the same table handle.
        let mut copies = Vec::with_capacity(parts.len());
        for part in parts {
            let handle = self.resolve_table(part)?.0;
            let mut tab = handle.write();
            let rows: Vec<usize> = (0..tab.nrow()).collect();
            copies.push(tab.take(&rows)?);
        }
        let mut refs: Vec<&mut Table> = copies.iter_mut().collect();
        let merged = Table::concat("concat", &mut refs)?;
        Ok(crate::table::handle(merged))
    }

    fn visit_create_table(
        &mut self,
        name: &str,
        like: Option<&TaqlNode>,
        like_drop: &[String],
        columns: &[TaqlNode],
        nrow: Option<&TaqlNode>,
    ) -> Result<NodeResult> {
        if self.catalog.contains(name) {
            return Err(TableError::TableExists(name.to_string()));
        }
        self.stack.push(QueryContext::new(CommandKind::CreateTable));
        let like = match like {
            Some(node) => Some(self.resolve_table(node)?.0),
            None => None,
        };
        let nrow = match nrow {
            Some(node) => Some(self.const_usize(node)?),
            None => None,
        };
        let mut specs = Vec::with_capacity(columns.len());
        for column in columns {
            specs.push(self.visit(column)?.into_colspec()?);
        }
        self.pop_context()?;

        let mut table = Table::new(name.to_string());
        if let Some(src) = like {
            let src = src.read();
            let mut descs = Vec::new();
            for col in src.column_names() {
                descs.push(src.column_desc(&col)?.clone());
            }
            // Dropped columns resolve before any additional specs merge.
            for drop in like_drop {
                let idx = descs
                    .iter()
                    .position(|d| d.name == *drop)
                    .ok_or_else(|| TableError::ColumnNotFound(drop.clone()))?;
                descs.remove(idx);
            }
            for desc in descs {
                table.add_column(desc)?;
            }
        }
        for desc in specs {
            table.add_column(desc)?;
        }
        if let Some(nrow) = nrow {
            table.add_rows(nrow)?;
        }
        let handle = self.catalog.insert(table)?;
        Ok(NodeResult::Table {
            handle,
            alias: None,
        })
    }

    fn visit_rendrop(&mut self, kind: RenDropKind, names: &[String]) -> Result<NodeResult> {
        let target = self.alter_target_handle()?;
        let mut tab = target.write();
        match kind {
            RenDropKind::RenameColumn => {
                for pair in names.chunks(2) {
                    let [old, new] = pair else {
                        return Err(TableError::MalformedClause {
                            command: "ALTER TABLE",
                            clause: "RENAME COLUMN needs old/new name pairs".into(),
                        });
                    };
                    tab.rename_column(old, new)?;
                }
            }
            RenDropKind::DropColumn => {
                for name in names {
                    tab.drop_column(name)?;
                }
            }
            RenDropKind::RenameKeyword => {
                for pair in names.chunks(2) {
                    let [old, new] = pair else {
                        return Err(TableError::MalformedClause {
                            command: "ALTER TABLE",
                            clause: "RENAME KEYWORD needs old/new name pairs".into(),
                        });
                    };
                    let value = tab.keywords_mut().remove(old).ok_or_else(|| {
                        TableError::ExprError(format!("unknown keyword {}", old))
                    })?;
                    tab.keywords_mut().set(new.clone(), value);
                }
            }
            RenDropKind::DropKeyword => {
                for name in names {
                    tab.keywords_mut().remove(name).ok_or_else(|| {
                        TableError::ExprError(format!("unknown keyword {}", name))
                    })?;
                }
            }
        }
        Ok(NodeResult::None)
    }

    fn visit_show(&mut self, parts: &[String]) -> Result<NodeResult> {
        let text = match parts.split_first() {
            Some((what, rest)) if what.eq_ignore_ascii_case("table") => {
                let name = rest.first().ok_or(TableError::MalformedClause {
                    command: "SHOW",
                    clause: "missing table name".into(),
                })?;
                let handle = self.catalog.open(name)?;
                let tab = handle.read();
                format!(
                    "table {}: {} row(s), columns [{}]",
                    tab.name(),
                    tab.nrow(),
                    tab.column_names().join(", ")
                )
            }
            _ => parts.join(" "),
        };
        Ok(NodeResult::Str(text))
    }

    fn alter_target_handle(&self) -> Result<TableHandle> {
        self.alter_target
            .clone()
            .ok_or_else(|| TableError::ExprError("no ALTER TABLE target in scope".into()))
    }

    /// Evaluate a node to a constant non-negative integer
    fn const_usize(&mut self, node: &TaqlNode) -> Result<usize> {
        let value = self.visit(node)?.into_expr()?.eval(None, 0)?;
        let n = value
            .as_i64()
            .ok_or_else(|| TableError::ExprError(format!("{} is not an integer", value)))?;
        usize::try_from(n)
            .map_err(|_| TableError::ExprError(format!("{} is not a valid count", n)))
    }

    /// Evaluate a field list into a constant record
    fn const_record(&mut self, fields: &[TaqlNode]) -> Result<Record> {
        let mut record = Record::new();
        for field in fields {
            let (name, expr) = self.visit(field)?.into_assignment()?;
            record.set(name, expr.eval(None, 0)?);
        }
        Ok(record)
    }
}

fn parse_dtype(name: &str) -> Result<DataType> {
    let dtype = match name.to_ascii_lowercase().as_str() {
        "b" | "bool" | "boolean" => DataType::Bool,
        "i" | "int" | "integer" => DataType::Int64,
        "r" | "real" | "float" | "double" => DataType::Float64,
        "s" | "string" => DataType::String,
        other => {
            return Err(TableError::ExprError(format!(
                "unknown column data type {}",
                other
            )))
        }
    };
    Ok(dtype)
}

/// Table name of a simple table reference
fn table_name(node: &TaqlNode) -> Result<String> {
    match node {
        TaqlNode::TableRef { table, .. } => table_name(table),
        TaqlNode::Const(Value::String(name)) => Ok(name.clone()),
        other => Err(TableError::ExprError(format!(
            "expected a table name, got a {} node",
            other.kind()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::handle;

    fn sample_table(name: &str, rows: usize) -> Table {
        let mut t = Table::new(name);
        t.add_column(ColumnDesc::scalar("a", DataType::Int64)).unwrap();
        t.add_column(ColumnDesc::scalar("b", DataType::String)).unwrap();
        t.add_column(ColumnDesc::scalar("c", DataType::Int64)).unwrap();
        t.add_rows(rows).unwrap();
        for row in 0..rows {
            t.set_cell("a", row, Value::Int64(rows as i64 - row as i64)).unwrap();
            t.set_cell("b", row, Value::String(format!("r{}", row))).unwrap();
            t.set_cell("c", row, Value::Int64(row as i64 - 2)).unwrap();
        }
        t
    }

    fn handler_with(table: Table) -> TreeHandler {
        let mut h = TreeHandler::new();
        h.catalog.insert(table).unwrap();
        h
    }

    fn from_t() -> Vec<TaqlNode> {
        vec![TaqlNode::TableRef {
            table: Box::new(TaqlNode::string("t")),
            alias: None,
        }]
    }

    fn select_a_b_where_c_sorted() -> TaqlNode {
        TaqlNode::Select {
            columns: Some(Box::new(TaqlNode::Columns {
                distinct: false,
                columns: vec![
                    TaqlNode::Col {
                        expr: Box::new(TaqlNode::column("a")),
                        alias: None,
                        mask: None,
                    },
                    TaqlNode::Col {
                        expr: Box::new(TaqlNode::column("b")),
                        alias: None,
                        mask: None,
                    },
                ],
            })),
            tables: from_t(),
            join: None,
            where_: Some(Box::new(TaqlNode::Binary {
                op: BinaryOp::Gt,
                left: Box::new(TaqlNode::column("c")),
                right: Box::new(TaqlNode::int(0)),
            })),
            groupby: None,
            having: None,
            sort: Some(Box::new(TaqlNode::Sort {
                keys: vec![TaqlNode::SortKey {
                    expr: Box::new(TaqlNode::column("a")),
                    descending: None,
                }],
            })),
            limitoff: Some(Box::new(TaqlNode::LimitOff {
                limit: Some(Box::new(TaqlNode::int(5))),
                offset: None,
            })),
            giving: None,
        }
    }

    #[test]
    fn test_select_context_fields() {
        let mut h = handler_with(sample_table("t", 8));
        let node = select_a_b_where_c_sorted();
        let ctx = h.process_select(&node).unwrap();
        assert_eq!(ctx.tables.len(), 1);
        assert_eq!(ctx.select.len(), 2);
        assert!(ctx.where_.is_some());
        assert_eq!(ctx.sort.len(), 1);
        assert!(!ctx.sort[0].1);
        assert_eq!(ctx.limit, Some(5));
        assert_eq!(h.depth(), 0);
    }

    #[test]
    fn test_select_executes() {
        let mut h = handler_with(sample_table("t", 8));
        let node = select_a_b_where_c_sorted();
        let (out, _) = h.handle_tree(&node, &[]).unwrap().into_table().unwrap();
        let mut out = out.write();
        assert_eq!(out.column_names(), vec!["a", "b"]);
        // c>0 keeps rows 3..8, a descending from 5 to 1; sorted ascending.
        assert_eq!(out.nrow(), 5);
        let mut prev = i64::MIN;
        for row in 0..out.nrow() {
            let a = out.get_cell("a", row).unwrap().as_i64().unwrap();
            assert!(a > prev);
            prev = a;
        }
    }

    #[test]
    fn test_numbered_table_resolution() {
        let mut h = TreeHandler::new();
        let registry = vec![
            handle(sample_table("t0", 2)),
            handle(sample_table("t1", 3)),
        ];
        let select = |k: i64| TaqlNode::Select {
            columns: None,
            tables: vec![TaqlNode::TableRef {
                table: Box::new(TaqlNode::int(k)),
                alias: None,
            }],
            join: None,
            where_: None,
            groupby: None,
            having: None,
            sort: None,
            limitoff: None,
            giving: None,
        };
        let (out, _) = h
            .handle_tree(&select(1), &registry)
            .unwrap()
            .into_table()
            .unwrap();
        assert_eq!(out.read().nrow(), 3);

        let err = h.handle_tree(&select(2), &registry).unwrap_err();
        assert!(matches!(
            err,
            TableError::UnknownTempTable { index: 2, count: 2 }
        ));
        assert_eq!(h.depth(), 0);
    }

    #[test]
    fn test_empty_registry_fails_before_clauses() {
        let mut h = TreeHandler::new();
        // WHERE references a column that could never resolve; the table
        // lookup must fail first.
        let node = TaqlNode::Select {
            columns: None,
            tables: vec![TaqlNode::TableRef {
                table: Box::new(TaqlNode::int(0)),
                alias: None,
            }],
            join: None,
            where_: Some(Box::new(TaqlNode::column("no_such_column"))),
            groupby: None,
            having: None,
            sort: None,
            limitoff: None,
            giving: None,
        };
        let err = h.handle_tree(&node, &[]).unwrap_err();
        assert!(matches!(
            err,
            TableError::UnknownTempTable { index: 0, count: 0 }
        ));
    }

    #[test]
    fn test_exists_keeps_outer_context_isolated() {
        let run = |inner_rows: usize| -> (usize, usize, usize) {
            let mut h = handler_with(sample_table("t", 8));
            h.catalog.insert(sample_table("u", inner_rows)).unwrap();
            let inner = TaqlNode::Select {
                columns: None,
                tables: vec![TaqlNode::TableRef {
                    table: Box::new(TaqlNode::string("u")),
                    alias: None,
                }],
                join: None,
                where_: None,
                groupby: None,
                having: None,
                sort: None,
                limitoff: None,
                giving: None,
            };
            let mut outer = select_a_b_where_c_sorted();
            if let TaqlNode::Select { where_, .. } = &mut outer {
                let prev = where_.take().unwrap();
                *where_ = Some(Box::new(TaqlNode::Binary {
                    op: BinaryOp::And,
                    left: Box::new(*prev),
                    right: Box::new(TaqlNode::Func {
                        name: "exists".into(),
                        args: vec![inner],
                    }),
                }));
            }
            let ctx = h.process_select(&outer).unwrap();
            let (from, select) = (ctx.tables.len(), ctx.select.len());
            let (out, _) = ctx.execute().unwrap().into_table().unwrap();
            let n = out.read().nrow();
            (from, select, n)
        };
        // Outer from-list, select-list and result are identical however
        // many rows the inner subquery scans.
        assert_eq!(run(1), (1, 2, 5));
        assert_eq!(run(6), (1, 2, 5));
        assert_eq!(run(0), (1, 2, 0));
    }

    #[test]
    fn test_create_like_dropping_column() {
        let mut h = handler_with(sample_table("t", 4));
        let node = TaqlNode::CreateTable {
            name: "t2".into(),
            like: Some(Box::new(TaqlNode::TableRef {
                table: Box::new(TaqlNode::string("t")),
                alias: None,
            })),
            like_drop: vec!["b".into()],
            columns: vec![TaqlNode::ColSpec {
                name: "d".into(),
                dtype: "double".into(),
                shape: None,
                unit: Some("m".into()),
            }],
            nrow: Some(Box::new(TaqlNode::int(2))),
        };
        let (out, _) = h.handle_tree(&node, &[]).unwrap().into_table().unwrap();
        let out = out.read();
        assert_eq!(out.column_names(), vec!["a", "c", "d"]);
        assert_eq!(out.nrow(), 2);
        assert!(h.catalog.contains("t2"));

        let bad = TaqlNode::CreateTable {
            name: "t3".into(),
            like: Some(Box::new(TaqlNode::string("t"))),
            like_drop: vec!["missing".into()],
            columns: vec![],
            nrow: None,
        };
        let err = h.handle_tree(&bad, &[]).unwrap_err();
        assert!(matches!(err, TableError::ColumnNotFound(_)));
        assert!(!h.catalog.contains("t3"));
    }

    #[test]
    fn test_update_and_delete_trees() {
        let mut h = handler_with(sample_table("t", 6));
        let update = TaqlNode::Update {
            tables: from_t(),
            assignments: vec![TaqlNode::UpdExpr {
                column: "a".into(),
                expr: Box::new(TaqlNode::int(0)),
            }],
            where_: Some(Box::new(TaqlNode::Binary {
                op: BinaryOp::Gt,
                left: Box::new(TaqlNode::column("c")),
                right: Box::new(TaqlNode::int(0)),
            })),
            sort: None,
            limitoff: None,
        };
        h.handle_tree(&update, &[]).unwrap();
        let t = h.catalog.open("t").unwrap();
        assert_eq!(t.write().get_cell("a", 3).unwrap(), Value::Int64(0));
        assert_eq!(t.write().get_cell("a", 0).unwrap(), Value::Int64(6));

        let delete = TaqlNode::Delete {
            tables: from_t(),
            where_: Some(Box::new(TaqlNode::Binary {
                op: BinaryOp::Eq,
                left: Box::new(TaqlNode::column("a")),
                right: Box::new(TaqlNode::int(0)),
            })),
            sort: None,
            limitoff: None,
        };
        h.handle_tree(&delete, &[]).unwrap();
        assert_eq!(t.read().nrow(), 3);
    }

    #[test]
    fn test_alter_table_commands() {
        let mut h = handler_with(sample_table("t", 3));
        let node = TaqlNode::AlterTable {
            table: Box::new(TaqlNode::string("t")),
            commands: vec![
                TaqlNode::AddCol {
                    columns: vec![TaqlNode::ColSpec {
                        name: "flags".into(),
                        dtype: "bool".into(),
                        shape: Some(vec![4]),
                        unit: None,
                    }],
                },
                TaqlNode::SetKey {
                    column: None,
                    fields: vec![TaqlNode::RecFld {
                        name: "OBSERVER".into(),
                        value: Box::new(TaqlNode::string("parkes")),
                    }],
                },
                TaqlNode::RenDrop {
                    kind: RenDropKind::RenameColumn,
                    names: vec!["b".into(), "label".into()],
                },
                TaqlNode::CopyCol {
                    pairs: vec![("a2".into(), "a".into())],
                },
                TaqlNode::AddRow {
                    count: Box::new(TaqlNode::int(2)),
                },
            ],
        };
        h.handle_tree(&node, &[]).unwrap();
        let t = h.catalog.open("t").unwrap();
        let mut t = t.write();
        assert_eq!(t.nrow(), 5);
        assert!(t.has_column("flags"));
        assert!(t.has_column("label"));
        assert_eq!(t.get_cell("a2", 0).unwrap(), Value::Int64(3));
        assert_eq!(
            t.keywords().get("OBSERVER"),
            Some(&Value::String("parkes".into()))
        );
    }

    #[test]
    fn test_calc_returns_bare_value() {
        let mut h = handler_with(sample_table("t", 3));
        let node = TaqlNode::Calc {
            tables: from_t(),
            expr: Box::new(TaqlNode::Func {
                name: "sum".into(),
                args: vec![TaqlNode::column("a")],
            }),
        };
        let value = h.handle_tree(&node, &[]).unwrap().into_value().unwrap();
        assert_eq!(value, Value::Int64(6));
    }

    #[test]
    fn test_in_set_and_index_nodes() {
        let mut h = handler_with(sample_table("t", 6));
        let node = TaqlNode::Select {
            columns: None,
            tables: from_t(),
            join: None,
            where_: Some(Box::new(TaqlNode::Binary {
                op: BinaryOp::In,
                left: Box::new(TaqlNode::column("a")),
                right: Box::new(TaqlNode::Multi(vec![
                    TaqlNode::int(2),
                    TaqlNode::Range {
                        lower: Some(Box::new(TaqlNode::int(5))),
                        upper: None,
                        incl_lower: true,
                        incl_upper: true,
                    },
                ])),
            })),
            groupby: None,
            having: None,
            sort: None,
            limitoff: None,
            giving: None,
        };
        let (out, _) = h.handle_tree(&node, &[]).unwrap().into_table().unwrap();
        // a values are 6..1; the set keeps 2, 5 and 6.
        assert_eq!(out.read().nrow(), 3);
    }

    #[test]
    fn test_giving_registers_result() {
        let mut h = handler_with(sample_table("t", 4));
        let mut node = select_a_b_where_c_sorted();
        if let TaqlNode::Select { giving, .. } = &mut node {
            *giving = Some(Box::new(TaqlNode::Giving {
                name: "picked".into(),
            }));
        }
        h.handle_tree(&node, &[]).unwrap();
        let picked = h.catalog.open("picked").unwrap();
        assert_eq!(picked.read().name(), "picked");
    }

    #[test]
    fn test_drop_and_show() {
        let mut h = handler_with(sample_table("t", 2));
        let shown = h
            .handle_tree(
                &TaqlNode::Show {
                    parts: vec!["table".into(), "t".into()],
                },
                &[],
            )
            .unwrap();
        match shown {
            NodeResult::Str(text) => assert!(text.contains("2 row(s)")),
            other => panic!("unexpected result kind {}", other.kind()),
        }

        h.handle_tree(
            &TaqlNode::DropTable {
                tables: vec![TaqlNode::string("t")],
            },
            &[],
        )
        .unwrap();
        assert!(!h.catalog.contains("t"));
    }

    #[test]
    fn test_concat_table_with_itself() {
        let mut h = handler_with(sample_table("t", 2));
        let node = TaqlNode::ConcTab {
            tables: vec![TaqlNode::string("t"), TaqlNode::string("t")],
        };
        // Both parts resolve to the same handle; the concat must not block
        // on its own lock.
        let (out, _) = h.handle_tree(&node, &[]).unwrap().into_table().unwrap();
        let mut out = out.write();
        assert_eq!(out.nrow(), 4);
        assert_eq!(out.get_cell("b", 0).unwrap(), out.get_cell("b", 2).unwrap());
    }

    #[test]
    fn test_derived_from_giving_registers() {
        let mut h = handler_with(sample_table("t", 6));
        let mut inner = select_a_b_where_c_sorted();
        if let TaqlNode::Select { giving, .. } = &mut inner {
            *giving = Some(Box::new(TaqlNode::Giving {
                name: "picked".into(),
            }));
        }
        let outer = TaqlNode::Select {
            columns: None,
            tables: vec![inner],
            join: None,
            where_: None,
            groupby: None,
            having: None,
            sort: None,
            limitoff: None,
            giving: None,
        };
        let (out, _) = h.handle_tree(&outer, &[]).unwrap().into_table().unwrap();
        assert_eq!(out.read().nrow(), 3);
        let picked = h.catalog.open("picked").unwrap();
        assert_eq!(picked.read().nrow(), 3);
    }
}
