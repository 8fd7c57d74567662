//! Per-statement query context
//!
//! One [`QueryContext`] accumulates the clauses of a single statement as
//! the tree handler visits them: from-list, select-list, predicate, group
//! and sort keys, limits and the command-specific payloads. When the
//! statement's clauses are complete the context executes, producing a
//! result table or a bare value.

use super::expr::ExprNode;
use super::result::NodeResult;
use crate::data::{ArrayData, NdArray, Value};
use crate::table::{handle, ColumnDesc, Table, TableHandle};
use crate::{Result, TableError};

/// Statement class a context is tagged with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Select,
    Update,
    Insert,
    Delete,
    Count,
    Calc,
    CreateTable,
    AlterTable,
    DropTable,
    Show,
}

impl CommandKind {
    pub fn name(self) -> &'static str {
        match self {
            CommandKind::Select => "SELECT",
            CommandKind::Update => "UPDATE",
            CommandKind::Insert => "INSERT",
            CommandKind::Delete => "DELETE",
            CommandKind::Count => "COUNT",
            CommandKind::Calc => "CALC",
            CommandKind::CreateTable => "CREATE TABLE",
            CommandKind::AlterTable => "ALTER TABLE",
            CommandKind::DropTable => "DROP TABLE",
            CommandKind::Show => "SHOW",
        }
    }
}

/// One select-list entry: an expression and its output name
#[derive(Debug, Clone)]
pub struct SelectItem {
    pub expr: ExprNode,
    pub alias: Option<String>,
}

impl SelectItem {
    /// Output column name: the alias, the column name, or a position name
    fn output_name(&self, position: usize) -> String {
        if let Some(alias) = &self.alias {
            return alias.clone();
        }
        match &self.expr {
            ExprNode::Column(name) => name.clone(),
            ExprNode::Keyword { column: None, key } => key.clone(),
            _ => format!("Expr_{}", position),
        }
    }
}

/// Accumulated parse/execution state for one statement
#[derive(Debug, Clone)]
pub struct QueryContext {
    pub command: CommandKind,
    /// From-list; the first entry is the primary table
    pub tables: Vec<(Option<String>, TableHandle)>,
    pub select: Vec<SelectItem>,
    pub distinct: bool,
    pub where_: Option<ExprNode>,
    pub groupby: Vec<ExprNode>,
    pub having: Option<ExprNode>,
    /// Sort keys with a descending flag each
    pub sort: Vec<(ExprNode, bool)>,
    pub limit: Option<usize>,
    pub offset: usize,
    /// Result-table name from a GIVING clause
    pub giving: Option<String>,
    /// UPDATE assignments in clause order
    pub assignments: Vec<(String, ExprNode)>,
    pub insert_columns: Vec<String>,
    pub insert_rows: Vec<Vec<ExprNode>>,
    pub insert_select: Option<Box<QueryContext>>,
    pub calc_expr: Option<ExprNode>,
}

impl QueryContext {
    pub fn new(command: CommandKind) -> Self {
        Self {
            command,
            tables: Vec::new(),
            select: Vec::new(),
            distinct: false,
            where_: None,
            groupby: Vec::new(),
            having: None,
            sort: Vec::new(),
            limit: None,
            offset: 0,
            giving: None,
            assignments: Vec::new(),
            insert_columns: Vec::new(),
            insert_rows: Vec::new(),
            insert_select: None,
            calc_expr: None,
        }
    }

    fn bad_clause(&self, clause: &str) -> TableError {
        TableError::MalformedClause {
            command: self.command.name(),
            clause: clause.to_string(),
        }
    }

    pub fn add_table(&mut self, alias: Option<String>, table: TableHandle) {
        self.tables.push((alias, table));
    }

    /// The first from-table
    pub fn primary_table(&self) -> Result<TableHandle> {
        self.tables
            .first()
            .map(|(_, t)| t.clone())
            .ok_or_else(|| self.bad_clause("missing table list"))
    }

    pub fn add_select(&mut self, item: SelectItem) -> Result<()> {
        match self.command {
            CommandKind::Select | CommandKind::Count => {
                self.select.push(item);
                Ok(())
            }
            _ => Err(self.bad_clause("select list")),
        }
    }

    pub fn set_where(&mut self, expr: ExprNode) -> Result<()> {
        match self.command {
            CommandKind::Select | CommandKind::Update | CommandKind::Delete | CommandKind::Count => {
                self.where_ = Some(expr);
                Ok(())
            }
            _ => Err(self.bad_clause("WHERE")),
        }
    }

    pub fn set_groupby(&mut self, keys: Vec<ExprNode>) -> Result<()> {
        if self.command != CommandKind::Select {
            return Err(self.bad_clause("GROUP BY"));
        }
        self.groupby = keys;
        Ok(())
    }

    pub fn set_having(&mut self, expr: ExprNode) -> Result<()> {
        if self.command != CommandKind::Select {
            return Err(self.bad_clause("HAVING"));
        }
        self.having = Some(expr);
        Ok(())
    }

    pub fn set_sort(&mut self, keys: Vec<(ExprNode, bool)>) -> Result<()> {
        match self.command {
            CommandKind::Select | CommandKind::Update | CommandKind::Delete => {
                self.sort = keys;
                Ok(())
            }
            _ => Err(self.bad_clause("ORDER BY")),
        }
    }

    pub fn set_limit_offset(&mut self, limit: Option<usize>, offset: usize) -> Result<()> {
        match self.command {
            CommandKind::Select | CommandKind::Update | CommandKind::Delete => {
                self.limit = limit;
                self.offset = offset;
                Ok(())
            }
            _ => Err(self.bad_clause("LIMIT/OFFSET")),
        }
    }

    pub fn set_giving(&mut self, name: String) -> Result<()> {
        if self.command != CommandKind::Select {
            return Err(self.bad_clause("GIVING"));
        }
        self.giving = Some(name);
        Ok(())
    }

    pub fn add_assignment(&mut self, column: String, expr: ExprNode) -> Result<()> {
        if self.command != CommandKind::Update {
            return Err(self.bad_clause("SET assignment"));
        }
        self.assignments.push((column, expr));
        Ok(())
    }

    pub fn set_calc(&mut self, expr: ExprNode) -> Result<()> {
        if self.command != CommandKind::Calc {
            return Err(self.bad_clause("CALC expression"));
        }
        self.calc_expr = Some(expr);
        Ok(())
    }

    /// Execute the accumulated statement
    pub fn execute(&self) -> Result<NodeResult> {
        log::debug!("executing {} statement", self.command.name());
        match self.command {
            CommandKind::Select => self.execute_select(),
            CommandKind::Count => self.execute_count(),
            CommandKind::Calc => self.execute_calc(),
            CommandKind::Update => self.execute_update(),
            CommandKind::Insert => self.execute_insert(),
            CommandKind::Delete => self.execute_delete(),
            // DDL statements are carried out by the tree handler itself;
            // their contexts exist for table resolution only.
            _ => Ok(NodeResult::None),
        }
    }

    /// Row numbers of the primary table passing the WHERE predicate
    fn matching_rows(&self, table: &TableHandle) -> Result<Vec<usize>> {
        let nrow = table.read().nrow();
        let mut rows = Vec::new();
        for row in 0..nrow {
            let keep = match &self.where_ {
                Some(pred) => pred.eval(Some(table), row)?.is_true(),
                None => true,
            };
            if keep {
                rows.push(row);
            }
        }
        Ok(rows)
    }

    /// Sort row numbers by the context's sort keys
    fn sorted_rows(&self, table: &TableHandle, mut rows: Vec<usize>) -> Result<Vec<usize>> {
        if self.sort.is_empty() {
            return Ok(rows);
        }
        let mut keys: Vec<Vec<Value>> = Vec::with_capacity(rows.len());
        for &row in &rows {
            let mut key = Vec::with_capacity(self.sort.len());
            for (expr, _) in &self.sort {
                key.push(expr.eval(Some(table), row)?);
            }
            keys.push(key);
        }
        let mut order: Vec<usize> = (0..rows.len()).collect();
        order.sort_by(|&a, &b| compare_keys(&keys[a], &keys[b], &self.sort));
        rows = order.into_iter().map(|i| rows[i]).collect();
        Ok(rows)
    }

    fn window<T>(&self, mut items: Vec<T>) -> Vec<T> {
        if self.offset > 0 {
            items.drain(..self.offset.min(items.len()));
        }
        if let Some(limit) = self.limit {
            items.truncate(limit);
        }
        items
    }

    /// Effective select items; an empty list means all columns
    fn effective_items(&self, table: &TableHandle) -> Vec<SelectItem> {
        if !self.select.is_empty() {
            return self.select.clone();
        }
        table
            .read()
            .column_names()
            .into_iter()
            .map(|name| SelectItem {
                expr: ExprNode::Column(name),
                alias: None,
            })
            .collect()
    }

    fn execute_select(&self) -> Result<NodeResult> {
        let table = self.primary_table()?;
        let rows = self.matching_rows(&table)?;
        let items = self.effective_items(&table);
        let grouped = !self.groupby.is_empty() || items.iter().any(|i| i.expr.has_aggregate());

        let mut matrix = if grouped {
            self.grouped_matrix(&table, rows, &items)?
        } else {
            let rows = self.sorted_rows(&table, rows)?;
            let mut matrix = Vec::with_capacity(rows.len());
            for &row in &rows {
                let mut out = Vec::with_capacity(items.len());
                for item in &items {
                    out.push(item.expr.eval(Some(&table), row)?);
                }
                matrix.push(out);
            }
            matrix
        };
        if self.distinct {
            matrix = dedup_rows(matrix);
        }
        matrix = self.window(matrix);

        let mut out = self.build_result(&table, &items, matrix)?;
        if let Some(name) = &self.giving {
            out.rename(name.clone());
        }
        Ok(NodeResult::Table {
            handle: handle(out),
            alias: None,
        })
    }

    /// Group the matched rows, apply HAVING, sort groups, project items
    fn grouped_matrix(
        &self,
        table: &TableHandle,
        rows: Vec<usize>,
        items: &[SelectItem],
    ) -> Result<Vec<Vec<Value>>> {
        // Groups keep first-seen order; keys compare by value.
        let mut groups: Vec<(Vec<Value>, Vec<usize>)> = Vec::new();
        for row in rows {
            let mut key = Vec::with_capacity(self.groupby.len());
            for expr in &self.groupby {
                key.push(expr.eval(Some(table), row)?);
            }
            match groups.iter_mut().find(|(k, _)| *k == key) {
                Some((_, members)) => members.push(row),
                None => groups.push((key, vec![row])),
            }
        }
        let mut surviving = Vec::with_capacity(groups.len());
        for (_, members) in groups {
            let keep = match &self.having {
                Some(pred) => pred.eval_group(Some(table), &members)?.is_true(),
                None => true,
            };
            if keep {
                surviving.push(members);
            }
        }
        if !self.sort.is_empty() {
            let mut keys = Vec::with_capacity(surviving.len());
            for members in &surviving {
                let mut key = Vec::with_capacity(self.sort.len());
                for (expr, _) in &self.sort {
                    key.push(expr.eval_group(Some(table), members)?);
                }
                keys.push(key);
            }
            let mut order: Vec<usize> = (0..surviving.len()).collect();
            order.sort_by(|&a, &b| compare_keys(&keys[a], &keys[b], &self.sort));
            let reordered: Vec<Vec<usize>> = order
                .into_iter()
                .map(|i| std::mem::take(&mut surviving[i]))
                .collect();
            surviving = reordered;
        }
        let mut matrix = Vec::with_capacity(surviving.len());
        for members in &surviving {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(item.expr.eval_group(Some(table), members)?);
            }
            matrix.push(out);
        }
        Ok(matrix)
    }

    /// Build the result table from an output-value matrix
    fn build_result(
        &self,
        table: &TableHandle,
        items: &[SelectItem],
        matrix: Vec<Vec<Value>>,
    ) -> Result<Table> {
        let mut out = Table::new(table.read().name().to_string());
        for (i, item) in items.iter().enumerate() {
            let name = item.output_name(i);
            let values: Vec<Value> = matrix.iter().map(|row| row[i].clone()).collect();
            let desc = match &item.expr {
                // Plain column references keep their source description.
                ExprNode::Column(col) if item.alias.is_none() => {
                    table.read().column_desc(col)?.clone()
                }
                _ => infer_desc(&name, &values),
            };
            out.push_memory_column(desc, values)?;
        }
        Ok(out)
    }

    fn execute_count(&self) -> Result<NodeResult> {
        let table = self.primary_table()?;
        let rows = self.matching_rows(&table)?;
        if self.select.is_empty() {
            return Ok(NodeResult::Value(Value::Int64(rows.len() as i64)));
        }
        // Per-value counts grouped by the column list.
        let mut groups: Vec<(Vec<Value>, i64)> = Vec::new();
        for row in rows {
            let mut key = Vec::with_capacity(self.select.len());
            for item in &self.select {
                key.push(item.expr.eval(Some(&table), row)?);
            }
            match groups.iter_mut().find(|(k, _)| *k == key) {
                Some((_, n)) => *n += 1,
                None => groups.push((key, 1)),
            }
        }
        let mut out = Table::new(table.read().name().to_string());
        for (i, item) in self.select.iter().enumerate() {
            let name = item.output_name(i);
            let values: Vec<Value> = groups.iter().map(|(k, _)| k[i].clone()).collect();
            out.push_memory_column(infer_desc(&name, &values), values)?;
        }
        let counts: Vec<Value> = groups.iter().map(|(_, n)| Value::Int64(*n)).collect();
        out.push_memory_column(infer_desc("_COUNT", &counts), counts)?;
        Ok(NodeResult::Table {
            handle: handle(out),
            alias: None,
        })
    }

    fn execute_calc(&self) -> Result<NodeResult> {
        let expr = self
            .calc_expr
            .as_ref()
            .ok_or_else(|| self.bad_clause("missing expression"))?;
        let Some((_, table)) = self.tables.first() else {
            return Ok(NodeResult::Value(expr.eval(None, 0)?));
        };
        let nrow = table.read().nrow();
        if expr.has_aggregate() {
            let rows: Vec<usize> = (0..nrow).collect();
            return Ok(NodeResult::Value(expr.eval_group(Some(table), &rows)?));
        }
        match nrow {
            0 => Ok(NodeResult::Value(Value::Null)),
            1 => Ok(NodeResult::Value(expr.eval(Some(table), 0)?)),
            _ => {
                let mut values = Vec::with_capacity(nrow);
                for row in 0..nrow {
                    values.push(expr.eval(Some(table), row)?);
                }
                Ok(NodeResult::Value(Value::Array(values_to_array(&values)?)))
            }
        }
    }

    fn execute_update(&self) -> Result<NodeResult> {
        let table = self.primary_table()?;
        let rows = self.matching_rows(&table)?;
        let rows = self.window(self.sorted_rows(&table, rows)?);
        for row in rows {
            // Evaluate every assignment against the pre-update row first.
            let mut updates = Vec::with_capacity(self.assignments.len());
            for (column, expr) in &self.assignments {
                updates.push((column.clone(), expr.eval(Some(&table), row)?));
            }
            let mut tab = table.write();
            for (column, value) in updates {
                tab.set_cell(&column, row, value)?;
            }
        }
        Ok(NodeResult::Table {
            handle: table,
            alias: None,
        })
    }

    fn execute_insert(&self) -> Result<NodeResult> {
        let table = self.primary_table()?;
        let columns = if self.insert_columns.is_empty() {
            table.read().column_names()
        } else {
            self.insert_columns.clone()
        };
        if let Some(select) = &self.insert_select {
            let (src, _) = select.execute()?.into_table()?;
            let src_names = src.read().column_names();
            if src_names.len() != columns.len() {
                return Err(self.bad_clause("source select column count"));
            }
            let n = src.read().nrow();
            for row in 0..n {
                let start = table.read().nrow();
                table.write().add_rows(1)?;
                for (dst, src_name) in columns.iter().zip(&src_names) {
                    let value = src.write().get_cell(src_name, row)?;
                    if !value.is_null() {
                        table.write().set_cell(dst, start, value)?;
                    }
                }
            }
        } else {
            for exprs in &self.insert_rows {
                if exprs.len() != columns.len() {
                    return Err(self.bad_clause("VALUES row length"));
                }
                let start = table.read().nrow();
                table.write().add_rows(1)?;
                for (column, expr) in columns.iter().zip(exprs) {
                    let value = expr.eval(None, 0)?;
                    if !value.is_null() {
                        table.write().set_cell(column, start, value)?;
                    }
                }
            }
        }
        Ok(NodeResult::Table {
            handle: table,
            alias: None,
        })
    }

    fn execute_delete(&self) -> Result<NodeResult> {
        let table = self.primary_table()?;
        let rows = self.matching_rows(&table)?;
        let rows = self.window(self.sorted_rows(&table, rows)?);
        table.write().remove_rows(&rows)?;
        Ok(NodeResult::Table {
            handle: table,
            alias: None,
        })
    }
}

fn compare_keys(
    a: &[Value],
    b: &[Value],
    sort: &[(ExprNode, bool)],
) -> std::cmp::Ordering {
    for (i, (_, descending)) in sort.iter().enumerate() {
        let ord = a[i].cmp_order(&b[i]);
        let ord = if *descending { ord.reverse() } else { ord };
        if ord != std::cmp::Ordering::Equal {
            return ord;
        }
    }
    std::cmp::Ordering::Equal
}

fn dedup_rows(matrix: Vec<Vec<Value>>) -> Vec<Vec<Value>> {
    let mut seen: Vec<Vec<Value>> = Vec::new();
    for row in matrix {
        if !seen.contains(&row) {
            seen.push(row);
        }
    }
    seen
}

/// Column description inferred from output values
fn infer_desc(name: &str, values: &[Value]) -> ColumnDesc {
    let first = values.iter().find(|v| !v.is_null());
    match first {
        Some(Value::Array(arr)) => ColumnDesc::array(name, arr.data_type()),
        Some(v) => ColumnDesc::scalar(name, v.data_type().unwrap_or(crate::data::DataType::Float64)),
        None => ColumnDesc::scalar(name, crate::data::DataType::Float64),
    }
}

/// Pack uniform scalar values into a 1-dimensional array
fn values_to_array(values: &[Value]) -> Result<NdArray> {
    let Some(first) = values.iter().find(|v| !v.is_null()) else {
        return Err(TableError::ExprError("cannot build an array of nulls".into()));
    };
    let data = match first {
        Value::Bool(_) => ArrayData::Bool(
            values
                .iter()
                .map(|v| match v {
                    Value::Bool(b) => Ok(*b),
                    other => Err(TableError::ExprError(format!("mixed result type {}", other))),
                })
                .collect::<Result<_>>()?,
        ),
        Value::Int64(_) => ArrayData::Int64(
            values
                .iter()
                .map(|v| match v {
                    Value::Int64(i) => Ok(*i),
                    other => Err(TableError::ExprError(format!("mixed result type {}", other))),
                })
                .collect::<Result<_>>()?,
        ),
        Value::Float64(_) => ArrayData::Float64(
            values
                .iter()
                .map(|v| v.as_f64().ok_or_else(|| {
                    TableError::ExprError(format!("mixed result type {}", v))
                }))
                .collect::<Result<_>>()?,
        ),
        Value::String(_) => ArrayData::String(
            values
                .iter()
                .map(|v| match v {
                    Value::String(s) => Ok(s.clone()),
                    other => Err(TableError::ExprError(format!("mixed result type {}", other))),
                })
                .collect::<Result<_>>()?,
        ),
        other => {
            return Err(TableError::ExprError(format!(
                "cannot pack {} into an array",
                other
            )))
        }
    };
    let n = data.len();
    NdArray::new(vec![n], data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::DataType;
    use crate::query::nodes::BinaryOp;
    use crate::table::ColumnDesc;

    fn sample() -> TableHandle {
        let mut t = Table::new("t");
        t.add_column(ColumnDesc::scalar("a", DataType::Int64)).unwrap();
        t.add_column(ColumnDesc::scalar("b", DataType::String)).unwrap();
        t.add_column(ColumnDesc::scalar("c", DataType::Int64)).unwrap();
        t.add_rows(6).unwrap();
        // a: 6..1, b: x/y alternating, c: -2,-1,0,1,2,3
        for row in 0..6 {
            t.set_cell("a", row, Value::Int64(6 - row as i64)).unwrap();
            t.set_cell("b", row, Value::String(if row % 2 == 0 { "x" } else { "y" }.into()))
                .unwrap();
            t.set_cell("c", row, Value::Int64(row as i64 - 2)).unwrap();
        }
        handle(t)
    }

    fn col(name: &str) -> ExprNode {
        ExprNode::Column(name.into())
    }

    fn gt_zero(name: &str) -> ExprNode {
        ExprNode::Binary {
            op: BinaryOp::Gt,
            left: Box::new(col(name)),
            right: Box::new(ExprNode::Literal(Value::Int64(0))),
        }
    }

    #[test]
    fn test_select_where_sort_limit() {
        let t = sample();
        let mut ctx = QueryContext::new(CommandKind::Select);
        ctx.add_table(None, t);
        ctx.add_select(SelectItem { expr: col("a"), alias: None }).unwrap();
        ctx.add_select(SelectItem { expr: col("b"), alias: None }).unwrap();
        ctx.set_where(gt_zero("c")).unwrap();
        ctx.set_sort(vec![(col("a"), false)]).unwrap();
        ctx.set_limit_offset(Some(5), 0).unwrap();

        let (out, _) = ctx.execute().unwrap().into_table().unwrap();
        let mut out = out.write();
        assert_eq!(out.column_names(), vec!["a", "b"]);
        // c>0 keeps rows 3,4,5 (a = 3,2,1), ascending by a.
        assert_eq!(out.nrow(), 3);
        assert_eq!(out.get_cell("a", 0).unwrap(), Value::Int64(1));
        assert_eq!(out.get_cell("a", 2).unwrap(), Value::Int64(3));
    }

    #[test]
    fn test_select_distinct() {
        let t = sample();
        let mut ctx = QueryContext::new(CommandKind::Select);
        ctx.add_table(None, t);
        ctx.add_select(SelectItem { expr: col("b"), alias: None }).unwrap();
        ctx.distinct = true;
        ctx.set_sort(vec![(col("b"), false)]).unwrap();
        let (out, _) = ctx.execute().unwrap().into_table().unwrap();
        assert_eq!(out.read().nrow(), 2);
    }

    #[test]
    fn test_group_by_with_having() {
        use crate::query::expr::Function;
        let t = sample();
        let mut ctx = QueryContext::new(CommandKind::Select);
        ctx.add_table(None, t);
        ctx.add_select(SelectItem { expr: col("b"), alias: None }).unwrap();
        ctx.add_select(SelectItem {
            expr: ExprNode::Func { func: Function::Sum, args: vec![col("a")] },
            alias: Some("total".into()),
        })
        .unwrap();
        ctx.set_groupby(vec![col("b")]).unwrap();
        ctx.set_having(ExprNode::Binary {
            op: BinaryOp::Gt,
            left: Box::new(ExprNode::Func { func: Function::Count, args: vec![] }),
            right: Box::new(ExprNode::Literal(Value::Int64(2))),
        })
        .unwrap();

        let (out, _) = ctx.execute().unwrap().into_table().unwrap();
        let mut out = out.write();
        // Both groups have 3 members; x rows hold a = 6,4,2 and y rows 5,3,1.
        assert_eq!(out.nrow(), 2);
        assert_eq!(out.get_cell("total", 0).unwrap(), Value::Int64(12));
        assert_eq!(out.get_cell("total", 1).unwrap(), Value::Int64(9));
    }

    #[test]
    fn test_count_grouped() {
        let t = sample();
        let mut ctx = QueryContext::new(CommandKind::Count);
        ctx.add_table(None, t.clone());
        let n = ctx.execute().unwrap().into_value().unwrap();
        assert_eq!(n, Value::Int64(6));

        let mut ctx = QueryContext::new(CommandKind::Count);
        ctx.add_table(None, t);
        ctx.add_select(SelectItem { expr: col("b"), alias: None }).unwrap();
        let (out, _) = ctx.execute().unwrap().into_table().unwrap();
        let mut out = out.write();
        assert_eq!(out.column_names(), vec!["b", "_COUNT"]);
        assert_eq!(out.get_cell("_COUNT", 0).unwrap(), Value::Int64(3));
    }

    #[test]
    fn test_update_and_delete() {
        let t = sample();
        let mut ctx = QueryContext::new(CommandKind::Update);
        ctx.add_table(None, t.clone());
        ctx.add_assignment(
            "a".into(),
            ExprNode::Binary {
                op: BinaryOp::Times,
                left: Box::new(col("a")),
                right: Box::new(ExprNode::Literal(Value::Int64(10))),
            },
        )
        .unwrap();
        ctx.set_where(gt_zero("c")).unwrap();
        ctx.execute().unwrap();
        assert_eq!(t.write().get_cell("a", 3).unwrap(), Value::Int64(30));
        assert_eq!(t.write().get_cell("a", 0).unwrap(), Value::Int64(6));

        let mut del = QueryContext::new(CommandKind::Delete);
        del.add_table(None, t.clone());
        del.set_where(gt_zero("c")).unwrap();
        del.execute().unwrap();
        assert_eq!(t.read().nrow(), 3);
    }

    #[test]
    fn test_insert_values() {
        let t = sample();
        let mut ctx = QueryContext::new(CommandKind::Insert);
        ctx.add_table(None, t.clone());
        ctx.insert_columns = vec!["a".into(), "b".into()];
        ctx.insert_rows = vec![vec![
            ExprNode::Literal(Value::Int64(99)),
            ExprNode::Literal(Value::String("z".into())),
        ]];
        ctx.execute().unwrap();
        assert_eq!(t.read().nrow(), 7);
        assert_eq!(t.write().get_cell("a", 6).unwrap(), Value::Int64(99));
        assert_eq!(t.write().get_cell("c", 6).unwrap(), Value::Null);
    }

    #[test]
    fn test_calc_per_row_and_aggregate() {
        use crate::query::expr::Function;
        let t = sample();
        let mut ctx = QueryContext::new(CommandKind::Calc);
        ctx.add_table(None, t.clone());
        ctx.set_calc(ExprNode::Func { func: Function::Sum, args: vec![col("a")] })
            .unwrap();
        assert_eq!(
            ctx.execute().unwrap().into_value().unwrap(),
            Value::Int64(21)
        );

        let mut bare = QueryContext::new(CommandKind::Calc);
        bare.set_calc(ExprNode::Binary {
            op: BinaryOp::Plus,
            left: Box::new(ExprNode::Literal(Value::Int64(1))),
            right: Box::new(ExprNode::Literal(Value::Int64(2))),
        })
        .unwrap();
        assert_eq!(
            bare.execute().unwrap().into_value().unwrap(),
            Value::Int64(3)
        );
    }

    #[test]
    fn test_clause_command_mismatch() {
        let mut ctx = QueryContext::new(CommandKind::Insert);
        let err = ctx.set_groupby(vec![col("a")]).unwrap_err();
        assert!(matches!(
            err,
            TableError::MalformedClause { command: "INSERT", .. }
        ));
    }
}
