//! Table implementation

use super::column::{ColumnData, ColumnDesc, TableColumn};
use crate::data::{Record, Value};
use crate::storage::{IndirectArrayColumn, TableArrayStore};
use crate::{Result, TableError};
use std::fmt;
use std::path::Path;

/// A relation of rows and typed columns, some holding array values.
///
/// A table is either storage-backed (it owns a [`TableArrayStore`] whose
/// payload file its indirect columns share) or a plain in-memory relation,
/// as produced by query execution.
pub struct Table {
    name: String,
    columns: Vec<TableColumn>,
    nrow: usize,
    keywords: Record,
    /// Set when any array put has happened since the last flush
    dirty: bool,
    store: Option<TableArrayStore>,
}

impl Table {
    /// New empty in-memory table
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            nrow: 0,
            keywords: Record::new(),
            dirty: false,
            store: None,
        }
    }

    /// New storage-backed table; array payloads land in `<base>.arr`
    pub fn create(name: impl Into<String>, base: &Path) -> Result<Self> {
        let store = TableArrayStore::create(base)?;
        Ok(Self {
            store: Some(store),
            ..Self::new(name)
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn nrow(&self) -> usize {
        self.nrow
    }

    pub fn ncol(&self) -> usize {
        self.columns.len()
    }

    pub fn store(&self) -> Option<&TableArrayStore> {
        self.store.as_ref()
    }

    pub fn keywords(&self) -> &Record {
        &self.keywords
    }

    pub fn keywords_mut(&mut self) -> &mut Record {
        &mut self.keywords
    }

    /// Set a table keyword
    pub fn set_keyword(&mut self, name: impl Into<String>, value: Value) {
        self.keywords.set(name, value);
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name().to_string()).collect()
    }

    pub fn column_desc(&self, name: &str) -> Result<&ColumnDesc> {
        Ok(&self.columns[self.column_index(name)?].desc)
    }

    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c.name() == name)
            .ok_or_else(|| TableError::ColumnNotFound(name.to_string()))
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name() == name)
    }

    /// Add a column sized to the current row count.
    ///
    /// Array columns of a storage-backed table get indirect storage; all
    /// other columns live in memory.
    pub fn add_column(&mut self, desc: ColumnDesc) -> Result<()> {
        if self.has_column(&desc.name) {
            return Err(TableError::ColumnExists(desc.name));
        }
        let column = match (&self.store, desc.is_array) {
            (Some(store), true) => {
                let col = IndirectArrayColumn::create(
                    store,
                    desc.dtype,
                    desc.fixed_shape.clone(),
                    self.nrow,
                )?;
                TableColumn::indirect(desc, col)
            }
            _ => TableColumn::memory(desc, self.nrow),
        };
        self.columns.push(column);
        Ok(())
    }

    /// Append `n` empty rows
    pub fn add_rows(&mut self, n: usize) -> Result<()> {
        let n_old = self.nrow;
        let n_new = n_old + n;
        for col in &mut self.columns {
            col.add_row(n_new, n_old)?;
        }
        self.nrow = n_new;
        Ok(())
    }

    /// Remove one row; following rows shift up
    pub fn remove_row(&mut self, row: usize) -> Result<()> {
        if row >= self.nrow {
            return Err(TableError::ExprError(format!("row {} out of range", row)));
        }
        for col in &mut self.columns {
            col.remove_row(row)?;
        }
        self.nrow -= 1;
        Ok(())
    }

    /// Remove several rows at once
    pub fn remove_rows(&mut self, rows: &[usize]) -> Result<()> {
        // Delete from the end so earlier indices stay valid.
        let mut sorted = rows.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        for &row in sorted.iter().rev() {
            self.remove_row(row)?;
        }
        Ok(())
    }

    pub fn get_cell(&mut self, column: &str, row: usize) -> Result<Value> {
        let idx = self.column_index(column)?;
        self.columns[idx].get(row)
    }

    pub fn set_cell(&mut self, column: &str, row: usize, value: Value) -> Result<()> {
        let idx = self.column_index(column)?;
        self.columns[idx].set(row, value)
    }

    /// True when any array put happened since the last flush
    pub fn is_dirty(&mut self) -> bool {
        for col in &mut self.columns {
            if col.take_has_put() {
                self.dirty = true;
            }
        }
        self.dirty
    }

    /// Flush array payloads and clear the dirty marker
    pub fn flush(&mut self) -> Result<()> {
        if let Some(store) = &self.store {
            store.flush()?;
        }
        self.dirty = false;
        Ok(())
    }

    /// In-memory copy holding only the given rows, in the given order
    pub fn take(&mut self, rows: &[usize]) -> Result<Table> {
        let mut out = Table::new(self.name.clone());
        out.keywords = self.keywords.clone();
        out.nrow = rows.len();
        let ncol = self.columns.len();
        for col_idx in 0..ncol {
            let desc = self.columns[col_idx].desc.clone();
            let mut values = Vec::with_capacity(rows.len());
            for &row in rows {
                values.push(self.columns[col_idx].get(row)?);
            }
            out.columns.push(TableColumn {
                desc,
                data: ColumnData::Memory(values),
            });
        }
        Ok(out)
    }

    /// Append a ready-made in-memory column; row count must match
    pub fn push_memory_column(&mut self, desc: ColumnDesc, values: Vec<Value>) -> Result<()> {
        if self.has_column(&desc.name) {
            return Err(TableError::ColumnExists(desc.name));
        }
        if !self.columns.is_empty() && values.len() != self.nrow {
            return Err(TableError::ExprError(format!(
                "column {} has {} row(s), table has {}",
                desc.name,
                values.len(),
                self.nrow
            )));
        }
        self.nrow = values.len();
        self.columns.push(TableColumn {
            desc,
            data: ColumnData::Memory(values),
        });
        Ok(())
    }

    /// Rename a column
    pub fn rename_column(&mut self, old: &str, new: &str) -> Result<()> {
        if self.has_column(new) {
            return Err(TableError::ColumnExists(new.to_string()));
        }
        let idx = self.column_index(old)?;
        self.columns[idx].desc.name = new.to_string();
        Ok(())
    }

    /// Drop a column
    pub fn drop_column(&mut self, name: &str) -> Result<()> {
        let idx = self.column_index(name)?;
        self.columns.remove(idx);
        Ok(())
    }

    /// Copy a column's description and data under a new name
    pub fn copy_column(&mut self, src: &str, dst: &str) -> Result<()> {
        if self.has_column(dst) {
            return Err(TableError::ColumnExists(dst.to_string()));
        }
        let src_idx = self.column_index(src)?;
        let mut desc = self.columns[src_idx].desc.clone();
        desc.name = dst.to_string();
        self.add_column(desc)?;
        let dst_idx = self.columns.len() - 1;
        for row in 0..self.nrow {
            let value = self.columns[src_idx].get(row)?;
            if !value.is_null() {
                self.columns[dst_idx].set(row, value)?;
            }
        }
        Ok(())
    }

    /// Set a keyword on a column
    pub fn set_column_keyword(
        &mut self,
        column: &str,
        name: impl Into<String>,
        value: Value,
    ) -> Result<()> {
        let idx = self.column_index(column)?;
        self.columns[idx].desc.keywords.set(name, value);
        Ok(())
    }

    /// Concatenate tables sharing a schema into one in-memory table
    pub fn concat(name: impl Into<String>, parts: &mut [&mut Table]) -> Result<Table> {
        let mut out = Table::new(name);
        let Some(first) = parts.first() else {
            return Ok(out);
        };
        let descs: Vec<ColumnDesc> = first.columns.iter().map(|c| c.desc.clone()).collect();
        for desc in &descs {
            out.add_column(desc.clone())?;
        }
        for part in parts.iter_mut() {
            for desc in &descs {
                if !part.has_column(&desc.name) {
                    return Err(TableError::ColumnNotFound(desc.name.clone()));
                }
            }
            let start = out.nrow;
            out.add_rows(part.nrow())?;
            for desc in &descs {
                let src_idx = part.column_index(&desc.name)?;
                let dst_idx = out.column_index(&desc.name)?;
                for row in 0..part.nrow() {
                    let value = part.columns[src_idx].get(row)?;
                    out.columns[dst_idx].set(start + row, value)?;
                }
            }
        }
        Ok(out)
    }
}

impl fmt::Debug for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("name", &self.name)
            .field("nrow", &self.nrow)
            .field("ncol", &self.columns.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{ArrayData, DataType, NdArray};
    use tempfile::tempdir;

    fn sample() -> Table {
        let mut t = Table::new("obs");
        t.add_column(ColumnDesc::scalar("a", DataType::Int64)).unwrap();
        t.add_column(ColumnDesc::scalar("b", DataType::String)).unwrap();
        t.add_rows(3).unwrap();
        for row in 0..3 {
            t.set_cell("a", row, Value::Int64(3 - row as i64)).unwrap();
            t.set_cell("b", row, Value::String(format!("r{}", row))).unwrap();
        }
        t
    }

    #[test]
    fn test_take() {
        let mut t = sample();
        let mut taken = t.take(&[2, 0]).unwrap();
        assert_eq!(taken.nrow(), 2);
        assert_eq!(taken.get_cell("a", 0).unwrap(), Value::Int64(1));
        assert_eq!(taken.column_names(), vec!["a", "b"]);
    }

    #[test]
    fn test_column_ddl() {
        let mut t = sample();
        t.rename_column("a", "alpha").unwrap();
        assert!(t.has_column("alpha"));
        t.copy_column("alpha", "alpha2").unwrap();
        assert_eq!(t.get_cell("alpha2", 1).unwrap(), Value::Int64(2));
        t.drop_column("alpha").unwrap();
        assert!(matches!(
            t.column_index("alpha"),
            Err(TableError::ColumnNotFound(_))
        ));
    }

    #[test]
    fn test_storage_backed_array_column() {
        let dir = tempdir().unwrap();
        let mut t = Table::create("obs", &dir.path().join("obs")).unwrap();
        t.add_column(ColumnDesc::scalar("a", DataType::Int64)).unwrap();
        t.add_column(ColumnDesc::array("data", DataType::Float64)).unwrap();
        t.add_rows(2).unwrap();

        let arr = NdArray::new(vec![2], ArrayData::Float64(vec![1.0, 2.0])).unwrap();
        t.set_cell("data", 0, Value::Array(arr.clone())).unwrap();
        assert_eq!(t.get_cell("data", 0).unwrap(), Value::Array(arr));
        // Undefined array cell reads as null through the table surface.
        assert_eq!(t.get_cell("data", 1).unwrap(), Value::Null);
        assert!(t.is_dirty());
        t.flush().unwrap();
    }

    #[test]
    fn test_concat() {
        let mut a = sample();
        let mut b = sample();
        let merged = Table::concat("both", &mut [&mut a, &mut b]).unwrap();
        assert_eq!(merged.nrow(), 6);
        assert_eq!(merged.ncol(), 2);
    }

    #[test]
    fn test_remove_rows() {
        let mut t = sample();
        t.remove_rows(&[0, 2]).unwrap();
        assert_eq!(t.nrow(), 1);
        assert_eq!(t.get_cell("b", 0).unwrap(), Value::String("r1".into()));
    }
}
