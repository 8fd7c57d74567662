//! Column descriptions and column storage

use crate::data::{DataType, Record, Value};
use crate::storage::IndirectArrayColumn;
use crate::{Result, TableError};
use serde::{Deserialize, Serialize};

/// Column description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDesc {
    /// Column name
    pub name: String,
    /// Element data type
    pub dtype: DataType,
    /// Whether cells hold arrays rather than scalars
    pub is_array: bool,
    /// Declared shape for fixed-shape array columns
    pub fixed_shape: Option<Vec<usize>>,
    /// Physical unit annotation, if any
    pub unit: Option<String>,
    /// Column keywords
    pub keywords: Record,
}

impl ColumnDesc {
    /// Scalar column description
    pub fn scalar(name: impl Into<String>, dtype: DataType) -> Self {
        Self {
            name: name.into(),
            dtype,
            is_array: false,
            fixed_shape: None,
            unit: None,
            keywords: Record::new(),
        }
    }

    /// Variable-shape array column description
    pub fn array(name: impl Into<String>, dtype: DataType) -> Self {
        Self {
            is_array: true,
            ..Self::scalar(name, dtype)
        }
    }

    /// Fix the per-row shape of an array column
    pub fn with_shape(mut self, shape: Vec<usize>) -> Self {
        self.is_array = true;
        self.fixed_shape = Some(shape);
        self
    }

    /// Attach a unit annotation
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }
}

/// Storage behind one table column
pub enum ColumnData {
    /// In-memory value vector; nulls are explicit `Value::Null` cells
    Memory(Vec<Value>),
    /// File-backed indirect array column
    Indirect(IndirectArrayColumn),
}

/// A named, typed table column
pub struct TableColumn {
    pub desc: ColumnDesc,
    pub data: ColumnData,
}

impl TableColumn {
    /// New in-memory column sized to `nrows` null cells
    pub fn memory(desc: ColumnDesc, nrows: usize) -> Self {
        Self {
            desc,
            data: ColumnData::Memory(vec![Value::Null; nrows]),
        }
    }

    /// New column backed by an indirect array column
    pub fn indirect(desc: ColumnDesc, column: IndirectArrayColumn) -> Self {
        Self {
            desc,
            data: ColumnData::Indirect(column),
        }
    }

    pub fn name(&self) -> &str {
        &self.desc.name
    }

    pub fn nrow(&self) -> usize {
        match &self.data {
            ColumnData::Memory(values) => values.len(),
            ColumnData::Indirect(col) => col.nrow(),
        }
    }

    /// Cell value for a row; an indirect row without an array reads as null
    pub fn get(&mut self, row: usize) -> Result<Value> {
        match &mut self.data {
            ColumnData::Memory(values) => values
                .get(row)
                .cloned()
                .ok_or_else(|| TableError::ExprError(format!("row {} out of range", row))),
            ColumnData::Indirect(col) => {
                if !col.is_shape_defined(row) {
                    if row >= col.nrow() {
                        return Err(TableError::ExprError(format!("row {} out of range", row)));
                    }
                    return Ok(Value::Null);
                }
                Ok(Value::Array(col.get(row)?))
            }
        }
    }

    /// Overwrite a cell; arrays written to indirect columns define the
    /// shape first when needed
    pub fn set(&mut self, row: usize, value: Value) -> Result<()> {
        match &mut self.data {
            ColumnData::Memory(values) => {
                let slot = values
                    .get_mut(row)
                    .ok_or_else(|| TableError::ExprError(format!("row {} out of range", row)))?;
                *slot = value;
                Ok(())
            }
            ColumnData::Indirect(col) => match value {
                Value::Array(arr) => {
                    col.set_shape(row, arr.shape())?;
                    col.put(row, &arr)
                }
                other => Err(TableError::ExprError(format!(
                    "array column {} cannot store scalar {}",
                    self.desc.name, other
                ))),
            },
        }
    }

    /// Extend the column from `n_old` to `n_new` rows
    pub fn add_row(&mut self, n_new: usize, n_old: usize) -> Result<()> {
        match &mut self.data {
            ColumnData::Memory(values) => {
                values.resize(n_new, Value::Null);
                Ok(())
            }
            ColumnData::Indirect(col) => col.add_row(n_new, n_old),
        }
    }

    /// Remove one row
    pub fn remove_row(&mut self, row: usize) -> Result<()> {
        match &mut self.data {
            ColumnData::Memory(values) => {
                if row >= values.len() {
                    return Err(TableError::ExprError(format!("row {} out of range", row)));
                }
                values.remove(row);
                Ok(())
            }
            ColumnData::Indirect(col) => col.remove(row),
        }
    }

    /// Collect and clear the dirty marker of file-backed columns
    pub fn take_has_put(&mut self) -> bool {
        match &mut self.data {
            ColumnData::Memory(_) => false,
            ColumnData::Indirect(col) => col.take_has_put(),
        }
    }
}
