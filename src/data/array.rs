//! N-dimensional array values
//!
//! Cells of array columns hold an [`NdArray`]: a row-major shape plus a
//! typed element buffer. Rectangular sub-arrays are addressed with a
//! [`Slice`] giving a start and length per axis.

use super::{DataType, Value};
use crate::{Result, TableError};
use serde::{Deserialize, Serialize};

/// Typed flat element buffer of an array
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ArrayData {
    Bool(Vec<bool>),
    Int64(Vec<i64>),
    Float64(Vec<f64>),
    String(Vec<String>),
}

impl ArrayData {
    pub fn len(&self) -> usize {
        match self {
            ArrayData::Bool(v) => v.len(),
            ArrayData::Int64(v) => v.len(),
            ArrayData::Float64(v) => v.len(),
            ArrayData::String(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn data_type(&self) -> DataType {
        match self {
            ArrayData::Bool(_) => DataType::Bool,
            ArrayData::Int64(_) => DataType::Int64,
            ArrayData::Float64(_) => DataType::Float64,
            ArrayData::String(_) => DataType::String,
        }
    }

    /// Empty buffer of the given type with reserved capacity
    pub fn with_capacity(dtype: DataType, capacity: usize) -> Self {
        match dtype {
            DataType::Bool => ArrayData::Bool(Vec::with_capacity(capacity)),
            DataType::Int64 => ArrayData::Int64(Vec::with_capacity(capacity)),
            DataType::Float64 => ArrayData::Float64(Vec::with_capacity(capacity)),
            DataType::String => ArrayData::String(Vec::with_capacity(capacity)),
        }
    }

    /// Append elements `src[range]` onto `self`; both must share a type
    fn extend_from(&mut self, src: &ArrayData, start: usize, len: usize) -> Result<()> {
        match (self, src) {
            (ArrayData::Bool(d), ArrayData::Bool(s)) => d.extend_from_slice(&s[start..start + len]),
            (ArrayData::Int64(d), ArrayData::Int64(s)) => d.extend_from_slice(&s[start..start + len]),
            (ArrayData::Float64(d), ArrayData::Float64(s)) => {
                d.extend_from_slice(&s[start..start + len])
            }
            (ArrayData::String(d), ArrayData::String(s)) => {
                d.extend_from_slice(&s[start..start + len])
            }
            (d, s) => {
                return Err(TableError::DataTypeMismatch {
                    expected: d.data_type(),
                    actual: s.data_type(),
                })
            }
        }
        Ok(())
    }

    /// Overwrite `self[dst..dst+len]` with `src[start..start+len]`
    fn copy_from(&mut self, dst: usize, src: &ArrayData, start: usize, len: usize) -> Result<()> {
        match (self, src) {
            (ArrayData::Bool(d), ArrayData::Bool(s)) => {
                d[dst..dst + len].copy_from_slice(&s[start..start + len])
            }
            (ArrayData::Int64(d), ArrayData::Int64(s)) => {
                d[dst..dst + len].copy_from_slice(&s[start..start + len])
            }
            (ArrayData::Float64(d), ArrayData::Float64(s)) => {
                d[dst..dst + len].copy_from_slice(&s[start..start + len])
            }
            (ArrayData::String(d), ArrayData::String(s)) => {
                d[dst..dst + len].clone_from_slice(&s[start..start + len])
            }
            (d, s) => {
                return Err(TableError::DataTypeMismatch {
                    expected: d.data_type(),
                    actual: s.data_type(),
                })
            }
        }
        Ok(())
    }
}

/// Rectangular sub-array selection: per-axis start and length
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slice {
    pub start: Vec<usize>,
    pub length: Vec<usize>,
}

impl Slice {
    pub fn new(start: Vec<usize>, length: Vec<usize>) -> Self {
        Self { start, length }
    }

    /// Validate against an array shape
    pub(crate) fn check(&self, shape: &[usize]) -> Result<()> {
        if self.start.len() != shape.len() || self.length.len() != shape.len() {
            return Err(TableError::ExprError(format!(
                "slice has {} axis(es), array has {}",
                self.start.len(),
                shape.len()
            )));
        }
        for (axis, ((&start, &len), &extent)) in self
            .start
            .iter()
            .zip(&self.length)
            .zip(shape)
            .enumerate()
        {
            if start + len > extent {
                return Err(TableError::SliceOutOfBounds { axis, start, len, extent });
            }
        }
        Ok(())
    }
}

/// An n-dimensional array value: row-major shape plus typed elements
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NdArray {
    shape: Vec<usize>,
    data: ArrayData,
}

impl NdArray {
    /// Build from a shape and matching flat buffer
    pub fn new(shape: Vec<usize>, data: ArrayData) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if data.len() != expected {
            return Err(TableError::ExprError(format!(
                "array data has {} element(s), shape {:?} needs {}",
                data.len(),
                shape,
                expected
            )));
        }
        Ok(Self { shape, data })
    }

    /// Array of the given shape filled with a type default
    pub fn filled(shape: Vec<usize>, dtype: DataType) -> Self {
        let n: usize = shape.iter().product();
        let data = match dtype {
            DataType::Bool => ArrayData::Bool(vec![false; n]),
            DataType::Int64 => ArrayData::Int64(vec![0; n]),
            DataType::Float64 => ArrayData::Float64(vec![0.0; n]),
            DataType::String => ArrayData::String(vec![String::new(); n]),
        };
        Self { shape, data }
    }

    /// 1-dimensional Int64 array
    pub fn from_i64(values: Vec<i64>) -> Self {
        Self {
            shape: vec![values.len()],
            data: ArrayData::Int64(values),
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    pub fn nelements(&self) -> usize {
        self.data.len()
    }

    pub fn data(&self) -> &ArrayData {
        &self.data
    }

    pub fn data_type(&self) -> DataType {
        self.data.data_type()
    }

    /// Elements as scalar values in row-major order
    pub fn values(&self) -> Vec<Value> {
        match &self.data {
            ArrayData::Bool(v) => v.iter().map(|&b| Value::Bool(b)).collect(),
            ArrayData::Int64(v) => v.iter().map(|&i| Value::Int64(i)).collect(),
            ArrayData::Float64(v) => v.iter().map(|&f| Value::Float64(f)).collect(),
            ArrayData::String(v) => v.iter().cloned().map(Value::String).collect(),
        }
    }

    /// First element as a scalar; null for an empty array
    pub fn first_value(&self) -> Value {
        match &self.data {
            ArrayData::Bool(v) => v.first().map(|&b| Value::Bool(b)),
            ArrayData::Int64(v) => v.first().map(|&i| Value::Int64(i)),
            ArrayData::Float64(v) => v.first().map(|&f| Value::Float64(f)),
            ArrayData::String(v) => v.first().cloned().map(Value::String),
        }
        .unwrap_or(Value::Null)
    }

    /// Row-major strides for the current shape
    fn strides(&self) -> Vec<usize> {
        let mut strides = vec![1usize; self.shape.len()];
        for axis in (0..self.shape.len().saturating_sub(1)).rev() {
            strides[axis] = strides[axis + 1] * self.shape[axis + 1];
        }
        strides
    }

    /// Flat offsets of the contiguous runs making up a slice region.
    ///
    /// Each returned offset is the start of a run of `run_len` elements
    /// along the innermost axis.
    fn region_runs(&self, slice: &Slice) -> (Vec<usize>, usize) {
        if self.shape.is_empty() {
            return (vec![0], 1);
        }
        let strides = self.strides();
        let inner = self.shape.len() - 1;
        let run_len = slice.length[inner];
        // Iterate the outer axes as a mixed-radix counter.
        let mut runs = Vec::new();
        let mut idx = vec![0usize; inner];
        loop {
            let mut offset = slice.start[inner];
            for axis in 0..inner {
                offset += (slice.start[axis] + idx[axis]) * strides[axis];
            }
            runs.push(offset);
            let mut axis = inner;
            loop {
                if axis == 0 {
                    return (runs, run_len);
                }
                axis -= 1;
                idx[axis] += 1;
                if idx[axis] < slice.length[axis] {
                    break;
                }
                idx[axis] = 0;
            }
        }
    }

    /// Extract a rectangular sub-array
    pub fn slice(&self, slice: &Slice) -> Result<NdArray> {
        slice.check(&self.shape)?;
        let (runs, run_len) = self.region_runs(slice);
        let mut out = ArrayData::with_capacity(self.data_type(), runs.len() * run_len);
        for offset in runs {
            out.extend_from(&self.data, offset, run_len)?;
        }
        NdArray::new(slice.length.clone(), out)
    }

    /// Overwrite a rectangular sub-array with `values`
    pub fn put_slice(&mut self, slice: &Slice, values: &NdArray) -> Result<()> {
        slice.check(&self.shape)?;
        if values.shape != slice.length {
            return Err(TableError::ShapeMismatch {
                given: values.shape.clone(),
                defined: slice.length.clone(),
            });
        }
        let (runs, run_len) = self.region_runs(slice);
        for (i, offset) in runs.into_iter().enumerate() {
            self.data.copy_from(offset, &values.data, i * run_len, run_len)?;
        }
        Ok(())
    }
}
