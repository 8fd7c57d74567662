//! Element types, scalar values and n-dimensional array values

pub mod array;
pub mod value;

pub use array::{ArrayData, NdArray, Slice};
pub use value::{DataType, Record, Value};
