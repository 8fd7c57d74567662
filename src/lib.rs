//! ArrayTable tabular storage and query-processing core
//!
//! A file-based relational table abstraction whose cells may hold
//! multi-dimensional numeric arrays, paired with the processing pipeline
//! for a SQL-like table query language (TaQL). The two central pieces are
//! the indirect-array column manager in [`storage`], which persists
//! per-row arrays of varying shape without loading whole tables, and the
//! tree handler in [`query`], which walks a parsed statement tree and
//! executes it against tables.

pub mod data;
pub mod query;
pub mod storage;
pub mod table;

// Re-export main types
pub use data::{ArrayData, DataType, NdArray, Record, Value};
pub use query::{NodeResult, QueryContext, TaqlNode, TreeHandler};
pub use storage::{ArrayFile, IndirectArrayColumn, TableArrayStore};
pub use table::{Table, TableCatalog};

/// Storage engine and query-processing error type
#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no array in row {row} of {file}")]
    NoArrayInRow { row: u64, file: String },

    #[error("shape of row {row} is fixed and cannot change")]
    ShapeIsFixed { row: u64 },

    #[error("shape mismatch: array has shape {given:?}, row defines {defined:?}")]
    ShapeMismatch { given: Vec<usize>, defined: Vec<usize> },

    #[error("slice out of bounds: axis {axis}, start {start} + length {len} > extent {extent}")]
    SliceOutOfBounds { axis: usize, start: usize, len: usize, extent: usize },

    #[error("data type mismatch: expected {expected}, got {actual}")]
    DataTypeMismatch { expected: DataType, actual: DataType },

    #[error("invalid file format")]
    InvalidFileFormat,

    #[error("checksum mismatch")]
    ChecksumMismatch,

    #[error("version mismatch: expected at most {expected}, got {actual}")]
    VersionMismatch { expected: u32, actual: u32 },

    #[error("file {0} is not writable")]
    NotWritable(String),

    #[error("table not found: {0}")]
    TableNotFound(String),

    #[error("table already exists: {0}")]
    TableExists(String),

    #[error("column not found: {0}")]
    ColumnNotFound(String),

    #[error("column already exists: {0}")]
    ColumnExists(String),

    #[error("temporary table ${index} does not exist; {count} table(s) given")]
    UnknownTempTable { index: usize, count: usize },

    #[error("clause not valid for {command} command: {clause}")]
    MalformedClause { command: &'static str, clause: String },

    #[error("expression error: {0}")]
    ExprError(String),

    #[error("node result holds {actual}, {expected} was requested")]
    WrongResultKind { expected: &'static str, actual: &'static str },
}

pub type Result<T> = std::result::Result<T, TableError>;
