//! Tables, columns and the table catalog

pub mod catalog;
pub mod column;
pub mod table;

pub use catalog::{handle, TableCatalog, TableHandle};
pub use column::{ColumnData, ColumnDesc, TableColumn};
pub use table::Table;
