//! Indirect array storage
//!
//! This module persists array-valued cells out of row: payload records
//! live in an append-style [`ArrayFile`], per-row descriptors are managed
//! by [`IndirectArrayColumn`], and [`StorageBinding`] selects between the
//! legacy per-column and current shared per-table file layouts.

pub mod array_file;
pub mod binding;
pub mod indirect;
pub mod stream;

pub use array_file::{ArrayFile, ArrayFileHeader};
pub use binding::{legacy_file_name, shared_file_name, StorageBinding, TableArrayStore};
pub use indirect::{ArrayDescriptor, IndirectArrayColumn};

/// Magic bytes of an array payload file
pub const MAGIC: &[u8; 8] = b"ARTBARRF";
/// Major version of the payload file format
pub const VERSION_MAJOR: u16 = 1;
/// Minor version of the payload file format
pub const VERSION_MINOR: u16 = 0;
/// Payload file header size in bytes
pub const HEADER_SIZE: usize = 64;
