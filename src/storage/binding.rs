//! Storage file bindings
//!
//! Two layout generations exist for indirect array payloads. The legacy
//! layout gives every column its own file, named by appending the column
//! sequence number to the table base name; the column owns and closes that
//! file. The current layout keeps one shared payload file per table, owned
//! by a [`TableArrayStore`]; columns hold a borrowed reference whose
//! lifetime is the table's. Only the current layout is ever written, but
//! both stay readable.

use super::ArrayFile;
use crate::Result;
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Per-table owner of the shared array payload file.
///
/// Also hands out the unique per-column sequence numbers recorded in the
/// serialized column headers.
pub struct TableArrayStore {
    file: Arc<RwLock<ArrayFile>>,
    base: PathBuf,
    next_seqnr: AtomicU32,
}

impl TableArrayStore {
    /// Create a new payload file for a table with the given base path
    pub fn create(base: &Path) -> Result<Self> {
        let file = ArrayFile::create(&shared_file_name(base))?;
        Ok(Self {
            file: Arc::new(RwLock::new(file)),
            base: base.to_path_buf(),
            next_seqnr: AtomicU32::new(0),
        })
    }

    /// Attach to an existing payload file
    pub fn attach(base: &Path, writable: bool) -> Result<Self> {
        let file = ArrayFile::open(&shared_file_name(base), writable)?;
        Ok(Self {
            file: Arc::new(RwLock::new(file)),
            base: base.to_path_buf(),
            next_seqnr: AtomicU32::new(0),
        })
    }

    /// Table base path the payload file is derived from
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Borrow the shared payload file
    pub fn handle(&self) -> Arc<RwLock<ArrayFile>> {
        Arc::clone(&self.file)
    }

    /// Next unique column sequence number
    pub fn unique_nr(&self) -> u32 {
        self.next_seqnr.fetch_add(1, Ordering::Relaxed)
    }

    /// Advance the sequence counter past one read from a stored column
    pub fn note_seqnr(&self, seqnr: u32) {
        self.next_seqnr.fetch_max(seqnr + 1, Ordering::Relaxed);
    }

    pub fn flush(&self) -> Result<()> {
        self.file.write().flush()
    }
}

/// File name of the shared per-table payload file
pub fn shared_file_name(base: &Path) -> PathBuf {
    let mut name = base.as_os_str().to_os_string();
    name.push(".arr");
    PathBuf::from(name)
}

/// File name of a legacy per-column payload file
pub fn legacy_file_name(base: &Path, seqnr: u32) -> PathBuf {
    let mut name = base.as_os_str().to_os_string();
    name.push(format!("i{}", seqnr));
    PathBuf::from(name)
}

/// A column's attachment to its payload file
#[derive(Debug)]
pub enum StorageBinding {
    /// Column-owned file of the legacy one-file-per-column layout
    Legacy(ArrayFile),
    /// Borrowed table-level file of the current layout
    Shared(Arc<RwLock<ArrayFile>>),
}

impl StorageBinding {
    /// Open a legacy per-column file
    pub fn open_legacy(base: &Path, seqnr: u32, writable: bool) -> Result<Self> {
        Ok(StorageBinding::Legacy(ArrayFile::open(
            &legacy_file_name(base, seqnr),
            writable,
        )?))
    }

    /// Run a read operation against the bound file
    pub fn read<T>(&self, f: impl FnOnce(&ArrayFile) -> Result<T>) -> Result<T> {
        match self {
            StorageBinding::Legacy(file) => f(file),
            StorageBinding::Shared(file) => f(&file.read()),
        }
    }

    /// Run a write operation against the bound file
    pub fn write<T>(&mut self, f: impl FnOnce(&mut ArrayFile) -> Result<T>) -> Result<T> {
        match self {
            StorageBinding::Legacy(file) => f(file),
            StorageBinding::Shared(file) => f(&mut file.write()),
        }
    }

    /// Name of the bound file, for error messages
    pub fn file_name(&self) -> String {
        match self {
            StorageBinding::Legacy(file) => file.path().display().to_string(),
            StorageBinding::Shared(file) => file.read().path().display().to_string(),
        }
    }

    /// Upgrade a read-only attach to read-write
    pub fn reopen_rw(&mut self) -> Result<()> {
        self.write(|file| file.reopen_rw())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_file_names() {
        let base = Path::new("/data/obs/main");
        assert_eq!(shared_file_name(base), Path::new("/data/obs/main.arr"));
        assert_eq!(legacy_file_name(base, 3), Path::new("/data/obs/maini3"));
    }

    #[test]
    fn test_store_create_attach() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("main");
        {
            let store = TableArrayStore::create(&base).unwrap();
            assert_eq!(store.unique_nr(), 0);
            assert_eq!(store.unique_nr(), 1);
            store.flush().unwrap();
        }
        let store = TableArrayStore::attach(&base, false).unwrap();
        store.note_seqnr(5);
        assert_eq!(store.unique_nr(), 6);
    }

    #[test]
    fn test_shared_binding_is_borrowed() {
        let dir = tempdir().unwrap();
        let store = TableArrayStore::create(&dir.path().join("t")).unwrap();
        let a = StorageBinding::Shared(store.handle());
        let b = StorageBinding::Shared(store.handle());
        // Both bindings see the same file.
        assert_eq!(a.file_name(), b.file_name());
    }
}
