//! Indirect array column manager
//!
//! Persists, per row, an optional array whose shape may vary row to row.
//! Each row has at most one descriptor pointing at a payload record in the
//! bound [`super::ArrayFile`]; descriptors are read lazily, so attaching a
//! column touches no payload data until a row is actually asked for.
//!
//! Disk space of removed or reshaped arrays is deliberately never
//! reclaimed; fixing that would break file compatibility.

use super::binding::{StorageBinding, TableArrayStore};
use super::stream;
use crate::data::{DataType, NdArray, Slice};
use crate::{Result, TableError};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};
use std::path::Path;

/// Structured-stream tag of the persisted column
const COLUMN_TAG: &str = "IndirectArrayColumn";
/// Current serialization version; version 1 used per-column files
const COLUMN_VERSION: u32 = 2;

/// Per-row record of a stored array's shape and file location
#[derive(Debug, Clone)]
pub struct ArrayDescriptor {
    /// Offset of the payload record; never 0 for a live descriptor
    offset: u64,
    /// Cached shape; `None` until first read from the file
    shape: Option<Vec<usize>>,
}

impl ArrayDescriptor {
    fn from_offset(offset: u64) -> Self {
        Self { offset, shape: None }
    }
}

/// Storage manager for one array column with row-varying shapes
#[derive(Debug)]
pub struct IndirectArrayColumn {
    dtype: DataType,
    /// Unique column sequence number within the table
    seqnr: u32,
    /// Declared fixed shape, if the column cannot change shape per row
    fixed_shape: Option<Vec<usize>>,
    /// Serialization version this column was read with
    version: u32,
    binding: StorageBinding,
    /// One slot per row; `None` means no array defined for the row
    descriptors: Vec<Option<ArrayDescriptor>>,
    /// Set by any put until the owning table collects it
    has_put: bool,
}

impl IndirectArrayColumn {
    /// Create a new column in the current shared layout, sized to `nrows`
    pub fn create(
        store: &TableArrayStore,
        dtype: DataType,
        fixed_shape: Option<Vec<usize>>,
        nrows: usize,
    ) -> Result<Self> {
        let mut col = Self {
            dtype,
            seqnr: store.unique_nr(),
            fixed_shape,
            version: COLUMN_VERSION,
            binding: StorageBinding::Shared(store.handle()),
            descriptors: Vec::new(),
            has_put: false,
        };
        col.add_row(nrows, 0)?;
        Ok(col)
    }

    pub fn data_type(&self) -> DataType {
        self.dtype
    }

    pub fn seqnr(&self) -> u32 {
        self.seqnr
    }

    pub fn nrow(&self) -> usize {
        self.descriptors.len()
    }

    /// False iff the column declared a fixed shape
    pub fn can_change_shape(&self) -> bool {
        self.fixed_shape.is_none()
    }

    /// Collect and clear the dirty marker set by puts
    pub fn take_has_put(&mut self) -> bool {
        std::mem::take(&mut self.has_put)
    }

    /// Upgrade a read-only attach to read-write
    pub fn reopen_rw(&mut self) -> Result<()> {
        self.binding.reopen_rw()
    }

    /// Extend the column from `n_old` to `n_new` rows.
    ///
    /// Fixed-shape columns materialize the shape of every new row at once;
    /// variable-shape rows start with no array defined.
    pub fn add_row(&mut self, n_new: usize, n_old: usize) -> Result<()> {
        debug_assert_eq!(self.descriptors.len(), n_old);
        self.descriptors.resize(n_new, None);
        if let Some(shape) = self.fixed_shape.clone() {
            for row in n_old..n_new {
                self.set_shape(row, &shape)?;
            }
        }
        Ok(())
    }

    /// Assign or replace the shape of a row.
    ///
    /// Writes to the file only on first assignment or an actual change; a
    /// change abandons the old payload record and appends a fresh one.
    pub fn set_shape(&mut self, row: usize, shape: &[usize]) -> Result<()> {
        self.check_row(row)?;
        if self.descriptors[row].is_some() {
            let current = self.shape(row)?;
            if current == shape {
                return Ok(());
            }
            if self.fixed_shape.is_some() {
                return Err(TableError::ShapeIsFixed { row: row as u64 });
            }
        }
        let dtype = self.dtype;
        let offset = self
            .binding
            .write(|file| file.append_empty_record(shape, dtype))?;
        self.descriptors[row] = Some(ArrayDescriptor {
            offset,
            shape: Some(shape.to_vec()),
        });
        Ok(())
    }

    /// Whether the row has an array defined
    pub fn is_shape_defined(&self, row: usize) -> bool {
        self.descriptors.get(row).map_or(false, Option::is_some)
    }

    /// Shape of the row's array, fetched lazily from the file
    pub fn shape(&mut self, row: usize) -> Result<Vec<usize>> {
        let offset = self.descriptor_offset(row)?;
        if let Some(Some(desc)) = self.descriptors.get(row) {
            if let Some(shape) = &desc.shape {
                return Ok(shape.clone());
            }
        }
        let shape = self.binding.read(|file| file.read_shape(offset))?;
        if let Some(desc) = &mut self.descriptors[row] {
            desc.shape = Some(shape.clone());
        }
        Ok(shape)
    }

    /// Dimensionality of the row's array
    pub fn ndim(&mut self, row: usize) -> Result<usize> {
        Ok(self.shape(row)?.len())
    }

    /// Read the full array of a row
    pub fn get(&mut self, row: usize) -> Result<NdArray> {
        let offset = self.descriptor_offset(row)?;
        let dtype = self.dtype;
        let arr = self.binding.read(|file| file.read_array(offset, dtype))?;
        if let Some(desc) = &mut self.descriptors[row] {
            desc.shape = Some(arr.shape().to_vec());
        }
        Ok(arr)
    }

    /// Overwrite the full array of a row; the shape must be set already
    pub fn put(&mut self, row: usize, arr: &NdArray) -> Result<()> {
        self.check_dtype(arr.data_type())?;
        let shape = self.shape(row)?;
        if shape != arr.shape() {
            return Err(TableError::ShapeMismatch {
                given: arr.shape().to_vec(),
                defined: shape,
            });
        }
        let offset = self.descriptor_offset(row)?;
        if self.dtype.fixed_size().is_some() {
            self.binding.write(|file| file.write_array_in_place(offset, arr))?;
        } else {
            // String elements have no fixed stride; append a fresh record
            // and abandon the old one.
            let new_offset = self.binding.write(|file| file.append_record(arr))?;
            if let Some(desc) = &mut self.descriptors[row] {
                desc.offset = new_offset;
            }
        }
        self.has_put = true;
        Ok(())
    }

    /// Read a rectangular sub-array of a row
    pub fn get_slice(&mut self, row: usize, slice: &Slice) -> Result<NdArray> {
        let offset = self.descriptor_offset(row)?;
        let dtype = self.dtype;
        self.binding.read(|file| file.read_slice(offset, dtype, slice))
    }

    /// Overwrite a rectangular sub-array of a row
    pub fn put_slice(&mut self, row: usize, slice: &Slice, values: &NdArray) -> Result<()> {
        self.check_dtype(values.data_type())?;
        let offset = self.descriptor_offset(row)?;
        if self.dtype.fixed_size().is_some() {
            self.binding
                .write(|file| file.write_slice_in_place(offset, slice, values))?;
        } else {
            let mut full = self.get(row)?;
            full.put_slice(slice, values)?;
            let new_offset = self.binding.write(|file| file.append_record(&full))?;
            if let Some(desc) = &mut self.descriptors[row] {
                desc.offset = new_offset;
            }
        }
        self.has_put = true;
        Ok(())
    }

    /// Drop the in-memory descriptor of a row.
    ///
    /// Following rows shift up; the payload record stays on disk.
    pub fn remove(&mut self, row: usize) -> Result<()> {
        self.check_row(row)?;
        self.descriptors.remove(row);
        Ok(())
    }

    // ---- serialization ---------------------------------------------------

    /// Write the versioned column header and per-row offset table
    pub fn write_column<W: Write>(&mut self, w: &mut W) -> Result<()> {
        stream::put_start(w, COLUMN_TAG, COLUMN_VERSION)?;
        // Data type code is retained for backward compatibility only.
        w.write_u8(self.dtype.code())?;
        w.write_u32::<LittleEndian>(self.seqnr)?;
        w.write_u64::<LittleEndian>(self.descriptors.len() as u64)?;
        stream::put_end(w)?;
        for desc in &self.descriptors {
            stream::write_offset(w, desc.as_ref().map(|d| d.offset))?;
        }
        self.binding.write(|file| file.flush())?;
        Ok(())
    }

    /// Read a column back, binding it to its payload file.
    ///
    /// Columns written with version 1 open their own legacy file named
    /// `<base>i<seqnr>`; current columns borrow the table store's file.
    pub fn read_column<R: Read>(
        r: &mut R,
        base: &Path,
        store: &TableArrayStore,
        fixed_shape: Option<Vec<usize>>,
        writable: bool,
    ) -> Result<Self> {
        let version = stream::get_start(r, COLUMN_TAG)?;
        if version > COLUMN_VERSION {
            return Err(TableError::VersionMismatch {
                expected: COLUMN_VERSION,
                actual: version,
            });
        }
        let dtype = DataType::from_code(r.read_u8()?).ok_or(TableError::InvalidFileFormat)?;
        let seqnr = r.read_u32::<LittleEndian>()?;
        let nrows = r.read_u64::<LittleEndian>()? as usize;
        stream::get_end(r)?;
        // The row count is untrusted; a corrupt value must surface as a
        // read error, not a huge allocation.
        let mut descriptors = Vec::new();
        for _ in 0..nrows {
            descriptors.push(stream::read_offset(r)?.map(ArrayDescriptor::from_offset));
        }
        store.note_seqnr(seqnr);
        let binding = if version <= 1 {
            StorageBinding::open_legacy(base, seqnr, writable)?
        } else {
            StorageBinding::Shared(store.handle())
        };
        log::debug!(
            "read column seq {} ({} row(s), version {}) from {}",
            seqnr,
            nrows,
            version,
            binding.file_name()
        );
        Ok(Self {
            dtype,
            seqnr,
            fixed_shape,
            version,
            binding,
            descriptors,
            has_put: false,
        })
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    // ---- helpers ---------------------------------------------------------

    fn check_row(&self, row: usize) -> Result<()> {
        if row >= self.descriptors.len() {
            return Err(TableError::NoArrayInRow {
                row: row as u64,
                file: self.binding.file_name(),
            });
        }
        Ok(())
    }

    fn check_dtype(&self, actual: DataType) -> Result<()> {
        if actual != self.dtype {
            return Err(TableError::DataTypeMismatch {
                expected: self.dtype,
                actual,
            });
        }
        Ok(())
    }

    /// Offset of the row's payload record, failing if no array is defined
    fn descriptor_offset(&self, row: usize) -> Result<u64> {
        match self.descriptors.get(row) {
            Some(Some(desc)) => Ok(desc.offset),
            _ => Err(TableError::NoArrayInRow {
                row: row as u64,
                file: self.binding.file_name(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ArrayData;
    use std::io::Cursor;
    use tempfile::tempdir;

    fn iota(shape: Vec<usize>) -> NdArray {
        let n: usize = shape.iter().product();
        NdArray::new(shape, ArrayData::Int64((0..n as i64).collect())).unwrap()
    }

    fn store(dir: &Path) -> TableArrayStore {
        TableArrayStore::create(&dir.join("main")).unwrap()
    }

    #[test]
    fn test_variable_shape_scenario() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        let mut col =
            IndirectArrayColumn::create(&store, DataType::Int64, None, 0).unwrap();
        col.add_row(3, 0).unwrap();

        col.set_shape(0, &[2, 2]).unwrap();
        let arr = iota(vec![2, 2]);
        col.put(0, &arr).unwrap();

        assert_eq!(col.shape(0).unwrap(), vec![2, 2]);
        assert_eq!(col.get(0).unwrap(), arr);
        assert!(matches!(
            col.shape(1),
            Err(TableError::NoArrayInRow { row: 1, .. })
        ));
        assert!(col.take_has_put());
        assert!(!col.take_has_put());
    }

    #[test]
    fn test_fixed_shape_materializes_on_add_row() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        let mut col =
            IndirectArrayColumn::create(&store, DataType::Float64, Some(vec![4]), 2).unwrap();
        assert!(!col.can_change_shape());
        assert!(col.is_shape_defined(0));
        assert!(col.is_shape_defined(1));
        col.add_row(5, 2).unwrap();
        for row in 0..5 {
            assert_eq!(col.shape(row).unwrap(), vec![4]);
        }
        // Changing a fixed shape is refused.
        assert!(matches!(
            col.set_shape(0, &[5]),
            Err(TableError::ShapeIsFixed { row: 0 })
        ));
    }

    #[test]
    fn test_set_shape_same_is_noop_change_moves_offset() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        let mut col = IndirectArrayColumn::create(&store, DataType::Int64, None, 1).unwrap();
        col.set_shape(0, &[2, 3]).unwrap();
        let first = col.descriptors[0].as_ref().unwrap().offset;
        col.set_shape(0, &[2, 3]).unwrap();
        assert_eq!(col.descriptors[0].as_ref().unwrap().offset, first);
        col.set_shape(0, &[3, 3]).unwrap();
        assert_ne!(col.descriptors[0].as_ref().unwrap().offset, first);
        assert_eq!(col.shape(0).unwrap(), vec![3, 3]);
    }

    #[test]
    fn test_slice_round_trip() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        let mut col = IndirectArrayColumn::create(&store, DataType::Int64, None, 1).unwrap();
        col.set_shape(0, &[3, 4]).unwrap();
        col.put(0, &iota(vec![3, 4])).unwrap();

        let slice = Slice::new(vec![1, 1], vec![2, 2]);
        let sub = col.get_slice(0, &slice).unwrap();
        assert_eq!(sub, iota(vec![3, 4]).slice(&slice).unwrap());

        let patch = NdArray::new(vec![2, 2], ArrayData::Int64(vec![-1, -2, -3, -4])).unwrap();
        col.put_slice(0, &slice, &patch).unwrap();
        assert_eq!(col.get_slice(0, &slice).unwrap(), patch);
        // Cells outside the slice are untouched.
        let full = col.get(0).unwrap();
        assert_eq!(
            full.slice(&Slice::new(vec![0, 0], vec![1, 4])).unwrap(),
            iota(vec![3, 4]).slice(&Slice::new(vec![0, 0], vec![1, 4])).unwrap()
        );
    }

    #[test]
    fn test_undefined_row_leaves_others_intact() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        let mut col = IndirectArrayColumn::create(&store, DataType::Int64, None, 3).unwrap();
        col.set_shape(2, &[2]).unwrap();
        let arr = iota(vec![2]);
        col.put(2, &arr).unwrap();

        assert!(col.get(1).is_err());
        assert_eq!(col.get(2).unwrap(), arr);
    }

    #[test]
    fn test_remove_keeps_disk_shifts_rows() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        let mut col = IndirectArrayColumn::create(&store, DataType::Int64, None, 2).unwrap();
        col.set_shape(1, &[2]).unwrap();
        let arr = iota(vec![2]);
        col.put(1, &arr).unwrap();

        let used_before = store.handle().read().used();
        col.remove(0).unwrap();
        assert_eq!(col.nrow(), 1);
        assert_eq!(col.get(0).unwrap(), arr);
        // No disk reclamation on removal.
        assert_eq!(store.handle().read().used(), used_before);
    }

    #[test]
    fn test_serialize_round_trip_lazy_shapes() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("main");
        let mut buf = Vec::new();
        {
            let store = TableArrayStore::create(&base).unwrap();
            let mut col = IndirectArrayColumn::create(&store, DataType::Int64, None, 4).unwrap();
            col.set_shape(1, &[2, 2]).unwrap();
            col.put(1, &iota(vec![2, 2])).unwrap();
            col.set_shape(3, &[3]).unwrap();
            col.put(3, &iota(vec![3])).unwrap();
            col.write_column(&mut buf).unwrap();
            store.flush().unwrap();
        }
        let store = TableArrayStore::attach(&base, false).unwrap();
        let mut col = IndirectArrayColumn::read_column(
            &mut Cursor::new(&buf),
            &base,
            &store,
            None,
            false,
        )
        .unwrap();
        assert_eq!(col.nrow(), 4);
        assert!(!col.is_shape_defined(0));
        assert!(col.is_shape_defined(1));
        // Shapes are lazily fetched and then cached.
        assert_eq!(col.shape(1).unwrap(), vec![2, 2]);
        assert!(col.descriptors[1].as_ref().unwrap().shape.is_some());
        assert!(col.descriptors[3].as_ref().unwrap().shape.is_none());
        assert_eq!(col.get(3).unwrap(), iota(vec![3]));
        assert!(col.get(0).is_err());
        // Sequence numbers continue past the stored ones.
        assert!(store.unique_nr() > col.seqnr());
    }

    #[test]
    fn test_corrupt_row_count_fails_cleanly() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("main");
        let store = TableArrayStore::create(&base).unwrap();
        let mut buf = Vec::new();
        stream::put_start(&mut buf, COLUMN_TAG, COLUMN_VERSION).unwrap();
        buf.write_u8(DataType::Int64.code()).unwrap();
        buf.write_u32::<LittleEndian>(1).unwrap();
        // A bogus row count with no offset entries behind it.
        buf.write_u64::<LittleEndian>(u64::MAX).unwrap();
        stream::put_end(&mut buf).unwrap();
        let err = IndirectArrayColumn::read_column(
            &mut Cursor::new(buf),
            &base,
            &store,
            None,
            false,
        )
        .unwrap_err();
        assert!(matches!(err, TableError::Io(_)));
    }

    #[test]
    fn test_string_column_put_moves_record() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        let mut col = IndirectArrayColumn::create(&store, DataType::String, None, 1).unwrap();
        col.set_shape(0, &[2]).unwrap();
        let arr = NdArray::new(
            vec![2],
            ArrayData::String(vec!["a-much-longer-name".into(), "b".into()]),
        )
        .unwrap();
        col.put(0, &arr).unwrap();
        assert_eq!(col.get(0).unwrap(), arr);
    }
}
