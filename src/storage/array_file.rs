//! Array payload file with memory mapping
//!
//! One [`ArrayFile`] holds the raw payloads of indirect array cells. Each
//! payload record is the array shape followed by its elements; records are
//! only ever appended, never reclaimed, so a record offset stays valid for
//! the life of the file. Offset 0 is inside the header and therefore free
//! to mean "no record".

use super::{HEADER_SIZE, MAGIC, VERSION_MAJOR, VERSION_MINOR};
use crate::data::{ArrayData, DataType, NdArray, Slice};
use crate::{Result, TableError};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use memmap2::{Mmap, MmapMut, MmapOptions};
use std::fs::{File, OpenOptions};
use std::io::Cursor;
use std::path::{Path, PathBuf};

/// Payload file header
#[derive(Debug, Clone)]
pub struct ArrayFileHeader {
    /// Magic bytes "ARTBARRF"
    pub magic: [u8; 8],
    /// Major version
    pub version_major: u16,
    /// Minor version
    pub version_minor: u16,
    /// High-water mark: bytes in use, header included
    pub used: u64,
    /// Creation timestamp (Unix timestamp)
    pub created_at: i64,
    /// Last modified timestamp
    pub modified_at: i64,
    /// Header checksum
    pub checksum: u32,
}

impl ArrayFileHeader {
    fn new() -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            magic: *MAGIC,
            version_major: VERSION_MAJOR,
            version_minor: VERSION_MINOR,
            used: HEADER_SIZE as u64,
            created_at: now,
            modified_at: now,
            checksum: 0,
        }
    }

    fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_SIZE);
        buf.extend_from_slice(&self.magic);
        buf.extend_from_slice(&self.version_major.to_le_bytes());
        buf.extend_from_slice(&self.version_minor.to_le_bytes());
        buf.extend_from_slice(&self.used.to_le_bytes());
        buf.extend_from_slice(&self.created_at.to_le_bytes());
        buf.extend_from_slice(&self.modified_at.to_le_bytes());
        let checksum = crc32fast::hash(&buf);
        buf.extend_from_slice(&checksum.to_le_bytes());
        buf.resize(HEADER_SIZE, 0);
        buf
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(TableError::InvalidFileFormat);
        }
        let mut cursor = Cursor::new(bytes);
        let mut magic = [0u8; 8];
        std::io::Read::read_exact(&mut cursor, &mut magic)?;
        if &magic != MAGIC {
            return Err(TableError::InvalidFileFormat);
        }
        let version_major = cursor.read_u16::<LittleEndian>()?;
        let version_minor = cursor.read_u16::<LittleEndian>()?;
        let used = cursor.read_u64::<LittleEndian>()?;
        let created_at = cursor.read_i64::<LittleEndian>()?;
        let modified_at = cursor.read_i64::<LittleEndian>()?;
        let checksum = cursor.read_u32::<LittleEndian>()?;
        let computed = crc32fast::hash(&bytes[..cursor.position() as usize - 4]);
        if computed != checksum {
            return Err(TableError::ChecksumMismatch);
        }
        if version_major > VERSION_MAJOR {
            return Err(TableError::VersionMismatch {
                expected: VERSION_MAJOR as u32,
                actual: version_major as u32,
            });
        }
        Ok(Self {
            magic,
            version_major,
            version_minor,
            used,
            created_at,
            modified_at,
            checksum,
        })
    }

    fn touch(&mut self) {
        self.modified_at = chrono::Utc::now().timestamp();
    }
}

#[derive(Debug)]
enum Map {
    ReadOnly(Mmap),
    ReadWrite(MmapMut),
    Unmapped,
}

/// Mapped append-style payload file
#[derive(Debug)]
pub struct ArrayFile {
    file: File,
    map: Map,
    header: ArrayFileHeader,
    writable: bool,
    path: PathBuf,
}

impl ArrayFile {
    /// Create a new payload file, truncating an existing one
    pub fn create(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        // Header plus initial payload room.
        file.set_len((HEADER_SIZE * 2) as u64)?;
        let mut af = Self {
            file,
            map: Map::Unmapped,
            header: ArrayFileHeader::new(),
            writable: true,
            path: path.to_path_buf(),
        };
        af.remap()?;
        af.write_header()?;
        log::debug!("created array file {}", af.path.display());
        Ok(af)
    }

    /// Open an existing payload file
    pub fn open(path: &Path, writable: bool) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(writable).open(path)?;
        let mut af = Self {
            file,
            map: Map::Unmapped,
            header: ArrayFileHeader::new(),
            writable,
            path: path.to_path_buf(),
        };
        af.remap()?;
        af.header = ArrayFileHeader::from_bytes(af.bytes())?;
        Ok(af)
    }

    /// Upgrade a read-only attach to read-write
    pub fn reopen_rw(&mut self) -> Result<()> {
        if self.writable {
            return Ok(());
        }
        self.map = Map::Unmapped;
        self.file = OpenOptions::new().read(true).write(true).open(&self.path)?;
        self.writable = true;
        self.remap()?;
        log::debug!("reopened {} read-write", self.path.display());
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    /// Bytes in use, header included
    pub fn used(&self) -> u64 {
        self.header.used
    }

    fn bytes(&self) -> &[u8] {
        match &self.map {
            Map::ReadOnly(m) => m,
            Map::ReadWrite(m) => m,
            Map::Unmapped => &[],
        }
    }

    fn remap(&mut self) -> Result<()> {
        self.map = Map::Unmapped;
        self.map = if self.writable {
            Map::ReadWrite(unsafe { MmapOptions::new().map_mut(&self.file)? })
        } else {
            Map::ReadOnly(unsafe { MmapOptions::new().map(&self.file)? })
        };
        Ok(())
    }

    fn write_header(&mut self) -> Result<()> {
        let bytes = self.header.to_bytes();
        match &mut self.map {
            Map::ReadWrite(m) => {
                m[..HEADER_SIZE].copy_from_slice(&bytes);
                Ok(())
            }
            _ => Err(TableError::NotWritable(self.path.display().to_string())),
        }
    }

    /// Grow the mapped file so `required` bytes fit
    fn ensure_capacity(&mut self, required: u64) -> Result<()> {
        let current = self.file.metadata()?.len();
        if required <= current {
            return Ok(());
        }
        // Double the file size or use the required size, whichever is larger.
        let new_size = required.max(current * 2);
        if let Map::ReadWrite(m) = &self.map {
            m.flush()?;
        }
        self.map = Map::Unmapped;
        self.file.set_len(new_size)?;
        self.remap()
    }

    /// Read raw bytes at an offset
    fn read_bytes(&self, offset: u64, len: usize) -> Result<&[u8]> {
        let start = offset as usize;
        let end = start + len;
        let bytes = self.bytes();
        if end > bytes.len() {
            return Err(TableError::InvalidFileFormat);
        }
        Ok(&bytes[start..end])
    }

    /// Write raw bytes at an offset already inside the used region
    fn write_bytes(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        let start = offset as usize;
        let end = start + data.len();
        match &mut self.map {
            Map::ReadWrite(m) => {
                if end > m.len() {
                    return Err(TableError::InvalidFileFormat);
                }
                m[start..end].copy_from_slice(data);
                Ok(())
            }
            _ => Err(TableError::NotWritable(self.path.display().to_string())),
        }
    }

    /// Append raw bytes, returning their offset
    fn append(&mut self, data: &[u8]) -> Result<u64> {
        if !self.writable {
            return Err(TableError::NotWritable(self.path.display().to_string()));
        }
        let offset = self.header.used;
        self.ensure_capacity(offset + data.len() as u64)?;
        self.write_bytes(offset, data)?;
        self.header.used = offset + data.len() as u64;
        self.header.touch();
        Ok(offset)
    }

    /// Flush the header and mapped data to disk
    pub fn flush(&mut self) -> Result<()> {
        if self.writable {
            self.write_header()?;
            if let Map::ReadWrite(m) = &self.map {
                m.flush()?;
            }
        }
        Ok(())
    }

    // ---- payload records -------------------------------------------------

    /// Append a record holding `shape` with default-filled elements
    pub fn append_empty_record(&mut self, shape: &[usize], dtype: DataType) -> Result<u64> {
        let arr = NdArray::filled(shape.to_vec(), dtype);
        self.append_record(&arr)
    }

    /// Append a full shape-plus-elements record, returning its offset
    pub fn append_record(&mut self, arr: &NdArray) -> Result<u64> {
        let mut buf = Vec::new();
        encode_shape(&mut buf, arr.shape())?;
        encode_elements(&mut buf, arr.data())?;
        self.append(&buf)
    }

    /// Read the shape stored at a record offset
    pub fn read_shape(&self, offset: u64) -> Result<Vec<usize>> {
        let ndim_bytes = self.read_bytes(offset, 4)?;
        let ndim = u32::from_le_bytes(ndim_bytes.try_into().unwrap()) as usize;
        let extents = self.read_bytes(offset + 4, ndim * 8)?;
        let mut cursor = Cursor::new(extents);
        let mut shape = Vec::with_capacity(ndim);
        for _ in 0..ndim {
            shape.push(cursor.read_u64::<LittleEndian>()? as usize);
        }
        Ok(shape)
    }

    /// Read the full array stored at a record offset
    pub fn read_array(&self, offset: u64, dtype: DataType) -> Result<NdArray> {
        let shape = self.read_shape(offset)?;
        let n: usize = shape.iter().product();
        let data_off = offset + shape_header_len(shape.len());
        let data = match dtype.fixed_size() {
            Some(size) => {
                let raw = self.read_bytes(data_off, n * size)?;
                decode_fixed_elements(raw, dtype, n)?
            }
            None => {
                if data_off > self.header.used {
                    return Err(TableError::InvalidFileFormat);
                }
                let raw = &self.bytes()[data_off as usize..self.header.used as usize];
                decode_string_elements(raw, n)?
            }
        };
        NdArray::new(shape, data)
    }

    /// Read a rectangular sub-array without reading the whole record.
    ///
    /// Fixed-stride element types seek directly to each contiguous run;
    /// string elements have no fixed stride, so the whole record is read
    /// and sliced in memory.
    pub fn read_slice(&self, offset: u64, dtype: DataType, slice: &Slice) -> Result<NdArray> {
        let size = match dtype.fixed_size() {
            Some(size) => size,
            None => return self.read_array(offset, dtype)?.slice(slice),
        };
        let shape = self.read_shape(offset)?;
        slice.check(&shape)?;
        let data_off = offset + shape_header_len(shape.len());
        let (runs, run_len) = region_runs(&shape, slice);
        let mut out = Vec::new();
        for run in runs {
            let raw = self.read_bytes(data_off + (run * size) as u64, run_len * size)?;
            out.extend_from_slice(raw);
        }
        let total = out.len() / size;
        NdArray::new(slice.length.clone(), decode_fixed_elements(&out, dtype, total)?)
    }

    /// Overwrite the elements of the record at `offset` in place.
    ///
    /// Only valid for fixed-stride element types whose stored shape equals
    /// the array's shape; callers append a fresh record otherwise.
    pub fn write_array_in_place(&mut self, offset: u64, arr: &NdArray) -> Result<()> {
        let shape = self.read_shape(offset)?;
        if shape != arr.shape() {
            return Err(TableError::ShapeMismatch {
                given: arr.shape().to_vec(),
                defined: shape,
            });
        }
        let mut buf = Vec::new();
        encode_elements(&mut buf, arr.data())?;
        self.write_bytes(offset + shape_header_len(arr.ndim()), &buf)?;
        self.header.touch();
        Ok(())
    }

    /// Overwrite a rectangular part of the record at `offset` in place
    pub fn write_slice_in_place(
        &mut self,
        offset: u64,
        slice: &Slice,
        values: &NdArray,
    ) -> Result<()> {
        let size = match values.data_type().fixed_size() {
            Some(size) => size,
            None => {
                return Err(TableError::ExprError(
                    "sliced writes of string arrays must rewrite the full array".into(),
                ))
            }
        };
        let shape = self.read_shape(offset)?;
        if values.shape() != slice.length.as_slice() {
            return Err(TableError::ShapeMismatch {
                given: values.shape().to_vec(),
                defined: slice.length.clone(),
            });
        }
        slice.check(&shape)?;
        let data_off = offset + shape_header_len(shape.len());
        let (runs, run_len) = region_runs(&shape, slice);
        let mut buf = Vec::new();
        encode_elements(&mut buf, values.data())?;
        for (i, run) in runs.into_iter().enumerate() {
            let src = &buf[i * run_len * size..(i + 1) * run_len * size];
            self.write_bytes(data_off + (run * size) as u64, src)?;
        }
        self.header.touch();
        Ok(())
    }
}

impl Drop for ArrayFile {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

/// Bytes occupied by a record's shape header
fn shape_header_len(ndim: usize) -> u64 {
    4 + 8 * ndim as u64
}

fn encode_shape(buf: &mut Vec<u8>, shape: &[usize]) -> Result<()> {
    buf.write_u32::<LittleEndian>(shape.len() as u32)?;
    for &extent in shape {
        buf.write_u64::<LittleEndian>(extent as u64)?;
    }
    Ok(())
}

fn encode_elements(buf: &mut Vec<u8>, data: &ArrayData) -> Result<()> {
    match data {
        ArrayData::Bool(v) => {
            for &b in v {
                buf.write_u8(b as u8)?;
            }
        }
        ArrayData::Int64(v) => {
            for &i in v {
                buf.write_i64::<LittleEndian>(i)?;
            }
        }
        ArrayData::Float64(v) => {
            for &f in v {
                buf.write_f64::<LittleEndian>(f)?;
            }
        }
        ArrayData::String(v) => {
            for s in v {
                buf.write_u32::<LittleEndian>(s.len() as u32)?;
                buf.extend_from_slice(s.as_bytes());
            }
        }
    }
    Ok(())
}

fn decode_fixed_elements(raw: &[u8], dtype: DataType, n: usize) -> Result<ArrayData> {
    let mut cursor = Cursor::new(raw);
    Ok(match dtype {
        DataType::Bool => {
            let mut v = Vec::with_capacity(n);
            for _ in 0..n {
                v.push(cursor.read_u8()? != 0);
            }
            ArrayData::Bool(v)
        }
        DataType::Int64 => {
            let mut v = Vec::with_capacity(n);
            for _ in 0..n {
                v.push(cursor.read_i64::<LittleEndian>()?);
            }
            ArrayData::Int64(v)
        }
        DataType::Float64 => {
            let mut v = Vec::with_capacity(n);
            for _ in 0..n {
                v.push(cursor.read_f64::<LittleEndian>()?);
            }
            ArrayData::Float64(v)
        }
        DataType::String => return Err(TableError::InvalidFileFormat),
    })
}

fn decode_string_elements(raw: &[u8], n: usize) -> Result<ArrayData> {
    let mut cursor = Cursor::new(raw);
    let mut v = Vec::with_capacity(n);
    for _ in 0..n {
        let len = cursor.read_u32::<LittleEndian>()? as usize;
        let pos = cursor.position() as usize;
        let bytes = raw.get(pos..pos + len).ok_or(TableError::InvalidFileFormat)?;
        v.push(String::from_utf8_lossy(bytes).into_owned());
        cursor.set_position((pos + len) as u64);
    }
    Ok(ArrayData::String(v))
}

/// Contiguous runs of a slice region over a row-major shape.
///
/// Mirrors the in-memory region walk in `data::array`; here the offsets
/// index elements inside the stored record.
fn region_runs(shape: &[usize], slice: &Slice) -> (Vec<usize>, usize) {
    if shape.is_empty() {
        return (vec![0], 1);
    }
    let mut strides = vec![1usize; shape.len()];
    for axis in (0..shape.len() - 1).rev() {
        strides[axis] = strides[axis + 1] * shape[axis + 1];
    }
    let inner = shape.len() - 1;
    let run_len = slice.length[inner];
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
