//! Buffers: typed, shaped views over shared byte storage.
//!
//! A [`Buffer`] never owns its bytes. It holds an `Arc<Storage>` plus an
//! element offset, shape and strides, so several buffers may alias one
//! allocation (e.g. per-rank chunks of a larger output). Cloning a buffer
//! clones the view and shares the storage; this is how in-flight work keeps
//! the memory it touches alive.

use std::sync::{Arc, Mutex, MutexGuard};

use super::element::Element;
use crate::error::{CclError, Result};
use crate::types::DataType;

/// Where a storage allocation lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemorySpace {
    Host,
    Device,
}

/// Element layout of a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layout {
    /// Dense elements addressed through shape and strides.
    Strided,
    /// Compressed sparse representation.
    Sparse,
}

/// A shared byte allocation.
pub struct Storage {
    bytes: Mutex<Vec<u8>>,
    space: MemorySpace,
}

impl Storage {
    fn new(bytes: Vec<u8>, space: MemorySpace) -> Arc<Self> {
        Arc::new(Self {
            bytes: Mutex::new(bytes),
            space,
        })
    }

    pub fn space(&self) -> MemorySpace {
        self.space
    }

    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, Vec<u8>>> {
        self.bytes
            .lock()
            .map_err(|_| CclError::LockPoisoned("buffer storage"))
    }
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("space", &self.space)
            .finish_non_exhaustive()
    }
}

/// A typed view over [`Storage`].
#[derive(Clone)]
pub struct Buffer {
    storage: Arc<Storage>,
    dtype: DataType,
    /// Offset of the first element, in elements of `dtype`.
    offset: usize,
    shape: Vec<usize>,
    strides: Vec<usize>,
    layout: Layout,
}

fn row_major_strides(shape: &[usize]) -> Vec<usize> {
    let mut strides = vec![1; shape.len()];
    for d in (0..shape.len().saturating_sub(1)).rev() {
        strides[d] = strides[d + 1] * shape[d + 1];
    }
    strides
}

impl Buffer {
    /// Zero-filled host buffer.
    pub fn zeros(dtype: DataType, shape: &[usize]) -> Self {
        let numel: usize = shape.iter().product();
        Self {
            storage: Storage::new(vec![0; numel * dtype.size_in_bytes()], MemorySpace::Host),
            dtype,
            offset: 0,
            shape: shape.to_vec(),
            strides: row_major_strides(shape),
            layout: Layout::Strided,
        }
    }

    /// Zero-length 1-D host buffer.
    pub fn empty(dtype: DataType) -> Self {
        Self::zeros(dtype, &[0])
    }

    /// 1-D host buffer holding `data`.
    pub fn from_vec<T: Element>(data: Vec<T>) -> Self {
        let size = T::DTYPE.size_in_bytes();
        let mut bytes = vec![0u8; data.len() * size];
        for (chunk, v) in bytes.chunks_exact_mut(size).zip(&data) {
            v.write_le(chunk);
        }
        Self {
            storage: Storage::new(bytes, MemorySpace::Host),
            dtype: T::DTYPE,
            offset: 0,
            shape: vec![data.len()],
            strides: vec![1],
            layout: Layout::Strided,
        }
    }

    /// Host buffer holding `data` with the given row-major shape.
    pub fn from_vec_shaped<T: Element>(data: Vec<T>, shape: &[usize]) -> Result<Self> {
        Self::from_vec(data).reshape(shape)
    }

    pub fn dtype(&self) -> DataType {
        self.dtype
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    /// Offset of the first element within the storage, in elements.
    pub fn storage_offset(&self) -> usize {
        self.offset
    }

    pub fn numel(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn len_bytes(&self) -> usize {
        self.numel() * self.dtype.size_in_bytes()
    }

    /// Extent of dimension 0, `None` for a 0-dimensional buffer.
    pub fn leading_dim(&self) -> Option<usize> {
        self.shape.first().copied()
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn is_sparse(&self) -> bool {
        self.layout == Layout::Sparse
    }

    pub fn space(&self) -> MemorySpace {
        self.storage.space()
    }

    /// Whether elements are laid out row-major without gaps.
    pub fn is_contiguous(&self) -> bool {
        if self.numel() == 0 {
            return true;
        }
        let mut expected = 1;
        for (&extent, &stride) in self.shape.iter().zip(&self.strides).rev() {
            if extent == 1 {
                continue;
            }
            if stride != expected {
                return false;
            }
            expected *= extent;
        }
        true
    }

    /// Whether both buffers view the same storage allocation.
    pub fn aliases(&self, other: &Buffer) -> bool {
        Arc::ptr_eq(&self.storage, &other.storage)
    }

    /// Same elements, new row-major shape. Requires a contiguous buffer.
    pub fn reshape(&self, shape: &[usize]) -> Result<Self> {
        let numel: usize = shape.iter().product();
        if numel != self.numel() {
            return Err(CclError::view(format!(
                "cannot reshape {} elements into {shape:?}",
                self.numel()
            )));
        }
        if !self.is_contiguous() {
            return Err(CclError::NonContiguous { what: "reshape source" });
        }
        Ok(Self {
            shape: shape.to_vec(),
            strides: row_major_strides(shape),
            ..self.clone()
        })
    }

    /// View of rows `start..start + len` along dimension 0.
    pub fn narrow(&self, start: usize, len: usize) -> Result<Self> {
        let extent = self
            .leading_dim()
            .ok_or_else(|| CclError::view("cannot narrow a 0-dimensional buffer"))?;
        if start + len > extent {
            return Err(CclError::view(format!(
                "rows {start}..{} exceed dim 0 extent {extent}",
                start + len
            )));
        }
        let mut shape = self.shape.clone();
        shape[0] = len;
        Ok(Self {
            offset: self.offset + start * self.strides[0],
            shape,
            ..self.clone()
        })
    }

    /// Split dimension 0 into `parts` equal views of the same storage.
    pub fn chunk(&self, parts: usize) -> Result<Vec<Self>> {
        let extent = self
            .leading_dim()
            .ok_or_else(|| CclError::view("cannot chunk a 0-dimensional buffer"))?;
        if parts == 0 || extent % parts != 0 {
            return Err(CclError::IndivisibleCount {
                extent,
                group_size: parts as u32,
            });
        }
        let rows = extent / parts;
        (0..parts).map(|i| self.narrow(i * rows, rows)).collect()
    }

    /// Swap the two dimensions of a 2-D buffer without moving data.
    pub fn transpose(&self) -> Result<Self> {
        if self.shape.len() != 2 {
            return Err(CclError::view(format!(
                "transpose needs 2 dimensions, got {}",
                self.shape.len()
            )));
        }
        Ok(Self {
            shape: vec![self.shape[1], self.shape[0]],
            strides: vec![self.strides[1], self.strides[0]],
            ..self.clone()
        })
    }

    /// 1-D view of `len` elements of the same storage, starting at this
    /// buffer's first element.
    pub fn flat_span(&self, len: usize) -> Result<Self> {
        let span = Self {
            shape: vec![len],
            strides: vec![1],
            ..self.clone()
        };
        span.check_bounds()?;
        Ok(span)
    }

    /// Copy of this buffer in device memory.
    pub fn to_device(&self) -> Result<Self> {
        let bytes = self.read_bytes()?;
        Ok(Self {
            storage: Storage::new(bytes, MemorySpace::Device),
            offset: 0,
            strides: row_major_strides(&self.shape),
            ..self.clone()
        })
    }

    /// The same elements tagged with a sparse layout.
    pub fn to_sparse(&self) -> Self {
        Self {
            layout: Layout::Sparse,
            ..self.clone()
        }
    }

    /// Read every element as `T`, honoring strides.
    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>> {
        if T::DTYPE != self.dtype {
            return Err(CclError::DTypeMismatch {
                operation: "to_vec",
                expected: self.dtype,
                actual: T::DTYPE,
            });
        }
        let size = self.dtype.size_in_bytes();
        let offsets = self.element_offsets();
        let bytes = self.storage.lock()?;
        offsets
            .into_iter()
            .map(|off| {
                bytes
                    .get(off * size..(off + 1) * size)
                    .map(T::read_le)
                    .ok_or_else(|| CclError::view("element outside storage"))
            })
            .collect()
    }

    /// Copy out the bytes of a contiguous buffer.
    pub fn read_bytes(&self) -> Result<Vec<u8>> {
        let range = self.byte_range()?;
        let bytes = self.storage.lock()?;
        Ok(bytes[range].to_vec())
    }

    /// Overwrite the bytes of a contiguous buffer.
    pub fn write_bytes(&self, data: &[u8]) -> Result<()> {
        let range = self.byte_range()?;
        if data.len() != range.len() {
            return Err(CclError::view(format!(
                "write of {} bytes into a {}-byte buffer",
                data.len(),
                range.len()
            )));
        }
        let mut bytes = self.storage.lock()?;
        bytes[range].copy_from_slice(data);
        Ok(())
    }

    /// Copy `src` element-for-element into this buffer.
    pub fn copy_from(&self, src: &Buffer) -> Result<()> {
        if src.dtype != self.dtype {
            return Err(CclError::DTypeMismatch {
                operation: "copy",
                expected: self.dtype,
                actual: src.dtype,
            });
        }
        if src.numel() != self.numel() {
            return Err(CclError::view(format!(
                "copy of {} elements into {}",
                src.numel(),
                self.numel()
            )));
        }
        let data = src.read_bytes()?;
        self.write_bytes(&data)
    }

    fn byte_range(&self) -> Result<std::ops::Range<usize>> {
        if !self.is_contiguous() {
            return Err(CclError::NonContiguous { what: "buffer" });
        }
        self.check_bounds()
    }

    fn check_bounds(&self) -> Result<std::ops::Range<usize>> {
        let size = self.dtype.size_in_bytes();
        let start = self.offset * size;
        let end = start + self.numel() * size;
        let available = self.storage.lock()?.len();
        if end > available {
            return Err(CclError::view(format!(
                "bytes {start}..{end} exceed storage of {available} bytes"
            )));
        }
        Ok(start..end)
    }

    /// Storage element index of every element, in row-major order.
    fn element_offsets(&self) -> Vec<usize> {
        let mut out = Vec::with_capacity(self.numel());
        if self.numel() == 0 {
            return out;
        }
        let mut idx = vec![0usize; self.shape.len()];
        loop {
            let off: usize = idx.iter().zip(&self.strides).map(|(i, s)| i * s).sum();
            out.push(self.offset + off);

            let mut d = self.shape.len();
            loop {
                if d == 0 {
                    return out;
                }
                d -= 1;
                idx[d] += 1;
                if idx[d] < self.shape[d] {
                    break;
                }
                idx[d] = 0;
            }
        }
    }
}

impl std::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("dtype", &self.dtype)
            .field("offset", &self.offset)
            .field("shape", &self.shape)
            .field("strides", &self.strides)
            .field("layout", &self.layout)
            .field("space", &self.storage.space)
            .finish()
    }
}

impl std::fmt::Display for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Buffer({}{:?}@{})", self.dtype, self.shape, self.offset)
    }
}
