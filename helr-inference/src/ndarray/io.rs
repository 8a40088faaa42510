//! File loaders: raw native-endian dumps and the big-endian IDX format.
//!
//! IDX layout: `u16` magic (zero), `u8` element type, `u8` dimension count,
//! one big-endian `u32` per dimension, then the row-major payload.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use bytemuck::Pod;
use log::debug;

use super::{element_count, NdArray};
use crate::error::{InferenceError, Result};

/// Required value of the two leading header bytes.
pub const IDX_MAGIC: u16 = 0x0000;

/// Element-type code for unsigned bytes, the only one supported.
pub const IDX_UBYTE: u8 = 0x08;

const IDX_PREAMBLE: usize = 4;

/// Read exactly `len` bytes, reporting how many were available on shortfall.
fn read_exact_counted<R: Read>(reader: R, len: usize) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(len);
    reader.take(len as u64).read_to_end(&mut buf)?;
    if buf.len() < len {
        return Err(InferenceError::TruncatedRead {
            expected: len,
            actual: buf.len(),
        });
    }
    Ok(buf)
}

impl<T: Pod> NdArray<T> {
    /// Load `product(shape)` elements of `T` from a headerless file.
    /// Trailing bytes beyond the requested shape are ignored.
    pub fn load_raw(path: impl AsRef<Path>, shape: &[usize]) -> Result<Self> {
        let path = path.as_ref();
        let len = element_count(shape)
            .and_then(|count| count.checked_mul(std::mem::size_of::<T>()))
            .ok_or_else(|| {
                InferenceError::InvalidConfig(format!("shape {:?} is too large to load", shape))
            })?;
        let bytes = read_exact_counted(File::open(path)?, len)?;
        debug!("loaded {} raw bytes from {}", len, path.display());
        Self::from_bytes(shape, &bytes)
    }

    /// Write the backing buffer as a headerless native-endian dump.
    pub fn save_raw(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.as_bytes())?;
        Ok(())
    }
}

impl NdArray<u8> {
    /// Parse an in-memory IDX file.
    pub fn parse_idx(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < IDX_PREAMBLE {
            return Err(InferenceError::TruncatedRead {
                expected: IDX_PREAMBLE,
                actual: bytes.len(),
            });
        }
        let magic = u16::from_be_bytes([bytes[0], bytes[1]]);
        if magic != IDX_MAGIC {
            return Err(InferenceError::BadMagic(magic));
        }
        if bytes[2] != IDX_UBYTE {
            return Err(InferenceError::UnsupportedElementType(bytes[2]));
        }
        let dims = bytes[3] as usize;
        let header = IDX_PREAMBLE + 4 * dims;
        if bytes.len() < header {
            return Err(InferenceError::TruncatedRead {
                expected: header,
                actual: bytes.len(),
            });
        }
        let shape: Vec<usize> = bytes[IDX_PREAMBLE..header]
            .chunks_exact(4)
            .map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]]) as usize)
            .collect();
        let count = element_count(&shape).unwrap_or(usize::MAX);
        let payload = &bytes[header..];
        if payload.len() < count {
            return Err(InferenceError::TruncatedRead {
                expected: header.saturating_add(count),
                actual: bytes.len(),
            });
        }
        Self::from_vec(&shape, payload[..count].to_vec())
    }

    /// Load an IDX file from disk.
    pub fn load_idx(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let array = Self::parse_idx(&bytes)?;
        debug!("loaded IDX array {:?} from {}", array.shape(), path.display());
        Ok(array)
    }

    /// Serialise into the IDX format.
    pub fn to_idx_bytes(&self) -> Result<Vec<u8>> {
        let dims = u8::try_from(self.shape().len()).map_err(|_| {
            InferenceError::InvalidConfig(format!(
                "IDX supports at most 255 dimensions, array has {}",
                self.shape().len()
            ))
        })?;
        let mut out = Vec::with_capacity(IDX_PREAMBLE + 4 * dims as usize + self.len());
        out.extend_from_slice(&IDX_MAGIC.to_be_bytes());
        out.push(IDX_UBYTE);
        out.push(dims);
        for &dim in self.shape() {
            let dim = u32::try_from(dim).map_err(|_| {
                InferenceError::InvalidConfig(format!("dimension {} does not fit in u32", dim))
            })?;
            out.extend_from_slice(&dim.to_be_bytes());
        }
        out.extend_from_slice(self.as_slice());
        Ok(out)
    }

    pub fn save_idx(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_idx_bytes()?)?;
        Ok(())
    }
}
