//! Owned n-dimensional arrays with row-major layout.
//!
//! Strides follow `stride[last] = 1, stride[i] = stride[i+1] * shape[i+1]`,
//! so dimension 0 is the outermost axis for both full-rank lookup and row
//! slicing. Slices are borrowed views into the single backing buffer.

mod io;

pub use io::{IDX_MAGIC, IDX_UBYTE};

use bytemuck::Pod;
use num_traits::AsPrimitive;

use crate::error::{InferenceError, Result};

/// A shape plus a flat buffer of exactly `product(shape)` elements.
#[derive(Clone, Debug, PartialEq)]
pub struct NdArray<T> {
    shape: Vec<usize>,
    data: Vec<T>,
}

/// `product(shape)`, or `None` when it does not fit in `usize`.
pub(crate) fn element_count(shape: &[usize]) -> Option<usize> {
    shape.iter().try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
}

impl<T: Copy + Default> NdArray<T> {
    /// Zero-filled array.
    pub fn zeros(shape: &[usize]) -> Self {
        Self {
            shape: shape.to_vec(),
            data: vec![T::default(); shape.iter().product()],
        }
    }
}

impl<T> NdArray<T> {
    /// Take ownership of an already-sized buffer.
    pub fn from_vec(shape: &[usize], data: Vec<T>) -> Result<Self> {
        let expected = element_count(shape).unwrap_or(usize::MAX);
        if data.len() != expected {
            return Err(InferenceError::SizeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            shape: shape.to_vec(),
            data,
        })
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    pub fn strides(&self) -> Vec<usize> {
        let mut strides = vec![1usize; self.shape.len()];
        for i in (0..self.shape.len().saturating_sub(1)).rev() {
            strides[i] = strides[i + 1] * self.shape[i + 1];
        }
        strides
    }

    fn offset(&self, index: &[usize]) -> Result<usize> {
        if index.len() != self.shape.len() {
            return Err(InferenceError::RankMismatch {
                expected: self.shape.len(),
                actual: index.len(),
            });
        }
        let mut offset = 0;
        for ((&i, &dim), stride) in index.iter().zip(&self.shape).zip(self.strides()) {
            if i >= dim {
                return Err(InferenceError::IndexOutOfBounds {
                    index: i,
                    length: dim,
                });
            }
            offset += i * stride;
        }
        Ok(offset)
    }

    /// Full-rank lookup.
    pub fn get(&self, index: &[usize]) -> Result<&T> {
        let offset = self.offset(index)?;
        Ok(&self.data[offset])
    }

    pub fn get_mut(&mut self, index: &[usize]) -> Result<&mut T> {
        let offset = self.offset(index)?;
        Ok(&mut self.data[offset])
    }

    /// Number of entries along dimension 0.
    pub fn rows(&self) -> usize {
        self.shape.first().copied().unwrap_or(0)
    }

    /// Elements per row: `product(shape[1..])`.
    pub fn feature_count(&self) -> usize {
        self.shape.iter().skip(1).product()
    }

    /// Row `i` along dimension 0.
    pub fn row(&self, i: usize) -> Result<&[T]> {
        self.rows_range(i, 1)
    }

    /// `count` consecutive rows starting at `start`, as one contiguous view.
    pub fn rows_range(&self, start: usize, count: usize) -> Result<&[T]> {
        if self.shape.is_empty() {
            return Err(InferenceError::RankMismatch {
                expected: 1,
                actual: 0,
            });
        }
        let rows = self.rows();
        if start + count > rows {
            return Err(InferenceError::IndexOutOfBounds {
                index: start + count - 1,
                length: rows,
            });
        }
        let width = self.feature_count();
        Ok(&self.data[start * width..(start + count) * width])
    }
}

impl<T: Copy + 'static> NdArray<T> {
    /// Element-wise numeric cast into a new array of the same shape.
    pub fn cast<U>(&self) -> NdArray<U>
    where
        T: AsPrimitive<U>,
        U: Copy + 'static,
    {
        NdArray {
            shape: self.shape.clone(),
            data: self.data.iter().map(|&x| x.as_()).collect(),
        }
    }
}

impl<T: Pod> NdArray<T> {
    /// Reinterpret native-endian bytes as elements of `T`.
    pub fn from_bytes(shape: &[usize], bytes: &[u8]) -> Result<Self> {
        let count = element_count(shape).unwrap_or(usize::MAX);
        let expected = count
            .checked_mul(std::mem::size_of::<T>())
            .unwrap_or(usize::MAX);
        if bytes.len() != expected {
            return Err(InferenceError::SizeMismatch {
                expected,
                actual: bytes.len(),
            });
        }
        let mut data = vec![T::zeroed(); count];
        bytemuck::cast_slice_mut::<T, u8>(&mut data).copy_from_slice(bytes);
        Ok(Self {
            shape: shape.to_vec(),
            data,
        })
    }

    /// The backing buffer as native-endian bytes.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zeros_has_product_of_shape_elements() {
        let a = NdArray::<f64>::zeros(&[2, 3, 4]);
        assert_eq!(a.len(), 24);
        assert!(a.as_slice().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn from_vec_checks_length() {
        assert!(NdArray::from_vec(&[2, 2], vec![1, 2, 3, 4]).is_ok());
        assert!(matches!(
            NdArray::from_vec(&[2, 2], vec![1, 2, 3]),
            Err(InferenceError::SizeMismatch {
                expected: 4,
                actual: 3
            })
        ));
    }

    #[test]
    fn strides_are_row_major() {
        let a = NdArray::<u8>::zeros(&[2, 3, 4]);
        assert_eq!(a.strides(), vec![12, 4, 1]);
        assert_eq!(NdArray::<u8>::zeros(&[5]).strides(), vec![1]);
    }

    #[test]
    fn lookup_agrees_with_row_slicing() {
        let a = NdArray::from_vec(&[2, 3], (0..6).collect::<Vec<i32>>()).unwrap();
        assert_eq!(*a.get(&[0, 2]).unwrap(), 2);
        assert_eq!(*a.get(&[1, 0]).unwrap(), 3);
        assert_eq!(a.row(1).unwrap(), &[3, 4, 5]);
        assert_eq!(a.row(1).unwrap()[2], *a.get(&[1, 2]).unwrap());
    }

    #[test]
    fn lookup_rejects_wrong_rank_and_range() {
        let mut a = NdArray::<f32>::zeros(&[2, 3]);
        assert!(matches!(
            a.get(&[1]),
            Err(InferenceError::RankMismatch {
                expected: 2,
                actual: 1
            })
        ));
        assert!(matches!(
            a.get(&[2, 0]),
            Err(InferenceError::IndexOutOfBounds { index: 2, length: 2 })
        ));
        *a.get_mut(&[1, 1]).unwrap() = 7.0;
        assert_eq!(a.as_slice()[4], 7.0);
    }

    #[test]
    fn rows_range_is_contiguous() {
        let a = NdArray::from_vec(&[4, 2], (0..8).collect::<Vec<u8>>()).unwrap();
        assert_eq!(a.feature_count(), 2);
        assert_eq!(a.rows_range(1, 2).unwrap(), &[2, 3, 4, 5]);
        assert!(a.rows_range(3, 2).is_err());
    }

    #[test]
    fn one_dimensional_rows_are_single_elements() {
        let labels = NdArray::from_vec(&[3], vec![3u8, 8, 5]).unwrap();
        assert_eq!(labels.feature_count(), 1);
        assert_eq!(labels.rows_range(1, 2).unwrap(), &[8, 5]);
    }

    #[test]
    fn cast_converts_elementwise() {
        let a = NdArray::from_vec(&[3], vec![0u8, 128, 255]).unwrap();
        let b: NdArray<f64> = a.cast();
        assert_eq!(b.shape(), &[3]);
        assert_eq!(b.as_slice(), &[0.0, 128.0, 255.0]);
    }

    #[test]
    fn bytes_roundtrip() {
        let values = [1.5f64, -2.25, 1e300];
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_ne_bytes()).collect();
        let a = NdArray::<f64>::from_bytes(&[3], &bytes).unwrap();
        assert_eq!(a.as_slice(), &values);
        assert_eq!(a.as_bytes(), bytes.as_slice());
        assert!(matches!(
            NdArray::<f64>::from_bytes(&[3], &bytes[1..]),
            Err(InferenceError::SizeMismatch { .. })
        ));
    }

    #[test]
    fn overflowing_shapes_never_match_a_buffer() {
        let huge = [usize::MAX, 2];
        assert_eq!(element_count(&huge), None);
        assert!(matches!(
            NdArray::from_vec(&huge, vec![0u8; 4]),
            Err(InferenceError::SizeMismatch {
                expected: usize::MAX,
                actual: 4
            })
        ));
        assert!(matches!(
            NdArray::<f64>::from_bytes(&[usize::MAX / 4], &[0u8; 16]),
            Err(InferenceError::SizeMismatch {
                expected: usize::MAX,
                actual: 16
            })
        ));
    }
}
