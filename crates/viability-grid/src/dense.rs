//! Dense N-dimensional arrays indexed by bin tuples.

use serde::{Deserialize, Serialize};

use crate::error::{GridError, Result};

/// A dense row-major N-dimensional array with an explicit shape.
///
/// All Q/S arrays in the toolkit are `DenseGrid`s whose shape is derived
/// from grid axis lengths, so a multi-index is always a tuple of bin
/// indices, one per axis (last axis varies fastest).
///
/// # Example
///
/// ```
/// use viability_grid::DenseGrid;
///
/// let mut q: DenseGrid<bool> = DenseGrid::from_elem(&[3, 4], false);
/// q.set(&[1, 2], true);
///
/// assert_eq!(q.get(&[1, 2]), &true);
/// assert_eq!(q.get(&[0, 0]), &false);
/// assert_eq!(q.len(), 12);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DenseGrid<T> {
    shape: Vec<usize>,
    data: Vec<T>,
}

impl<T: Clone> DenseGrid<T> {
    /// Creates an array of the given shape filled with `value`.
    ///
    /// # Panics
    ///
    /// Panics if the shape has a zero-length dimension.
    #[must_use]
    pub fn from_elem(shape: &[usize], value: T) -> Self {
        let len = checked_len(shape);
        Self {
            shape: shape.to_vec(),
            data: vec![value; len],
        }
    }
}

impl<T> DenseGrid<T> {
    /// Creates an array from a flat row-major data vector.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::ShapeMismatch`] if `data.len()` is not the
    /// product of `shape`.
    pub fn from_vec(shape: &[usize], data: Vec<T>) -> Result<Self> {
        let expected = shape.iter().product::<usize>();
        if data.len() != expected {
            return Err(GridError::ShapeMismatch {
                shape: shape.to_vec(),
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            shape: shape.to_vec(),
            data,
        })
    }

    /// The array shape (axis lengths).
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Number of dimensions.
    #[must_use]
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Total number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the array holds no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Converts a multi-index to a flat row-major offset.
    ///
    /// # Panics
    ///
    /// Panics if `index` has the wrong arity or any component is out of
    /// bounds for its axis.
    #[must_use]
    pub fn flat_index(&self, index: &[usize]) -> usize {
        assert_eq!(
            index.len(),
            self.shape.len(),
            "index arity does not match array dimensionality"
        );
        let mut flat = 0;
        for (dim, (&i, &n)) in index.iter().zip(self.shape.iter()).enumerate() {
            assert!(i < n, "index {i} out of bounds for axis {dim} (len {n})");
            flat = flat * n + i;
        }
        flat
    }

    /// Converts a flat offset back to a multi-index.
    ///
    /// # Panics
    ///
    /// Panics if `flat >= len()`.
    #[must_use]
    pub fn multi_index(&self, flat: usize) -> Vec<usize> {
        assert!(flat < self.data.len(), "flat index out of bounds");
        let mut index = vec![0; self.shape.len()];
        let mut rem = flat;
        for dim in (0..self.shape.len()).rev() {
            index[dim] = rem % self.shape[dim];
            rem /= self.shape[dim];
        }
        index
    }

    /// Reference to the element at a multi-index.
    ///
    /// # Panics
    ///
    /// Panics on arity mismatch or out-of-bounds components.
    #[must_use]
    pub fn get(&self, index: &[usize]) -> &T {
        &self.data[self.flat_index(index)]
    }

    /// Reference to the element at a flat offset.
    ///
    /// # Panics
    ///
    /// Panics if `flat >= len()`.
    #[must_use]
    pub fn get_flat(&self, flat: usize) -> &T {
        &self.data[flat]
    }

    /// Writes the element at a multi-index.
    ///
    /// # Panics
    ///
    /// Panics on arity mismatch or out-of-bounds components.
    pub fn set(&mut self, index: &[usize], value: T) {
        let flat = self.flat_index(index);
        self.data[flat] = value;
    }

    /// Writes the element at a flat offset.
    ///
    /// # Panics
    ///
    /// Panics if `flat >= len()`.
    pub fn set_flat(&mut self, flat: usize, value: T) {
        self.data[flat] = value;
    }

    /// Flat row-major view of the data.
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Iterator over elements in row-major order.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.data.iter()
    }

    /// Iterator over `(multi_index, element)` pairs in row-major order.
    pub fn iter_indexed(&self) -> impl Iterator<Item = (Vec<usize>, &T)> {
        self.data
            .iter()
            .enumerate()
            .map(|(flat, value)| (self.multi_index(flat), value))
    }

    /// Elementwise map into a new array of the same shape.
    #[must_use]
    pub fn map<U, F: FnMut(&T) -> U>(&self, f: F) -> DenseGrid<U> {
        DenseGrid {
            shape: self.shape.clone(),
            data: self.data.iter().map(f).collect(),
        }
    }
}

impl DenseGrid<bool> {
    /// Number of `true` elements.
    #[must_use]
    pub fn count_true(&self) -> usize {
        self.data.iter().filter(|&&v| v).count()
    }

    /// Returns `true` if any element is `true`.
    #[must_use]
    pub fn any(&self) -> bool {
        self.data.iter().any(|&v| v)
    }

    /// Set inclusion: every `true` cell of `self` is `true` in `other`.
    ///
    /// # Panics
    ///
    /// Panics if the shapes differ.
    #[must_use]
    pub fn is_subset_of(&self, other: &Self) -> bool {
        assert_eq!(self.shape, other.shape, "shape mismatch in set comparison");
        self.data
            .iter()
            .zip(other.data.iter())
            .all(|(&a, &b)| !a || b)
    }
}

fn checked_len(shape: &[usize]) -> usize {
    assert!(
        shape.iter().all(|&n| n > 0),
        "array shape must have no zero-length dimension"
    );
    shape.iter().product()
}
