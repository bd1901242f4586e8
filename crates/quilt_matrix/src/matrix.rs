use fixedbitset::FixedBitSet;

/// Square matrix filled cell by cell while bins are stitched.
///
/// A cell is either unwritten (its bin never succeeded), written without a value
/// (the oracle found no route) or written with a value.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    size: usize,
    values: Vec<Option<f64>>,
    written: FixedBitSet,
}

impl Matrix {
    pub fn new(size: usize) -> Self {
        Matrix {
            size,
            values: vec![None; size * size],
            written: FixedBitSet::with_capacity(size * size),
        }
    }

    #[inline(always)]
    fn index(&self, source: usize, destination: usize) -> usize {
        source * self.size + destination
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Writes a cell, returns `false` if it had already been written.
    pub fn set(&mut self, source: usize, destination: usize, value: Option<f64>) -> bool {
        let index = self.index(source, destination);
        let already_written = self.written.put(index);
        self.values[index] = value;
        !already_written
    }

    pub fn is_written(&self, source: usize, destination: usize) -> bool {
        self.written.contains(self.index(source, destination))
    }

    /// The stored value, `None` when the cell is unwritten or unroutable.
    pub fn get(&self, source: usize, destination: usize) -> Option<f64> {
        self.values[self.index(source, destination)]
    }

    pub fn num_written(&self) -> usize {
        self.written.count_ones(..)
    }

    pub fn is_complete(&self) -> bool {
        self.num_written() == self.size * self.size
    }

    pub fn row(&self, source: usize) -> &[Option<f64>] {
        let start = self.index(source, 0);
        &self.values[start..start + self.size]
    }

    pub fn rows(&self) -> Vec<Vec<Option<f64>>> {
        (0..self.size).map(|source| self.row(source).to_vec()).collect()
    }

    /// Fully written matrix over row-major `values` of `size * size` cells.
    pub(crate) fn from_values(size: usize, values: Vec<Option<f64>>) -> Self {
        let mut written = FixedBitSet::with_capacity(size * size);
        written.insert_range(..);
        Matrix {
            size,
            values,
            written,
        }
    }

    pub(crate) fn into_values(self) -> Vec<Option<f64>> {
        self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_tracks_written_cells() {
        let mut matrix = Matrix::new(3);
        assert!(!matrix.is_written(1, 2));

        assert!(matrix.set(1, 2, Some(42.0)));
        assert!(matrix.set(0, 0, None));
        assert!(!matrix.set(1, 2, Some(43.0)));

        assert!(matrix.is_written(0, 0));
        assert_eq!(matrix.get(0, 0), None);
        assert_eq!(matrix.get(1, 2), Some(43.0));
        assert_eq!(matrix.num_written(), 2);
        assert!(!matrix.is_complete());
    }

    #[test]
    fn test_rows() {
        let mut matrix = Matrix::new(2);
        matrix.set(0, 1, Some(1.0));
        matrix.set(1, 0, Some(2.0));

        assert_eq!(matrix.rows(), vec![vec![None, Some(1.0)], vec![Some(2.0), None]]);
    }
}
