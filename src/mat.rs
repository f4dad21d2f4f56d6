use std::io::{self, Write};
use std::ops::{Index, IndexMut, SubAssign};

/// Dense row-major matrix of doubles.
#[derive(Debug, Clone, PartialEq)]
pub struct Mat {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Mat {
    pub fn zeros(rows: usize, cols: usize) -> Mat {
        Mat::filled(rows, cols, 0.0)
    }

    pub fn filled(rows: usize, cols: usize, value: f64) -> Mat {
        Mat {
            rows,
            cols,
            data: vec![value; rows * cols],
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// Smallest entry; +inf for an empty matrix.
    pub fn min(&self) -> f64 {
        self.data.iter().copied().fold(f64::INFINITY, f64::min)
    }

    /// Largest entry; -inf for an empty matrix.
    pub fn max(&self) -> f64 {
        self.data.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    pub fn fill_diagonal(&mut self, value: f64) {
        for i in 0..self.rows.min(self.cols) {
            self.data[i * self.cols + i] = value;
        }
    }

    pub fn scale(&mut self, factor: f64) {
        for value in &mut self.data {
            *value *= factor;
        }
    }

    pub fn shift(&mut self, offset: f64) {
        for value in &mut self.data {
            *value += offset;
        }
    }

    pub fn map_inplace<F: Fn(f64) -> f64>(&mut self, f: F) {
        for value in &mut self.data {
            *value = f(*value);
        }
    }

    /// Adds `value` at (i, j) and mirrors the result to (j, i).
    pub fn add_sym(&mut self, i: usize, j: usize, value: f64) {
        let updated = self[(i, j)] + value;
        self[(i, j)] = updated;
        self[(j, i)] = updated;
    }

    /// Serializes the contents as row-major little-endian doubles.
    pub fn write_binary<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        for value in &self.data {
            writer.write_all(&value.to_le_bytes())?;
        }
        Ok(())
    }
}

impl Index<(usize, usize)> for Mat {
    type Output = f64;

    fn index(&self, (i, j): (usize, usize)) -> &f64 {
        &self.data[i * self.cols + j]
    }
}

impl IndexMut<(usize, usize)> for Mat {
    fn index_mut(&mut self, (i, j): (usize, usize)) -> &mut f64 {
        &mut self.data[i * self.cols + j]
    }
}

impl SubAssign<&Mat> for Mat {
    fn sub_assign(&mut self, other: &Mat) {
        assert_eq!((self.rows, self.cols), (other.rows, other.cols));
        for (a, b) in self.data.iter_mut().zip(&other.data) {
            *a -= b;
        }
    }
}
