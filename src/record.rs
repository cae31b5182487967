/// A dense row-major matrix of `f32` features.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f32>,
}

impl Matrix {
    /// `data` is row-major and must hold exactly `rows * cols` values.
    pub fn new(rows: usize, cols: usize, data: Vec<f32>) -> Matrix {
        assert_eq!(rows * cols, data.len(), "matrix data length mismatch");
        Matrix { rows, cols, data }
    }

    #[inline(always)]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline(always)]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline(always)]
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    #[inline(always)]
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    #[inline(always)]
    pub fn get(&self, row: usize, col: usize) -> Option<f32> {
        if row < self.rows && col < self.cols {
            Some(self.data[row * self.cols + col])
        } else {
            None
        }
    }
}

/// An integer label sequence, such as a frame-level alignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntVector(Vec<i32>);

impl IntVector {
    pub fn new(values: Vec<i32>) -> IntVector {
        IntVector(values)
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[inline(always)]
    pub fn as_slice(&self) -> &[i32] {
        &self.0
    }
}

impl From<Vec<i32>> for IntVector {
    fn from(values: Vec<i32>) -> IntVector {
        IntVector(values)
    }
}

/// A composite training example: an ordered set of named feature
/// matrices (e.g. `input`, `ivector`, `output`).
#[derive(Debug, Clone, PartialEq)]
pub struct Example {
    inputs: Vec<(String, Matrix)>,
}

impl Example {
    pub fn new(inputs: Vec<(String, Matrix)>) -> Example {
        Example { inputs }
    }

    #[inline(always)]
    pub fn inputs(&self) -> &[(String, Matrix)] {
        &self.inputs
    }

    pub fn input(&self, name: &str) -> Option<&Matrix> {
        self.inputs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, m)| m)
    }
}
