use onnxruntime::ndarray::{Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

/// Dense `(batch, vocab)` SPLADE output, one row per input text in input order.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseEmbeddings {
    values: Array2<f32>,
}

impl SparseEmbeddings {
    pub fn new(values: Array2<f32>) -> Self {
        Self { values }
    }

    /// `(batch, vocab)`.
    pub fn shape(&self) -> (usize, usize) {
        self.values.dim()
    }

    pub fn len(&self) -> usize {
        self.values.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.values.nrows() == 0
    }

    pub fn row(&self, index: usize) -> Option<ArrayView1<'_, f32>> {
        (index < self.len()).then(|| self.values.row(index))
    }

    pub fn view(&self) -> ArrayView2<'_, f32> {
        self.values.view()
    }

    pub fn into_array(self) -> Array2<f32> {
        self.values
    }

    /// Number of non-zero dimensions of row `index`.
    pub fn active_dims(&self, index: usize) -> Option<usize> {
        self.row(index)
            .map(|row| row.iter().filter(|&&v| v != 0.0).count())
    }

    /// Non-zero entries of row `index`.
    pub fn to_sparse(&self, index: usize) -> Option<SparseVector> {
        self.row(index).map(SparseVector::from_dense)
    }
}

/// Non-zero entries of one embedding row; `indices` are strictly increasing.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SparseVector {
    pub indices: Vec<u32>,
    pub values: Vec<f32>,
}

impl SparseVector {
    pub fn from_dense(row: ArrayView1<f32>) -> Self {
        let (indices, values) = row
            .iter()
            .enumerate()
            .filter(|&(_, &v)| v != 0.0)
            .map(|(i, &v)| (i as u32, v))
            .unzip();
        Self { indices, values }
    }

    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    /// Inner product by merging the two index lists.
    pub fn dot(&self, other: &SparseVector) -> f32 {
        let (mut i, mut j) = (0, 0);
        let mut sum = 0.0;
        while i < self.indices.len() && j < other.indices.len() {
            match self.indices[i].cmp(&other.indices[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    sum += self.values[i] * other.values[j];
                    i += 1;
                    j += 1;
                }
            }
        }
        sum
    }
}
