pub mod common_io; // buffered readers and writers
pub mod dmatrix_util; // dense matrix operations
pub mod sparse_util; // sparse matrix triplets
pub mod traits; // matrix operation traits
pub mod utils; // batching helpers
