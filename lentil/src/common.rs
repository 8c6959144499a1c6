pub use log::{info, warn};

pub type Mat = nalgebra::DMatrix<f64>;
pub type DVec = nalgebra::DVector<f64>;
pub type CscMat = nalgebra_sparse::CscMatrix<f64>;

/// counts-per-million
pub const CPM_TOTAL: f64 = 1e6;

/// A progress bar that only shows up in verbose mode
pub fn new_progress_bar(len: usize, verbose: bool) -> indicatif::ProgressBar {
    if verbose {
        indicatif::ProgressBar::new(len as u64)
    } else {
        indicatif::ProgressBar::hidden()
    }
}
