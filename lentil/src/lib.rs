pub mod bulk; // synthetic bulk aggregation in batches
pub mod cell_sampler; // multinomial draws of cells
pub mod common; // shared types and helpers
pub mod distance; // latent-space distance matrix
pub mod error; // failure kinds of the pipeline
pub mod mixture; // randomized Gaussian mixtures over cells
pub mod probability; // mixture to cell probability vectors
pub mod sigma; // kernel bandwidth calibration
pub mod simulate; // toy reference data
pub mod training_set; // the whole synthesis pipeline

pub use error::SynthError;
pub use training_set::{build_training_set, TrainingSet, TrainingSetArgs};
